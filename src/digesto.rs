// =============================================================================
// digesto.rs — THE REST SIDE OF DIGESTO
// =============================================================================
//
// Not everything needs a browser. Two questions the ops team asks all day
// can be answered straight from the JSON API:
//
// - "Who did this case get distributed to, and when?" (monitored events
//   of type 4 for a CNJ, plus the name of every company involved)
// - "Which party patterns does this client monitor?" (the company's regex
//   list, fed to the validator)
//
// Every call carries the bearer token and goes through the circuit breaker.
// The API answers in three different shapes depending on its mood (a bare
// array, `{items: [...]}`, or one lonely object), and we take all of them.
// =============================================================================

use chrono::{DateTime, FixedOffset};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::circuit_breaker::CircuitBreaker;
use crate::cnj;
use crate::config::Config;
use crate::dates::{self, NOT_AVAILABLE};

/// Monitored-event type for distributions.
const DISTRIBUTION_EVENT: u32 = 4;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Display offset for timestamps. Brasília has had no DST since 2019.
const BRASILIA_OFFSET_SECS: i32 = -3 * 3600;

#[derive(Debug, Error)]
pub enum DigestoError {
    #[error("Token de autenticação não configurado.")]
    MissingToken,

    #[error("Número CNJ inválido.")]
    InvalidCnj,

    #[error("ID da empresa inválido.")]
    InvalidCompanyId,

    #[error("Desculpe, esse processo não nos retornou informação")]
    NoInformation,

    #[error("API Digesto indisponível no momento, tente novamente em instantes")]
    CircuitOpen,

    #[error("Erro ao consultar API (HTTP {0})")]
    Status(u16),

    #[error("Erro ao consultar API: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid Digesto URL: {0}")]
    Url(#[from] url::ParseError),
}

/// One distribution of a case, ready for display.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DistributionRecord {
    pub cnj: String,
    pub distribution_id: String,
    pub distribution_sent: String,
    pub distribution_date: String,
    pub notified_at: String,
    pub user_company_id: Option<i64>,
    pub user_company_name: String,
    /// Sent to the client before the court distributed the case.
    pub sent_before_distributed: bool,
}

#[derive(Debug, Deserialize)]
struct MongoDate {
    #[serde(rename = "$date")]
    millis: f64,
}

#[derive(Debug, Default, Deserialize)]
struct EventData {
    #[serde(rename = "distribuicaoData", default)]
    distribuicao_data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MonitoredEvent {
    #[serde(rename = "$uri", default)]
    uri: Option<String>,
    #[serde(default)]
    created_at: Option<MongoDate>,
    #[serde(default)]
    notified_at: Option<MongoDate>,
    #[serde(default)]
    user_company_id: Option<i64>,
    #[serde(default)]
    data: Option<Vec<EventData>>,
}

impl MonitoredEvent {
    fn into_record(self, cnj: &str, company_names: &HashMap<i64, String>) -> DistributionRecord {
        let distribution_sent = self
            .created_at
            .map(|d| format_timestamp(d.millis as i64))
            .unwrap_or_else(|| NOT_AVAILABLE.to_string());
        let distribution_date = self
            .data
            .as_deref()
            .and_then(|data| data.first())
            .and_then(|first| first.distribuicao_data.as_deref())
            .filter(|raw| !raw.is_empty())
            .map(format_distribution_date)
            .unwrap_or_else(|| NOT_AVAILABLE.to_string());
        let user_company_name = self
            .user_company_id
            .and_then(|id| company_names.get(&id).cloned())
            .unwrap_or_else(|| NOT_AVAILABLE.to_string());

        DistributionRecord {
            cnj: cnj.to_string(),
            distribution_id: distribution_id(self.uri.as_deref()),
            sent_before_distributed: dates::is_sent_before_distributed(&distribution_sent, &distribution_date),
            distribution_sent,
            distribution_date,
            notified_at: self
                .notified_at
                .map(|d| format_timestamp(d.millis as i64))
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            user_company_id: self.user_company_id,
            user_company_name,
        }
    }
}

/// Last path segment of an event's `$uri`.
fn distribution_id(uri: Option<&str>) -> String {
    uri.and_then(|uri| uri.rsplit('/').next())
        .filter(|id| !id.is_empty())
        .unwrap_or(NOT_AVAILABLE)
        .to_string()
}

/// Epoch milliseconds as "DD/MM/YYYY, HH:MM:SS", Brasília time.
pub fn format_timestamp(millis: i64) -> String {
    let Some(offset) = FixedOffset::east_opt(BRASILIA_OFFSET_SECS) else {
        return NOT_AVAILABLE.to_string();
    };
    match DateTime::from_timestamp_millis(millis) {
        Some(utc) => utc.with_timezone(&offset).format("%d/%m/%Y, %H:%M:%S").to_string(),
        None => NOT_AVAILABLE.to_string(),
    }
}

/// "2026-01-15" -> "15/01/2026".
pub fn format_distribution_date(raw: &str) -> String {
    raw.split('-').rev().collect::<Vec<_>>().join("/")
}

/// Monitored events in any of the shapes the API returns.
fn events_from_response(body: Value) -> Vec<MonitoredEvent> {
    let items = match body {
        Value::Array(items) => items,
        Value::Object(mut object) => match object.remove("items") {
            Some(Value::Array(items)) => items,
            _ if object.contains_key("$uri") => vec![Value::Object(object)],
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };

    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(event) => Some(event),
            Err(e) => {
                debug!(error = %e, "Skipping malformed monitored event");
                None
            }
        })
        .collect()
}

/// Regex strings from either a bare array or `{regexps: [...]}`.
pub fn patterns_from_response(body: &Value) -> Vec<String> {
    let list = match body {
        Value::Array(items) => Some(items),
        Value::Object(object) => object.get("regexps").and_then(Value::as_array),
        _ => None,
    };
    list.map(|items| {
        items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect()
    })
    .unwrap_or_default()
}

pub struct DigestoClient {
    http: reqwest::Client,
    base_url: Url,
    token: Option<String>,
    breaker: Arc<CircuitBreaker>,
}

impl DigestoClient {
    pub fn new(config: &Config) -> Result<Self, DigestoError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("tribunal_radar/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let breaker = CircuitBreaker::new(
            "digesto",
            config.circuit_breaker_failure_threshold,
            config.circuit_breaker_reset_timeout,
            config.circuit_breaker_success_threshold,
        );

        Ok(Self {
            http,
            base_url: Url::parse(&config.digesto_base_url)?,
            token: config.digesto_api_token.clone(),
            breaker: Arc::new(breaker),
        })
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// GET `segments` under the base URL with bearer auth, JSON back.
    async fn get_json(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<Value, DigestoError> {
        let token = self.token.as_deref().ok_or(DigestoError::MissingToken)?;
        if !self.breaker.allow_request() {
            return Err(DigestoError::CircuitOpen);
        }

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| DigestoError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(segments);
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }

        debug!(url = %url, "Digesto request");
        let response = match self.http.get(url).bearer_auth(token).send().await {
            Ok(response) => response,
            Err(e) => {
                self.breaker.record_failure();
                warn!(error = %e, "Digesto request failed");
                return Err(e.into());
            }
        };

        let status = response.status();
        if status.is_server_error() || status.as_u16() == 429 {
            self.breaker.record_failure();
            warn!(status = status.as_u16(), "Digesto answered with an error");
            return Err(DigestoError::Status(status.as_u16()));
        }
        self.breaker.record_success();
        if !status.is_success() {
            return Err(DigestoError::Status(status.as_u16()));
        }

        Ok(response.json().await?)
    }

    /// Every distribution on record for the CNJ found in `raw_cnj`.
    pub async fn distribution_lookup(&self, raw_cnj: &str) -> Result<Vec<DistributionRecord>, DigestoError> {
        if self.token.is_none() {
            return Err(DigestoError::MissingToken);
        }
        let clean = cnj::extract_and_clean(raw_cnj).ok_or(DigestoError::InvalidCnj)?;
        let target_number = cnj::format(&clean);

        let filter = json!({ "evt_type": DISTRIBUTION_EVENT, "target_number": target_number }).to_string();
        let body = self
            .get_json(&["api", "monitored_event"], &[("where", filter.as_str())])
            .await?;

        let events = events_from_response(body);
        if events.is_empty() {
            return Err(DigestoError::NoInformation);
        }

        let company_ids: BTreeSet<i64> = events.iter().filter_map(|e| e.user_company_id).collect();
        let company_names: HashMap<i64, String> = join_all(
            company_ids
                .into_iter()
                .map(|id| async move { (id, self.company_name(id).await) }),
        )
        .await
        .into_iter()
        .collect();

        Ok(events
            .into_iter()
            .map(|event| event.into_record(&target_number, &company_names))
            .collect())
    }

    /// A company's display name, "N/A" when it can't be had.
    pub async fn company_name(&self, company_id: i64) -> String {
        let id = company_id.to_string();
        match self.get_json(&["api", "admin", "user_company", &id], &[]).await {
            Ok(body) => body
                .get("name")
                .and_then(Value::as_str)
                .filter(|name| !name.is_empty())
                .unwrap_or(NOT_AVAILABLE)
                .to_string(),
            Err(e) => {
                warn!(company_id = company_id, error = %e, "Company name lookup failed");
                NOT_AVAILABLE.to_string()
            }
        }
    }

    /// The party regexes a client company monitors.
    pub async fn regex_patterns(&self, company_id: &str) -> Result<Vec<String>, DigestoError> {
        let company_id = company_id.trim();
        if company_id.is_empty() || !company_id.chars().all(|c| c.is_ascii_digit()) {
            return Err(DigestoError::InvalidCompanyId);
        }
        let body = self
            .get_json(
                &["api", "admin", "user_company", company_id, "all_parte_ids"],
                &[("regexps", "true")],
            )
            .await?;
        Ok(patterns_from_response(&body))
    }
}
