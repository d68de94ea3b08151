//! Where things live in the Digesto report page (AngularJS + ui-grid).

use crate::browser::Locator;

/// Case-insensitive label of the filter value we want.
pub const NOT_UPDATED_PATTERN: &str = r"N[ãa]o\s+Atualizado(s)?";

/// Scrollable part of the grid.
pub const GRID_VIEWPORT: &str = ".ui-grid-viewport";

pub const PAGE_SIZE_LABEL: &str = "1000";

pub fn update_request_link() -> Locator {
    Locator::css("a").has_text("Pedido de atualização")
}

pub fn status_header() -> Locator {
    Locator::css(".ui-grid-header-cell").has_text("Status")
}

pub fn status_header_buttons() -> Locator {
    status_header().within("button")
}

pub fn status_header_menu_icon() -> Locator {
    status_header().within(".ui-grid-icon-menu")
}

pub fn not_updated_option() -> Locator {
    Locator::css("div.ui-grid-cell-contents").matching(NOT_UPDATED_PATTERN)
}

pub fn filter_button() -> Locator {
    Locator::css("button").has_text("Filtrar")
}

pub fn generic_filter_button() -> Locator {
    Locator::css("button.ui-grid-filter-button")
}

pub fn page_size_select() -> Locator {
    Locator::css("select[ng-model='grid.options.paginationPageSize']")
}

pub fn grid_rows() -> Locator {
    Locator::css(".ui-grid-canvas div[role='row']")
}

/// First cell of every rendered row.
pub fn first_cells() -> Locator {
    grid_rows().first_within("div[role='gridcell']")
}

pub fn progress_row() -> Locator {
    Locator::css("tr").has_text("Progresso")
}

pub fn progress_anywhere() -> Locator {
    Locator::css("*").has_text("Progresso")
}
