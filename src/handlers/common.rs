use axum::http::{header, HeaderMap};
use serde::{Deserialize, Serialize};
use utoipa::IntoParams;

/// Pagination parameters for list operations
#[derive(Debug, Deserialize, Serialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PaginationParams {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u64,
}

fn default_page() -> u64 {
    1
}

fn default_per_page() -> u64 {
    crate::services::orders::DEFAULT_PER_PAGE
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

/// The request's `Origin` if it is an http(s) origin, otherwise `fallback`.
///
/// Browsers send `Origin: null` for opaque origins; that falls back too.
pub fn request_origin(headers: &HeaderMap, fallback: &str) -> String {
    headers
        .get(header::ORIGIN)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|origin| origin.starts_with("https://") || origin.starts_with("http://"))
        .unwrap_or(fallback)
        .to_string()
}
