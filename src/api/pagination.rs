use crate::config::MAX_PAGE_SIZE;
use crate::models::Paginated;
use axum::http::Uri;
use serde::Deserialize;
use utoipa::IntoParams;

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct PageQuery {
    /// 1-based page number
    pub page: Option<u64>,
    /// Page size
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageRequest {
    pub page: u64,
    pub limit: u64,
}

impl PageRequest {
    /// Zero-based index for `Paginator::fetch_page`.
    pub fn index(&self) -> u64 {
        self.page - 1
    }
}

impl PageQuery {
    pub fn resolve(&self, default_limit: u64) -> PageRequest {
        PageRequest {
            page: self.page.filter(|p| *p > 0).unwrap_or(1),
            limit: self
                .limit
                .filter(|l| *l > 0)
                .unwrap_or(default_limit)
                .min(MAX_PAGE_SIZE),
        }
    }

    /// Lenient parse of a raw query string; unknown keys are ignored.
    pub fn from_pairs(pairs: &[(String, String)]) -> Self {
        let find = |key: &str| {
            pairs
                .iter()
                .find(|(k, _)| k == key)
                .and_then(|(_, v)| v.parse().ok())
        };
        Self {
            page: find("page"),
            limit: find("limit"),
        }
    }
}

pub fn query_pairs(uri: &Uri) -> Vec<(String, String)> {
    uri.query()
        .and_then(|q| serde_urlencoded::from_str(q).ok())
        .unwrap_or_default()
}

fn page_link(uri: &Uri, page: u64, limit: u64) -> String {
    let mut pairs = query_pairs(uri);
    pairs.retain(|(k, _)| k != "page" && k != "limit");
    pairs.push(("page".to_string(), page.to_string()));
    pairs.push(("limit".to_string(), limit.to_string()));
    let query = serde_urlencoded::to_string(&pairs).unwrap_or_default();
    format!("{}?{}", uri.path(), query)
}

pub fn paginate<T>(uri: &Uri, request: PageRequest, count: u64, results: Vec<T>) -> Paginated<T> {
    let pages = count.div_ceil(request.limit);
    let next = (request.page < pages).then(|| page_link(uri, request.page + 1, request.limit));
    let previous = (request.page > 1 && pages > 0)
        .then(|| page_link(uri, (request.page - 1).min(pages), request.limit));

    Paginated {
        count,
        next,
        previous,
        results,
    }
}
