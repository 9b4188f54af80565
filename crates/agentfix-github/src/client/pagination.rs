//! Page-number pagination for GitHub list endpoints.
//!
//! List endpoints are read with `per_page` and `page` query parameters. The
//! loop stops at the first page that is empty or shorter than the page size,
//! whichever page that is.

use std::future::Future;

use crate::error::ApiError;

/// Page size used when none is configured (GitHub's maximum).
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// One page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based page number
    pub page: u32,
    /// Items per page
    pub per_page: u32,
}

impl PageRequest {
    /// Query parameters for this page.
    pub fn query(&self) -> [(&'static str, String); 2] {
        [
            ("per_page", self.per_page.to_string()),
            ("page", self.page.to_string()),
        ]
    }
}

/// Fetch every page of a listing and concatenate the items in order.
///
/// # Errors
///
/// The first failing page aborts the listing and its error is returned.
pub async fn collect_pages<T, F, Fut>(per_page: u32, mut fetch_page: F) -> Result<Vec<T>, ApiError>
where
    F: FnMut(PageRequest) -> Fut,
    Fut: Future<Output = Result<Vec<T>, ApiError>>,
{
    let per_page = per_page.max(1);
    let mut items = Vec::new();
    let mut page = 1;

    loop {
        let chunk = fetch_page(PageRequest { page, per_page }).await?;
        let is_last = is_last_page(chunk.len(), per_page);
        items.extend(chunk);

        if is_last {
            break;
        }
        page += 1;
    }

    Ok(items)
}

/// Whether a page of `len` items ends the listing.
pub fn is_last_page(len: usize, per_page: u32) -> bool {
    len == 0 || len < per_page as usize
}

#[cfg(test)]
#[path = "pagination_tests.rs"]
mod tests;
