//! Shared pagination types for API query parameters.
//!
//! Paginated search endpoints take 1-based `page` and `size` plus an optional
//! `sortField`/`sortOrder`. Values are clamped rather than rejected.

use crate::db::handlers::sorting::Sort;
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use utoipa::{IntoParams, ToSchema};

/// Default number of items per page.
pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// Maximum number of items that can be requested per page.
pub const MAX_PAGE_SIZE: i64 = 100;

/// Page-based pagination and sorting parameters.
#[serde_as]
#[derive(Debug, Default, Clone, Deserialize, IntoParams, ToSchema)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct PageParams {
    /// 1-based page number (default: 1)
    #[param(default = 1, minimum = 1)]
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub page: Option<i64>,

    /// Items per page (default: 10, max: 100)
    #[param(default = 10, minimum = 1, maximum = 100)]
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub size: Option<i64>,

    /// Field to sort by. Unknown fields fall back to the default ordering.
    pub sort_field: Option<String>,

    /// `asc` (default) or `desc`
    pub sort_order: Option<String>,
}

impl PageParams {
    /// Page number, at least 1.
    #[inline]
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    /// Page size, clamped between 1 and MAX_PAGE_SIZE.
    #[inline]
    pub fn size(&self) -> i64 {
        self.size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    /// Rows to skip for the requested page.
    #[inline]
    pub fn offset(&self) -> i64 {
        (self.page() - 1).saturating_mul(self.size())
    }

    pub fn sort(&self) -> Sort {
        Sort::new(self.sort_field.clone(), self.sort_order.as_deref())
    }
}

/// Paginated response wrapper for search endpoints.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedResponse<T: ToSchema> {
    /// The items for the current page
    pub items: Vec<T>,
    /// Total number of items matching the query (before pagination)
    pub total: i64,
    pub page: i64,
    pub size: i64,
    pub total_pages: i64,
}

impl<T: ToSchema> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, total: i64, params: &PageParams) -> Self {
        let size = params.size();
        Self {
            items,
            total,
            page: params.page(),
            size,
            total_pages: (total + size - 1) / size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::handlers::sorting::SortOrder;

    fn params(query: &str) -> PageParams {
        let uri: axum::http::Uri = format!("http://localhost/?{query}").parse().unwrap();
        axum::extract::Query::<PageParams>::try_from_uri(&uri).unwrap().0
    }

    #[test]
    fn test_defaults() {
        let p = params("");
        assert_eq!((p.page(), p.size(), p.offset()), (1, DEFAULT_PAGE_SIZE, 0));
        assert_eq!(p.sort(), Sort::default());
    }

    #[test]
    fn test_values_are_clamped() {
        let p = params("page=0&size=1000");
        assert_eq!((p.page(), p.size()), (1, MAX_PAGE_SIZE));

        let p = params("page=-3&size=-1");
        assert_eq!((p.page(), p.size()), (1, 1));
    }

    #[test]
    fn test_offset_and_sort() {
        let p = params("page=3&size=20&sortField=nombre&sortOrder=DESC");
        assert_eq!(p.offset(), 40);
        let sort = p.sort();
        assert_eq!(sort.field.as_deref(), Some("nombre"));
        assert_eq!(sort.order, SortOrder::Desc);
    }

    #[test]
    fn test_total_pages() {
        let p = params("size=10");
        assert_eq!(PaginatedResponse::<i64>::new(vec![], 0, &p).total_pages, 0);
        assert_eq!(PaginatedResponse::<i64>::new(vec![], 10, &p).total_pages, 1);
        assert_eq!(PaginatedResponse::<i64>::new(vec![], 11, &p).total_pages, 2);
    }
}
