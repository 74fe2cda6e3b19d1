//! Pagination request and response shapes.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

const DEFAULT_PAGE_SIZE: u64 = 20;
const MAX_PAGE_SIZE: u64 = 100;

#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema, IntoParams)]
pub struct PaginationParams {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

impl PaginationParams {
    pub fn page(&self) -> u64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }

    pub fn get_offset(&self) -> u64 {
        (self.page() - 1) * self.page_size()
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub page: u64,
    pub page_size: u64,
    pub total: u64,
    pub total_pages: u64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, params: &PaginationParams, total: u64) -> Self {
        let page_size = params.page_size();
        Self {
            data,
            page: params.page(),
            page_size,
            total,
            total_pages: total.div_ceil(page_size),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_clamping() {
        let p = PaginationParams::default();
        assert_eq!(p.page(), 1);
        assert_eq!(p.page_size(), 20);
        assert_eq!(p.get_offset(), 0);

        let p = PaginationParams {
            page: Some(0),
            page_size: Some(1000),
        };
        assert_eq!(p.page(), 1);
        assert_eq!(p.page_size(), 100);

        let p = PaginationParams {
            page: Some(3),
            page_size: Some(10),
        };
        assert_eq!(p.get_offset(), 20);
    }

    #[test]
    fn test_total_pages() {
        let p = PaginationParams {
            page: Some(1),
            page_size: Some(10),
        };
        assert_eq!(PaginatedResponse::new(vec![(); 10], &p, 21).total_pages, 3);
        assert_eq!(PaginatedResponse::<()>::new(vec![], &p, 0).total_pages, 0);
    }
}
