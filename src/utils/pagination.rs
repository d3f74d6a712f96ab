use serde::Deserialize;
use utoipa::IntoParams;

/// Pagination query parameters shared by every list endpoint.
#[derive(Debug, Clone, Copy, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    /// Page number (1-based)
    pub page: Option<u32>,
    /// Items per page (1..=100)
    pub per_page: Option<u32>,
}

impl PageQuery {
    pub const DEFAULT_PER_PAGE: u32 = 20;
    pub const MAX_PER_PAGE: u32 = 100;

    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
            .unwrap_or(Self::DEFAULT_PER_PAGE)
            .clamp(1, Self::MAX_PER_PAGE)
    }

    /// Row offset; computed in `u64` so the largest page number cannot overflow.
    pub fn offset(&self) -> u64 {
        u64::from(self.page() - 1) * u64::from(self.per_page())
    }
}

/// Declares a paginated list response for one resource.
macro_rules! page_response {
    ($name:ident, $item:ident) => {
        #[derive(serde::Serialize, utoipa::ToSchema)]
        pub struct $name {
            pub data: Vec<$item>,
            #[schema(example = 1)]
            pub page: u32,
            #[schema(example = 20)]
            pub per_page: u32,
            #[schema(example = 1)]
            pub total: i64,
        }

        impl $name {
            pub fn new(data: Vec<$item>, query: &$crate::utils::pagination::PageQuery, total: i64) -> Self {
                Self {
                    data,
                    page: query.page(),
                    per_page: query.per_page(),
                    total,
                }
            }
        }
    };
}

pub(crate) use page_response;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_first_page() {
        let q = PageQuery::default();
        assert_eq!(q.page(), 1);
        assert_eq!(q.per_page(), 20);
        assert_eq!(q.offset(), 0);
    }

    #[test]
    fn clamps_out_of_range_values() {
        let q = PageQuery {
            page: Some(0),
            per_page: Some(10_000),
        };
        assert_eq!(q.page(), 1);
        assert_eq!(q.per_page(), 100);

        let q = PageQuery {
            page: Some(3),
            per_page: Some(0),
        };
        assert_eq!(q.per_page(), 1);
        assert_eq!(q.offset(), 2);
    }

    #[test]
    fn last_page_number_does_not_overflow() {
        let q = PageQuery {
            page: Some(u32::MAX),
            per_page: Some(100),
        };
        assert_eq!(q.offset(), (u32::MAX as u64 - 1) * 100);
    }
}
