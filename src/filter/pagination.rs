use serde::{Deserialize, Serialize};

use super::options::{DEFAULT_PAGE, DEFAULT_PER_PAGE};

/// Pagination metadata attached to list responses. Derived, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
    pub has_next_page: bool,
}

impl Pagination {
    /// `per_page <= 0` falls back to the default page size instead of dividing by zero
    pub fn new(total: i64, page: i64, per_page: i64) -> Self {
        let total = total.max(0);
        let page = if page < 1 { DEFAULT_PAGE } else { page };
        let per_page = if per_page < 1 { DEFAULT_PER_PAGE } else { per_page };

        let total_pages = if total == 0 { 0 } else { (total + per_page - 1) / per_page };

        Self {
            total,
            page,
            per_page,
            total_pages,
            has_next_page: page < total_pages,
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.per_page)
    }
}

/// In-memory fallback: slice one page out of an already loaded collection.
/// An offset past the end yields an empty page.
pub fn paginate_slice<T: Clone>(items: &[T], page: i64, per_page: i64) -> (Vec<T>, Pagination) {
    let pagination = Pagination::new(items.len() as i64, page, per_page);
    let start = usize::try_from(pagination.offset()).unwrap_or(usize::MAX);
    let page_items = items
        .iter()
        .skip(start)
        .take(pagination.per_page as usize)
        .cloned()
        .collect();
    (page_items, pagination)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ceiling_division_and_next_page() {
        for total in 0..60_i64 {
            for per_page in 1..12_i64 {
                for page in 1..8_i64 {
                    let p = Pagination::new(total, page, per_page);
                    let expected_pages = (total as f64 / per_page as f64).ceil() as i64;
                    assert_eq!(p.total_pages, expected_pages);
                    assert_eq!(p.has_next_page, page < expected_pages);
                    assert_eq!(p.has_next_page, p.offset() + per_page < total);
                }
            }
        }
    }

    #[test]
    fn empty_total() {
        let p = Pagination::new(0, 1, 10);
        assert_eq!(p.total_pages, 0);
        assert!(!p.has_next_page);
    }

    #[test]
    fn zero_per_page_uses_default() {
        let p = Pagination::new(25, 1, 0);
        assert_eq!(p.per_page, 10);
        assert_eq!(p.total_pages, 3);
        assert!(p.has_next_page);
    }

    #[test]
    fn offset_saturates_for_absurd_pages() {
        let pagination = Pagination::new(3, i64::MAX, 100);
        assert_eq!(pagination.offset(), i64::MAX);
        assert!(!pagination.has_next_page);

        let (items, _) = paginate_slice(&[1, 2, 3], i64::MAX, 100);
        assert!(items.is_empty());
    }

    #[test]
    fn slice_pages() {
        let items: Vec<i32> = (1..=25).collect();

        let (page, meta) = paginate_slice(&items, 3, 10);
        assert_eq!(page, vec![21, 22, 23, 24, 25]);
        assert!(!meta.has_next_page);

        let (page, meta) = paginate_slice(&items, 9, 10);
        assert!(page.is_empty());
        assert_eq!(meta.total, 25);
    }
}
