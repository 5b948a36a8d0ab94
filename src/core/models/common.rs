#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    limit: i64,
    offset: Option<i64>,
}

impl Pagination {
    pub fn new(limit: i64, offset: Option<i64>) -> Self {
        Self { limit, offset }
    }

    pub fn limit(&self) -> i64 {
        self.limit
    }

    pub fn offset(&self) -> Option<i64> {
        self.offset
    }
}
