use crate::core::models::common::Pagination as PageClause;
use crate::error::Error;
use crate::serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_size")]
    pub size: i64,
}

fn default_page() -> i64 {
    1
}

fn default_size() -> i64 {
    20
}

impl Pagination {
    pub fn to_clause(&self) -> Result<PageClause, Error> {
        let size = self.size.clamp(1, 100);
        let offset = (self.page.max(1) - 1)
            .checked_mul(size)
            .ok_or_else(|| Error::Validation("Page out of range".into()))?;
        Ok(PageClause::new(size, Some(offset)))
    }
}

#[derive(Debug, Deserialize)]
pub struct CastVote {
    pub option_index: i64,
    #[serde(default)]
    pub is_anonymous: bool,
}
