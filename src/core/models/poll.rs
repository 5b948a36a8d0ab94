use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::Error;

pub const MIN_OPTIONS: usize = 2;
pub const MAX_TITLE_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ShowResults {
    Immediately,
    #[default]
    AfterVote,
    AfterEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub allow_multiple_votes: bool,
    pub show_results: ShowResults,
    pub is_public: bool,
    pub require_auth: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            allow_multiple_votes: false,
            show_results: ShowResults::AfterVote,
            is_public: true,
            require_auth: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOption {
    pub id: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Poll {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub owner_id: Option<Uuid>,
    pub share_token: String,
    pub options: Vec<PollOption>,
    pub settings: Settings,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Poll {
    pub fn is_owned_by(&self, uid: Uuid) -> bool {
        self.owner_id == Some(uid)
    }

    /// A poll has ended once its expiry is not strictly in the future.
    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(false, |at| at <= now)
    }
}

/// Option as submitted by a client; `id` is generated when missing.
#[derive(Debug, Clone, Deserialize)]
pub struct OptionInput {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollCreate {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub options: Vec<OptionInput>,
    #[serde(default)]
    pub settings: Option<Settings>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Partial update. `expires_at: null` clears the expiry, an absent key keeps it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PollPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub options: Option<Vec<OptionInput>>,
    #[serde(default)]
    pub settings: Option<Settings>,
    #[serde(default, deserialize_with = "double_option")]
    pub expires_at: Option<Option<DateTime<Utc>>>,
}

fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(de).map(Some)
}

#[derive(Debug, Clone)]
pub struct Insert {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub owner_id: Uuid,
    pub share_token: String,
    pub options: Vec<PollOption>,
    pub settings: Settings,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct Update {
    pub title: String,
    pub description: Option<String>,
    pub options: Vec<PollOption>,
    pub settings: Settings,
    pub expires_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct Query {
    pub owner_id_eq: Option<Uuid>,
}

pub fn normalize_title(title: &str) -> Result<String, Error> {
    let title = title.trim();
    if title.is_empty() {
        return Err(Error::Validation("Poll title is required".into()));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(Error::Validation(format!("Poll title must be at most {} characters", MAX_TITLE_CHARS)));
    }
    Ok(title.to_owned())
}

pub fn normalize_description(description: Option<String>) -> Option<String> {
    description.map(|d| d.trim().to_owned()).filter(|d| !d.is_empty())
}

/// Drops blank options, trims texts and assigns ids to new options.
pub fn normalize_options(options: Vec<OptionInput>) -> Result<Vec<PollOption>, Error> {
    let options: Vec<PollOption> = options
        .into_iter()
        .filter(|o| !o.text.trim().is_empty())
        .map(|o| PollOption {
            id: o.id.filter(|id| !id.trim().is_empty()).unwrap_or_else(|| Uuid::new_v4().simple().to_string()),
            text: o.text.trim().to_owned(),
            color: o.color,
        })
        .collect();
    if options.len() < MIN_OPTIONS {
        return Err(Error::Validation("At least 2 options are required".into()));
    }
    for (i, o) in options.iter().enumerate() {
        if options[..i].iter().any(|prev| prev.id == o.id) {
            return Err(Error::Validation(format!("Duplicate option id {}", o.id)));
        }
    }
    Ok(options)
}

/// Once votes exist they point at options by position, so the existing
/// options must keep their ids and order. Texts may change and new options
/// may be appended.
pub fn check_option_identity(current: &[PollOption], next: &[PollOption]) -> Result<(), Error> {
    if next.len() < current.len() || current.iter().zip(next).any(|(c, n)| c.id != n.id) {
        return Err(Error::Validation("Options referenced by votes cannot be removed or reordered".into()));
    }
    Ok(())
}
