use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Vote {
    pub id: Uuid,
    pub poll_id: Uuid,
    pub user_id: Uuid,
    pub option_index: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnonymousVote {
    pub id: Uuid,
    pub poll_id: Uuid,
    pub option_index: i32,
    pub ip_hash: Option<String>,
    pub session_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Insert {
    pub id: Uuid,
    pub poll_id: Uuid,
    pub user_id: Uuid,
    pub option_index: i32,
    /// Set when the poll disallows multiple votes; at most one exclusive row
    /// may exist per (poll, user).
    pub exclusive: bool,
}

#[derive(Debug, Clone)]
pub struct AnonymousInsert {
    pub id: Uuid,
    pub poll_id: Uuid,
    pub option_index: i32,
    pub ip_hash: Option<String>,
    pub session_id: Option<String>,
}

/// Advisory bookkeeping for anonymous votes. Never used as a uniqueness key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WeakIdentity {
    pub ip_hash: Option<String>,
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Voter {
    User(Uuid),
    Anonymous(WeakIdentity),
}

impl Voter {
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Voter::User(id) => Some(*id),
            Voter::Anonymous(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollRef {
    Id(Uuid),
    ShareToken(String),
}

#[derive(Debug, Clone)]
pub struct Ballot {
    pub poll: PollRef,
    pub option_index: i64,
    pub voter: Voter,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RecordedVote {
    Authenticated(Vote),
    Anonymous(AnonymousVote),
}

/// Event pushed to live viewers for every persisted vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoteEvent {
    pub poll_id: Uuid,
    pub option_index: i32,
    pub anonymous: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&RecordedVote> for VoteEvent {
    fn from(vote: &RecordedVote) -> Self {
        match vote {
            RecordedVote::Authenticated(v) => VoteEvent {
                poll_id: v.poll_id,
                option_index: v.option_index,
                anonymous: false,
                created_at: v.created_at,
            },
            RecordedVote::Anonymous(v) => VoteEvent {
                poll_id: v.poll_id,
                option_index: v.option_index,
                anonymous: true,
                created_at: v.created_at,
            },
        }
    }
}
