use crate::core::models::{
    common::Pagination,
    poll::{Insert as PollInsert, Poll, Query as PollQuery, Update as PollUpdate},
    vote::{AnonymousInsert, AnonymousVote, Insert as VoteInsert, Vote},
};
use crate::error::Error;
use uuid::Uuid;

/// Row lock held on a poll until the surrounding transaction ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowLock {
    /// Taken by votes; blocks option edits but not other votes.
    Share,
    /// Taken by updates and deletes.
    Update,
}

pub trait PollCommon {
    async fn insert(&mut self, poll: PollInsert) -> Result<Poll, Error>;
    async fn get(&mut self, id: Uuid) -> Result<Option<Poll>, Error>;
    async fn lock(&mut self, id: Uuid, mode: RowLock) -> Result<Option<Poll>, Error>;
    async fn get_by_share_token(&mut self, token: &str) -> Result<Option<Poll>, Error>;
    async fn update(&mut self, id: Uuid, update: PollUpdate) -> Result<Poll, Error>;
    async fn delete(&mut self, id: Uuid) -> Result<(), Error>;
    async fn query(&mut self, query: &PollQuery, pagination: Option<Pagination>) -> Result<Vec<Poll>, Error>;
    async fn count(&mut self, query: &PollQuery) -> Result<i64, Error>;
}

pub trait VoteCommon {
    /// Fails with `Rejection::AlreadyVoted` when the row violates a uniqueness
    /// constraint and with `Error::NotFound` when the poll no longer exists.
    async fn insert(&mut self, vote: VoteInsert) -> Result<Vote, Error>;
    async fn option_indexes_of_voter(&mut self, poll_id: Uuid, user_id: Uuid) -> Result<Vec<i32>, Error>;
}

pub trait AnonymousVoteCommon {
    async fn insert(&mut self, vote: AnonymousInsert) -> Result<AnonymousVote, Error>;
    async fn exists_for_session(&mut self, poll_id: Uuid, session_id: &str) -> Result<bool, Error>;
}

/// Reads over authenticated and anonymous votes together.
pub trait BallotCommon {
    async fn option_indexes(&mut self, poll_id: Uuid) -> Result<Vec<i32>, Error>;
    async fn count(&mut self, poll_id: Uuid) -> Result<i64, Error>;
}

pub trait Common: PollCommon + VoteCommon + AnonymousVoteCommon + BallotCommon {}

pub trait Store: Common {}

pub trait TxStore: Store {
    async fn commit(self) -> Result<(), Error>;
    async fn rollback(self) -> Result<(), Error>;
}

pub trait Manager {
    type Store: Store;
    type TxStore: TxStore;
    async fn db(&self) -> Result<Self::Store, Error>;
    async fn tx(&self) -> Result<Self::TxStore, Error>;
}
