//! Process-local store for `STORE_BACKEND=memory` and the tests; transactions are not isolated.

use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use crate::core::guard::Rejection;
use crate::core::models::{
    common::Pagination,
    poll::{Insert as PollInsert, Poll, Query as PollQuery, Update as PollUpdate},
    vote::{AnonymousInsert, AnonymousVote, Insert as VoteInsert, Vote},
};
use crate::core::ports::repository::{AnonymousVoteCommon, BallotCommon, Common, Manager, PollCommon, RowLock, Store, TxStore, VoteCommon};
use crate::error::Error;

#[derive(Debug, Clone)]
struct VoteRow {
    vote: Vote,
    exclusive: bool,
}

#[derive(Debug, Default)]
struct Tables {
    polls: Vec<Poll>,
    votes: Vec<VoteRow>,
    anonymous_votes: Vec<AnonymousVote>,
    #[cfg(test)]
    locks: Vec<(Uuid, RowLock)>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryManager {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryManager {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) fn locks_taken(&self) -> Vec<(Uuid, RowLock)> {
        self.tables.lock().unwrap().locks.clone()
    }
}

pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl PollCommon for MemoryStore {
    async fn insert(&mut self, poll: PollInsert) -> Result<Poll, Error> {
        let mut tables = self.tables();
        if tables.polls.iter().any(|p| p.id == poll.id || p.share_token == poll.share_token) {
            return Err(Error::ServerError("duplicate poll key".into()));
        }
        let now = Utc::now();
        let poll = Poll {
            id: poll.id,
            title: poll.title,
            description: poll.description,
            owner_id: Some(poll.owner_id),
            share_token: poll.share_token,
            options: poll.options,
            settings: poll.settings,
            expires_at: poll.expires_at,
            created_at: now,
            updated_at: now,
        };
        tables.polls.push(poll.clone());
        Ok(poll)
    }

    async fn get(&mut self, id: Uuid) -> Result<Option<Poll>, Error> {
        Ok(self.tables().polls.iter().find(|p| p.id == id).cloned())
    }

    // Every call already holds the table mutex, so the request is only recorded.
    async fn lock(&mut self, id: Uuid, mode: RowLock) -> Result<Option<Poll>, Error> {
        #[cfg(test)]
        self.tables().locks.push((id, mode));
        #[cfg(not(test))]
        let _ = mode;
        PollCommon::get(self, id).await
    }

    async fn get_by_share_token(&mut self, token: &str) -> Result<Option<Poll>, Error> {
        Ok(self.tables().polls.iter().find(|p| p.share_token == token).cloned())
    }

    async fn update(&mut self, id: Uuid, update: PollUpdate) -> Result<Poll, Error> {
        let mut tables = self.tables();
        let poll = tables.polls.iter_mut().find(|p| p.id == id).ok_or(Error::NotFound)?;
        poll.title = update.title;
        poll.description = update.description;
        poll.options = update.options;
        poll.settings = update.settings;
        poll.expires_at = update.expires_at;
        poll.updated_at = update.updated_at;
        Ok(poll.clone())
    }

    async fn delete(&mut self, id: Uuid) -> Result<(), Error> {
        let mut tables = self.tables();
        tables.polls.retain(|p| p.id != id);
        tables.votes.retain(|v| v.vote.poll_id != id);
        tables.anonymous_votes.retain(|v| v.poll_id != id);
        Ok(())
    }

    async fn query(&mut self, query: &PollQuery, pagination: Option<Pagination>) -> Result<Vec<Poll>, Error> {
        let tables = self.tables();
        let mut polls: Vec<Poll> = tables
            .polls
            .iter()
            .rev()
            .filter(|p| query.owner_id_eq.map_or(true, |uid| p.owner_id == Some(uid)))
            .cloned()
            .collect();
        polls.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let polls = match pagination {
            Some(page) => polls
                .into_iter()
                .skip(page.offset().unwrap_or(0).max(0) as usize)
                .take(page.limit().max(0) as usize)
                .collect(),
            None => polls,
        };
        Ok(polls)
    }

    async fn count(&mut self, query: &PollQuery) -> Result<i64, Error> {
        let tables = self.tables();
        let n = tables.polls.iter().filter(|p| query.owner_id_eq.map_or(true, |uid| p.owner_id == Some(uid))).count();
        Ok(n as i64)
    }
}

impl VoteCommon for MemoryStore {
    async fn insert(&mut self, vote: VoteInsert) -> Result<Vote, Error> {
        let mut tables = self.tables();
        if !tables.polls.iter().any(|p| p.id == vote.poll_id) {
            return Err(Error::NotFound);
        }
        let conflict = tables.votes.iter().any(|row| {
            row.vote.poll_id == vote.poll_id
                && row.vote.user_id == vote.user_id
                && (row.vote.option_index == vote.option_index || (row.exclusive && vote.exclusive))
        });
        if conflict {
            return Err(Rejection::AlreadyVoted.into());
        }
        let row = VoteRow {
            vote: Vote {
                id: vote.id,
                poll_id: vote.poll_id,
                user_id: vote.user_id,
                option_index: vote.option_index,
                created_at: Utc::now(),
            },
            exclusive: vote.exclusive,
        };
        tables.votes.push(row.clone());
        Ok(row.vote)
    }

    async fn option_indexes_of_voter(&mut self, poll_id: Uuid, user_id: Uuid) -> Result<Vec<i32>, Error> {
        let tables = self.tables();
        Ok(tables
            .votes
            .iter()
            .filter(|row| row.vote.poll_id == poll_id && row.vote.user_id == user_id)
            .map(|row| row.vote.option_index)
            .collect())
    }
}

impl AnonymousVoteCommon for MemoryStore {
    async fn insert(&mut self, vote: AnonymousInsert) -> Result<AnonymousVote, Error> {
        let mut tables = self.tables();
        if !tables.polls.iter().any(|p| p.id == vote.poll_id) {
            return Err(Error::NotFound);
        }
        let vote = AnonymousVote {
            id: vote.id,
            poll_id: vote.poll_id,
            option_index: vote.option_index,
            ip_hash: vote.ip_hash,
            session_id: vote.session_id,
            created_at: Utc::now(),
        };
        tables.anonymous_votes.push(vote.clone());
        Ok(vote)
    }

    async fn exists_for_session(&mut self, poll_id: Uuid, session_id: &str) -> Result<bool, Error> {
        let tables = self.tables();
        Ok(tables
            .anonymous_votes
            .iter()
            .any(|v| v.poll_id == poll_id && v.session_id.as_deref() == Some(session_id)))
    }
}

impl BallotCommon for MemoryStore {
    async fn option_indexes(&mut self, poll_id: Uuid) -> Result<Vec<i32>, Error> {
        let tables = self.tables();
        let authenticated = tables.votes.iter().filter(|row| row.vote.poll_id == poll_id).map(|row| row.vote.option_index);
        let anonymous = tables.anonymous_votes.iter().filter(|v| v.poll_id == poll_id).map(|v| v.option_index);
        Ok(authenticated.chain(anonymous).collect())
    }

    async fn count(&mut self, poll_id: Uuid) -> Result<i64, Error> {
        let tables = self.tables();
        let n = tables.votes.iter().filter(|row| row.vote.poll_id == poll_id).count()
            + tables.anonymous_votes.iter().filter(|v| v.poll_id == poll_id).count();
        Ok(n as i64)
    }
}

impl Common for MemoryStore {}
impl Store for MemoryStore {}

impl TxStore for MemoryStore {
    async fn commit(self) -> Result<(), Error> {
        Ok(())
    }

    async fn rollback(self) -> Result<(), Error> {
        Ok(())
    }
}

impl Manager for MemoryManager {
    type Store = MemoryStore;
    type TxStore = MemoryStore;

    async fn db(&self) -> Result<MemoryStore, Error> {
        Ok(MemoryStore {
            tables: self.tables.clone(),
        })
    }

    async fn tx(&self) -> Result<MemoryStore, Error> {
        self.db().await
    }
}
