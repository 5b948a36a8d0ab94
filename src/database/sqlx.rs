use crate::core::guard::Rejection;
use crate::core::models::{
    common::Pagination,
    poll::{Insert as PollInsert, Poll, PollOption, Query as PollQuery, Settings, Update as PollUpdate},
    vote::{AnonymousInsert, AnonymousVote, Insert as VoteInsert, Vote},
};
use crate::core::ports::repository::{AnonymousVoteCommon, BallotCommon, Common, Manager, PollCommon, RowLock, Store, TxStore, VoteCommon};
use crate::error::Error;
use chrono::{DateTime, Utc};
use sqlx::pool::PoolConnection;
use sqlx::types::Json;
use sqlx::{query, query_as, query_scalar, FromRow, PgConnection, PgPool, Postgres, QueryBuilder, Transaction};
use std::ops::DerefMut;
use uuid::Uuid;

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Maps constraint violations on vote inserts to their domain meaning.
fn vote_insert_error(err: sqlx::Error) -> Error {
    if let sqlx::Error::Database(db_err) = &err {
        match db_err.code().as_deref() {
            Some(UNIQUE_VIOLATION) => return Rejection::AlreadyVoted.into(),
            Some(FOREIGN_KEY_VIOLATION) => return Error::NotFound,
            _ => {}
        }
    }
    Error::Database(err)
}

#[derive(Debug, FromRow)]
struct PollRow {
    id: Uuid,
    title: String,
    description: Option<String>,
    owner_id: Option<Uuid>,
    share_token: String,
    options: Json<Vec<PollOption>>,
    settings: Json<Settings>,
    expires_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PollRow> for Poll {
    fn from(row: PollRow) -> Self {
        Poll {
            id: row.id,
            title: row.title,
            description: row.description,
            owner_id: row.owner_id,
            share_token: row.share_token,
            options: row.options.0,
            settings: row.settings.0,
            expires_at: row.expires_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct VoteRow {
    id: Uuid,
    poll_id: Uuid,
    user_id: Uuid,
    option_index: i32,
    created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct AnonymousVoteRow {
    id: Uuid,
    poll_id: Uuid,
    option_index: i32,
    ip_hash: Option<String>,
    session_id: Option<String>,
    created_at: DateTime<Utc>,
}

fn lock_clause(mode: RowLock) -> &'static str {
    match mode {
        RowLock::Share => "FOR SHARE",
        RowLock::Update => "FOR UPDATE",
    }
}

const POLL_COLUMNS: &str = "id, title, description, owner_id, share_token, options, settings, expires_at, created_at, updated_at";

pub struct PgSqlx<E>
where
    E: DerefMut<Target = PgConnection>,
{
    executor: E,
}

impl<E> PgSqlx<E>
where
    E: DerefMut<Target = PgConnection>,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }
}

impl<E> PollCommon for PgSqlx<E>
where
    E: DerefMut<Target = PgConnection>,
{
    async fn insert(&mut self, poll: PollInsert) -> Result<Poll, Error> {
        let row: PollRow = query_as(&format!(
            "INSERT INTO polls (id, title, description, owner_id, share_token, options, settings, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}",
            POLL_COLUMNS
        ))
        .bind(poll.id)
        .bind(poll.title)
        .bind(poll.description)
        .bind(poll.owner_id)
        .bind(poll.share_token)
        .bind(Json(poll.options))
        .bind(Json(poll.settings))
        .bind(poll.expires_at)
        .fetch_one(&mut *self.executor)
        .await?;
        Ok(row.into())
    }

    async fn get(&mut self, id: Uuid) -> Result<Option<Poll>, Error> {
        let row: Option<PollRow> = query_as(&format!("SELECT {} FROM polls WHERE id = $1", POLL_COLUMNS))
            .bind(id)
            .fetch_optional(&mut *self.executor)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn lock(&mut self, id: Uuid, mode: RowLock) -> Result<Option<Poll>, Error> {
        let row: Option<PollRow> = query_as(&format!("SELECT {} FROM polls WHERE id = $1 {}", POLL_COLUMNS, lock_clause(mode)))
            .bind(id)
            .fetch_optional(&mut *self.executor)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn get_by_share_token(&mut self, token: &str) -> Result<Option<Poll>, Error> {
        let row: Option<PollRow> = query_as(&format!("SELECT {} FROM polls WHERE share_token = $1", POLL_COLUMNS))
            .bind(token)
            .fetch_optional(&mut *self.executor)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn update(&mut self, id: Uuid, update: PollUpdate) -> Result<Poll, Error> {
        let row: Option<PollRow> = query_as(&format!(
            "UPDATE polls
            SET title = $1, description = $2, options = $3, settings = $4, expires_at = $5, updated_at = $6
            WHERE id = $7
            RETURNING {}",
            POLL_COLUMNS
        ))
        .bind(update.title)
        .bind(update.description)
        .bind(Json(update.options))
        .bind(Json(update.settings))
        .bind(update.expires_at)
        .bind(update.updated_at)
        .bind(id)
        .fetch_optional(&mut *self.executor)
        .await?;
        row.map(Into::into).ok_or(Error::NotFound)
    }

    async fn delete(&mut self, id: Uuid) -> Result<(), Error> {
        query("DELETE FROM polls WHERE id = $1").bind(id).execute(&mut *self.executor).await?;
        Ok(())
    }

    async fn query(&mut self, query: &PollQuery, pagination: Option<Pagination>) -> Result<Vec<Poll>, Error> {
        let mut stmt = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM polls WHERE 1 = 1", POLL_COLUMNS));
        if let Some(uid) = query.owner_id_eq {
            stmt.push(" AND owner_id = ").push_bind(uid);
        }
        stmt.push(" ORDER BY created_at DESC");
        if let Some(page) = pagination {
            stmt.push(" LIMIT ").push_bind(page.limit());
            if let Some(offset) = page.offset() {
                stmt.push(" OFFSET ").push_bind(offset);
            }
        }
        let rows: Vec<PollRow> = stmt.build_query_as().fetch_all(&mut *self.executor).await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn count(&mut self, query: &PollQuery) -> Result<i64, Error> {
        let mut stmt = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM polls WHERE 1 = 1");
        if let Some(uid) = query.owner_id_eq {
            stmt.push(" AND owner_id = ").push_bind(uid);
        }
        let (n,): (i64,) = stmt.build_query_as().fetch_one(&mut *self.executor).await?;
        Ok(n)
    }
}

impl<E> VoteCommon for PgSqlx<E>
where
    E: DerefMut<Target = PgConnection>,
{
    async fn insert(&mut self, vote: VoteInsert) -> Result<Vote, Error> {
        let row: VoteRow = query_as(
            "INSERT INTO votes (id, poll_id, user_id, option_index, exclusive)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, poll_id, user_id, option_index, created_at",
        )
        .bind(vote.id)
        .bind(vote.poll_id)
        .bind(vote.user_id)
        .bind(vote.option_index)
        .bind(vote.exclusive)
        .fetch_one(&mut *self.executor)
        .await
        .map_err(vote_insert_error)?;
        Ok(Vote {
            id: row.id,
            poll_id: row.poll_id,
            user_id: row.user_id,
            option_index: row.option_index,
            created_at: row.created_at,
        })
    }

    async fn option_indexes_of_voter(&mut self, poll_id: Uuid, user_id: Uuid) -> Result<Vec<i32>, Error> {
        let indexes = query_scalar("SELECT option_index FROM votes WHERE poll_id = $1 AND user_id = $2")
            .bind(poll_id)
            .bind(user_id)
            .fetch_all(&mut *self.executor)
            .await?;
        Ok(indexes)
    }
}

impl<E> AnonymousVoteCommon for PgSqlx<E>
where
    E: DerefMut<Target = PgConnection>,
{
    async fn insert(&mut self, vote: AnonymousInsert) -> Result<AnonymousVote, Error> {
        let row: AnonymousVoteRow = query_as(
            "INSERT INTO anonymous_votes (id, poll_id, option_index, ip_hash, session_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, poll_id, option_index, ip_hash, session_id, created_at",
        )
        .bind(vote.id)
        .bind(vote.poll_id)
        .bind(vote.option_index)
        .bind(vote.ip_hash)
        .bind(vote.session_id)
        .fetch_one(&mut *self.executor)
        .await
        .map_err(vote_insert_error)?;
        Ok(AnonymousVote {
            id: row.id,
            poll_id: row.poll_id,
            option_index: row.option_index,
            ip_hash: row.ip_hash,
            session_id: row.session_id,
            created_at: row.created_at,
        })
    }

    async fn exists_for_session(&mut self, poll_id: Uuid, session_id: &str) -> Result<bool, Error> {
        let exists = query_scalar("SELECT EXISTS(SELECT 1 FROM anonymous_votes WHERE poll_id = $1 AND session_id = $2)")
            .bind(poll_id)
            .bind(session_id)
            .fetch_one(&mut *self.executor)
            .await?;
        Ok(exists)
    }
}

impl<E> BallotCommon for PgSqlx<E>
where
    E: DerefMut<Target = PgConnection>,
{
    async fn option_indexes(&mut self, poll_id: Uuid) -> Result<Vec<i32>, Error> {
        let indexes = query_scalar(
            "SELECT option_index FROM votes WHERE poll_id = $1
            UNION ALL
            SELECT option_index FROM anonymous_votes WHERE poll_id = $1",
        )
        .bind(poll_id)
        .fetch_all(&mut *self.executor)
        .await?;
        Ok(indexes)
    }

    async fn count(&mut self, poll_id: Uuid) -> Result<i64, Error> {
        let n = query_scalar(
            "SELECT (SELECT COUNT(*) FROM votes WHERE poll_id = $1) + (SELECT COUNT(*) FROM anonymous_votes WHERE poll_id = $1)",
        )
        .bind(poll_id)
        .fetch_one(&mut *self.executor)
        .await?;
        Ok(n)
    }
}

impl Common for PgSqlx<PoolConnection<Postgres>> {}
impl Common for PgSqlx<Transaction<'static, Postgres>> {}
impl Store for PgSqlx<PoolConnection<Postgres>> {}
impl Store for PgSqlx<Transaction<'static, Postgres>> {}

impl TxStore for PgSqlx<Transaction<'static, Postgres>> {
    async fn commit(self) -> Result<(), Error> {
        self.executor.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), Error> {
        self.executor.rollback().await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct PgSqlxManager {
    pool: PgPool,
}

impl PgSqlxManager {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl Manager for PgSqlxManager {
    type Store = PgSqlx<PoolConnection<Postgres>>;
    type TxStore = PgSqlx<Transaction<'static, Postgres>>;

    async fn db(&self) -> Result<Self::Store, Error> {
        let conn = self.pool.acquire().await?;
        Ok(PgSqlx::new(conn))
    }

    async fn tx(&self) -> Result<Self::TxStore, Error> {
        let tx = self.pool.begin().await?;
        Ok(PgSqlx::new(tx))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_vote_lock_conflicts_only_with_update_lock() {
        assert_eq!(lock_clause(RowLock::Share), "FOR SHARE");
        assert_eq!(lock_clause(RowLock::Update), "FOR UPDATE");
    }

    #[test]
    fn test_vote_insert_error_passthrough() {
        assert!(matches!(vote_insert_error(sqlx::Error::RowNotFound), Error::Database(_)));
    }
}
