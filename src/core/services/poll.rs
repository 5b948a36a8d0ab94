use chrono::{DateTime, Utc};
use log::info;
use rand::{thread_rng, Rng};
use uuid::Uuid;

use crate::core::models::{
    common::Pagination,
    poll::{self, Insert as PollInsert, Poll, PollCreate, PollPatch, Query as PollQuery, Update as PollUpdate},
    vote::PollRef,
};
use crate::core::ports::repository::{BallotCommon, PollCommon, RowLock, Store, TxStore};
use crate::error::Error;

const SHARE_TOKEN_LEN: usize = 12;
const SHARE_TOKEN_CHARS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

pub fn random_share_token() -> String {
    let mut rng = thread_rng();
    (0..SHARE_TOKEN_LEN)
        .map(|_| SHARE_TOKEN_CHARS[rng.gen_range(0..SHARE_TOKEN_CHARS.len())] as char)
        .collect()
}

/// Private polls are reachable by id only for their owner. The share token
/// is itself the credential, so lookups through it are always allowed.
pub fn can_access(poll: &Poll, poll_ref: &PollRef, viewer: Option<Uuid>) -> bool {
    match poll_ref {
        PollRef::ShareToken(_) => true,
        PollRef::Id(_) => poll.settings.is_public || viewer.map_or(false, |uid| poll.is_owned_by(uid)),
    }
}

pub async fn find_poll<S>(storer: &mut S, poll_ref: &PollRef) -> Result<Option<Poll>, Error>
where
    S: Store,
{
    match poll_ref {
        PollRef::Id(id) => PollCommon::get(storer, *id).await,
        PollRef::ShareToken(token) => PollCommon::get_by_share_token(storer, token).await,
    }
}

/// Resolves a poll the viewer may see; anything else is reported as not found.
pub async fn accessible_poll<S>(storer: &mut S, poll_ref: &PollRef, viewer: Option<Uuid>) -> Result<Poll, Error>
where
    S: Store,
{
    match find_poll(storer, poll_ref).await? {
        Some(poll) if can_access(&poll, poll_ref, viewer) => Ok(poll),
        _ => Err(Error::NotFound),
    }
}

pub async fn create_poll<S>(storer: &mut S, uid: Uuid, create: PollCreate) -> Result<Poll, Error>
where
    S: Store,
{
    let insert = PollInsert {
        id: Uuid::new_v4(),
        title: poll::normalize_title(&create.title)?,
        description: poll::normalize_description(create.description),
        owner_id: uid,
        share_token: random_share_token(),
        options: poll::normalize_options(create.options)?,
        settings: create.settings.unwrap_or_default(),
        expires_at: create.expires_at,
    };
    let poll = PollCommon::insert(storer, insert).await?;
    info!("poll {} created by {}", poll.id, uid);
    Ok(poll)
}

pub async fn list_polls<S>(storer: &mut S, uid: Uuid, pagination: Pagination) -> Result<(Vec<Poll>, i64), Error>
where
    S: Store,
{
    let query = PollQuery { owner_id_eq: Some(uid) };
    let total = PollCommon::count(storer, &query).await?;
    let polls = PollCommon::query(storer, &query, Some(pagination)).await?;
    Ok((polls, total))
}

async fn owned_poll<S>(storer: &mut S, uid: Uuid, id: Uuid) -> Result<Poll, Error>
where
    S: Store,
{
    let poll = PollCommon::lock(storer, id, RowLock::Update).await?.ok_or(Error::NotFound)?;
    if !poll.is_owned_by(uid) {
        return Err(Error::Forbidden);
    }
    Ok(poll)
}

pub async fn update_poll<T>(mut storer: T, uid: Uuid, id: Uuid, patch: PollPatch, now: DateTime<Utc>) -> Result<Poll, Error>
where
    T: TxStore,
{
    let current = owned_poll(&mut storer, uid, id).await?;
    let options = match patch.options {
        Some(options) => {
            let options = poll::normalize_options(options)?;
            if BallotCommon::count(&mut storer, id).await? > 0 {
                poll::check_option_identity(&current.options, &options)?;
            }
            options
        }
        None => current.options,
    };
    let update = PollUpdate {
        title: match patch.title {
            Some(title) => poll::normalize_title(&title)?,
            None => current.title,
        },
        description: match patch.description {
            Some(description) => poll::normalize_description(description),
            None => current.description,
        },
        options,
        settings: patch.settings.unwrap_or(current.settings),
        expires_at: patch.expires_at.unwrap_or(current.expires_at),
        updated_at: now,
    };
    let poll = PollCommon::update(&mut storer, id, update).await?;
    storer.commit().await?;
    info!("poll {} updated", id);
    Ok(poll)
}

pub async fn delete_poll<T>(mut storer: T, uid: Uuid, id: Uuid) -> Result<(), Error>
where
    T: TxStore,
{
    owned_poll(&mut storer, uid, id).await?;
    PollCommon::delete(&mut storer, id).await?;
    storer.commit().await?;
    info!("poll {} deleted", id);
    Ok(())
}
