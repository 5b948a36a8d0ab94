use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::core::models::poll::{Poll, ShowResults};
use crate::core::models::vote::PollRef;
use crate::core::ports::repository::{AnonymousVoteCommon, BallotCommon, Store, VoteCommon};
use crate::core::services::poll::accessible_poll;
use crate::core::tally::{tally, Tally};
use crate::error::Error;

#[derive(Debug, Clone, Default)]
pub struct Viewer {
    pub user_id: Option<Uuid>,
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PollView {
    pub poll: Poll,
    pub results: Option<Tally>,
    pub results_visible: bool,
    pub has_voted: bool,
}

pub fn results_visible(poll: &Poll, is_owner: bool, has_voted: bool, now: DateTime<Utc>) -> bool {
    if is_owner {
        return true;
    }
    match poll.settings.show_results {
        ShowResults::Immediately => true,
        ShowResults::AfterVote => has_voted || poll.has_ended(now),
        ShowResults::AfterEnd => poll.has_ended(now),
    }
}

async fn has_voted<S>(storer: &mut S, poll_id: Uuid, viewer: &Viewer) -> Result<bool, Error>
where
    S: Store,
{
    if let Some(uid) = viewer.user_id {
        if !VoteCommon::option_indexes_of_voter(storer, poll_id, uid).await?.is_empty() {
            return Ok(true);
        }
    }
    match &viewer.session_id {
        Some(session_id) => AnonymousVoteCommon::exists_for_session(storer, poll_id, session_id).await,
        None => Ok(false),
    }
}

/// Loads a poll together with a freshly computed tally, subject to the
/// poll's result-visibility policy.
pub async fn poll_view<S>(storer: &mut S, poll_ref: &PollRef, viewer: &Viewer, now: DateTime<Utc>) -> Result<PollView, Error>
where
    S: Store,
{
    let poll = accessible_poll(storer, poll_ref, viewer.user_id).await?;
    let is_owner = viewer.user_id.map_or(false, |uid| poll.is_owned_by(uid));
    let has_voted = has_voted(storer, poll.id, viewer).await?;
    let visible = results_visible(&poll, is_owner, has_voted, now);
    let results = if visible {
        let indexes = BallotCommon::option_indexes(storer, poll.id).await?;
        Some(tally(&poll.options, indexes))
    } else {
        None
    };
    Ok(PollView {
        poll,
        results,
        results_visible: visible,
        has_voted,
    })
}
