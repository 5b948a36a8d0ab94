use std::time::Duration;

use futures::stream::{self, Stream};
use tokio::time::{interval_at, Instant, Interval};
use uuid::Uuid;

use crate::actix_web::{
    http::header::{CACHE_CONTROL, CONTENT_TYPE},
    web::{Data, Path},
    HttpResponse,
};
use crate::bytes::Bytes;
use crate::context::UserInfo;
use crate::core::models::vote::{PollRef, VoteEvent};
use crate::core::ports::repository::Manager;
use crate::core::services::poll::accessible_poll;
use crate::error::Error;
use crate::impls::feed::{Subscription, VoteHub};

const KEEP_ALIVE: Duration = Duration::from_secs(15);
const KEEP_ALIVE_FRAME: &[u8] = b": keep-alive\n\n";

fn vote_frame(event: &VoteEvent) -> Result<Bytes, Error> {
    let data = serde_json::to_string(event).map_err(|e| Error::ServerError(e.to_string()))?;
    Ok(Bytes::from(format!("event: vote\ndata: {}\n\n", data)))
}

/// Server-sent events for one subscription. The stream ends when the hub
/// goes away; when the client disconnects the stream is dropped together
/// with its subscription.
pub(crate) fn event_stream(subscription: Subscription, keep_alive: Duration) -> impl Stream<Item = Result<Bytes, Error>> {
    let ticker = interval_at(Instant::now() + keep_alive, keep_alive);
    stream::unfold((subscription, ticker), |(mut subscription, mut ticker): (Subscription, Interval)| async move {
        let frame = tokio::select! {
            event = subscription.recv() => vote_frame(&event?),
            _ = ticker.tick() => Ok(Bytes::from_static(KEEP_ALIVE_FRAME)),
        };
        Some((frame, (subscription, ticker)))
    })
}

async fn open<M>(manager: &M, hub: &VoteHub, poll_ref: PollRef, user_info: Option<UserInfo>) -> Result<HttpResponse, Error>
where
    M: Manager,
{
    let poll = {
        let mut db = manager.db().await?;
        accessible_poll(&mut db, &poll_ref, user_info.map(|u| u.id)).await?
    };
    let subscription = hub.subscribe(poll.id);
    Ok(HttpResponse::Ok()
        .insert_header((CONTENT_TYPE, "text/event-stream"))
        .insert_header((CACHE_CONTROL, "no-cache"))
        .streaming(event_stream(subscription, KEEP_ALIVE)))
}

pub async fn by_id<M>(user_info: Option<UserInfo>, path: Path<(Uuid,)>, manager: Data<M>, hub: Data<VoteHub>) -> Result<HttpResponse, Error>
where
    M: Manager + 'static,
{
    let (id,) = path.into_inner();
    open(manager.get_ref(), hub.get_ref(), PollRef::Id(id), user_info).await
}

pub async fn by_share_token<M>(user_info: Option<UserInfo>, path: Path<(String,)>, manager: Data<M>, hub: Data<VoteHub>) -> Result<HttpResponse, Error>
where
    M: Manager + 'static,
{
    let (token,) = path.into_inner();
    open(manager.get_ref(), hub.get_ref(), PollRef::ShareToken(token), user_info).await
}
