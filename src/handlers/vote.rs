use chrono::Utc;
use uuid::Uuid;

use crate::actix_web::{
    web::{Data, Json, Path},
    HttpRequest,
};
use crate::config::Config;
use crate::context::UserInfo;
use crate::core::models::vote::{Ballot, PollRef, RecordedVote, Voter};
use crate::core::ports::repository::Manager;
use crate::core::services::vote::cast_vote;
use crate::error::Error;
use crate::handlers::weak_identity;
use crate::impls::feed::VoteHub;
use crate::request::CastVote;
use crate::response::VoteResponse;

/// A vote is anonymous only when the client asks for it; otherwise the
/// caller must carry an identity.
fn voter(user_info: Option<UserInfo>, is_anonymous: bool, req: &HttpRequest, salt: &str) -> Result<Voter, Error> {
    if is_anonymous {
        return Ok(Voter::Anonymous(weak_identity(req, salt)));
    }
    user_info.map(|u| Voter::User(u.id)).ok_or(Error::Unauthorized)
}

async fn cast<M>(
    manager: &M,
    hub: &VoteHub,
    config: &Config,
    poll: PollRef,
    user_info: Option<UserInfo>,
    body: CastVote,
    req: &HttpRequest,
) -> Result<Json<VoteResponse<RecordedVote>>, Error>
where
    M: Manager,
{
    let ballot = Ballot {
        poll,
        option_index: body.option_index,
        voter: voter(user_info, body.is_anonymous, req, &config.hint_salt)?,
    };
    let tx = manager.tx().await?;
    let vote = cast_vote(tx, hub, ballot, Utc::now()).await?;
    Ok(Json(VoteResponse {
        vote,
        message: "Vote recorded successfully",
    }))
}

pub async fn cast_by_id<M>(
    user_info: Option<UserInfo>,
    path: Path<(Uuid,)>,
    Json(body): Json<CastVote>,
    req: HttpRequest,
    manager: Data<M>,
    hub: Data<VoteHub>,
    config: Data<Config>,
) -> Result<Json<VoteResponse<RecordedVote>>, Error>
where
    M: Manager + 'static,
{
    let (id,) = path.into_inner();
    cast(manager.get_ref(), hub.get_ref(), config.get_ref(), PollRef::Id(id), user_info, body, &req).await
}

pub async fn cast_by_share_token<M>(
    user_info: Option<UserInfo>,
    path: Path<(String,)>,
    Json(body): Json<CastVote>,
    req: HttpRequest,
    manager: Data<M>,
    hub: Data<VoteHub>,
    config: Data<Config>,
) -> Result<Json<VoteResponse<RecordedVote>>, Error>
where
    M: Manager + 'static,
{
    let (token,) = path.into_inner();
    cast(manager.get_ref(), hub.get_ref(), config.get_ref(), PollRef::ShareToken(token), user_info, body, &req).await
}
