use uuid::Uuid;

use crate::actix_web::{
    http::header::CACHE_CONTROL,
    web::{Data, Path},
    HttpRequest, HttpResponse,
};
use crate::config::Config;
use crate::context::UserInfo;
use crate::core::models::vote::PollRef;
use crate::core::ports::qr::QrRenderer;
use crate::core::ports::repository::Manager;
use crate::core::services::poll::accessible_poll;
use crate::error::Error;
use crate::handlers::share_url;

pub async fn share_code<M, R>(
    user_info: Option<UserInfo>,
    path: Path<(Uuid,)>,
    req: HttpRequest,
    manager: Data<M>,
    renderer: Data<R>,
    config: Data<Config>,
) -> Result<HttpResponse, Error>
where
    M: Manager + 'static,
    R: QrRenderer + 'static,
{
    let (id,) = path.into_inner();
    let mut db = manager.db().await?;
    let poll = accessible_poll(&mut db, &PollRef::Id(id), user_info.map(|u| u.id)).await?;
    let image = renderer.render(&share_url(&config, &req, &poll.share_token))?;
    Ok(HttpResponse::Ok()
        .content_type(renderer.content_type())
        .insert_header((CACHE_CONTROL, "public, max-age=3600"))
        .body(image))
}
