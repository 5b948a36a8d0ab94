use crate::actix_web::web::{self, delete, get, post, put, JsonConfig, PathConfig, QueryConfig};
use crate::core::ports::repository::Manager;
use crate::error::Error;
use crate::handlers::{live, poll, qr, vote};
use crate::impls::qr::PngQr;

pub fn config_routes<M>(cfg: &mut web::ServiceConfig)
where
    M: Manager + 'static,
{
    cfg.app_data(JsonConfig::default().error_handler(|err, _| Error::Validation(err.to_string()).into()))
        .app_data(QueryConfig::default().error_handler(|err, _| Error::Validation(err.to_string()).into()))
        .app_data(PathConfig::default().error_handler(|_, _| Error::NotFound.into()))
        .service(
            web::scope("/api")
                .service(
                    web::scope("/polls")
                        .route("", post().to(poll::create::<M>))
                        .route("", get().to(poll::list::<M>))
                        .route("/{id}", get().to(poll::detail::<M>))
                        .route("/{id}", put().to(poll::update::<M>))
                        .route("/{id}", delete().to(poll::delete::<M>))
                        .route("/{id}/vote", post().to(vote::cast_by_id::<M>))
                        .route("/{id}/live", get().to(live::by_id::<M>))
                        .route("/{id}/qr", get().to(qr::share_code::<M, PngQr>)),
                )
                .service(
                    web::scope("/p/{token}")
                        .route("", get().to(poll::shared::<M>))
                        .route("/vote", post().to(vote::cast_by_share_token::<M>))
                        .route("/live", get().to(live::by_share_token::<M>)),
                )
                .route("/qr/{id}", get().to(qr::share_code::<M, PngQr>)),
        );
}
