use crate::actix_web::{self, FromRequest, HttpMessage};
use crate::error::Error;
use std::future::{ready, Ready};
use uuid::Uuid;

/// Identity asserted by the identity provider for the current request.
///
/// Inserted into request extensions by the JWT middleware. Extracting
/// `UserInfo` fails with 401 for anonymous requests; extract
/// `Option<UserInfo>` where anonymous access is allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserInfo {
    pub id: Uuid,
}

impl FromRequest for UserInfo {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &actix_web::HttpRequest, _: &mut actix_web::dev::Payload) -> Self::Future {
        ready(req.extensions().get::<Self>().copied().ok_or(Error::Unauthorized))
    }
}
