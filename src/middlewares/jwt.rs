use log::debug;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::actix_web::{
    dev::{Service, ServiceRequest, Transform},
    http::header::AUTHORIZATION,
    Error, HttpMessage,
};
use crate::context::UserInfo;
use crate::core::ports::tokener::{Payload, Tokener};
use crate::error::Error as AuthError;
use crate::impls::tokener::jwt::JWT;
use std::future::{ready, Future, Ready};
use std::pin::Pin;

#[derive(Debug, Deserialize, Serialize)]
pub struct Claim {
    pub user: String,
    pub exp: i64,
}

impl Payload for Claim {
    fn user(&self) -> &str {
        &self.user
    }
}

/// Resolves the bearer token issued by the identity provider into a
/// [`UserInfo`] request extension.
///
/// Requests without an `Authorization` header pass through anonymously;
/// handlers decide whether they need an identity. A header that is present
/// but does not verify is rejected with 401.
pub(crate) struct JWTMiddleware {
    secret: Vec<u8>,
}

impl JWTMiddleware {
    pub fn new(secret: Vec<u8>) -> Self {
        Self { secret }
    }
}

impl<S> Transform<S, ServiceRequest> for JWTMiddleware
where
    S: Service<ServiceRequest> + 'static,
    S::Future: 'static,
    S::Error: Into<Error>,
{
    type Error = Error;
    type Response = S::Response;
    type Transform = JWTService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(JWTService {
            tokener: JWT::new(self.secret.clone()),
            next_service: service,
        }))
    }
}

pub struct JWTService<S> {
    tokener: JWT,
    next_service: S,
}

impl<S> JWTService<S> {
    fn identify(&self, header: &str) -> Result<Uuid, AuthError> {
        let token = header.strip_prefix("Bearer ").unwrap_or(header).trim();
        let claim = <JWT as Tokener<Claim>>::verify_token(&self.tokener, token)?;
        claim.user().parse::<Uuid>().map_err(|_| AuthError::Unauthorized)
    }
}

impl<S> Service<ServiceRequest> for JWTService<S>
where
    S: Service<ServiceRequest>,
    S::Future: 'static,
    S::Error: Into<Error>,
{
    type Response = S::Response;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&self, ctx: &mut std::task::Context<'_>) -> std::task::Poll<Result<(), Self::Error>> {
        self.next_service.poll_ready(ctx).map_err(|e| e.into())
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if let Some(header) = req.headers().get(AUTHORIZATION) {
            let identified = header.to_str().map_err(|_| AuthError::Unauthorized).and_then(|h| self.identify(h));
            match identified {
                Err(e) => {
                    debug!("rejected bearer token: {}", e);
                    return Box::pin(async move { Err(e.into()) });
                }
                Ok(id) => {
                    req.extensions_mut().insert(UserInfo { id });
                }
            }
        }

        let res_fut = self.next_service.call(req);
        Box::pin(async move {
            let resp = res_fut.await.map_err(|e| e.into())?;
            Ok(resp)
        })
    }
}
