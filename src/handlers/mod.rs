pub mod live;
pub mod poll;
pub mod qr;
pub mod vote;

use std::net::SocketAddr;

use crate::actix_web::HttpRequest;
use crate::config::Config;
use crate::context::UserInfo;
use crate::core::models::vote::WeakIdentity;
use crate::core::services::results::Viewer;
use crate::hex::ToHex;
use crate::sha2::{Digest, Sha256};

pub const SESSION_HEADER: &str = "X-Session-Id";
const MAX_SESSION_CHARS: usize = 255;

fn hash_ip(ip: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(ip);
    hasher.finalize().encode_hex()
}

fn session_id(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.chars().take(MAX_SESSION_CHARS).collect())
}

/// Advisory hints stored with anonymous votes.
pub(crate) fn weak_identity(req: &HttpRequest, salt: &str) -> WeakIdentity {
    let ip_hash = req.connection_info().realip_remote_addr().map(|addr| {
        let ip = addr.parse::<SocketAddr>().map(|sock| sock.ip().to_string()).unwrap_or_else(|_| addr.to_owned());
        hash_ip(&ip, salt)
    });
    WeakIdentity {
        ip_hash,
        session_id: session_id(req),
    }
}

pub(crate) fn viewer(user_info: Option<UserInfo>, req: &HttpRequest) -> Viewer {
    Viewer {
        user_id: user_info.map(|u| u.id),
        session_id: session_id(req),
    }
}

pub(crate) fn share_url(config: &Config, req: &HttpRequest, share_token: &str) -> String {
    let base = match &config.app_url {
        Some(url) => url.clone(),
        None => {
            let info = req.connection_info();
            format!("{}://{}", info.scheme(), info.host())
        }
    };
    format!("{}/p/{}", base, share_token)
}
