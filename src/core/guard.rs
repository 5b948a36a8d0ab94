//! Admission rules for a single vote attempt.
//!
//! The decision is pure: callers read the poll and the voter's prior votes,
//! then ask [`admit`]. Storage constraints remain the authority on
//! uniqueness; this check only gives early, well-typed rejections.

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::core::models::poll::Settings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("Poll has expired")]
    Expired,

    #[error("Invalid option index")]
    InvalidOption,

    #[error("Authentication required")]
    AuthRequired,

    #[error("You have already voted on this poll")]
    AlreadyVoted,
}

#[derive(Debug, Clone)]
pub struct Admission<'a> {
    pub settings: &'a Settings,
    pub expires_at: Option<DateTime<Utc>>,
    pub option_count: usize,
    pub voter: Option<Uuid>,
    pub option_index: i64,
    /// Option indexes the voter has already chosen in this poll.
    pub prior_votes: &'a [i32],
}

pub fn admit(admission: &Admission, now: DateTime<Utc>) -> Result<i32, Rejection> {
    if admission.expires_at.map_or(false, |at| at <= now) {
        return Err(Rejection::Expired);
    }
    let option_index = match i32::try_from(admission.option_index) {
        Ok(i) if i >= 0 && (i as usize) < admission.option_count => i,
        _ => return Err(Rejection::InvalidOption),
    };
    if admission.voter.is_none() {
        if admission.settings.require_auth {
            return Err(Rejection::AuthRequired);
        }
        return Ok(option_index);
    }
    let duplicate = if admission.settings.allow_multiple_votes {
        admission.prior_votes.contains(&option_index)
    } else {
        !admission.prior_votes.is_empty()
    };
    if duplicate {
        return Err(Rejection::AlreadyVoted);
    }
    Ok(option_index)
}
