use crate::core::models::vote::VoteEvent;

/// Outbound side of the live update feed.
///
/// Publishing happens after the vote is committed. Implementations deliver
/// the event to every subscriber of `event.poll_id` that is registered at
/// the time of the call.
pub trait VoteFeed {
    fn publish(&self, event: VoteEvent);
}
