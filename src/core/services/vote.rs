use chrono::{DateTime, Utc};
use log::{info, warn};
use uuid::Uuid;

use crate::core::guard::{self, Admission};
use crate::core::models::vote::{AnonymousInsert, Ballot, Insert as VoteInsert, RecordedVote, VoteEvent, Voter};
use crate::core::ports::feed::VoteFeed;
use crate::core::ports::repository::{AnonymousVoteCommon, PollCommon, RowLock, TxStore, VoteCommon};
use crate::core::services::poll::accessible_poll;
use crate::error::Error;

/// Admits, persists and announces one vote.
///
/// The poll's settings are read under a share lock inside the transaction. The event is
/// published only after the commit succeeded, so viewers never see a vote
/// that was rolled back.
pub async fn cast_vote<T, F>(mut storer: T, feed: &F, ballot: Ballot, now: DateTime<Utc>) -> Result<RecordedVote, Error>
where
    T: TxStore,
    F: VoteFeed,
{
    let poll_id = accessible_poll(&mut storer, &ballot.poll, ballot.voter.user_id()).await?.id;
    // Option edits wait on this lock until the vote commits.
    let poll = PollCommon::lock(&mut storer, poll_id, RowLock::Share).await?.ok_or(Error::NotFound)?;
    let prior_votes = match &ballot.voter {
        Voter::User(uid) => VoteCommon::option_indexes_of_voter(&mut storer, poll.id, *uid).await?,
        Voter::Anonymous(_) => Vec::new(),
    };
    let admission = Admission {
        settings: &poll.settings,
        expires_at: poll.expires_at,
        option_count: poll.options.len(),
        voter: ballot.voter.user_id(),
        option_index: ballot.option_index,
        prior_votes: &prior_votes,
    };
    let option_index = match guard::admit(&admission, now) {
        Ok(index) => index,
        Err(rejection) => {
            warn!("vote on poll {} rejected: {}", poll.id, rejection);
            storer.rollback().await?;
            return Err(rejection.into());
        }
    };
    let recorded = match ballot.voter {
        Voter::User(user_id) => RecordedVote::Authenticated(
            VoteCommon::insert(
                &mut storer,
                VoteInsert {
                    id: Uuid::new_v4(),
                    poll_id: poll.id,
                    user_id,
                    option_index,
                    exclusive: !poll.settings.allow_multiple_votes,
                },
            )
            .await?,
        ),
        Voter::Anonymous(hint) => RecordedVote::Anonymous(
            AnonymousVoteCommon::insert(
                &mut storer,
                AnonymousInsert {
                    id: Uuid::new_v4(),
                    poll_id: poll.id,
                    option_index,
                    ip_hash: hint.ip_hash,
                    session_id: hint.session_id,
                },
            )
            .await?,
        ),
    };
    storer.commit().await?;
    info!("vote recorded on poll {} for option {}", poll.id, option_index);
    feed.publish(VoteEvent::from(&recorded));
    Ok(recorded)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::guard::Rejection;
    use crate::core::models::poll::{Insert as PollInsert, PollOption, Settings};
    use crate::core::models::vote::{PollRef, WeakIdentity};
    use crate::core::ports::repository::{BallotCommon, Manager};
    use crate::impls::memory::MemoryManager;
    use chrono::Duration;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingFeed {
        events: Mutex<Vec<VoteEvent>>,
    }

    impl VoteFeed for RecordingFeed {
        fn publish(&self, event: VoteEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    async fn seed(manager: &MemoryManager, settings: Settings, expires_at: Option<DateTime<Utc>>) -> Uuid {
        let poll = PollCommon::insert(
            &mut manager.db().await.unwrap(),
            PollInsert {
                id: Uuid::new_v4(),
                title: "Colour".into(),
                description: None,
                owner_id: Uuid::new_v4(),
                share_token: crate::core::services::poll::random_share_token(),
                options: vec![
                    PollOption {
                        id: "r".into(),
                        text: "Red".into(),
                        color: None,
                    },
                    PollOption {
                        id: "b".into(),
                        text: "Blue".into(),
                        color: None,
                    },
                ],
                settings,
                expires_at,
            },
        )
        .await
        .unwrap();
        poll.id
    }

    fn ballot(poll_id: Uuid, option_index: i64, voter: Voter) -> Ballot {
        Ballot {
            poll: PollRef::Id(poll_id),
            option_index,
            voter,
        }
    }

    #[actix_web::test]
    async fn test_authenticated_vote_is_recorded_and_published() {
        let manager = MemoryManager::new();
        let feed = RecordingFeed::default();
        let poll_id = seed(&manager, Settings::default(), None).await;
        let uid = Uuid::new_v4();
        let recorded = cast_vote(manager.tx().await.unwrap(), &feed, ballot(poll_id, 1, Voter::User(uid)), Utc::now()).await.unwrap();
        match &recorded {
            RecordedVote::Authenticated(v) => {
                assert_eq!(v.user_id, uid);
                assert_eq!(v.option_index, 1);
            }
            other => panic!("unexpected {:?}", other),
        }
        let events = feed.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!((events[0].poll_id, events[0].option_index, events[0].anonymous), (poll_id, 1, false));
    }

    #[actix_web::test]
    async fn test_second_vote_rejected() {
        let manager = MemoryManager::new();
        let feed = RecordingFeed::default();
        let poll_id = seed(&manager, Settings::default(), None).await;
        let uid = Uuid::new_v4();
        cast_vote(manager.tx().await.unwrap(), &feed, ballot(poll_id, 0, Voter::User(uid)), Utc::now()).await.unwrap();
        let res = cast_vote(manager.tx().await.unwrap(), &feed, ballot(poll_id, 1, Voter::User(uid)), Utc::now()).await;
        assert!(matches!(res, Err(Error::Rejected(Rejection::AlreadyVoted))));
        assert_eq!(feed.events.lock().unwrap().len(), 1);
        assert_eq!(BallotCommon::count(&mut manager.db().await.unwrap(), poll_id).await.unwrap(), 1);
    }

    #[actix_web::test]
    async fn test_concurrent_duplicates_keep_one_row() {
        let manager = MemoryManager::new();
        let feed = RecordingFeed::default();
        let poll_id = seed(&manager, Settings::default(), None).await;
        let uid = Uuid::new_v4();
        let mut stores = Vec::new();
        for _ in 0..8 {
            stores.push(manager.tx().await.unwrap());
        }
        let attempts = stores
            .into_iter()
            .enumerate()
            .map(|(i, store)| cast_vote(store, &feed, ballot(poll_id, (i % 2) as i64, Voter::User(uid)), Utc::now()));
        let results = futures::future::join_all(attempts).await;
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, Error::Rejected(Rejection::AlreadyVoted))));
        let rows = VoteCommon::option_indexes_of_voter(&mut manager.db().await.unwrap(), poll_id, uid).await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[actix_web::test]
    async fn test_storage_constraint_rejects_duplicate_insert() {
        let manager = MemoryManager::new();
        let poll_id = seed(&manager, Settings::default(), None).await;
        let uid = Uuid::new_v4();
        let mut db = manager.db().await.unwrap();
        let insert = |option_index| VoteInsert {
            id: Uuid::new_v4(),
            poll_id,
            user_id: uid,
            option_index,
            exclusive: true,
        };
        VoteCommon::insert(&mut db, insert(0)).await.unwrap();
        let res = VoteCommon::insert(&mut db, insert(1)).await;
        assert!(matches!(res, Err(Error::Rejected(Rejection::AlreadyVoted))));
    }

    #[actix_web::test]
    async fn test_multiple_votes_for_distinct_options() {
        let manager = MemoryManager::new();
        let feed = RecordingFeed::default();
        let settings = Settings {
            allow_multiple_votes: true,
            ..Settings::default()
        };
        let poll_id = seed(&manager, settings, None).await;
        let uid = Uuid::new_v4();
        cast_vote(manager.tx().await.unwrap(), &feed, ballot(poll_id, 0, Voter::User(uid)), Utc::now()).await.unwrap();
        cast_vote(manager.tx().await.unwrap(), &feed, ballot(poll_id, 1, Voter::User(uid)), Utc::now()).await.unwrap();
        let res = cast_vote(manager.tx().await.unwrap(), &feed, ballot(poll_id, 1, Voter::User(uid)), Utc::now()).await;
        assert!(matches!(res, Err(Error::Rejected(Rejection::AlreadyVoted))));
        let mut rows = VoteCommon::option_indexes_of_voter(&mut manager.db().await.unwrap(), poll_id, uid).await.unwrap();
        rows.sort();
        assert_eq!(rows, vec![0, 1]);
    }

    #[actix_web::test]
    async fn test_anonymous_votes_always_admitted() {
        let manager = MemoryManager::new();
        let feed = RecordingFeed::default();
        let poll_id = seed(&manager, Settings::default(), None).await;
        let hint = WeakIdentity {
            ip_hash: Some("abc".into()),
            session_id: Some("s".into()),
        };
        for _ in 0..2 {
            let recorded = cast_vote(manager.tx().await.unwrap(), &feed, ballot(poll_id, 0, Voter::Anonymous(hint.clone())), Utc::now()).await.unwrap();
            assert!(matches!(recorded, RecordedVote::Anonymous(_)));
        }
        assert_eq!(BallotCommon::count(&mut manager.db().await.unwrap(), poll_id).await.unwrap(), 2);
        assert!(feed.events.lock().unwrap().iter().all(|e| e.anonymous));
    }

    #[actix_web::test]
    async fn test_invalid_and_expired_votes_not_persisted() {
        let manager = MemoryManager::new();
        let feed = RecordingFeed::default();
        let open = seed(&manager, Settings::default(), None).await;
        let expired = seed(&manager, Settings::default(), Some(Utc::now() - Duration::minutes(5))).await;
        let anon = || Voter::Anonymous(WeakIdentity::default());

        let res = cast_vote(manager.tx().await.unwrap(), &feed, ballot(open, 2, anon()), Utc::now()).await;
        assert!(matches!(res, Err(Error::Rejected(Rejection::InvalidOption))));
        let res = cast_vote(manager.tx().await.unwrap(), &feed, ballot(open, -1, Voter::User(Uuid::new_v4())), Utc::now()).await;
        assert!(matches!(res, Err(Error::Rejected(Rejection::InvalidOption))));
        let res = cast_vote(manager.tx().await.unwrap(), &feed, ballot(expired, 0, anon()), Utc::now()).await;
        assert!(matches!(res, Err(Error::Rejected(Rejection::Expired))));

        let mut db = manager.db().await.unwrap();
        assert_eq!(BallotCommon::count(&mut db, open).await.unwrap(), 0);
        assert_eq!(BallotCommon::count(&mut db, expired).await.unwrap(), 0);
        assert!(feed.events.lock().unwrap().is_empty());
    }

    #[actix_web::test]
    async fn test_unknown_poll() {
        let manager = MemoryManager::new();
        let feed = RecordingFeed::default();
        let res = cast_vote(manager.tx().await.unwrap(), &feed, ballot(Uuid::new_v4(), 0, Voter::User(Uuid::new_v4())), Utc::now()).await;
        assert!(matches!(res, Err(Error::NotFound)));
    }

    #[actix_web::test]
    async fn test_vote_reads_poll_under_share_lock() {
        let manager = MemoryManager::new();
        let feed = RecordingFeed::default();
        let poll_id = seed(&manager, Settings::default(), None).await;
        cast_vote(manager.tx().await.unwrap(), &feed, ballot(poll_id, 0, Voter::User(Uuid::new_v4())), Utc::now()).await.unwrap();
        assert_eq!(manager.locks_taken(), vec![(poll_id, RowLock::Share)]);
    }
}
