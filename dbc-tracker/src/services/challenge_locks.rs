//! Per-challenge exclusive locks
//!
//! Serializes the read-recompute-write sequences of track updates and
//! settlement for one user challenge. Different challenges proceed in
//! parallel. Entries are weak so the map only holds challenges with a live
//! guard; dead entries are pruned on acquisition once the map grows.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError, Weak};

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Map size above which dead entries are pruned
const PRUNE_THRESHOLD: usize = 256;

/// Keyed async mutex registry
#[derive(Debug, Default)]
pub struct ChallengeLocks {
    locks: StdMutex<HashMap<i64, Weak<Mutex<()>>>>,
}

/// Holds one challenge's lock until dropped
#[derive(Debug)]
pub struct ChallengeGuard {
    user_challenge_id: i64,
    _guard: OwnedMutexGuard<()>,
}

impl ChallengeGuard {
    pub fn user_challenge_id(&self) -> i64 {
        self.user_challenge_id
    }
}

impl ChallengeLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `user_challenge_id`
    pub async fn acquire(&self, user_challenge_id: i64) -> ChallengeGuard {
        let mutex = {
            let mut map = self.locks.lock().unwrap_or_else(PoisonError::into_inner);

            if map.len() > PRUNE_THRESHOLD {
                map.retain(|_, weak| weak.strong_count() > 0);
            }

            match map.get(&user_challenge_id).and_then(Weak::upgrade) {
                Some(existing) => existing,
                None => {
                    let created = Arc::new(Mutex::new(()));
                    map.insert(user_challenge_id, Arc::downgrade(&created));
                    created
                }
            }
        };

        ChallengeGuard {
            user_challenge_id,
            _guard: mutex.lock_owned().await,
        }
    }

    /// Number of entries in the map, live or dead
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_challenge_is_exclusive() {
        let locks = Arc::new(ChallengeLocks::new());
        let guard = locks.acquire(1).await;
        assert_eq!(guard.user_challenge_id(), 1);

        let contender = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _guard = locks.acquire(1).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!contender.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .expect("contender should acquire after release")
            .unwrap();
    }

    #[tokio::test]
    async fn test_different_challenges_do_not_block() {
        let locks = ChallengeLocks::new();
        let _first = locks.acquire(1).await;

        let second = tokio::time::timeout(Duration::from_millis(100), locks.acquire(2)).await;
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn test_released_entries_are_reused() {
        let locks = ChallengeLocks::new();
        for _ in 0..3 {
            let _guard = locks.acquire(7).await;
        }
        assert_eq!(locks.len(), 1);
    }

    #[tokio::test]
    async fn test_dead_entries_pruned() {
        let locks = ChallengeLocks::new();
        for id in 0..(PRUNE_THRESHOLD as i64 + 10) {
            let _guard = locks.acquire(id).await;
        }
        let _guard = locks.acquire(-1).await;
        assert!(locks.len() <= PRUNE_THRESHOLD + 1);
    }
}
