//! Token pool manager.
//!
//! Credentials are grouped into named pools. Callers ask for a token from a
//! priority list of pools and report back what the upstream said about it.
//! Health transitions happen under the individual token's mutex, so callers
//! using different tokens never contend. The pool map is only write-locked
//! when a credential is added.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use voxgate_core::utils::mask_secret;
use voxgate_core::{CoreError, TokenHealth, TokenSignal};

/// A credential handed to a caller. The manager keeps the health state.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenLease {
    pub pool: String,
    pub index: usize,
    pub secret: String,
}

impl std::fmt::Debug for TokenLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenLease")
            .field("pool", &self.pool)
            .field("index", &self.index)
            .field("secret", &mask_secret(&self.secret))
            .finish()
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TokenPoolError {
    /// Every listed pool is out of selectable credentials.
    #[error("No available tokens in pools [{}]", pools.join(", "))]
    NoTokenAvailable { pools: Vec<String> },

    #[error("Unknown token {index} in pool '{pool}'")]
    UnknownToken { pool: String, index: usize },
}

impl From<TokenPoolError> for CoreError {
    fn from(err: TokenPoolError) -> Self {
        match err {
            TokenPoolError::NoTokenAvailable { pools } => Self::NoTokenAvailable { pools },
            other @ TokenPoolError::UnknownToken { .. } => Self::NotFound(other.to_string()),
        }
    }
}

#[derive(Debug)]
struct SlotState {
    health: TokenHealth,
    uses: u64,
    last_used: Option<Instant>,
}

impl SlotState {
    /// Current health, clearing an elapsed cooldown.
    fn refresh(&mut self, now: Instant) -> TokenHealth {
        if let TokenHealth::CoolingDown { until } = self.health
            && now.into_std() >= until
        {
            self.health = TokenHealth::Available;
        }
        self.health
    }
}

#[derive(Debug)]
struct TokenSlot {
    secret: String,
    state: Mutex<SlotState>,
}

impl TokenSlot {
    fn new(secret: String) -> Self {
        Self {
            secret,
            state: Mutex::new(SlotState {
                health: TokenHealth::Available,
                uses: 0,
                last_used: None,
            }),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Default)]
struct Pool {
    tokens: Vec<TokenSlot>,
    cursor: AtomicUsize,
}

/// Status of one credential, safe to log or return to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenSnapshot {
    pub index: usize,
    pub token: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cooldown_remaining_secs: Option<u64>,
    pub uses: u64,
    /// Seconds since the token was last handed out.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idle_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolSnapshot {
    pub pool: String,
    pub available: usize,
    pub tokens: Vec<TokenSnapshot>,
}

/// Credential pools with round-robin selection and health tracking.
#[derive(Debug)]
pub struct TokenPoolManager {
    pools: RwLock<HashMap<String, Pool>>,
    cooldown: Duration,
}

impl TokenPoolManager {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            pools: RwLock::new(HashMap::new()),
            cooldown,
        }
    }

    /// Register a credential. Returns `false` if the pool already holds it.
    pub fn add_token(&self, pool: &str, secret: &str) -> bool {
        let secret = secret.trim();
        if secret.is_empty() {
            return false;
        }
        let mut pools = self.pools.write().unwrap_or_else(PoisonError::into_inner);
        let entry = pools.entry(pool.to_string()).or_default();
        if entry.tokens.iter().any(|slot| slot.secret == secret) {
            return false;
        }
        entry.tokens.push(TokenSlot::new(secret.to_string()));
        info!(pool, token = %mask_secret(secret), "Token registered");
        true
    }

    /// Next available token in `pool`, rotating so one credential is not pinned.
    pub fn get_token(&self, pool: &str) -> Option<TokenLease> {
        let pools = self.pools.read().unwrap_or_else(PoisonError::into_inner);
        let entry = pools.get(pool)?;
        let count = entry.tokens.len();
        if count == 0 {
            return None;
        }

        let now = Instant::now();
        let start = entry.cursor.load(Ordering::Relaxed);
        (0..count).find_map(|offset| {
            let index = (start + offset) % count;
            let slot = &entry.tokens[index];
            let mut state = slot.state();
            if state.refresh(now) != TokenHealth::Available {
                return None;
            }
            state.uses += 1;
            state.last_used = Some(now);
            // Resume after the slot handed out, not after the scan start.
            entry.cursor.store((index + 1) % count, Ordering::Relaxed);
            Some(TokenLease {
                pool: pool.to_string(),
                index,
                secret: slot.secret.clone(),
            })
        })
    }

    /// First available token across `pools`, in priority order.
    ///
    /// Fails fast: nothing here waits for a cooldown to expire.
    pub fn get_token_from<S: AsRef<str>>(&self, pools: &[S]) -> Result<TokenLease, TokenPoolError> {
        for pool in pools {
            if let Some(lease) = self.get_token(pool.as_ref()) {
                debug!(pool = %lease.pool, index = lease.index, "Token selected");
                return Ok(lease);
            }
        }
        let pools: Vec<String> = pools.iter().map(|p| p.as_ref().to_string()).collect();
        warn!(pools = ?pools, "No token available");
        Err(TokenPoolError::NoTokenAvailable { pools })
    }

    /// Apply what the upstream said about a leased credential.
    pub fn report(&self, lease: &TokenLease, signal: TokenSignal) {
        let pools = self.pools.read().unwrap_or_else(PoisonError::into_inner);
        let Some(slot) = pools
            .get(&lease.pool)
            .and_then(|pool| pool.tokens.get(lease.index))
            .filter(|slot| slot.secret == lease.secret)
        else {
            warn!(pool = %lease.pool, index = lease.index, "Report for unknown token ignored");
            return;
        };

        let now = Instant::now();
        let mut state = slot.state();
        let previous = state.refresh(now);
        let next = match (previous, signal) {
            (TokenHealth::Exhausted, _) | (_, TokenSignal::Success) => previous,
            (_, TokenSignal::RateLimited) => TokenHealth::CoolingDown {
                until: (now + self.cooldown).into_std(),
            },
            (_, TokenSignal::Rejected) => TokenHealth::Exhausted,
        };
        state.health = next;

        if next != previous {
            warn!(
                pool = %lease.pool,
                token = %mask_secret(&slot.secret),
                from = previous.label(),
                to = next.label(),
                "Token health changed"
            );
        }
    }

    /// Put a cooling or exhausted token back into rotation.
    pub fn reset(&self, pool: &str, index: usize) -> Result<(), TokenPoolError> {
        let pools = self.pools.read().unwrap_or_else(PoisonError::into_inner);
        let slot = pools
            .get(pool)
            .and_then(|p| p.tokens.get(index))
            .ok_or_else(|| TokenPoolError::UnknownToken {
                pool: pool.to_string(),
                index,
            })?;
        slot.state().health = TokenHealth::Available;
        info!(pool, index, "Token reset");
        Ok(())
    }

    /// Per-pool status with masked secrets, pools sorted by name.
    pub fn snapshot(&self) -> Vec<PoolSnapshot> {
        let pools = self.pools.read().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();

        let mut snapshot: Vec<PoolSnapshot> = pools
            .iter()
            .map(|(name, pool)| {
                let tokens: Vec<TokenSnapshot> = pool
                    .tokens
                    .iter()
                    .enumerate()
                    .map(|(index, slot)| {
                        let mut state = slot.state();
                        let health = state.refresh(now);
                        let cooldown_remaining_secs = match health {
                            TokenHealth::CoolingDown { until } => {
                                Some(until.saturating_duration_since(now.into_std()).as_secs())
                            }
                            _ => None,
                        };
                        TokenSnapshot {
                            index,
                            token: mask_secret(&slot.secret),
                            status: health.label(),
                            cooldown_remaining_secs,
                            uses: state.uses,
                            idle_secs: state
                                .last_used
                                .map(|used| now.saturating_duration_since(used).as_secs()),
                        }
                    })
                    .collect();
                PoolSnapshot {
                    pool: name.clone(),
                    available: tokens.iter().filter(|t| t.status == "available").count(),
                    tokens,
                }
            })
            .collect();
        snapshot.sort_by(|a, b| a.pool.cmp(&b.pool));
        snapshot
    }

    /// Total registered credentials across all pools.
    pub fn len(&self) -> usize {
        self.pools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|pool| pool.tokens.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const BASIC: &str = "ssoBasic";
    const SUPER: &str = "ssoSuper";

    fn manager() -> TokenPoolManager {
        let manager = TokenPoolManager::new(Duration::from_secs(300));
        manager.add_token(BASIC, "basic-token-aaaaaaaa");
        manager.add_token(BASIC, "basic-token-bbbbbbbb");
        manager.add_token(SUPER, "super-token-cccccccc");
        manager
    }

    #[test]
    fn test_add_token_dedups() {
        let manager = manager();
        assert!(!manager.add_token(BASIC, " basic-token-aaaaaaaa "));
        assert!(!manager.add_token(BASIC, "   "));
        assert_eq!(manager.len(), 3);
    }

    #[test]
    fn test_round_robin_within_pool() {
        let manager = manager();
        let seen: HashSet<usize> = (0..4)
            .map(|_| manager.get_token(BASIC).unwrap().index)
            .collect();
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn test_rotation_skips_cooling_slot_evenly() {
        let manager = TokenPoolManager::new(Duration::from_secs(300));
        for secret in ["rot-token-00000000", "rot-token-11111111", "rot-token-22222222"] {
            manager.add_token(BASIC, secret);
        }
        let first = manager.get_token(BASIC).unwrap();
        assert_eq!(first.index, 0);
        manager.report(&first, TokenSignal::RateLimited);

        let picks: Vec<usize> = (0..6)
            .map(|_| manager.get_token(BASIC).unwrap().index)
            .collect();
        assert_eq!(picks, vec![1, 2, 1, 2, 1, 2]);
    }

    #[test]
    fn test_priority_order_and_failover() {
        let manager = manager();
        let lease = manager.get_token_from(&[BASIC, SUPER]).unwrap();
        assert_eq!(lease.pool, BASIC);

        let forged = TokenLease {
            pool: BASIC.into(),
            index: 0,
            secret: "not-the-real-secret".into(),
        };
        manager.report(&forged, TokenSignal::Rejected);
        assert_eq!(manager.snapshot()[0].available, 2);

        for _ in 0..2 {
            let lease = manager.get_token(BASIC).unwrap();
            manager.report(&lease, TokenSignal::Rejected);
        }
        let lease = manager.get_token_from(&[BASIC, SUPER]).unwrap();
        assert_eq!(lease.pool, SUPER);

        manager.report(&lease, TokenSignal::RateLimited);
        let err = manager.get_token_from(&[BASIC, SUPER]).unwrap_err();
        assert_eq!(
            err,
            TokenPoolError::NoTokenAvailable {
                pools: vec![BASIC.into(), SUPER.into()]
            }
        );
        assert!(manager.get_token_from::<&str>(&[]).is_err());
        assert!(manager.get_token("missing").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_expires_lazily() {
        let manager = TokenPoolManager::new(Duration::from_secs(300));
        manager.add_token(BASIC, "only-token-dddddddd");

        let lease = manager.get_token(BASIC).unwrap();
        manager.report(&lease, TokenSignal::RateLimited);
        assert!(manager.get_token(BASIC).is_none());
        assert_eq!(manager.snapshot()[0].tokens[0].status, "cooling_down");

        tokio::time::advance(Duration::from_secs(299)).await;
        assert!(manager.get_token(BASIC).is_none());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(manager.get_token(BASIC).unwrap().index, 0);
    }

    #[test]
    fn test_exhausted_is_terminal_until_reset() {
        let manager = TokenPoolManager::new(Duration::from_secs(1));
        manager.add_token(BASIC, "only-token-eeeeeeee");
        let lease = manager.get_token(BASIC).unwrap();

        manager.report(&lease, TokenSignal::Rejected);
        manager.report(&lease, TokenSignal::Success);
        manager.report(&lease, TokenSignal::RateLimited);
        assert!(manager.get_token(BASIC).is_none());
        assert_eq!(manager.snapshot()[0].tokens[0].status, "exhausted");

        manager.reset(BASIC, 0).unwrap();
        assert!(manager.get_token(BASIC).is_some());
        tokio_test::assert_err!(manager.reset(BASIC, 9));
    }

    #[test]
    fn test_snapshot_masks_secrets() {
        let manager = manager();
        let snapshot = manager.snapshot();
        assert_eq!(snapshot[0].pool, BASIC);
        assert_eq!(snapshot[0].available, 2);
        assert_eq!(snapshot[0].tokens[0].token, "basi...aaaa");
        assert!(
            snapshot
                .iter()
                .flat_map(|p| &p.tokens)
                .all(|t| !t.token.contains("token"))
        );
    }

    #[test]
    fn test_concurrent_selection_never_returns_unavailable() {
        let manager = std::sync::Arc::new(manager());
        let lease = manager.get_token(SUPER).unwrap();
        manager.report(&lease, TokenSignal::Rejected);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let manager = std::sync::Arc::clone(&manager);
                std::thread::spawn(move || {
                    (0..100)
                        .map(|_| manager.get_token_from(&[SUPER, BASIC]).unwrap().pool)
                        .all(|pool| pool == BASIC)
                })
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap());
        }
    }
}
