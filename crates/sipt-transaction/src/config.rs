use std::time::Duration;

use serde::{Deserialize, Serialize};

/// RFC 3261 §17 timer constants (spec.md §3, §4.2). No behavior of its own;
/// carried as a plain value so an embedding application can override it at
/// `TransactionLayer` construction (used extensively by this crate's own
/// tests to run the FSMs against a compressed clock).
///
/// Derives `Deserialize`/`Serialize` so it can be loaded from an embedding
/// application's config file/env, matching the teacher's practice of
/// deriving `serde` uniformly on config-shaped structs (SPEC_FULL.md
/// "AMBIENT: CONFIGURATION").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawTransactionConfig", into = "RawTransactionConfig")]
pub struct TransactionConfig {
    /// RTT estimate; base interval for retransmissions. Default 500 ms.
    pub t1: Duration,
    /// Cap on exponential backoff for non-INVITE retransmissions. Default 4 s.
    pub t2: Duration,
    /// Maximum message lifetime in the network. Default 5 s.
    pub t4: Duration,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        TransactionConfig {
            t1: Duration::from_millis(500),
            t2: Duration::from_secs(4),
            t4: Duration::from_secs(5),
        }
    }
}

impl TransactionConfig {
    /// `Tretry(n) = min(T1·2^n, T2)`, the non-INVITE client/server retry
    /// schedule (spec.md §4.3/§4.4).
    pub fn retry_interval_capped(&self, n: u32) -> Duration {
        self.t1.saturating_mul(1u32 << n.min(16)).min(self.t2)
    }

    /// `Tretry(n) = T1·2^n`, uncapped INVITE client retransmission
    /// schedule (spec.md §4.3).
    pub fn retry_interval_uncapped(&self, n: u32) -> Duration {
        self.t1.saturating_mul(1u32 << n.min(16))
    }

    /// `64·T1`, the request/transaction timeout (spec.md §4.3/§4.4).
    pub fn timeout(&self) -> Duration {
        self.t1.saturating_mul(64)
    }
}

#[derive(Serialize, Deserialize)]
struct RawTransactionConfig {
    t1_ms: u64,
    t2_ms: u64,
    t4_ms: u64,
}

impl From<RawTransactionConfig> for TransactionConfig {
    fn from(raw: RawTransactionConfig) -> Self {
        TransactionConfig {
            t1: Duration::from_millis(raw.t1_ms),
            t2: Duration::from_millis(raw.t2_ms),
            t4: Duration::from_millis(raw.t4_ms),
        }
    }
}

impl From<TransactionConfig> for RawTransactionConfig {
    fn from(cfg: TransactionConfig) -> Self {
        RawTransactionConfig {
            t1_ms: cfg.t1.as_millis() as u64,
            t2_ms: cfg.t2.as_millis() as u64,
            t4_ms: cfg.t4.as_millis() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// The capped retry schedule never exceeds T2 and never decreases
        /// as the retransmit count grows, for any config an embedder might
        /// supply (not just the RFC 3261 defaults) — the server/client
        /// loops rely on this to avoid ever scheduling a *shorter* wait
        /// after a retransmission than before it.
        #[test]
        fn capped_retry_is_bounded_and_monotonic(
            t1_ms in 1u64..10_000,
            t2_ms in 1u64..60_000,
            n in 0u32..20,
        ) {
            let cfg = TransactionConfig {
                t1: Duration::from_millis(t1_ms),
                t2: Duration::from_millis(t2_ms),
                t4: Duration::from_secs(5),
            };
            let this = cfg.retry_interval_capped(n);
            let next = cfg.retry_interval_capped(n + 1);
            prop_assert!(this <= cfg.t2);
            prop_assert!(next >= this);
        }
    }

    #[test]
    fn defaults_match_rfc_3261() {
        let cfg = TransactionConfig::default();
        assert_eq!(cfg.t1, Duration::from_millis(500));
        assert_eq!(cfg.t2, Duration::from_secs(4));
        assert_eq!(cfg.t4, Duration::from_secs(5));
    }

    #[test]
    fn capped_retry_schedule_matches_scenario_1() {
        let cfg = TransactionConfig::default();
        let intervals: Vec<Duration> = (0..7).map(|n| cfg.retry_interval_capped(n)).collect();
        assert_eq!(
            intervals,
            vec![
                Duration::from_millis(500),
                Duration::from_millis(1000),
                Duration::from_millis(2000),
                Duration::from_millis(4000),
                Duration::from_millis(4000),
                Duration::from_millis(4000),
                Duration::from_millis(4000),
            ]
        );
    }

    #[test]
    fn timeout_is_64_t1() {
        let cfg = TransactionConfig::default();
        assert_eq!(cfg.timeout(), Duration::from_secs(32));
    }
}
