//! Chain adapter: the boundary between the executor and a blockchain.
//!
//! Executing a module submits a [`ChainRequest`] and gets back a
//! [`TransactionReceipt`]. The only implementation shipped is
//! [`SimulatedChain`], which waits a per-type latency and fabricates a
//! receipt. Tests substitute their own adapters.

use crate::module::{ModuleId, ModuleType};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Proof that an operation was accepted by the chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub tx_hash: String,
    pub block_number: u64,
    pub timestamp: DateTime<Utc>,
}

/// An operation to submit on behalf of a module.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainRequest {
    pub module_id: ModuleId,
    pub module_type: ModuleType,
    /// Amount flowing into the operation.
    pub amount: f64,
}

/// Errors from chain submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    /// The chain refused the transaction.
    Rejected { reason: String },
    /// The chain could not be reached.
    Unavailable { reason: String },
}

impl std::fmt::Display for ChainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rejected { reason } => write!(f, "transaction rejected: {reason}"),
            Self::Unavailable { reason } => write!(f, "chain unavailable: {reason}"),
        }
    }
}

impl std::error::Error for ChainError {}

/// Submits module operations to a chain.
#[async_trait]
pub trait ChainAdapter: Send + Sync {
    /// Submits an operation and waits for its receipt.
    async fn submit(&self, request: &ChainRequest) -> Result<TransactionReceipt, ChainError>;
}

/// Simulated confirmation time per module type.
#[derive(Debug, Clone, PartialEq)]
pub struct LatencyTable {
    pub swap_ms: u64,
    pub stake_ms: u64,
    pub claim_ms: u64,
    pub bridge_ms: u64,
    pub lend_ms: u64,
    /// Used for condition, start and end.
    pub default_ms: u64,
    /// Multiplier applied to every entry; 0 disables waiting.
    pub scale: f64,
}

impl LatencyTable {
    /// The default table with every delay multiplied by `scale`.
    #[must_use]
    pub fn scaled(scale: f64) -> Self {
        Self {
            scale,
            ..Self::default()
        }
    }

    /// How long an operation of this type takes to confirm.
    #[must_use]
    pub fn delay_for(&self, module_type: &ModuleType) -> Duration {
        let base_ms = match module_type {
            ModuleType::Swap => self.swap_ms,
            ModuleType::Stake => self.stake_ms,
            ModuleType::Claim => self.claim_ms,
            ModuleType::Bridge => self.bridge_ms,
            ModuleType::Lend => self.lend_ms,
            _ => self.default_ms,
        };

        let secs = base_ms as f64 * self.scale / 1000.0;
        if !secs.is_finite() || secs <= 0.0 {
            return Duration::ZERO;
        }
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO)
    }
}

impl Default for LatencyTable {
    fn default() -> Self {
        Self {
            swap_ms: 2000,
            stake_ms: 3000,
            claim_ms: 1500,
            bridge_ms: 4000,
            lend_ms: 2500,
            default_ms: 2000,
            scale: 1.0,
        }
    }
}

/// First block number handed out by the simulated chain.
const SIMULATED_BLOCK_BASE: u64 = 15_000_000;
const SIMULATED_BLOCK_SPAN: u64 = 1_000_000;
const TX_HASH_LEN: usize = 40;

/// A chain that confirms every operation after a fixed delay.
#[derive(Debug, Clone, Default)]
pub struct SimulatedChain {
    latency: LatencyTable,
}

impl SimulatedChain {
    #[must_use]
    pub fn new(latency: LatencyTable) -> Self {
        Self { latency }
    }
}

#[async_trait]
impl ChainAdapter for SimulatedChain {
    async fn submit(&self, request: &ChainRequest) -> Result<TransactionReceipt, ChainError> {
        let delay = self.latency.delay_for(&request.module_type);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(fabricate_receipt())
    }
}

fn fabricate_receipt() -> TransactionReceipt {
    let mut rng = rand::thread_rng();
    let hash: String = (&mut rng)
        .sample_iter(&Alphanumeric)
        .take(TX_HASH_LEN)
        .map(char::from)
        .collect();

    TransactionReceipt {
        tx_hash: format!("0x{hash}"),
        block_number: SIMULATED_BLOCK_BASE + rng.gen_range(0..SIMULATED_BLOCK_SPAN),
        timestamp: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    fn request(module_type: &str) -> ChainRequest {
        ChainRequest {
            module_id: "A".into(),
            module_type: module_type.into(),
            amount: 100.0,
        }
    }

    #[test]
    fn default_latencies() {
        let table = LatencyTable::default();
        assert_eq!(table.delay_for(&ModuleType::Swap), Duration::from_millis(2000));
        assert_eq!(table.delay_for(&ModuleType::Stake), Duration::from_millis(3000));
        assert_eq!(table.delay_for(&ModuleType::Claim), Duration::from_millis(1500));
        assert_eq!(table.delay_for(&ModuleType::Bridge), Duration::from_millis(4000));
        assert_eq!(table.delay_for(&ModuleType::Lend), Duration::from_millis(2500));
        assert_eq!(table.delay_for(&ModuleType::Condition), Duration::from_millis(2000));
    }

    #[test]
    fn scale_shrinks_and_disables_delay() {
        assert_eq!(
            LatencyTable::scaled(0.5).delay_for(&ModuleType::Bridge),
            Duration::from_millis(2000)
        );
        assert_eq!(LatencyTable::scaled(0.0).delay_for(&ModuleType::Bridge), Duration::ZERO);
        assert_eq!(LatencyTable::scaled(-1.0).delay_for(&ModuleType::Swap), Duration::ZERO);
    }

    #[test]
    fn receipt_shape() {
        let receipt = fabricate_receipt();
        assert_eq!(receipt.tx_hash.len(), 2 + TX_HASH_LEN);
        assert!(receipt.tx_hash.starts_with("0x"));
        assert!(receipt.tx_hash[2..].chars().all(|c| c.is_ascii_alphanumeric()));
        assert!(receipt.block_number >= SIMULATED_BLOCK_BASE);
        assert!(receipt.block_number < SIMULATED_BLOCK_BASE + SIMULATED_BLOCK_SPAN);
    }

    #[tokio::test(start_paused = true)]
    async fn simulated_chain_waits_for_latency() {
        let chain = SimulatedChain::default();
        let started = Instant::now();

        let receipt = chain.submit(&request("stake")).await.expect("receipt");

        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(3000));
        assert!(elapsed < Duration::from_millis(3100));
        assert!(receipt.tx_hash.starts_with("0x"));
    }

    #[tokio::test]
    async fn zero_scale_skips_waiting() {
        let chain = SimulatedChain::new(LatencyTable::scaled(0.0));
        let receipt = chain.submit(&request("bridge")).await.expect("receipt");
        assert!(receipt.block_number >= SIMULATED_BLOCK_BASE);
    }
}
