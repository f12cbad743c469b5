//! Operation executor: runs one module against the chain adapter.
//!
//! The executor computes what a module does to the amount flowing into it,
//! submits the operation through a [`ChainAdapter`] and turns the outcome
//! into an [`ExecutionResult`]. Failures never escape as errors; they become
//! `failed` results so the engine can stop the run and report the trail.

use crate::chain::{ChainAdapter, ChainRequest, TransactionReceipt};
use crate::error::OperationError;
use crate::execution::ExecutionResult;
use crate::module::{Module, ModuleConfig, ModuleType};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

/// Fraction of the input a swap returns after fees.
pub const SWAP_OUTPUT_RATIO: f64 = 0.99;
/// Fraction of the input a claim pays out.
pub const CLAIM_YIELD_RATE: f64 = 0.10;
/// Swap slippage tolerance used when none is configured, in percent.
pub const DEFAULT_SLIPPAGE_PERCENT: f64 = 0.5;

/// The amount flowing into a module.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputState {
    pub amount: f64,
}

impl InputState {
    #[must_use]
    pub fn new(amount: f64) -> Self {
        Self { amount }
    }
}

/// What a module produced, by module type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum OperationOutput {
    Swap {
        amount_in: f64,
        amount_out: f64,
        min_amount_out: f64,
        slippage: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token_in: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token_out: Option<String>,
    },
    Stake {
        staked: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token: Option<String>,
    },
    Claim {
        claimed: f64,
    },
    Bridge {
        bridged: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        destination_chain: Option<String>,
    },
    Lend {
        lent: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        protocol: Option<String>,
    },
    Condition {
        result: bool,
        amount: f64,
    },
    Marker {
        amount: f64,
    },
}

impl OperationOutput {
    /// The amount this module hands to its successors.
    #[must_use]
    pub fn carried_amount(&self) -> f64 {
        match self {
            Self::Swap { amount_out, .. } => *amount_out,
            Self::Stake { staked, .. } => *staked,
            Self::Claim { claimed } => *claimed,
            Self::Bridge { bridged, .. } => *bridged,
            Self::Lend { lent, .. } => *lent,
            Self::Condition { amount, .. } | Self::Marker { amount } => *amount,
        }
    }
}

/// Computes a module's output from its input, without touching the chain.
///
/// # Errors
///
/// Returns [`OperationError::UnknownModuleType`] for unrecognized types and
/// [`OperationError::NonFiniteAmount`] when the input is infinite or NaN.
pub fn compute_output(
    module: &Module,
    input: &InputState,
) -> Result<OperationOutput, OperationError> {
    let amount = input.amount;
    if !amount.is_finite() {
        return Err(OperationError::NonFiniteAmount);
    }

    let output = match &module.module_type {
        ModuleType::Swap => {
            let config = match &module.config {
                ModuleConfig::Swap(config) => config.clone(),
                _ => Default::default(),
            };
            let slippage = config.slippage.unwrap_or(DEFAULT_SLIPPAGE_PERCENT);
            let amount_out = amount * SWAP_OUTPUT_RATIO;
            OperationOutput::Swap {
                amount_in: amount,
                amount_out,
                min_amount_out: amount_out * (1.0 - slippage / 100.0),
                slippage,
                token_in: config.token_in,
                token_out: config.token_out,
            }
        }
        ModuleType::Stake => OperationOutput::Stake {
            staked: amount,
            token: match &module.config {
                ModuleConfig::Stake(config) => config.token.clone(),
                _ => None,
            },
        },
        ModuleType::Claim => OperationOutput::Claim {
            claimed: amount * CLAIM_YIELD_RATE,
        },
        ModuleType::Bridge => OperationOutput::Bridge {
            bridged: amount,
            destination_chain: match &module.config {
                ModuleConfig::Bridge(config) => config.destination_chain.clone(),
                _ => None,
            },
        },
        ModuleType::Lend => OperationOutput::Lend {
            lent: amount,
            protocol: match &module.config {
                ModuleConfig::Lend(config) => config.protocol.clone(),
                _ => None,
            },
        },
        ModuleType::Condition => OperationOutput::Condition {
            result: true,
            amount,
        },
        ModuleType::Start | ModuleType::End => OperationOutput::Marker { amount },
        ModuleType::Unknown(other) => {
            return Err(OperationError::UnknownModuleType {
                module_type: other.clone(),
            });
        }
    };

    Ok(output)
}

/// Executes single modules through a chain adapter.
#[derive(Debug, Clone)]
pub struct OperationExecutor<C> {
    chain: C,
}

impl<C: ChainAdapter> OperationExecutor<C> {
    #[must_use]
    pub fn new(chain: C) -> Self {
        Self { chain }
    }

    #[must_use]
    pub fn chain(&self) -> &C {
        &self.chain
    }

    /// Executes a module and records the outcome.
    #[instrument(
        skip(self, module, input),
        fields(module_id = %module.id, module_type = %module.module_type, amount_in = input.amount)
    )]
    pub async fn execute(&self, module: &Module, input: &InputState) -> ExecutionResult {
        match self.submit(module, input).await {
            Ok((receipt, output)) => {
                info!(
                    tx_hash = %receipt.tx_hash,
                    block_number = receipt.block_number,
                    "module executed"
                );
                ExecutionResult::succeeded(
                    module.id.clone(),
                    module.module_type.clone(),
                    receipt,
                    output,
                )
            }
            Err(e) => {
                warn!(error = %e, "module failed");
                ExecutionResult::failed(
                    module.id.clone(),
                    module.module_type.clone(),
                    e.to_string(),
                )
            }
        }
    }

    async fn submit(
        &self,
        module: &Module,
        input: &InputState,
    ) -> Result<(TransactionReceipt, OperationOutput), OperationError> {
        let output = compute_output(module, input)?;

        let request = ChainRequest {
            module_id: module.id.clone(),
            module_type: module.module_type.clone(),
            amount: input.amount,
        };
        let receipt = self.chain.submit(&request).await?;

        Ok((receipt, output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ChainError;
    use crate::execution::StepStatus;
    use crate::module::SwapConfig;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingChain {
        calls: AtomicUsize,
        refuse: bool,
    }

    #[async_trait]
    impl ChainAdapter for CountingChain {
        async fn submit(&self, _request: &ChainRequest) -> Result<TransactionReceipt, ChainError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.refuse {
                return Err(ChainError::Rejected {
                    reason: "insufficient gas".to_string(),
                });
            }
            Ok(TransactionReceipt {
                tx_hash: "0xfeed".to_string(),
                block_number: 15_000_042,
                timestamp: Utc::now(),
            })
        }
    }

    fn carried(module_type: &str, amount: f64) -> f64 {
        compute_output(&Module::new("A", module_type), &InputState::new(amount))
            .expect("known type")
            .carried_amount()
    }

    #[test]
    fn fee_and_yield_arithmetic() {
        assert_eq!(carried("swap", 100.0), 99.0);
        assert_eq!(carried("claim", 100.0), 10.0);
        assert_eq!(carried("stake", 100.0), 100.0);
        assert_eq!(carried("bridge", 100.0), 100.0);
        assert_eq!(carried("lend", 100.0), 100.0);
        assert_eq!(carried("condition", 42.0), 42.0);
        assert_eq!(carried("start", 7.0), 7.0);
    }

    #[test]
    fn swap_reports_minimum_out_with_slippage() {
        let module = Module::new("A", "swap").with_config(ModuleConfig::Swap(SwapConfig {
            token_in: Some("WETH".into()),
            token_out: Some("USDC".into()),
            amount: None,
            slippage: Some(1.0),
        }));

        let output = compute_output(&module, &InputState::new(100.0)).expect("swap");
        let OperationOutput::Swap {
            amount_out,
            min_amount_out,
            slippage,
            token_out,
            ..
        } = output
        else {
            panic!("expected swap output");
        };
        assert_eq!(amount_out, 99.0);
        assert!((min_amount_out - 98.01).abs() < 1e-9);
        assert_eq!(slippage, 1.0);
        assert_eq!(token_out.as_deref(), Some("USDC"));
    }

    #[test]
    fn swap_uses_default_slippage() {
        let output =
            compute_output(&Module::new("A", "swap"), &InputState::new(100.0)).expect("swap");
        assert!(matches!(
            output,
            OperationOutput::Swap { slippage, .. } if slippage == DEFAULT_SLIPPAGE_PERCENT
        ));
    }

    #[test]
    fn condition_is_always_true() {
        let output = compute_output(&Module::new("C", "condition"), &InputState::new(5.0))
            .expect("condition");
        assert_eq!(
            output,
            OperationOutput::Condition {
                result: true,
                amount: 5.0
            }
        );
    }

    #[test]
    fn output_wire_format() {
        let json =
            serde_json::to_value(OperationOutput::Claim { claimed: 10.0 }).expect("serialize");
        assert_eq!(json, serde_json::json!({ "kind": "claim", "claimed": 10.0 }));

        let json = serde_json::to_value(OperationOutput::Bridge {
            bridged: 1.0,
            destination_chain: Some("arbitrum".into()),
        })
        .expect("serialize");
        assert_eq!(json["destinationChain"], "arbitrum");
    }

    #[tokio::test]
    async fn successful_module_carries_receipt() {
        let executor = OperationExecutor::new(CountingChain::default());
        let result = executor
            .execute(&Module::new("A", "stake"), &InputState::new(99.0))
            .await;

        assert_eq!(result.status, StepStatus::Success);
        assert_eq!(result.transaction.map(|t| t.block_number), Some(15_000_042));
        assert_eq!(result.output.map(|o| o.carried_amount()), Some(99.0));
        assert_eq!(executor.chain().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_type_fails_without_touching_the_chain() {
        let executor = OperationExecutor::new(CountingChain::default());
        let result = executor
            .execute(&Module::new("A", "unknown-type"), &InputState::new(100.0))
            .await;

        assert_eq!(result.status, StepStatus::Failed);
        assert_eq!(result.error.as_deref(), Some("Unknown module type: unknown-type"));
        assert!(result.transaction.is_none());
        assert_eq!(executor.chain().calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn non_finite_input_is_refused() {
        for amount in [f64::INFINITY, f64::NAN] {
            assert_eq!(
                compute_output(&Module::new("A", "claim"), &InputState::new(amount)),
                Err(OperationError::NonFiniteAmount)
            );
        }
    }

    #[tokio::test]
    async fn non_finite_input_never_reaches_the_chain() {
        let executor = OperationExecutor::new(CountingChain::default());
        let result = executor
            .execute(&Module::new("A", "stake"), &InputState::new(f64::INFINITY))
            .await;

        assert_eq!(result.status, StepStatus::Failed);
        assert!(result.output.is_none());
        assert_eq!(executor.chain().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn chain_refusal_becomes_failed_result() {
        let executor = OperationExecutor::new(CountingChain {
            refuse: true,
            ..CountingChain::default()
        });
        let result = executor
            .execute(&Module::new("A", "lend"), &InputState::new(1.0))
            .await;

        assert_eq!(result.status, StepStatus::Failed);
        assert_eq!(
            result.error.as_deref(),
            Some("transaction rejected: insufficient gas")
        );
        assert!(result.output.is_none());
    }
}
