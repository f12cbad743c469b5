//! Workflow modules: the operation nodes of a workflow graph.
//!
//! Each module has:
//! - A client-assigned id, unique within the workflow
//! - A type (swap, stake, claim, bridge, lend, condition, start, end)
//! - A typed configuration matching its type
//! - A canvas position, carried through untouched
//!
//! On the wire a module is `{ id, type, config?, position, label? }` with the
//! config as a free-form object. It is parsed into [`ModuleConfig`] against
//! the module type when the module is deserialized.

use crate::error::ConfigError;
use serde::de::{Deserializer, Error as _};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

/// Identifier of a module, assigned by the editor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleId(String);

impl ModuleId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModuleId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ModuleId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// The operation a module performs.
///
/// Type strings outside the known set are kept as `Unknown` so the graph can
/// still be loaded; executing such a module fails.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ModuleType {
    Swap,
    Stake,
    Claim,
    Bridge,
    Lend,
    Condition,
    Start,
    End,
    Unknown(String),
}

impl ModuleType {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Swap => "swap",
            Self::Stake => "stake",
            Self::Claim => "claim",
            Self::Bridge => "bridge",
            Self::Lend => "lend",
            Self::Condition => "condition",
            Self::Start => "start",
            Self::End => "end",
            Self::Unknown(other) => other,
        }
    }
}

impl From<String> for ModuleType {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "swap" => Self::Swap,
            "stake" => Self::Stake,
            "claim" => Self::Claim,
            "bridge" => Self::Bridge,
            "lend" => Self::Lend,
            "condition" => Self::Condition,
            "start" => Self::Start,
            "end" => Self::End,
            _ => Self::Unknown(raw),
        }
    }
}

impl From<&str> for ModuleType {
    fn from(raw: &str) -> Self {
        Self::from(raw.to_string())
    }
}

impl From<ModuleType> for String {
    fn from(module_type: ModuleType) -> Self {
        match module_type {
            ModuleType::Unknown(other) => other,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ModuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canvas coordinates of a module.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Accepts an amount as a JSON number or a numeric string; blank strings are absent.
fn deserialize_amount<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    match Option::<Repr>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Repr::Number(n)) => Ok(Some(n)),
        Some(Repr::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(Repr::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("invalid amount '{text}'"))),
    }
}

/// Configuration of a swap module.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SwapConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_in: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_out: Option<String>,
    #[serde(
        deserialize_with = "deserialize_amount",
        skip_serializing_if = "Option::is_none"
    )]
    pub amount: Option<f64>,
    /// Slippage tolerance in percent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slippage: Option<f64>,
}

/// Configuration of a stake module.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StakeConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(
        deserialize_with = "deserialize_amount",
        skip_serializing_if = "Option::is_none"
    )]
    pub amount: Option<f64>,
}

/// Configuration of a claim module.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClaimConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claim_id: Option<String>,
    #[serde(
        deserialize_with = "deserialize_amount",
        skip_serializing_if = "Option::is_none"
    )]
    pub amount: Option<f64>,
}

/// Configuration of a bridge module.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BridgeConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_chain: Option<String>,
    #[serde(
        deserialize_with = "deserialize_amount",
        skip_serializing_if = "Option::is_none"
    )]
    pub amount: Option<f64>,
}

/// Configuration of a lend module.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LendConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(
        deserialize_with = "deserialize_amount",
        skip_serializing_if = "Option::is_none"
    )]
    pub amount: Option<f64>,
}

/// Configuration of a condition module.
///
/// The expression is stored for display; conditions always evaluate to true.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConditionConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
}

/// Typed configuration of a module, one variant per module type.
#[derive(Debug, Clone, PartialEq)]
pub enum ModuleConfig {
    Swap(SwapConfig),
    Stake(StakeConfig),
    Claim(ClaimConfig),
    Bridge(BridgeConfig),
    Lend(LendConfig),
    Condition(ConditionConfig),
    /// Start and end markers carry no configuration.
    Marker,
    /// Config of an unrecognized module type, kept verbatim.
    Opaque(Option<JsonValue>),
}

impl ModuleConfig {
    /// The empty configuration for a module type.
    #[must_use]
    pub fn default_for(module_type: &ModuleType) -> Self {
        match module_type {
            ModuleType::Swap => Self::Swap(SwapConfig::default()),
            ModuleType::Stake => Self::Stake(StakeConfig::default()),
            ModuleType::Claim => Self::Claim(ClaimConfig::default()),
            ModuleType::Bridge => Self::Bridge(BridgeConfig::default()),
            ModuleType::Lend => Self::Lend(LendConfig::default()),
            ModuleType::Condition => Self::Condition(ConditionConfig::default()),
            ModuleType::Start | ModuleType::End => Self::Marker,
            ModuleType::Unknown(_) => Self::Opaque(None),
        }
    }

    /// Parses a raw config object for the given module type.
    ///
    /// # Errors
    ///
    /// Returns an error if a field has the wrong JSON shape.
    pub fn parse(
        module_type: &ModuleType,
        raw: Option<JsonValue>,
    ) -> Result<Self, serde_json::Error> {
        let Some(raw) = raw.filter(|value| !value.is_null()) else {
            return Ok(Self::default_for(module_type));
        };

        Ok(match module_type {
            ModuleType::Swap => Self::Swap(serde_json::from_value(raw)?),
            ModuleType::Stake => Self::Stake(serde_json::from_value(raw)?),
            ModuleType::Claim => Self::Claim(serde_json::from_value(raw)?),
            ModuleType::Bridge => Self::Bridge(serde_json::from_value(raw)?),
            ModuleType::Lend => Self::Lend(serde_json::from_value(raw)?),
            ModuleType::Condition => Self::Condition(serde_json::from_value(raw)?),
            ModuleType::Start | ModuleType::End => Self::Marker,
            ModuleType::Unknown(_) => Self::Opaque(Some(raw)),
        })
    }

    /// The configured amount, if this config type has one and it is set.
    #[must_use]
    pub fn amount(&self) -> Option<f64> {
        match self {
            Self::Swap(c) => c.amount,
            Self::Stake(c) => c.amount,
            Self::Claim(c) => c.amount,
            Self::Bridge(c) => c.amount,
            Self::Lend(c) => c.amount,
            Self::Condition(_) | Self::Marker | Self::Opaque(_) => None,
        }
    }

    /// Checks value ranges, returning one message per problem.
    #[must_use]
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if let Some(amount) = self.amount() {
            if !amount.is_finite() || amount < 0.0 {
                problems.push(format!(
                    "amount must be a non-negative number, got {amount}"
                ));
            }
        }

        if let Self::Swap(swap) = self {
            if let Some(slippage) = swap.slippage {
                if !(0.0..=MAX_SLIPPAGE_PERCENT).contains(&slippage) {
                    problems.push(format!(
                        "slippage must be between 0 and {MAX_SLIPPAGE_PERCENT} percent, got {slippage}"
                    ));
                }
            }
            if let (Some(token_in), Some(token_out)) = (&swap.token_in, &swap.token_out) {
                if token_in.eq_ignore_ascii_case(token_out) {
                    problems.push(format!("cannot swap {token_in} into itself"));
                }
            }
        }

        problems
    }

    fn to_json(&self) -> Option<JsonValue> {
        let value = match self {
            Self::Swap(c) => serde_json::to_value(c),
            Self::Stake(c) => serde_json::to_value(c),
            Self::Claim(c) => serde_json::to_value(c),
            Self::Bridge(c) => serde_json::to_value(c),
            Self::Lend(c) => serde_json::to_value(c),
            Self::Condition(c) => serde_json::to_value(c),
            Self::Marker => return None,
            Self::Opaque(raw) => return raw.clone(),
        };
        value.ok()
    }
}

/// Upper bound accepted for swap slippage tolerance.
pub const MAX_SLIPPAGE_PERCENT: f64 = 100.0;

/// A workflow module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ModuleRepr", into = "ModuleRepr")]
pub struct Module {
    pub id: ModuleId,
    pub module_type: ModuleType,
    pub config: ModuleConfig,
    pub position: Position,
    pub label: Option<String>,
}

impl Module {
    /// Creates a module with the empty config for its type.
    #[must_use]
    pub fn new(id: impl Into<ModuleId>, module_type: impl Into<ModuleType>) -> Self {
        let module_type = module_type.into();
        Self {
            id: id.into(),
            config: ModuleConfig::default_for(&module_type),
            module_type,
            position: Position::default(),
            label: None,
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: ModuleConfig) -> Self {
        self.config = config;
        self
    }
}

/// Wire shape of a module.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModuleRepr {
    id: ModuleId,
    #[serde(rename = "type")]
    module_type: ModuleType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    config: Option<JsonValue>,
    #[serde(default)]
    position: Position,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    label: Option<String>,
}

impl TryFrom<ModuleRepr> for Module {
    type Error = ConfigError;

    fn try_from(repr: ModuleRepr) -> Result<Self, Self::Error> {
        let config =
            ModuleConfig::parse(&repr.module_type, repr.config).map_err(|e| ConfigError {
                module_id: repr.id.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            id: repr.id,
            module_type: repr.module_type,
            config,
            position: repr.position,
            label: repr.label,
        })
    }
}

impl From<Module> for ModuleRepr {
    fn from(module: Module) -> Self {
        Self {
            config: module.config.to_json(),
            id: module.id,
            module_type: module.module_type,
            position: module.position,
            label: module.label,
        }
    }
}
