//! RPC request and response types.

use serde::{Deserialize, Deserializer, Serialize};

use super::{Asset, BlockTimestamp, ChainId, Checksum256, Name, PermissionLevel, PublicKey, TimePoint};
use crate::abi::AbiDefinition;

/// Deserialize an `i64` the node may print either as a number or as a string.
fn int_or_string<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Int(i64),
        Str(String),
    }

    match Repr::deserialize(d)? {
        Repr::Int(v) => Ok(v),
        Repr::Str(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

// ============================================================================
// Chain info
// ============================================================================

/// Response of `get_info`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainInfo {
    #[serde(default)]
    pub server_version: String,
    pub chain_id: ChainId,
    pub head_block_num: u32,
    pub head_block_id: Checksum256,
    pub head_block_time: TimePoint,
    #[serde(default)]
    pub head_block_producer: Name,
    pub last_irreversible_block_num: u32,
    pub last_irreversible_block_id: Checksum256,
    #[serde(default)]
    pub virtual_block_cpu_limit: u64,
    #[serde(default)]
    pub virtual_block_net_limit: u64,
    #[serde(default)]
    pub block_cpu_limit: u64,
    #[serde(default)]
    pub block_net_limit: u64,
    #[serde(default)]
    pub server_version_string: Option<String>,
}

// ============================================================================
// ABI and keys
// ============================================================================

/// Response of `get_abi`. `abi` is absent when the account has no contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetAbiResponse {
    pub account_name: Name,
    #[serde(default)]
    pub abi: Option<AbiDefinition>,
}

/// Response of `get_required_keys`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequiredKeysResponse {
    pub required_keys: Vec<PublicKey>,
}

/// Response of `push_transaction`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushTransactionResponse {
    /// Node-reported transaction id.
    pub transaction_id: Checksum256,
    /// Raw execution trace.
    #[serde(default)]
    pub processed: serde_json::Value,
}

// ============================================================================
// Blocks
// ============================================================================

/// Response of `get_block`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockInfo {
    pub id: Checksum256,
    pub block_num: u32,
    pub timestamp: BlockTimestamp,
    pub producer: Name,
    #[serde(default)]
    pub confirmed: u16,
    pub previous: Checksum256,
    #[serde(default)]
    pub transaction_mroot: Checksum256,
    #[serde(default)]
    pub action_mroot: Checksum256,
    #[serde(default)]
    pub schedule_version: u32,
    pub ref_block_prefix: u32,
    #[serde(default)]
    pub transactions: Vec<serde_json::Value>,
}

/// Block number or block id, as accepted by `get_block`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockId {
    Num(u32),
    Id(Checksum256),
}

impl From<u32> for BlockId {
    fn from(num: u32) -> Self {
        BlockId::Num(num)
    }
}

impl From<Checksum256> for BlockId {
    fn from(id: Checksum256) -> Self {
        BlockId::Id(id)
    }
}

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockId::Num(n) => write!(f, "{}", n),
            BlockId::Id(id) => write!(f, "{}", id),
        }
    }
}

// ============================================================================
// Accounts
// ============================================================================

/// A weighted key in an authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyWeight {
    pub key: PublicKey,
    pub weight: u16,
}

/// A weighted account permission in an authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionLevelWeight {
    pub permission: PermissionLevel,
    pub weight: u16,
}

/// A weighted delay in an authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitWeight {
    pub wait_sec: u32,
    pub weight: u16,
}

/// Threshold authority of a permission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authority {
    pub threshold: u32,
    #[serde(default)]
    pub keys: Vec<KeyWeight>,
    #[serde(default)]
    pub accounts: Vec<PermissionLevelWeight>,
    #[serde(default)]
    pub waits: Vec<WaitWeight>,
}

/// A named permission of an account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Permission {
    pub perm_name: Name,
    pub parent: Name,
    pub required_auth: Authority,
}

/// CPU or NET usage window.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ResourceLimit {
    #[serde(deserialize_with = "int_or_string")]
    pub used: i64,
    #[serde(deserialize_with = "int_or_string")]
    pub available: i64,
    #[serde(deserialize_with = "int_or_string")]
    pub max: i64,
}

/// Response of `get_account`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountInfo {
    pub account_name: Name,
    pub head_block_num: u32,
    pub created: TimePoint,
    #[serde(default)]
    pub privileged: bool,
    #[serde(default)]
    pub core_liquid_balance: Option<Asset>,
    #[serde(deserialize_with = "int_or_string")]
    pub ram_quota: i64,
    #[serde(deserialize_with = "int_or_string")]
    pub ram_usage: i64,
    #[serde(deserialize_with = "int_or_string")]
    pub net_weight: i64,
    #[serde(deserialize_with = "int_or_string")]
    pub cpu_weight: i64,
    pub net_limit: ResourceLimit,
    pub cpu_limit: ResourceLimit,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

impl AccountInfo {
    /// Look up a permission by name.
    pub fn permission(&self, name: Name) -> Option<&Permission> {
        self.permissions.iter().find(|p| p.perm_name == name)
    }
}

// ============================================================================
// Tables
// ============================================================================

/// Parameters of `get_table_rows`.
#[derive(Debug, Clone, Serialize)]
pub struct TableRowsRequest {
    pub code: Name,
    /// Scope; usually an account name, sometimes a symbol code.
    pub scope: String,
    pub table: Name,
    /// `true` asks the node to decode rows to JSON; `false` returns hex rows.
    pub json: bool,
    pub limit: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lower_bound: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upper_bound: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_position: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_type: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub reverse: bool,
}

impl TableRowsRequest {
    /// Request JSON rows of `code::table` in `scope`.
    pub fn new(code: Name, scope: impl Into<String>, table: Name) -> Self {
        Self {
            code,
            scope: scope.into(),
            table,
            json: true,
            limit: 10,
            lower_bound: None,
            upper_bound: None,
            index_position: None,
            key_type: None,
            reverse: false,
        }
    }

    /// Set the row limit.
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    /// Set the lower bound (inclusive).
    pub fn lower_bound(mut self, bound: impl Into<String>) -> Self {
        self.lower_bound = Some(bound.into());
        self
    }

    /// Set the upper bound (inclusive).
    pub fn upper_bound(mut self, bound: impl Into<String>) -> Self {
        self.upper_bound = Some(bound.into());
        self
    }

    /// Iterate in descending key order.
    pub fn reverse(mut self) -> Self {
        self.reverse = true;
        self
    }

    /// Ask for hex-encoded binary rows instead of node-decoded JSON.
    pub fn binary(mut self) -> Self {
        self.json = false;
        self
    }
}

/// Response of `get_table_rows`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableRows<T> {
    pub rows: Vec<T>,
    #[serde(default)]
    pub more: bool,
    #[serde(default)]
    pub next_key: String,
}
