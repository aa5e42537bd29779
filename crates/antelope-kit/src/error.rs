//! Error types for antelope-kit.
//!
//! # Error Hierarchy
//!
//! - [`Error`](enum@Error) - Main error type, returned by the pipeline
//!   - [`SerializationError`] - Payload does not match the ABI shape
//!   - [`RpcError`] - Transport failures and node rejections
//!   - [`SignerError`] - Signing provider failures
//!   - [`ParseNameError`], [`ParseAssetError`], [`ParseKeyError`], [`ParseHashError`],
//!     [`ParseTimeError`] - text formats
//!
//! # Pattern Matching on Node Rejections
//!
//! ```rust,no_run
//! use antelope_kit::*;
//!
//! # async fn example(client: Client, actions: Vec<Action>) -> Result<(), Error> {
//! match client.transact(actions, TransactOptions::default()).await {
//!     Ok(result) => println!("included as {}", result.transaction_id),
//!     Err(Error::Rpc(err @ RpcError::NodeRejected { .. })) if err.needs_fresh_header() => {
//!         // expired or stale reference block: rebuild and try again
//!     }
//!     Err(e) => return Err(e),
//! }
//! # Ok(())
//! # }
//! ```

use thiserror::Error;

use crate::types::{Name, PublicKey};

/// Error parsing an account or action name.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseNameError {
    #[error("Name '{0}' is too long (max 13 characters)")]
    TooLong(String),

    #[error("Name '{0}' contains invalid character '{1}'")]
    InvalidChar(String, char),

    #[error("Name '{0}' has an invalid 13th character (only '.' and '1'-'5', 'a'-'j' allowed)")]
    InvalidLastChar(String),
}

/// Error parsing a symbol or asset.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseAssetError {
    #[error("Invalid symbol format: '{0}'. Use '4,TOK'")]
    InvalidSymbol(String),

    #[error("Invalid symbol code: '{0}' (1-7 uppercase letters)")]
    InvalidSymbolCode(String),

    #[error("Invalid asset format: '{0}'. Use '1.0000 TOK'")]
    InvalidFormat(String),

    #[error("Invalid number in asset: '{0}'")]
    InvalidNumber(String),

    #[error("Precision {0} is too large (max 18)")]
    PrecisionTooLarge(u8),

    #[error("Asset amount overflow: value too large")]
    Overflow,
}

/// Error parsing a public key, secret key or signature.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseKeyError {
    #[error("Invalid key format: expected 'EOS...', 'PUB_K1_...', 'PVT_K1_...', 'SIG_K1_...' or WIF")]
    InvalidFormat,

    #[error("Unsupported key type: '{0}'")]
    UnsupportedKeyType(String),

    #[error("Invalid base58 encoding: {0}")]
    InvalidBase58(String),

    #[error("Invalid key length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Checksum mismatch")]
    InvalidChecksum,

    #[error("Invalid curve point: key bytes do not represent a valid point on the curve")]
    InvalidCurvePoint,
}

/// Error parsing a checksum / chain id / block id.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseHashError {
    #[error("Invalid hex encoding: {0}")]
    InvalidHex(String),

    #[error("Invalid hash length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

/// Error parsing a timestamp.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseTimeError {
    #[error("Invalid timestamp '{0}': expected 'YYYY-MM-DDTHH:MM:SS[.sss]'")]
    InvalidFormat(String),

    #[error("Timestamp '{0}' is out of range for this type")]
    OutOfRange(String),
}

/// Error during signing operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SignerError {
    #[error("Signing failed: {0}")]
    SigningFailed(String),

    #[error("Provider does not hold key {0}")]
    KeyNotFound(PublicKey),

    #[error("Remote signer error: {0}")]
    Remote(String),

    #[error("Invalid signer configuration: {0}")]
    Config(String),

    #[error("No provider signed for required keys: {}", format_keys(.0))]
    UnresolvedKeys(Vec<PublicKey>),
}

// ============================================================================
// Serialization Errors
// ============================================================================

/// Errors raised while encoding or decoding values against an ABI.
///
/// These are always caller input errors (or a stale ABI) and are never retried.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SerializationError {
    #[error("Missing field '{field}' in struct '{structure}'")]
    MissingField { structure: String, field: String },

    #[error("Unknown field '{field}' for struct '{structure}'")]
    UnknownField { structure: String, field: String },

    #[error("Unknown type '{0}'")]
    UnknownType(String),

    #[error("Invalid value for type '{type_name}': {message}")]
    InvalidValue { type_name: String, message: String },

    #[error("Variant '{variant}' has no alternative '{alternative}'")]
    InvalidVariant { variant: String, alternative: String },

    #[error("Unexpected end of data while reading '{0}'")]
    UnexpectedEof(String),

    #[error("{0} trailing bytes after decoding")]
    TrailingBytes(usize),

    #[error("Type nesting is too deep while resolving '{0}'")]
    RecursionLimit(String),
}

impl SerializationError {
    pub(crate) fn invalid(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        SerializationError::InvalidValue {
            type_name: type_name.into(),
            message: message.into(),
        }
    }
}

// ============================================================================
// RPC Errors
// ============================================================================

/// Category of a structured rejection returned by the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionKind {
    /// The transaction expiration has passed (or is too far in the future).
    Expired,
    /// The node already saw a transaction with the same id.
    Duplicate,
    /// CPU, NET or RAM budget exceeded.
    ResourceExhausted,
    /// Signatures do not satisfy the declared authorizations.
    Unauthorized,
    /// The reference block is unknown or does not match.
    InvalidReferenceBlock,
    /// A contract assertion failed while executing an action.
    ContractAssertion,
    /// Anything else.
    Other,
}

impl RejectionKind {
    /// Classify a node error by its exception name and code.
    pub fn classify(name: &str, code: i64) -> Self {
        match (name, code) {
            ("expired_tx_exception", _) | ("tx_exp_too_far_exception", _) | (_, 3040005) => {
                RejectionKind::Expired
            }
            ("tx_duplicate", _) | (_, 3040008) => RejectionKind::Duplicate,
            ("tx_cpu_usage_exceeded", _)
            | ("tx_net_usage_exceeded", _)
            | ("ram_usage_exceeded", _)
            | ("leeway_deadline_exception", _)
            | ("deadline_exception", _) => RejectionKind::ResourceExhausted,
            ("unsatisfied_authorization", _)
            | ("tx_irrelevant_sig", _)
            | ("tx_duplicate_sig", _)
            | ("missing_auth_exception", _) => RejectionKind::Unauthorized,
            ("invalid_ref_block_exception", _) | (_, 3040007) => {
                RejectionKind::InvalidReferenceBlock
            }
            ("eosio_assert_message_exception", _) | ("eosio_assert_code_exception", _) => {
                RejectionKind::ContractAssertion
            }
            _ => RejectionKind::Other,
        }
    }
}

/// RPC-specific errors.
#[derive(Debug, Error)]
pub enum RpcError {
    // ─── Network/Transport ───
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Network error: {message}")]
    Network {
        message: String,
        status_code: Option<u16>,
        retryable: bool,
    },

    #[error("Timeout after {0} retries")]
    Timeout(u32),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    // ─── Node Rejection ───
    #[error("Node rejected request: {name} ({code}): {message}")]
    NodeRejected {
        code: i64,
        name: String,
        message: String,
        kind: RejectionKind,
        details: Vec<String>,
    },
}

impl RpcError {
    /// Check if this error is retryable at the transport layer.
    pub fn is_retryable(&self) -> bool {
        match self {
            RpcError::Http(e) => e.is_timeout() || e.is_connect(),
            RpcError::Timeout(_) => true,
            RpcError::Network { retryable, .. } => *retryable,
            _ => false,
        }
    }

    /// True if the call did not complete, so no on-chain effect is guaranteed.
    pub fn is_transport_failure(&self) -> bool {
        matches!(
            self,
            RpcError::Http(_) | RpcError::Network { .. } | RpcError::Timeout(_)
        )
    }

    /// The rejection category, if the node returned a structured failure.
    pub fn rejection_kind(&self) -> Option<RejectionKind> {
        match self {
            RpcError::NodeRejected { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// True if rebuilding with a fresh expiration / reference block may succeed.
    pub fn needs_fresh_header(&self) -> bool {
        matches!(
            self.rejection_kind(),
            Some(RejectionKind::Expired) | Some(RejectionKind::InvalidReferenceBlock)
        )
    }

    /// Create a network error.
    pub fn network(message: impl Into<String>, status_code: Option<u16>, retryable: bool) -> Self {
        RpcError::Network {
            message: message.into(),
            status_code,
            retryable,
        }
    }

    /// Create a node rejection, classifying it by name and code.
    pub fn node_rejected(
        code: i64,
        name: impl Into<String>,
        message: impl Into<String>,
        details: Vec<String>,
    ) -> Self {
        let name = name.into();
        RpcError::NodeRejected {
            kind: RejectionKind::classify(&name, code),
            code,
            name,
            message: message.into(),
            details,
        }
    }
}

// ============================================================================
// Main Error Type
// ============================================================================

/// Main error type for antelope-kit operations.
#[derive(Debug, Error)]
pub enum Error {
    // ─── Configuration ───
    #[error("No signature provider configured. Call .provider() on ClientBuilder.")]
    NoProvider,

    #[error("Invalid configuration: {0}")]
    Config(String),

    // ─── Parsing ───
    #[error(transparent)]
    ParseName(#[from] ParseNameError),

    #[error(transparent)]
    ParseAsset(#[from] ParseAssetError),

    #[error(transparent)]
    ParseKey(#[from] ParseKeyError),

    #[error(transparent)]
    ParseHash(#[from] ParseHashError),

    #[error(transparent)]
    ParseTime(#[from] ParseTimeError),

    // ─── ABI / Payload ───
    #[error("No ABI available for account {0}")]
    AbiUnavailable(Name),

    #[error("Invalid action {account}::{name}: not declared in the contract ABI")]
    InvalidAction { account: Name, name: Name },

    #[error(transparent)]
    Serialization(#[from] SerializationError),

    // ─── Keys ───
    #[error("No signature provider exposes any key")]
    NoKeysAvailable,

    #[error("No provider can sign for required keys: {}", format_keys(.0))]
    UnresolvedKeys(Vec<PublicKey>),

    // ─── RPC ───
    #[error(transparent)]
    Rpc(#[from] RpcError),

    // ─── Transaction ───
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    // ─── Signing ───
    #[error("Signing failed: {0}")]
    Signing(#[source] SignerError),

    // ─── Serialization ───
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<SignerError> for Error {
    fn from(err: SignerError) -> Self {
        match err {
            SignerError::UnresolvedKeys(keys) => Error::UnresolvedKeys(keys),
            other => Error::Signing(other),
        }
    }
}

impl Error {
    /// True if the node (or the path to it) failed before accepting the request.
    pub fn is_transport_failure(&self) -> bool {
        matches!(self, Error::Rpc(e) if e.is_transport_failure())
    }

    /// True if the node returned a structured rejection.
    pub fn is_node_rejected(&self) -> bool {
        matches!(self, Error::Rpc(RpcError::NodeRejected { .. }))
    }
}

fn format_keys(keys: &[PublicKey]) -> String {
    keys.iter()
        .map(|k| k.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
