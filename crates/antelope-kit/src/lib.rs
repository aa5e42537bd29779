//! Transaction construction, ABI serialization and pluggable signing for
//! Antelope (EOSIO) chains.
//!
//! **antelope-kit** turns human-level actions into signed, node-accepted
//! transactions: it fetches and caches contract ABIs, encodes payloads into the
//! chain's binary format, fills in expiration and reference-block fields,
//! computes the signing digest, asks the node which keys are required, signs
//! through a pluggable provider and submits once.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use antelope_kit::*;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), antelope_kit::Error> {
//!     let client = Client::from_env()?;
//!
//!     let result = client
//!         .transaction()
//!         .add_action(
//!             Action::new(
//!                 "eosio.token".parse()?,
//!                 "transfer".parse()?,
//!                 ActionData::from_json(json!({
//!                     "from": "alice",
//!                     "to": "bob",
//!                     "quantity": "1.0000 TOK",
//!                     "memo": "",
//!                 }))?,
//!             )
//!             .authorize("alice@active".parse()?),
//!         )
//!         .send()
//!         .await?;
//!
//!     println!("Included as {}", result.transaction_id);
//!     Ok(())
//! }
//! ```
//!
//! # Core Types
//!
//! - [`Name`] - 64-bit account / action name
//! - [`Asset`], [`Symbol`] - Token amounts with fixed precision
//! - [`PublicKey`], [`SecretKey`], [`Signature`] - secp256k1 keys in `PUB_K1_` / WIF / `SIG_K1_` form
//! - [`Transaction`], [`SignedTransaction`], [`PackedTransaction`] - Pipeline stages
//! - [`Abi`] - A contract ABI indexed for encoding and decoding
//!
//! # String Parsing
//!
//! ```
//! use antelope_kit::{Asset, Name, PermissionLevel};
//!
//! let account: Name = "eosio.token".parse().unwrap();
//! let amount: Asset = "1.0000 TOK".parse().unwrap();
//! let auth: PermissionLevel = "alice@active".parse().unwrap();
//! assert_eq!(account.as_u64(), 0x5530ea033482a600);
//! assert_eq!(amount.amount(), 10_000);
//! assert_eq!(auth.to_string(), "alice@active");
//! ```

pub mod abi;
pub mod client;
pub mod error;
pub mod types;

// Re-export commonly used types at crate root
pub use error::{
    Error, ParseAssetError, ParseHashError, ParseKeyError, ParseNameError, ParseTimeError,
    RejectionKind, RpcError, SerializationError, SignerError,
};
pub use types::*;

pub use abi::{Abi, AbiDefinition, AbiRegistry};

pub use client::{
    ChainApi, Client, ClientBuilder, CombinedProvider, InMemoryProvider, RetryConfig, RpcClient,
    SignatureProvider, TaposSource, TransactOptions, TransactResult, TransactionBuilder,
    TransactionSend, WalletProvider,
};
