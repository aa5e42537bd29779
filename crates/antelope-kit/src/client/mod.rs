//! Client module: node access, signing and the transaction pipeline.
//!
//! - [`Client`] - The main client, the single entry point for all operations
//! - [`ClientBuilder`] - Fluent builder for configuring the client
//! - [`RpcClient`] - Low-level HTTP client with retry logic for reads
//! - [`ChainApi`] - The node operations the pipeline depends on
//!
//! # Signature Providers
//!
//! | Provider | Use Case |
//! |----------|----------|
//! | [`InMemoryProvider`] | Scripts and bots with keys in memory, env or a key file |
//! | [`WalletProvider`] | Keys held by a keosd-compatible wallet daemon |
//! | [`CombinedProvider`] | Several providers acting as one |
//!
//! # Pipeline
//!
//! [`Client::transact`] and [`TransactionBuilder`] run the same sequence:
//! chain info, assembly (ABI resolution and encoding), key discovery, digest,
//! required keys, signing, and a single push.

mod antelope;
mod rpc;
mod signer;
mod transaction;
mod wallet;

#[cfg(test)]
pub(crate) mod testing;

pub use antelope::{CHAIN_ID_ENV, Client, ClientBuilder, ENDPOINT_ENV};
pub use rpc::{ChainApi, RetryConfig, RpcClient};
pub use signer::{CombinedProvider, InMemoryProvider, PRIVATE_KEYS_ENV, SignatureProvider};
pub use transaction::{
    DEFAULT_EXPIRE_SECONDS, TaposSource, TransactOptions, TransactResult, TransactionBuilder,
    TransactionSend, assemble, serialize_action, transaction_header,
};
pub use wallet::WalletProvider;
