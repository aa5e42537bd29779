//! Integration tests for antelope-kit.
//!
//! These drive the full pipeline through the public API against an in-process
//! node that implements [`antelope_kit::ChainApi`].
//!
//! Run with: `cargo test --test integration`

mod common;

mod error_handling_integration;
mod offline_signing_integration;
mod pipeline_integration;
mod signer_integration;
