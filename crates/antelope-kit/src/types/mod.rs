//! Core chain types.
//!
//! Hand-rolled types for names, assets, keys and transactions, with the node's
//! JSON and binary representations.

mod action;
mod asset;
mod hash;
mod key;
mod name;
mod rpc;
mod timestamp;
mod transaction;

pub use action::{Action, ActionData, PermissionLevel, SerializedAction};
pub use asset::{Asset, ExtendedAsset, MAX_PRECISION, Symbol, SymbolCode};
pub use hash::{ChainId, Checksum256};
pub use key::{KeyType, LEGACY_PUBLIC_KEY_PREFIX, PublicKey, SecretKey, Signature};
pub use name::{MAX_NAME_LEN, Name};
pub use rpc::{
    AccountInfo, Authority, BlockId, BlockInfo, ChainInfo, GetAbiResponse, KeyWeight, Permission,
    PermissionLevelWeight, PushTransactionResponse, RequiredKeysResponse, ResourceLimit,
    TableRows, TableRowsRequest, WaitWeight,
};
pub use timestamp::{BlockTimestamp, TimePoint, TimePointSec};
pub use transaction::{
    Compression, PackedTransaction, SignedTransaction, Transaction, TransactionExtension,
    TransactionHeader, pack_context_free_data, signing_digest,
};

/// Serde adapter for `Vec<u8>` fields carried as hex strings.
pub(crate) mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s: String = Deserialize::deserialize(d)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}
