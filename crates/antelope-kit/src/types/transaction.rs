//! Transaction types, packing and the signing digest.

use serde::{Deserialize, Serialize};

use super::{ChainId, Checksum256, SerializedAction, Signature, TimePointSec};
use crate::abi::serializer::{ByteReader, ByteWriter};
use crate::error::{Error, SerializationError};

/// Transaction header.
///
/// Resource budgets default to zero, which lets the node apply its own limits.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionHeader {
    /// The transaction is rejected after this time.
    pub expiration: TimePointSec,
    /// Low 16 bits of the reference block number.
    pub ref_block_num: u16,
    /// 32 bits of the reference block id.
    pub ref_block_prefix: u32,
    /// Upper bound on NET usage, in 8-byte words (`varuint32`).
    pub max_net_usage_words: u32,
    /// Upper bound on CPU usage, in milliseconds.
    pub max_cpu_usage_ms: u8,
    /// Seconds to delay execution (`varuint32`).
    pub delay_sec: u32,
}

impl TransactionHeader {
    fn pack(&self, w: &mut ByteWriter) {
        w.write_u32(self.expiration.as_secs());
        w.write_u16(self.ref_block_num);
        w.write_u32(self.ref_block_prefix);
        w.write_varuint32(self.max_net_usage_words);
        w.write_u8(self.max_cpu_usage_ms);
        w.write_varuint32(self.delay_sec);
    }

    fn unpack(r: &mut ByteReader<'_>) -> Result<Self, SerializationError> {
        Ok(Self {
            expiration: TimePointSec::from_secs(r.read_u32("expiration")?),
            ref_block_num: r.read_u16("ref_block_num")?,
            ref_block_prefix: r.read_u32("ref_block_prefix")?,
            max_net_usage_words: r.read_varuint32("max_net_usage_words")?,
            max_cpu_usage_ms: r.read_u8("max_cpu_usage_ms")?,
            delay_sec: r.read_varuint32("delay_sec")?,
        })
    }
}

/// A `(type, data)` transaction extension.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionExtension {
    #[serde(rename = "type")]
    pub kind: u16,
    #[serde(with = "super::hex_bytes")]
    pub data: Vec<u8>,
}

/// An unsigned transaction with every action binary encoded.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(flatten)]
    pub header: TransactionHeader,
    #[serde(default)]
    pub context_free_actions: Vec<SerializedAction>,
    pub actions: Vec<SerializedAction>,
    #[serde(default)]
    pub transaction_extensions: Vec<TransactionExtension>,
}

impl Transaction {
    /// Binary encoding, as included in the digest and the `packed_trx` envelope field.
    pub fn pack(&self) -> Result<Vec<u8>, SerializationError> {
        let mut w = ByteWriter::new();
        self.header.pack(&mut w);
        w.write_len(self.context_free_actions.len())?;
        for action in &self.context_free_actions {
            action.pack(&mut w)?;
        }
        w.write_len(self.actions.len())?;
        for action in &self.actions {
            action.pack(&mut w)?;
        }
        w.write_len(self.transaction_extensions.len())?;
        for ext in &self.transaction_extensions {
            w.write_u16(ext.kind);
            w.write_bytes(&ext.data)?;
        }
        Ok(w.into_bytes())
    }

    /// Decode a packed transaction.
    pub fn unpack(bytes: &[u8]) -> Result<Self, SerializationError> {
        let mut r = ByteReader::new(bytes);
        let header = TransactionHeader::unpack(&mut r)?;
        let context_free_actions = unpack_actions(&mut r, "context_free_actions")?;
        let actions = unpack_actions(&mut r, "actions")?;
        let count = r.read_len("transaction_extensions", 3)?;
        let transaction_extensions = (0..count)
            .map(|_| {
                Ok(TransactionExtension {
                    kind: r.read_u16("transaction_extensions.type")?,
                    data: r.read_bytes("transaction_extensions.data")?.to_vec(),
                })
            })
            .collect::<Result<Vec<_>, SerializationError>>()?;
        r.finish()?;
        Ok(Self {
            header,
            context_free_actions,
            actions,
            transaction_extensions,
        })
    }

    /// The transaction id: sha256 of the packed transaction.
    pub fn id(&self) -> Result<Checksum256, SerializationError> {
        Ok(Checksum256::hash(&self.pack()?))
    }

    /// Compute the digest signers must sign.
    pub fn signing_digest(
        &self,
        chain_id: &ChainId,
        context_free_data: &[Vec<u8>],
    ) -> Result<Checksum256, SerializationError> {
        signing_digest(chain_id, &self.pack()?, context_free_data)
    }
}

fn unpack_actions(
    r: &mut ByteReader<'_>,
    what: &str,
) -> Result<Vec<SerializedAction>, SerializationError> {
    let count = r.read_len(what, 18)?;
    (0..count).map(|_| SerializedAction::unpack(r)).collect()
}

/// Pack context-free data as `vec<bytes>`. Empty input packs to no bytes at all.
pub fn pack_context_free_data(context_free_data: &[Vec<u8>]) -> Result<Vec<u8>, SerializationError> {
    if context_free_data.is_empty() {
        return Ok(Vec::new());
    }
    let mut w = ByteWriter::new();
    w.write_len(context_free_data.len())?;
    for blob in context_free_data {
        w.write_bytes(blob)?;
    }
    Ok(w.into_bytes())
}

fn unpack_context_free_data(bytes: &[u8]) -> Result<Vec<Vec<u8>>, SerializationError> {
    if bytes.is_empty() {
        return Ok(Vec::new());
    }
    let mut r = ByteReader::new(bytes);
    let count = r.read_len("context_free_data", 1)?;
    let blobs = (0..count)
        .map(|_| r.read_bytes("context_free_data").map(<[u8]>::to_vec))
        .collect::<Result<Vec<_>, _>>()?;
    r.finish()?;
    Ok(blobs)
}

/// `sha256(chain_id ‖ packed_trx ‖ cfd_hash)`, where `cfd_hash` is 32 zero bytes
/// without context-free data and `sha256(packed_cfd)` otherwise.
pub fn signing_digest(
    chain_id: &ChainId,
    packed_trx: &[u8],
    context_free_data: &[Vec<u8>],
) -> Result<Checksum256, SerializationError> {
    let cfd_hash = if context_free_data.is_empty() {
        Checksum256::ZERO
    } else {
        Checksum256::hash(&pack_context_free_data(context_free_data)?)
    };

    let mut buf = Vec::with_capacity(32 + packed_trx.len() + 32);
    buf.extend_from_slice(chain_id.as_bytes());
    buf.extend_from_slice(packed_trx);
    buf.extend_from_slice(cfd_hash.as_bytes());
    Ok(Checksum256::hash(&buf))
}

/// A transaction with its signatures and context-free data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedTransaction {
    /// The unsigned transaction.
    pub transaction: Transaction,
    /// Signatures, in the order the providers were resolved.
    pub signatures: Vec<Signature>,
    /// Raw context-free data blobs.
    pub context_free_data: Vec<Vec<u8>>,
}

impl SignedTransaction {
    /// Get the transaction id.
    pub fn id(&self) -> Result<Checksum256, SerializationError> {
        self.transaction.id()
    }

    /// Build the envelope submitted to the node.
    pub fn to_packed(&self) -> Result<PackedTransaction, SerializationError> {
        Ok(PackedTransaction {
            signatures: self.signatures.clone(),
            compression: Compression::None,
            packed_context_free_data: pack_context_free_data(&self.context_free_data)?,
            packed_trx: self.transaction.pack()?,
        })
    }
}

/// Envelope compression. Only uncompressed envelopes are produced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    None,
}

/// The envelope pushed to `push_transaction`.
///
/// Serializes to `{signatures, compression, packed_context_free_data, packed_trx}` with
/// hex byte fields.
///
/// # Example
///
/// ```rust,ignore
/// let packed = client.transaction().add_action(action).sign().await?;
/// let json = serde_json::to_string(&packed)?;
/// // ... later, possibly elsewhere
/// let packed: PackedTransaction = serde_json::from_str(&json)?;
/// client.push_transaction(&packed).await?;
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackedTransaction {
    pub signatures: Vec<Signature>,
    #[serde(default)]
    pub compression: Compression,
    #[serde(with = "super::hex_bytes", default)]
    pub packed_context_free_data: Vec<u8>,
    #[serde(with = "super::hex_bytes")]
    pub packed_trx: Vec<u8>,
}

impl PackedTransaction {
    /// Transaction id computed locally from `packed_trx`.
    ///
    /// The node's id is authoritative; this is only useful for logging and lookups.
    pub fn id(&self) -> Checksum256 {
        Checksum256::hash(&self.packed_trx)
    }

    /// Decode the envelope back into a [`SignedTransaction`].
    pub fn unpack(&self) -> Result<SignedTransaction, Error> {
        Ok(SignedTransaction {
            transaction: Transaction::unpack(&self.packed_trx)?,
            signatures: self.signatures.clone(),
            context_free_data: unpack_context_free_data(&self.packed_context_free_data)?,
        })
    }
}
