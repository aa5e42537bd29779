//! Transaction assembly and the sign / submit pipeline.

use std::collections::BTreeMap;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::Arc;

use tracing::{debug, info};

use super::rpc::ChainApi;
use super::signer::SignatureProvider;
use crate::abi::AbiRegistry;
use crate::error::Error;
use crate::types::{
    Action, ActionData, ChainId, ChainInfo, Checksum256, PackedTransaction, PublicKey,
    SerializedAction, Signature, SignedTransaction, TimePointSec, Transaction, TransactionHeader,
};

/// Default transaction lifetime, in seconds past the head block time.
pub const DEFAULT_EXPIRE_SECONDS: u32 = 30;

// ============================================================================
// Options
// ============================================================================

/// Which block the transaction references (TaPoS).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TaposSource {
    /// The head block. Fastest, but the transaction is dropped if that block is forked out.
    #[default]
    Head,
    /// The last irreversible block.
    LastIrreversible,
}

/// Per-transaction settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactOptions {
    /// Seconds past the head block time before the transaction expires.
    pub expire_seconds: u32,
    /// Reference block.
    pub tapos: TaposSource,
    /// NET budget in 8-byte words; 0 lets the node decide.
    pub max_net_usage_words: u32,
    /// CPU budget in milliseconds; 0 lets the node decide.
    pub max_cpu_usage_ms: u8,
    /// Seconds to delay execution.
    pub delay_sec: u32,
    /// Context-free data blobs, included in the signing digest.
    pub context_free_data: Vec<Vec<u8>>,
}

impl Default for TransactOptions {
    fn default() -> Self {
        Self {
            expire_seconds: DEFAULT_EXPIRE_SECONDS,
            tapos: TaposSource::Head,
            max_net_usage_words: 0,
            max_cpu_usage_ms: 0,
            delay_sec: 0,
            context_free_data: Vec::new(),
        }
    }
}

impl TransactOptions {
    /// Set the expiration window.
    pub fn expire_seconds(mut self, seconds: u32) -> Self {
        self.expire_seconds = seconds;
        self
    }

    /// Set the reference block.
    pub fn tapos(mut self, tapos: TaposSource) -> Self {
        self.tapos = tapos;
        self
    }
}

/// Outcome of a submitted transaction.
#[derive(Clone, Debug)]
pub struct TransactResult {
    /// Transaction id as reported by the node.
    pub transaction_id: Checksum256,
    /// Raw execution trace.
    pub processed: serde_json::Value,
}

// ============================================================================
// Assembly
// ============================================================================

/// Header fields derived from chain state: expiration and reference block.
pub fn transaction_header(info: &ChainInfo, options: &TransactOptions) -> TransactionHeader {
    let (block_num, block_id) = match options.tapos {
        TaposSource::Head => (info.head_block_num, &info.head_block_id),
        TaposSource::LastIrreversible => (
            info.last_irreversible_block_num,
            &info.last_irreversible_block_id,
        ),
    };
    let id = block_id.as_bytes();

    TransactionHeader {
        expiration: TimePointSec::from(info.head_block_time).saturating_add(options.expire_seconds),
        ref_block_num: (block_num & 0xFFFF) as u16,
        ref_block_prefix: u32::from_le_bytes([id[8], id[9], id[10], id[11]]),
        max_net_usage_words: options.max_net_usage_words,
        max_cpu_usage_ms: options.max_cpu_usage_ms,
        delay_sec: options.delay_sec,
    }
}

/// Encode an action's payload through its contract ABI.
///
/// Raw payloads are passed through without touching the registry.
pub async fn serialize_action(
    action: &Action,
    registry: &AbiRegistry,
) -> Result<SerializedAction, Error> {
    let data = match &action.data {
        ActionData::Raw(bytes) => bytes.clone(),
        ActionData::Fields(fields) => {
            let abi = registry.resolve(action.account).await?;
            let type_name = abi.action_type(action.name).ok_or(Error::InvalidAction {
                account: action.account,
                name: action.name,
            })?;
            abi.encode_fields(type_name, fields)?
        }
    };

    Ok(SerializedAction {
        account: action.account,
        name: action.name,
        authorization: action.authorization.clone(),
        data,
    })
}

/// Build an unsigned transaction from caller actions and chain state.
pub async fn assemble(
    actions: &[Action],
    context_free_actions: &[Action],
    info: &ChainInfo,
    options: &TransactOptions,
    registry: &AbiRegistry,
) -> Result<Transaction, Error> {
    let mut serialized = Vec::with_capacity(actions.len());
    for action in actions {
        serialized.push(serialize_action(action, registry).await?);
    }
    let mut context_free = Vec::with_capacity(context_free_actions.len());
    for action in context_free_actions {
        context_free.push(serialize_action(action, registry).await?);
    }

    Ok(Transaction {
        header: transaction_header(info, options),
        context_free_actions: context_free,
        actions: serialized,
        transaction_extensions: Vec::new(),
    })
}

// ============================================================================
// Pipeline
// ============================================================================

/// Everything a transaction needs from its client.
#[derive(Clone)]
pub(crate) struct Pipeline {
    pub api: Arc<dyn ChainApi>,
    pub registry: Arc<AbiRegistry>,
    pub provider: Option<Arc<dyn SignatureProvider>>,
    pub chain_id: Option<ChainId>,
}

impl Pipeline {
    fn chain_id(&self, info: &ChainInfo) -> Result<ChainId, Error> {
        match self.chain_id {
            Some(expected) if expected != info.chain_id => Err(Error::Config(format!(
                "Node reports chain id {}, client is configured for {}",
                info.chain_id, expected
            ))),
            Some(expected) => Ok(expected),
            None => Ok(info.chain_id),
        }
    }

    /// Assemble and sign without broadcasting.
    pub async fn sign(
        &self,
        actions: &[Action],
        context_free_actions: &[Action],
        options: &TransactOptions,
    ) -> Result<SignedTransaction, Error> {
        if actions.is_empty() && context_free_actions.is_empty() {
            return Err(Error::InvalidTransaction(
                "Transaction must have at least one action".to_string(),
            ));
        }
        let provider = self.provider.as_ref().ok_or(Error::NoProvider)?;

        let info = self.api.get_info().await?;
        let chain_id = self.chain_id(&info)?;
        debug!(head_block_num = info.head_block_num, %chain_id, "Fetched chain info");

        let transaction = assemble(
            actions,
            context_free_actions,
            &info,
            options,
            &self.registry,
        )
        .await?;
        debug!(
            actions = transaction.actions.len(),
            expiration = %transaction.header.expiration,
            ref_block_num = transaction.header.ref_block_num,
            "Assembled transaction"
        );

        let available = provider.available_keys().await?;
        if available.is_empty() {
            return Err(Error::NoKeysAvailable);
        }

        let digest = transaction.signing_digest(&chain_id, &options.context_free_data)?;
        let required = self
            .api
            .get_required_keys(&transaction, &available)
            .await?;
        debug!(available = available.len(), required = required.len(), %digest, "Resolved required keys");

        let signatures = provider.sign(&chain_id, &required, &digest).await?;
        let signatures = collect_signatures(&required, signatures)?;

        Ok(SignedTransaction {
            transaction,
            signatures,
            context_free_data: options.context_free_data.clone(),
        })
    }

    /// Push a signed envelope exactly once.
    pub async fn submit(&self, packed: &PackedTransaction) -> Result<TransactResult, Error> {
        info!(local_id = %packed.id(), signatures = packed.signatures.len(), "Pushing transaction");
        let response = self.api.push_transaction(packed).await?;
        info!(transaction_id = %response.transaction_id, "Transaction accepted");
        Ok(TransactResult {
            transaction_id: response.transaction_id,
            processed: response.processed,
        })
    }

    /// Assemble, sign and submit.
    pub async fn transact(
        &self,
        actions: &[Action],
        context_free_actions: &[Action],
        options: &TransactOptions,
    ) -> Result<TransactResult, Error> {
        let signed = self.sign(actions, context_free_actions, options).await?;
        self.submit(&signed.to_packed()?).await
    }
}

/// Order signatures like `required`, failing if any key went unsigned.
fn collect_signatures(
    required: &[PublicKey],
    mut signatures: BTreeMap<PublicKey, Signature>,
) -> Result<Vec<Signature>, Error> {
    let missing: Vec<PublicKey> = required
        .iter()
        .filter(|key| !signatures.contains_key(key))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(Error::UnresolvedKeys(missing));
    }
    Ok(required
        .iter()
        .filter_map(|key| signatures.remove(key))
        .collect())
}

// ============================================================================
// TransactionBuilder
// ============================================================================

/// Fluent builder for a transaction.
///
/// Created via [`Client::transaction`](crate::Client::transaction).
///
/// # Example
///
/// ```rust,no_run
/// # use antelope_kit::*;
/// # use serde_json::json;
/// # async fn example(client: Client) -> Result<(), Error> {
/// let transfer = Action::new(
///     "eosio.token".parse()?,
///     "transfer".parse()?,
///     ActionData::from_json(json!({
///         "from": "alice",
///         "to": "bob",
///         "quantity": "1.0000 TOK",
///         "memo": "",
///     }))?,
/// )
/// .authorize("alice@active".parse()?);
///
/// let result = client
///     .transaction()
///     .add_action(transfer)
///     .expire_seconds(60)
///     .send()
///     .await?;
/// println!("{}", result.transaction_id);
/// # Ok(())
/// # }
/// ```
pub struct TransactionBuilder {
    pipeline: Pipeline,
    actions: Vec<Action>,
    context_free_actions: Vec<Action>,
    options: TransactOptions,
}

impl TransactionBuilder {
    pub(crate) fn new(pipeline: Pipeline, options: TransactOptions) -> Self {
        Self {
            pipeline,
            actions: Vec::new(),
            context_free_actions: Vec::new(),
            options,
        }
    }

    // ========================================================================
    // Contents
    // ========================================================================

    /// Append an action.
    pub fn add_action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    /// Append several actions.
    pub fn actions(mut self, actions: impl IntoIterator<Item = Action>) -> Self {
        self.actions.extend(actions);
        self
    }

    /// Append a context-free action. These carry no authorization.
    pub fn add_context_free_action(mut self, action: Action) -> Self {
        self.context_free_actions.push(action);
        self
    }

    /// Append a context-free data blob.
    pub fn context_free_data(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.options.context_free_data.push(data.into());
        self
    }

    // ========================================================================
    // Header
    // ========================================================================

    /// Replace all options at once.
    pub fn options(mut self, options: TransactOptions) -> Self {
        self.options = options;
        self
    }

    /// Seconds past the head block time before the transaction expires.
    pub fn expire_seconds(mut self, seconds: u32) -> Self {
        self.options.expire_seconds = seconds;
        self
    }

    /// Reference block source.
    pub fn tapos(mut self, tapos: TaposSource) -> Self {
        self.options.tapos = tapos;
        self
    }

    /// NET budget in 8-byte words.
    pub fn max_net_usage_words(mut self, words: u32) -> Self {
        self.options.max_net_usage_words = words;
        self
    }

    /// CPU budget in milliseconds.
    pub fn max_cpu_usage_ms(mut self, ms: u8) -> Self {
        self.options.max_cpu_usage_ms = ms;
        self
    }

    /// Delay execution.
    pub fn delay_sec(mut self, seconds: u32) -> Self {
        self.options.delay_sec = seconds;
        self
    }

    /// Sign with a different provider than the client's.
    pub fn sign_with(mut self, provider: impl SignatureProvider + 'static) -> Self {
        self.pipeline.provider = Some(Arc::new(provider));
        self
    }

    // ========================================================================
    // Execution
    // ========================================================================

    /// Assemble and sign without broadcasting.
    ///
    /// Use [`SignedTransaction::to_packed`] for the envelope that
    /// [`Client::push_transaction`](crate::Client::push_transaction) accepts.
    pub async fn sign(self) -> Result<SignedTransaction, Error> {
        self.pipeline
            .sign(&self.actions, &self.context_free_actions, &self.options)
            .await
    }

    /// Send the transaction.
    ///
    /// This is equivalent to awaiting the builder directly.
    pub fn send(self) -> TransactionSend {
        TransactionSend { builder: self }
    }
}

/// Future for sending a transaction.
pub struct TransactionSend {
    builder: TransactionBuilder,
}

impl IntoFuture for TransactionSend {
    type Output = Result<TransactResult, Error>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            let builder = self.builder;
            builder
                .pipeline
                .transact(
                    &builder.actions,
                    &builder.context_free_actions,
                    &builder.options,
                )
                .await
        })
    }
}

impl IntoFuture for TransactionBuilder {
    type Output = Result<TransactResult, Error>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        self.send().into_future()
    }
}
