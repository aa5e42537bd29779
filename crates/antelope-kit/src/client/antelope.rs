//! The main client.

use std::sync::Arc;

use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::abi::{Abi, AbiRegistry};
use crate::error::{Error, SerializationError};
use crate::types::{
    AccountInfo, Action, BlockId, BlockInfo, ChainId, ChainInfo, Name, PackedTransaction,
    TableRows, TableRowsRequest,
};

use super::rpc::{ChainApi, RetryConfig, RpcClient};
use super::signer::{InMemoryProvider, PRIVATE_KEYS_ENV, SignatureProvider};
use super::transaction::{
    Pipeline, TaposSource, TransactOptions, TransactResult, TransactionBuilder,
};

/// Environment variable read by [`Client::from_env`] for the node URL.
pub const ENDPOINT_ENV: &str = "ANTELOPE_ENDPOINT";
/// Environment variable read by [`Client::from_env`] for the expected chain id.
pub const CHAIN_ID_ENV: &str = "ANTELOPE_CHAIN_ID";

/// The main client for building, signing and submitting transactions.
///
/// Cheap to clone; clones share the ABI cache and the signature provider.
///
/// # Example
///
/// ```rust,no_run
/// use antelope_kit::*;
/// use serde_json::json;
///
/// #[tokio::main]
/// async fn main() -> Result<(), antelope_kit::Error> {
///     let client = Client::builder("http://127.0.0.1:8888")
///         .provider(InMemoryProvider::new(["5KQwrPbwdL6PhXujxW37FSSQZ1JiwsST4cqQzDeyXtP79zkvFD3"])?)
///         .build()?;
///
///     let transfer = Action::new(
///         "eosio.token".parse()?,
///         "transfer".parse()?,
///         ActionData::from_json(json!({
///             "from": "alice",
///             "to": "bob",
///             "quantity": "1.0000 TOK",
///             "memo": "",
///         }))?,
///     )
///     .authorize("alice@active".parse()?);
///
///     let result = client.transact(vec![transfer], TransactOptions::default()).await?;
///     println!("Included as {}", result.transaction_id);
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Client {
    rpc: Arc<RpcClient>,
    pipeline: Pipeline,
    defaults: TransactOptions,
}

impl Client {
    /// Create a builder for a node at `endpoint` (e.g. `http://127.0.0.1:8888`).
    pub fn builder(endpoint: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(endpoint)
    }

    /// Create a configured client from environment variables.
    ///
    /// Reads the following environment variables:
    /// - `ANTELOPE_ENDPOINT` (required): node URL.
    /// - `ANTELOPE_CHAIN_ID` (optional): expected chain id, checked against the node.
    /// - `ANTELOPE_PRIVATE_KEYS` (optional): comma-separated secret keys.
    ///
    /// Without keys the client can read but not sign.
    ///
    /// # Errors
    ///
    /// Returns an error if `ANTELOPE_ENDPOINT` is missing or a value cannot be parsed.
    pub fn from_env() -> Result<Client, Error> {
        let endpoint = std::env::var(ENDPOINT_ENV)
            .map_err(|_| Error::Config(format!("{} is not set", ENDPOINT_ENV)))?;
        let mut builder = Client::builder(endpoint);

        if let Ok(chain_id) = std::env::var(CHAIN_ID_ENV) {
            builder = builder.chain_id(chain_id.trim().parse()?);
        }
        if std::env::var_os(PRIVATE_KEYS_ENV).is_some() {
            builder = builder.provider(InMemoryProvider::from_env()?);
        }

        builder.build()
    }

    /// Get the underlying RPC client.
    pub fn rpc(&self) -> &RpcClient {
        &self.rpc
    }

    /// Get the node URL.
    pub fn endpoint(&self) -> &str {
        self.rpc.url()
    }

    /// The ABI cache shared by all transactions of this client.
    pub fn abi_registry(&self) -> &AbiRegistry {
        &self.pipeline.registry
    }

    /// True if a signature provider is configured.
    pub fn can_sign(&self) -> bool {
        self.pipeline.provider.is_some()
    }

    /// Options applied to new transactions.
    pub fn default_options(&self) -> &TransactOptions {
        &self.defaults
    }

    // ========================================================================
    // Transactions
    // ========================================================================

    /// Assemble, sign and submit `actions`.
    ///
    /// Push is attempted exactly once. On [`Error::is_transport_failure`] the
    /// outcome is unknown; look the transaction up before resubmitting.
    pub async fn transact(
        &self,
        actions: Vec<Action>,
        options: TransactOptions,
    ) -> Result<TransactResult, Error> {
        self.pipeline.transact(&actions, &[], &options).await
    }

    /// Start building a transaction with the client's default options.
    pub fn transaction(&self) -> TransactionBuilder {
        TransactionBuilder::new(self.pipeline.clone(), self.defaults.clone())
    }

    /// Submit an envelope signed earlier, e.g. by [`TransactionBuilder::sign`].
    pub async fn push_transaction(
        &self,
        transaction: &PackedTransaction,
    ) -> Result<TransactResult, Error> {
        self.pipeline.submit(transaction).await
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Chain id and head / irreversible block.
    pub async fn get_info(&self) -> Result<ChainInfo, Error> {
        Ok(self.pipeline.api.get_info().await?)
    }

    /// The ABI deployed on `account`, cached after the first call.
    pub async fn abi(&self, account: Name) -> Result<Arc<Abi>, Error> {
        self.pipeline.registry.resolve(account).await
    }

    /// A block by number or id.
    pub async fn get_block(&self, block: impl Into<BlockId>) -> Result<BlockInfo, Error> {
        Ok(self.rpc.get_block(block).await?)
    }

    /// Account metadata, resources and permissions.
    pub async fn get_account(&self, account: Name) -> Result<AccountInfo, Error> {
        Ok(self.rpc.get_account(account).await?)
    }

    /// Table rows decoded by the node and deserialized into `T`.
    ///
    /// `T` decides how strict the shape check is; add
    /// `#[serde(deny_unknown_fields)]` to reject unexpected columns.
    pub async fn table_rows<T: DeserializeOwned>(
        &self,
        request: TableRowsRequest,
    ) -> Result<TableRows<T>, Error> {
        let request = TableRowsRequest {
            json: true,
            ..request
        };
        Ok(self.rpc.get_table_rows(&request).await?)
    }

    /// Table rows fetched as binary and decoded locally with the contract ABI.
    ///
    /// Fails if the ABI does not declare the table or a row does not decode
    /// into its declared type.
    pub async fn table_rows_binary<T: DeserializeOwned>(
        &self,
        request: TableRowsRequest,
    ) -> Result<TableRows<T>, Error> {
        let request = request.binary();
        let abi = self.abi(request.code).await?;
        let row_type = abi.table_type(request.table).ok_or_else(|| {
            SerializationError::UnknownType(format!("table {}::{}", request.code, request.table))
        })?;

        let raw: TableRows<BinaryRow> = self.rpc.get_table_rows(&request).await?;
        let rows = raw
            .rows
            .iter()
            .map(|row| -> Result<T, Error> {
                let bytes = hex::decode(row.hex()).map_err(|e| {
                    SerializationError::invalid(row_type, format!("row is not hex: {}", e))
                })?;
                let value = abi.decode(row_type, &bytes)?;
                Ok(serde_json::from_value(value)?)
            })
            .collect::<Result<Vec<T>, Error>>()?;

        Ok(TableRows {
            rows,
            more: raw.more,
            next_key: raw.next_key,
        })
    }
}

/// A binary table row; nodes add the payer when `show_payer` is set.
#[derive(Deserialize)]
#[serde(untagged)]
enum BinaryRow {
    Hex(String),
    WithPayer { data: String },
}

impl BinaryRow {
    fn hex(&self) -> &str {
        match self {
            BinaryRow::Hex(data) | BinaryRow::WithPayer { data } => data,
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("rpc", &self.rpc)
            .field("chain_id", &self.pipeline.chain_id)
            .field("can_sign", &self.can_sign())
            .field("defaults", &self.defaults)
            .finish()
    }
}

// ============================================================================
// ClientBuilder
// ============================================================================

/// Builder for creating a [`Client`].
///
/// # Example
///
/// ```rust,no_run
/// use antelope_kit::*;
///
/// # fn example() -> Result<(), antelope_kit::Error> {
/// let client = Client::builder("http://127.0.0.1:8888")
///     .provider(WalletProvider::new("http://127.0.0.1:8900"))
///     .expire_seconds(120)
///     .tapos(TaposSource::LastIrreversible)
///     .retry_config(RetryConfig::none())
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    endpoint: String,
    provider: Option<Arc<dyn SignatureProvider>>,
    chain_id: Option<ChainId>,
    chain_api: Option<Arc<dyn ChainApi>>,
    retry_config: RetryConfig,
    defaults: TransactOptions,
}

impl ClientBuilder {
    fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            provider: None,
            chain_id: None,
            chain_api: None,
            retry_config: RetryConfig::default(),
            defaults: TransactOptions::default(),
        }
    }

    /// Set the signature provider.
    pub fn provider(mut self, provider: impl SignatureProvider + 'static) -> Self {
        self.provider = Some(Arc::new(provider));
        self
    }

    /// Set a shared signature provider.
    pub fn shared_provider(mut self, provider: Arc<dyn SignatureProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Sign for this chain only; transactions fail if the node reports another id.
    pub fn chain_id(mut self, chain_id: ChainId) -> Self {
        self.chain_id = Some(chain_id);
        self
    }

    /// Route pipeline calls through a custom [`ChainApi`] instead of the HTTP client.
    ///
    /// The read helpers that are not part of [`ChainApi`] still use the endpoint.
    pub fn chain_api(mut self, api: Arc<dyn ChainApi>) -> Self {
        self.chain_api = Some(api);
        self
    }

    /// Set the retry configuration for reads.
    pub fn retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    /// Default expiration window for new transactions.
    pub fn expire_seconds(mut self, seconds: u32) -> Self {
        self.defaults.expire_seconds = seconds;
        self
    }

    /// Default reference block for new transactions.
    pub fn tapos(mut self, tapos: TaposSource) -> Self {
        self.defaults.tapos = tapos;
        self
    }

    /// Build the client.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is not an `http(s)` URL.
    pub fn build(self) -> Result<Client, Error> {
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(Error::Config(format!(
                "Endpoint must be an http(s) URL, got '{}'",
                self.endpoint
            )));
        }

        let rpc = Arc::new(RpcClient::with_retry_config(
            self.endpoint,
            self.retry_config,
        ));
        let api: Arc<dyn ChainApi> = match self.chain_api {
            Some(api) => api,
            None => rpc.clone(),
        };

        Ok(Client {
            pipeline: Pipeline {
                registry: Arc::new(AbiRegistry::new(api.clone())),
                api,
                provider: self.provider,
                chain_id: self.chain_id,
            },
            rpc,
            defaults: self.defaults,
        })
    }
}
