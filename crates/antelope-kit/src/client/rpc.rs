//! Low-level HTTP client for the node's chain API.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::{debug, warn};

use crate::abi::AbiDefinition;
use crate::error::RpcError;
use crate::types::{
    AccountInfo, BlockId, BlockInfo, ChainInfo, GetAbiResponse, Name, PackedTransaction,
    PublicKey, PushTransactionResponse, RequiredKeysResponse, TableRows, TableRowsRequest,
    Transaction,
};

/// Retry configuration for idempotent RPC reads.
///
/// `push_transaction` is never retried.
#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Maximum number of retries.
    pub max_retries: u32,
    /// Initial delay in milliseconds.
    pub initial_delay_ms: u64,
    /// Maximum delay in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 500,
            max_delay_ms: 5000,
        }
    }
}

impl RetryConfig {
    /// No retries at all.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    fn delay(&self, attempt: u32) -> Duration {
        let delay = self
            .initial_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt))
            .min(self.max_delay_ms);
        Duration::from_millis(delay)
    }
}

// ============================================================================
// ChainApi Trait
// ============================================================================

/// The node operations the transaction pipeline depends on.
///
/// [`RpcClient`] implements this over HTTP. Tests and alternative transports can
/// provide their own implementation.
pub trait ChainApi: Send + Sync {
    /// Chain id, head block and last irreversible block.
    fn get_info(&self) -> BoxFuture<'_, Result<ChainInfo, RpcError>>;

    /// The contract ABI deployed on `account`, or `None` when there is no contract.
    fn get_abi(&self, account: Name) -> BoxFuture<'_, Result<Option<AbiDefinition>, RpcError>>;

    /// The minimal subset of `available_keys` that satisfies the transaction's authorizations.
    fn get_required_keys<'a>(
        &'a self,
        transaction: &'a Transaction,
        available_keys: &'a [PublicKey],
    ) -> BoxFuture<'a, Result<Vec<PublicKey>, RpcError>>;

    /// Submit a signed envelope.
    fn push_transaction<'a>(
        &'a self,
        transaction: &'a PackedTransaction,
    ) -> BoxFuture<'a, Result<PushTransactionResponse, RpcError>>;
}

impl<T: ChainApi + ?Sized> ChainApi for Arc<T> {
    fn get_info(&self) -> BoxFuture<'_, Result<ChainInfo, RpcError>> {
        (**self).get_info()
    }

    fn get_abi(&self, account: Name) -> BoxFuture<'_, Result<Option<AbiDefinition>, RpcError>> {
        (**self).get_abi(account)
    }

    fn get_required_keys<'a>(
        &'a self,
        transaction: &'a Transaction,
        available_keys: &'a [PublicKey],
    ) -> BoxFuture<'a, Result<Vec<PublicKey>, RpcError>> {
        (**self).get_required_keys(transaction, available_keys)
    }

    fn push_transaction<'a>(
        &'a self,
        transaction: &'a PackedTransaction,
    ) -> BoxFuture<'a, Result<PushTransactionResponse, RpcError>> {
        (**self).push_transaction(transaction)
    }
}

// ============================================================================
// Node error payloads
// ============================================================================

/// Error body returned by the node alongside a non-2xx status.
#[derive(Debug, Deserialize)]
struct NodeErrorResponse {
    #[allow(dead_code)]
    code: u16,
    message: String,
    error: NodeError,
}

#[derive(Debug, Deserialize)]
struct NodeError {
    code: i64,
    name: String,
    #[serde(default)]
    what: String,
    #[serde(default)]
    details: Vec<NodeErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct NodeErrorDetail {
    message: String,
}

/// Map a non-2xx response to an error.
pub(crate) fn parse_error_response(status: u16, body: &str) -> RpcError {
    match serde_json::from_str::<NodeErrorResponse>(body) {
        Ok(resp) => {
            let message = if resp.error.what.is_empty() {
                resp.message
            } else {
                resp.error.what
            };
            RpcError::node_rejected(
                resp.error.code,
                resp.error.name,
                message,
                resp.error.details.into_iter().map(|d| d.message).collect(),
            )
        }
        Err(_) => RpcError::network(
            format!("HTTP {}: {}", status, body),
            Some(status),
            is_retryable_status(status),
        ),
    }
}

fn is_retryable_status(status: u16) -> bool {
    // 408 Request Timeout, 429 Too Many Requests, 5xx server errors
    status == 408 || status == 429 || (500..600).contains(&status)
}

// ============================================================================
// RpcClient
// ============================================================================

/// HTTP client for a node's `/v1/chain/*` API.
#[derive(Clone)]
pub struct RpcClient {
    url: String,
    client: reqwest::Client,
    retry_config: RetryConfig,
}

impl RpcClient {
    /// Create a new RPC client with the given base URL (e.g. `http://127.0.0.1:8888`).
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_retry_config(url, RetryConfig::default())
    }

    /// Create a new RPC client with custom retry configuration.
    pub fn with_retry_config(url: impl Into<String>, retry_config: RetryConfig) -> Self {
        let url = url.into();
        Self {
            url: url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            retry_config,
        }
    }

    /// Get the base URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// POST `params` to `path`, retrying transport failures per [`RetryConfig`].
    ///
    /// Only use this for idempotent requests.
    pub async fn call<P: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        path: &str,
        params: &P,
    ) -> Result<R, RpcError> {
        let total_attempts = self.retry_config.max_retries + 1;

        for attempt in 0..total_attempts {
            match self.call_once(path, params).await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < total_attempts - 1 => {
                    let delay = self.retry_config.delay(attempt);
                    warn!(
                        path,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying RPC request"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }

        Err(RpcError::Timeout(total_attempts))
    }

    /// Single attempt, no retries.
    pub async fn call_once<P: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        path: &str,
        params: &P,
    ) -> Result<R, RpcError> {
        debug!(path, "RPC request");
        let response = self
            .client
            .post(format!("{}{}", self.url, path))
            .json(params)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(parse_error_response(status.as_u16(), &body));
        }

        serde_json::from_str(&body).map_err(RpcError::Json)
    }

    // ========================================================================
    // Chain API
    // ========================================================================

    /// `get_info`.
    pub async fn get_info(&self) -> Result<ChainInfo, RpcError> {
        self.call("/v1/chain/get_info", &serde_json::json!({})).await
    }

    /// `get_abi`. Returns `None` when the account has no contract.
    pub async fn get_abi(&self, account: Name) -> Result<Option<AbiDefinition>, RpcError> {
        let resp: GetAbiResponse = self
            .call(
                "/v1/chain/get_abi",
                &serde_json::json!({ "account_name": account }),
            )
            .await?;
        // some nodes return an empty definition instead of omitting it
        Ok(resp
            .abi
            .filter(|abi| !(abi.version.is_empty() && abi.structs.is_empty())))
    }

    /// `get_required_keys`.
    pub async fn get_required_keys(
        &self,
        transaction: &Transaction,
        available_keys: &[PublicKey],
    ) -> Result<Vec<PublicKey>, RpcError> {
        let resp: RequiredKeysResponse = self
            .call(
                "/v1/chain/get_required_keys",
                &serde_json::json!({
                    "transaction": transaction,
                    "available_keys": available_keys,
                }),
            )
            .await?;
        Ok(resp.required_keys)
    }

    /// `push_transaction`. Issued exactly once.
    pub async fn push_transaction(
        &self,
        transaction: &PackedTransaction,
    ) -> Result<PushTransactionResponse, RpcError> {
        self.call_once("/v1/chain/push_transaction", transaction)
            .await
    }

    /// `get_block` by number or id.
    pub async fn get_block(&self, block: impl Into<BlockId>) -> Result<BlockInfo, RpcError> {
        let block = block.into();
        self.call(
            "/v1/chain/get_block",
            &serde_json::json!({ "block_num_or_id": block.to_string() }),
        )
        .await
    }

    /// `get_account`.
    pub async fn get_account(&self, account: Name) -> Result<AccountInfo, RpcError> {
        self.call(
            "/v1/chain/get_account",
            &serde_json::json!({ "account_name": account }),
        )
        .await
    }

    /// `get_table_rows`, deserializing rows into `T`.
    ///
    /// With `request.json == false` rows are hex strings; see
    /// [`Client::table_rows_binary`](crate::Client::table_rows_binary).
    pub async fn get_table_rows<T: DeserializeOwned>(
        &self,
        request: &TableRowsRequest,
    ) -> Result<TableRows<T>, RpcError> {
        self.call("/v1/chain/get_table_rows", request).await
    }
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("url", &self.url)
            .field("retry_config", &self.retry_config)
            .finish()
    }
}

impl ChainApi for RpcClient {
    fn get_info(&self) -> BoxFuture<'_, Result<ChainInfo, RpcError>> {
        Box::pin(RpcClient::get_info(self))
    }

    fn get_abi(&self, account: Name) -> BoxFuture<'_, Result<Option<AbiDefinition>, RpcError>> {
        Box::pin(RpcClient::get_abi(self, account))
    }

    fn get_required_keys<'a>(
        &'a self,
        transaction: &'a Transaction,
        available_keys: &'a [PublicKey],
    ) -> BoxFuture<'a, Result<Vec<PublicKey>, RpcError>> {
        Box::pin(RpcClient::get_required_keys(self, transaction, available_keys))
    }

    fn push_transaction<'a>(
        &'a self,
        transaction: &'a PackedTransaction,
    ) -> BoxFuture<'a, Result<PushTransactionResponse, RpcError>> {
        Box::pin(RpcClient::push_transaction(self, transaction))
    }
}
