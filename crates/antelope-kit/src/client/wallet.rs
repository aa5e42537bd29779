//! Remote key daemon provider.

use std::collections::BTreeMap;

use futures::future::BoxFuture;
use serde::{Serialize, de::DeserializeOwned};
use tracing::debug;

use super::rpc::parse_error_response;
use super::signer::SignatureProvider;
use crate::error::{RpcError, SignerError};
use crate::types::{ChainId, Checksum256, PublicKey, Signature};

/// Signs through a keosd-compatible wallet daemon.
///
/// Keys never leave the daemon; its wallets must be unlocked before signing.
///
/// # Example
///
/// ```rust,no_run
/// use antelope_kit::{Client, WalletProvider};
///
/// # fn example() -> Result<(), antelope_kit::Error> {
/// let client = Client::builder("http://127.0.0.1:8888")
///     .provider(WalletProvider::new("http://127.0.0.1:8900"))
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct WalletProvider {
    url: String,
    client: reqwest::Client,
}

impl WalletProvider {
    /// Connect to a daemon at `url` (e.g. `http://127.0.0.1:8900`).
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(url, reqwest::Client::new())
    }

    /// Connect using a preconfigured HTTP client.
    pub fn with_client(url: impl Into<String>, client: reqwest::Client) -> Self {
        let url = url.into();
        Self {
            url: url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the base URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn post<P: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        path: &str,
        params: Option<&P>,
    ) -> Result<R, SignerError> {
        debug!(path, "Wallet request");
        let mut request = self.client.post(format!("{}{}", self.url, path));
        if let Some(params) = params {
            request = request.json(params);
        }
        let response = request.send().await.map_err(remote)?;

        let status = response.status();
        let body = response.text().await.map_err(remote)?;
        if !status.is_success() {
            return Err(remote(parse_error_response(status.as_u16(), &body)));
        }
        serde_json::from_str(&body).map_err(remote)
    }

    /// Unlock a named wallet.
    pub async fn unlock(&self, wallet: &str, password: &str) -> Result<(), SignerError> {
        let _: serde_json::Value = self
            .post("/v1/wallet/unlock", Some(&[wallet, password]))
            .await?;
        Ok(())
    }

    /// Public keys of all unlocked wallets.
    pub async fn public_keys(&self) -> Result<Vec<PublicKey>, SignerError> {
        self.post::<(), _>("/v1/wallet/get_public_keys", None).await
    }

    /// Sign one digest with one key held by the daemon.
    pub async fn sign_digest(
        &self,
        digest: &Checksum256,
        key: &PublicKey,
    ) -> Result<Signature, SignerError> {
        self.post(
            "/v1/wallet/sign_digest",
            Some(&(digest.to_string(), key.to_string())),
        )
        .await
    }

    async fn sign_all(
        &self,
        required_keys: &[PublicKey],
        digest: &Checksum256,
    ) -> Result<BTreeMap<PublicKey, Signature>, SignerError> {
        let held = self.public_keys().await?;
        let mut signatures = BTreeMap::new();
        for key in required_keys.iter().filter(|k| held.contains(k)) {
            let signature = self.sign_digest(digest, key).await?;
            if !signature.verify(digest, key) {
                return Err(SignerError::Remote(format!(
                    "wallet returned a signature that does not match {}",
                    key
                )));
            }
            signatures.insert(key.clone(), signature);
        }
        Ok(signatures)
    }
}

fn remote(err: impl Into<RpcError>) -> SignerError {
    SignerError::Remote(err.into().to_string())
}

impl std::fmt::Debug for WalletProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletProvider")
            .field("url", &self.url)
            .finish()
    }
}

impl SignatureProvider for WalletProvider {
    fn available_keys(&self) -> BoxFuture<'_, Result<Vec<PublicKey>, SignerError>> {
        Box::pin(self.public_keys())
    }

    fn sign<'a>(
        &'a self,
        _chain_id: &'a ChainId,
        required_keys: &'a [PublicKey],
        digest: &'a Checksum256,
    ) -> BoxFuture<'a, Result<BTreeMap<PublicKey, Signature>, SignerError>> {
        Box::pin(self.sign_all(required_keys, digest))
    }
}
