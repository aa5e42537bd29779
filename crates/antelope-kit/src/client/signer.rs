//! Signature providers.
//!
//! A [`SignatureProvider`] exposes the public keys it can sign for and signs a
//! transaction digest with whichever of the requested keys it holds.
//!
//! # Implementations
//!
//! - [`InMemoryProvider`] - K1 secret keys held in process memory
//! - [`CombinedProvider`] - Ordered set of providers acting as one
//! - [`WalletProvider`](super::WalletProvider) - Remote key daemon (keosd)
//!
//! # Example
//!
//! ```rust,no_run
//! use antelope_kit::{Client, InMemoryProvider};
//!
//! # fn example() -> Result<(), antelope_kit::Error> {
//! let provider = InMemoryProvider::new(["5KQwrPbwdL6PhXujxW37FSSQZ1JiwsST4cqQzDeyXtP79zkvFD3"])?;
//!
//! let client = Client::builder("http://127.0.0.1:8888")
//!     .provider(provider)
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use futures::future::{BoxFuture, try_join_all};
use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, SignerError};
use crate::types::{ChainId, Checksum256, PublicKey, SecretKey, Signature};

/// Environment variable read by [`InMemoryProvider::from_env`].
pub const PRIVATE_KEYS_ENV: &str = "ANTELOPE_PRIVATE_KEYS";

// ============================================================================
// SignatureProvider Trait
// ============================================================================

/// A source of signatures over transaction digests.
///
/// Both methods may be remote, so both are async.
///
/// # Example Implementation
///
/// ```rust,ignore
/// use antelope_kit::{SignatureProvider, SignerError, ChainId, Checksum256, PublicKey, Signature};
/// use futures::future::BoxFuture;
/// use std::collections::BTreeMap;
///
/// struct HsmProvider { /* ... */ }
///
/// impl SignatureProvider for HsmProvider {
///     fn available_keys(&self) -> BoxFuture<'_, Result<Vec<PublicKey>, SignerError>> {
///         Box::pin(async { todo!() })
///     }
///
///     fn sign<'a>(
///         &'a self,
///         chain_id: &'a ChainId,
///         required_keys: &'a [PublicKey],
///         digest: &'a Checksum256,
///     ) -> BoxFuture<'a, Result<BTreeMap<PublicKey, Signature>, SignerError>> {
///         Box::pin(async { todo!() })
///     }
/// }
/// ```
pub trait SignatureProvider: Send + Sync {
    /// Public keys this provider can sign for.
    fn available_keys(&self) -> BoxFuture<'_, Result<Vec<PublicKey>, SignerError>>;

    /// Sign `digest` with each key of `required_keys` this provider holds.
    ///
    /// Keys the provider does not hold are left out of the result; it is the
    /// caller's job to notice they are missing.
    fn sign<'a>(
        &'a self,
        chain_id: &'a ChainId,
        required_keys: &'a [PublicKey],
        digest: &'a Checksum256,
    ) -> BoxFuture<'a, Result<BTreeMap<PublicKey, Signature>, SignerError>>;
}

impl<T: SignatureProvider + ?Sized> SignatureProvider for Arc<T> {
    fn available_keys(&self) -> BoxFuture<'_, Result<Vec<PublicKey>, SignerError>> {
        (**self).available_keys()
    }

    fn sign<'a>(
        &'a self,
        chain_id: &'a ChainId,
        required_keys: &'a [PublicKey],
        digest: &'a Checksum256,
    ) -> BoxFuture<'a, Result<BTreeMap<PublicKey, Signature>, SignerError>> {
        (**self).sign(chain_id, required_keys, digest)
    }
}

// ============================================================================
// InMemoryProvider
// ============================================================================

/// Secret keys stored in memory.
///
/// Suitable for scripts, bots and tests. Signing is local, deterministic and
/// always produces canonical signatures.
///
/// # Example
///
/// ```rust
/// use antelope_kit::InMemoryProvider;
///
/// let provider = InMemoryProvider::new([
///     "5KQwrPbwdL6PhXujxW37FSSQZ1JiwsST4cqQzDeyXtP79zkvFD3",
/// ]).unwrap();
/// assert_eq!(provider.public_keys().len(), 1);
/// ```
#[derive(Clone, Default)]
pub struct InMemoryProvider {
    keys: BTreeMap<PublicKey, SecretKey>,
}

/// Key file format accepted by [`InMemoryProvider::from_file`].
#[derive(Deserialize)]
#[serde(untagged)]
enum KeyFile {
    List(Vec<String>),
    Object { keys: Vec<String> },
}

impl InMemoryProvider {
    /// Create a provider from secret keys in WIF or `PVT_K1_` form.
    ///
    /// # Errors
    ///
    /// Returns an error if any key cannot be parsed.
    pub fn new<I, S>(keys: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keys = keys
            .into_iter()
            .map(|k| k.as_ref().trim().parse::<SecretKey>())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_secret_keys(keys))
    }

    /// Create a provider from parsed secret keys.
    pub fn from_secret_keys(keys: impl IntoIterator<Item = SecretKey>) -> Self {
        let mut provider = Self::default();
        for key in keys {
            provider.add_key(key);
        }
        provider
    }

    /// Load comma-separated keys from `ANTELOPE_PRIVATE_KEYS`.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_env_var(PRIVATE_KEYS_ENV)
    }

    /// Load comma-separated keys from a custom environment variable.
    pub fn from_env_var(var: &str) -> Result<Self, Error> {
        let value = std::env::var(var)
            .map_err(|_| Error::Config(format!("Environment variable {} not set", var)))?;
        let provider = Self::new(value.split(',').filter(|k| !k.trim().is_empty()))?;
        if provider.keys.is_empty() {
            return Err(Error::Config(format!(
                "Environment variable {} holds no keys",
                var
            )));
        }
        Ok(provider)
    }

    /// Load keys from a JSON file.
    ///
    /// The file holds either a list of key strings or an object with a `keys` list.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read key file {}: {}", path.display(), e))
        })?;
        let file: KeyFile = serde_json::from_str(&content).map_err(|e| {
            Error::Config(format!("Failed to parse key file {}: {}", path.display(), e))
        })?;
        let keys = match file {
            KeyFile::List(keys) | KeyFile::Object { keys } => keys,
        };
        Self::new(keys)
    }

    /// Add a key, replacing any existing entry for the same public key.
    pub fn add_key(&mut self, key: SecretKey) {
        self.keys.insert(key.public_key(), key);
    }

    /// Public keys held, in key order.
    pub fn public_keys(&self) -> Vec<PublicKey> {
        self.keys.keys().cloned().collect()
    }

    fn sign_now(
        &self,
        required_keys: &[PublicKey],
        digest: &Checksum256,
    ) -> Result<BTreeMap<PublicKey, Signature>, SignerError> {
        let mut signatures = BTreeMap::new();
        for public_key in required_keys {
            if let Some(secret) = self.keys.get(public_key) {
                signatures.insert(public_key.clone(), secret.sign_digest(digest)?);
            }
        }
        Ok(signatures)
    }
}

impl std::fmt::Debug for InMemoryProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryProvider")
            .field("public_keys", &self.keys.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl SignatureProvider for InMemoryProvider {
    fn available_keys(&self) -> BoxFuture<'_, Result<Vec<PublicKey>, SignerError>> {
        let keys = self.public_keys();
        Box::pin(async move { Ok(keys) })
    }

    fn sign<'a>(
        &'a self,
        _chain_id: &'a ChainId,
        required_keys: &'a [PublicKey],
        digest: &'a Checksum256,
    ) -> BoxFuture<'a, Result<BTreeMap<PublicKey, Signature>, SignerError>> {
        let result = self.sign_now(required_keys, digest);
        Box::pin(async move { result })
    }
}

// ============================================================================
// CombinedProvider
// ============================================================================

/// Several providers behind one interface.
///
/// Order matters: when two providers hold the same key, the earlier one signs.
/// Unlike a single provider, the combination fails with
/// [`SignerError::UnresolvedKeys`] if any required key is left unsigned.
///
/// # Example
///
/// ```rust
/// use antelope_kit::{CombinedProvider, InMemoryProvider, SecretKey};
///
/// let hot = InMemoryProvider::from_secret_keys([SecretKey::generate()]);
/// let cold = InMemoryProvider::from_secret_keys([SecretKey::generate()]);
///
/// let provider = CombinedProvider::new().with(hot).with(cold);
/// assert_eq!(provider.len(), 2);
/// ```
#[derive(Clone, Default)]
pub struct CombinedProvider {
    providers: Vec<Arc<dyn SignatureProvider>>,
}

impl CombinedProvider {
    /// Create an empty combination.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a provider.
    pub fn with(mut self, provider: impl SignatureProvider + 'static) -> Self {
        self.providers.push(Arc::new(provider));
        self
    }

    /// Append a shared provider.
    pub fn with_shared(mut self, provider: Arc<dyn SignatureProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Number of sub-providers.
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// True if there are no sub-providers.
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    async fn key_sets(&self) -> Result<Vec<Vec<PublicKey>>, SignerError> {
        try_join_all(self.providers.iter().map(|p| p.available_keys())).await
    }

    async fn sign_combined(
        &self,
        chain_id: &ChainId,
        required_keys: &[PublicKey],
        digest: &Checksum256,
    ) -> Result<BTreeMap<PublicKey, Signature>, SignerError> {
        let key_sets = self.key_sets().await?;

        let mut assignments = vec![Vec::new(); self.providers.len()];
        for key in required_keys {
            match key_sets.iter().position(|set| set.contains(key)) {
                Some(index) => assignments[index].push(key.clone()),
                None => debug!(%key, "No provider holds required key"),
            }
        }

        let jobs = self
            .providers
            .iter()
            .zip(&assignments)
            .filter(|(_, keys)| !keys.is_empty())
            .map(|(provider, keys)| provider.sign(chain_id, keys, digest));
        let results = try_join_all(jobs).await?;

        let mut signatures = BTreeMap::new();
        for (key, signature) in results.into_iter().flatten() {
            signatures.entry(key).or_insert(signature);
        }

        let missing: Vec<PublicKey> = required_keys
            .iter()
            .filter(|key| !signatures.contains_key(key))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(SignerError::UnresolvedKeys(missing));
        }
        Ok(signatures)
    }
}

impl std::fmt::Debug for CombinedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CombinedProvider")
            .field("providers", &self.providers.len())
            .finish()
    }
}

impl SignatureProvider for CombinedProvider {
    fn available_keys(&self) -> BoxFuture<'_, Result<Vec<PublicKey>, SignerError>> {
        Box::pin(async move {
            let mut union: Vec<PublicKey> = Vec::new();
            for key in self.key_sets().await?.into_iter().flatten() {
                if !union.contains(&key) {
                    union.push(key);
                }
            }
            Ok(union)
        })
    }

    fn sign<'a>(
        &'a self,
        chain_id: &'a ChainId,
        required_keys: &'a [PublicKey],
        digest: &'a Checksum256,
    ) -> BoxFuture<'a, Result<BTreeMap<PublicKey, Signature>, SignerError>> {
        Box::pin(self.sign_combined(chain_id, required_keys, digest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;

    const DEV_WIF: &str = "5KQwrPbwdL6PhXujxW37FSSQZ1JiwsST4cqQzDeyXtP79zkvFD3";
    const DEV_PUBLIC: &str = "EOS6MRyAjQq8ud7hVNYcfnVPJqcVpscN5So8BhtHuGYqET5GDW5CV";

    fn digest() -> Checksum256 {
        Checksum256::hash(b"transaction")
    }

    /// Wraps a provider and records which keys each sign call was asked for.
    struct Recording {
        inner: InMemoryProvider,
        calls: Arc<Mutex<Vec<Vec<PublicKey>>>>,
    }

    impl SignatureProvider for Recording {
        fn available_keys(&self) -> BoxFuture<'_, Result<Vec<PublicKey>, SignerError>> {
            self.inner.available_keys()
        }

        fn sign<'a>(
            &'a self,
            chain_id: &'a ChainId,
            required_keys: &'a [PublicKey],
            digest: &'a Checksum256,
        ) -> BoxFuture<'a, Result<BTreeMap<PublicKey, Signature>, SignerError>> {
            self.calls.lock().unwrap().push(required_keys.to_vec());
            self.inner.sign(chain_id, required_keys, digest)
        }
    }

    /// Claims a key but never signs with it.
    struct AdvertiseOnly(PublicKey);

    impl SignatureProvider for AdvertiseOnly {
        fn available_keys(&self) -> BoxFuture<'_, Result<Vec<PublicKey>, SignerError>> {
            let keys = vec![self.0.clone()];
            Box::pin(async move { Ok(keys) })
        }

        fn sign<'a>(
            &'a self,
            _chain_id: &'a ChainId,
            _required_keys: &'a [PublicKey],
            _digest: &'a Checksum256,
        ) -> BoxFuture<'a, Result<BTreeMap<PublicKey, Signature>, SignerError>> {
            Box::pin(async { Ok(BTreeMap::new()) })
        }
    }

    struct Failing;

    impl SignatureProvider for Failing {
        fn available_keys(&self) -> BoxFuture<'_, Result<Vec<PublicKey>, SignerError>> {
            Box::pin(async { Ok(vec![DEV_PUBLIC.parse().unwrap()]) })
        }

        fn sign<'a>(
            &'a self,
            _chain_id: &'a ChainId,
            _required_keys: &'a [PublicKey],
            _digest: &'a Checksum256,
        ) -> BoxFuture<'a, Result<BTreeMap<PublicKey, Signature>, SignerError>> {
            Box::pin(async { Err(SignerError::Remote("device unplugged".to_string())) })
        }
    }

    #[tokio::test]
    async fn test_in_memory_signs_held_keys_only() {
        let provider = InMemoryProvider::new([DEV_WIF]).unwrap();
        let held: PublicKey = DEV_PUBLIC.parse().unwrap();
        let other = SecretKey::generate().public_key();

        let signatures = provider
            .sign(&ChainId::ZERO, &[held.clone(), other.clone()], &digest())
            .await
            .unwrap();

        assert_eq!(signatures.len(), 1);
        assert!(signatures[&held].verify(&digest(), &held));
        assert!(!signatures.contains_key(&other));
    }

    #[test]
    fn test_in_memory_signing_is_deterministic() {
        let provider = InMemoryProvider::new([DEV_WIF]).unwrap();
        let key: PublicKey = DEV_PUBLIC.parse().unwrap();
        let required = [key.clone()];

        let first = tokio_test::block_on(provider.sign(&ChainId::ZERO, &required, &digest())).unwrap();
        let second = tokio_test::block_on(provider.sign(&ChainId::ZERO, &required, &digest())).unwrap();
        assert_eq!(first, second);
        assert!(first[&key].is_canonical());
    }

    #[tokio::test]
    async fn test_in_memory_available_keys() {
        let provider = InMemoryProvider::new([DEV_WIF]).unwrap();
        let keys = provider.available_keys().await.unwrap();
        assert_eq!(keys, vec![DEV_PUBLIC.parse::<PublicKey>().unwrap()]);
    }

    #[test]
    fn test_in_memory_rejects_bad_key() {
        assert!(matches!(
            InMemoryProvider::new(["not-a-key"]),
            Err(Error::ParseKey(_))
        ));
    }

    #[test]
    fn test_env_var_missing() {
        let result = InMemoryProvider::from_env_var("ANTELOPE_KIT_TEST_NONEXISTENT_KEYS");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_from_file_list_and_object() {
        let mut list = tempfile::NamedTempFile::new().unwrap();
        write!(list, "[\"{}\"]", DEV_WIF).unwrap();
        let provider = InMemoryProvider::from_file(list.path()).unwrap();
        assert_eq!(provider.public_keys().len(), 1);

        let second = SecretKey::generate();
        let mut object = tempfile::NamedTempFile::new().unwrap();
        write!(object, "{{\"keys\": [\"{}\", \"{}\"]}}", DEV_WIF, second).unwrap();
        let provider = InMemoryProvider::from_file(object.path()).unwrap();
        assert_eq!(provider.public_keys().len(), 2);
    }

    #[test]
    fn test_from_file_errors() {
        assert!(matches!(
            InMemoryProvider::from_file("/nonexistent/keys.json"),
            Err(Error::Config(_))
        ));

        let mut garbage = tempfile::NamedTempFile::new().unwrap();
        write!(garbage, "not json").unwrap();
        assert!(matches!(
            InMemoryProvider::from_file(garbage.path()),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_in_memory_debug_hides_secret() {
        let provider = InMemoryProvider::new([DEV_WIF]).unwrap();
        let debug_str = format!("{:?}", provider);
        assert!(debug_str.contains("PUB_K1_"));
        assert!(!debug_str.contains(DEV_WIF));
        assert!(!debug_str.contains("PVT_K1_"));
    }

    #[tokio::test]
    async fn test_combined_available_keys_deduplicated_in_order() {
        let a = SecretKey::generate();
        let b = SecretKey::generate();
        let dev: SecretKey = DEV_WIF.parse().unwrap();

        let provider = CombinedProvider::new()
            .with(InMemoryProvider::from_secret_keys([dev.clone()]))
            .with(InMemoryProvider::from_secret_keys([a.clone(), dev.clone()]))
            .with(InMemoryProvider::from_secret_keys([b.clone()]));

        let keys = provider.available_keys().await.unwrap();
        assert_eq!(keys.len(), 3);
        assert_eq!(keys[0], dev.public_key());
        assert_eq!(keys[2], b.public_key());
        assert!(keys.contains(&a.public_key()));
    }

    #[tokio::test]
    async fn test_combined_first_claim_wins() {
        let dev: SecretKey = DEV_WIF.parse().unwrap();
        let first_calls = Arc::new(Mutex::new(Vec::new()));
        let second_calls = Arc::new(Mutex::new(Vec::new()));

        let provider = CombinedProvider::new()
            .with(Recording {
                inner: InMemoryProvider::from_secret_keys([dev.clone()]),
                calls: first_calls.clone(),
            })
            .with(Recording {
                inner: InMemoryProvider::from_secret_keys([dev.clone()]),
                calls: second_calls.clone(),
            });

        let signatures = provider
            .sign(&ChainId::ZERO, &[dev.public_key()], &digest())
            .await
            .unwrap();

        assert_eq!(signatures.len(), 1);
        assert_eq!(first_calls.lock().unwrap().as_slice(), [vec![dev.public_key()]]);
        assert!(second_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_combined_merges_disjoint_providers() {
        let a = SecretKey::generate();
        let b = SecretKey::generate();
        let provider = CombinedProvider::new()
            .with(InMemoryProvider::from_secret_keys([a.clone()]))
            .with(InMemoryProvider::from_secret_keys([b.clone()]));

        let required = [a.public_key(), b.public_key()];
        let signatures = provider
            .sign(&ChainId::ZERO, &required, &digest())
            .await
            .unwrap();

        assert_eq!(signatures.len(), 2);
        for key in &required {
            assert!(signatures[key].verify(&digest(), key));
        }
    }

    #[tokio::test]
    async fn test_combined_fails_on_unclaimed_key() {
        let a = SecretKey::generate();
        let stranger = SecretKey::generate().public_key();
        let provider =
            CombinedProvider::new().with(InMemoryProvider::from_secret_keys([a.clone()]));

        let result = provider
            .sign(&ChainId::ZERO, &[a.public_key(), stranger.clone()], &digest())
            .await;

        assert_eq!(result, Err(SignerError::UnresolvedKeys(vec![stranger])));
    }

    #[tokio::test]
    async fn test_combined_fails_when_claimant_does_not_sign() {
        let a = SecretKey::generate();
        let b = SecretKey::generate();
        let provider = CombinedProvider::new()
            .with(InMemoryProvider::from_secret_keys([a.clone()]))
            .with(AdvertiseOnly(b.public_key()));

        let result = provider
            .sign(&ChainId::ZERO, &[a.public_key(), b.public_key()], &digest())
            .await;

        assert_eq!(result, Err(SignerError::UnresolvedKeys(vec![b.public_key()])));
    }

    #[tokio::test]
    async fn test_combined_failure_aborts() {
        let a = SecretKey::generate();
        let provider = CombinedProvider::new()
            .with(InMemoryProvider::from_secret_keys([a.clone()]))
            .with(Failing);

        let result = provider
            .sign(
                &ChainId::ZERO,
                &[a.public_key(), DEV_PUBLIC.parse().unwrap()],
                &digest(),
            )
            .await;

        assert_eq!(
            result,
            Err(SignerError::Remote("device unplugged".to_string()))
        );
    }
}
