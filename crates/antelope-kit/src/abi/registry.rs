//! Per-account ABI cache.
//!
//! Each account gets its own async slot, so concurrent resolves of the same account
//! share one `get_abi` call while other accounts proceed independently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::Mutex as AsyncMutex;
use tracing::debug;

use super::Abi;
use crate::client::ChainApi;
use crate::error::Error;
use crate::types::Name;

type Slot = Arc<AsyncMutex<Option<Arc<Abi>>>>;

/// Fetches contract ABIs once and caches them by account.
pub struct AbiRegistry {
    api: Arc<dyn ChainApi>,
    slots: Mutex<HashMap<Name, Slot>>,
}

impl AbiRegistry {
    /// Create an empty registry fetching through `api`.
    pub fn new(api: Arc<dyn ChainApi>) -> Self {
        Self {
            api,
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn slot(&self, account: Name) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.entry(account).or_default().clone()
    }

    /// Get the ABI for `account`, fetching it on first use.
    ///
    /// Fails with [`Error::AbiUnavailable`] when the account has no contract.
    pub async fn resolve(&self, account: Name) -> Result<Arc<Abi>, Error> {
        let slot = self.slot(account);
        let mut entry = slot.lock().await;
        if let Some(abi) = entry.as_ref() {
            return Ok(abi.clone());
        }

        debug!(%account, "Fetching ABI");
        let fetched = match self.api.get_abi(account).await {
            Ok(definition) => definition.ok_or(Error::AbiUnavailable(account)),
            Err(err) => Err(err.into()),
        };
        let definition = match fetched {
            Ok(definition) => definition,
            Err(err) => {
                self.forget(account, &slot);
                return Err(err);
            }
        };
        let abi = Arc::new(Abi::new(definition));
        *entry = Some(abi.clone());
        Ok(abi)
    }

    /// Drop `slot` from the map unless it was already replaced.
    fn forget(&self, account: Name, slot: &Slot) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if slots.get(&account).is_some_and(|current| Arc::ptr_eq(current, slot)) {
            slots.remove(&account);
        }
    }

    /// The cached ABI for `account`, without fetching.
    pub fn cached(&self, account: Name) -> Option<Arc<Abi>> {
        let slot = self
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&account)?
            .clone();
        // a slot that is locked is still being filled
        let entry = slot.try_lock().ok()?;
        entry.clone()
    }

    /// Seed the cache with an ABI obtained out of band.
    pub fn insert(&self, account: Name, abi: Abi) {
        let slot: Slot = Arc::new(AsyncMutex::new(Some(Arc::new(abi))));
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(account, slot);
    }

    /// Drop the cached ABI for `account`; the next resolve refetches it.
    pub fn invalidate(&self, account: Name) {
        debug!(%account, "Invalidating cached ABI");
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&account);
    }

    /// Refetch the ABI for `account`, replacing any cached copy.
    pub async fn refresh(&self, account: Name) -> Result<Arc<Abi>, Error> {
        self.invalidate(account);
        self.resolve(account).await
    }
}

impl std::fmt::Debug for AbiRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let accounts: Vec<Name> = self
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect();
        f.debug_struct("AbiRegistry")
            .field("accounts", &accounts)
            .finish()
    }
}
