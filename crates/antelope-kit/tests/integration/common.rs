//! Shared in-process node for the integration suite.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, Once};

use antelope_kit::*;
use futures::future::BoxFuture;
use serde_json::json;

pub const DEV_WIF: &str = "5KQwrPbwdL6PhXujxW37FSSQZ1JiwsST4cqQzDeyXtP79zkvFD3";
pub const DEV_PUBLIC: &str = "EOS6MRyAjQq8ud7hVNYcfnVPJqcVpscN5So8BhtHuGYqET5GDW5CV";

/// Route pipeline logs to the test harness. Filter with `RUST_LOG=antelope_kit=debug`.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Node calls in the order they happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    GetInfo,
    GetAbi(Name),
    GetRequiredKeys(Vec<PublicKey>),
    Push,
}

/// An in-memory node.
///
/// `get_required_keys` answers with the authority keys of every actor named in
/// the transaction's authorizations, restricted to the available keys, and
/// rejects with `unsatisfied_authorization` if an actor has none available.
pub struct MockNode {
    pub info: ChainInfo,
    pub abis: HashMap<Name, AbiDefinition>,
    pub authorities: HashMap<Name, Vec<PublicKey>>,
    pub push_error: Mutex<Option<RpcError>>,
    pub calls: Mutex<Vec<Call>>,
    pub pushed: Mutex<Vec<PackedTransaction>>,
}

impl MockNode {
    pub fn new() -> Self {
        init_tracing();
        let dev: PublicKey = DEV_PUBLIC.parse().unwrap();
        Self {
            info: chain_info(),
            abis: HashMap::from([(name("eosio.token"), token_abi())]),
            authorities: HashMap::from([(name("alice"), vec![dev])]),
            push_error: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            pushed: Mutex::new(Vec::new()),
        }
    }

    pub fn with_authority(mut self, actor: &str, key: PublicKey) -> Self {
        self.authorities.entry(name(actor)).or_default().push(key);
        self
    }

    pub fn fail_push(&self, error: RpcError) {
        *self.push_error.lock().unwrap() = Some(error);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn push_count(&self) -> usize {
        self.pushed.lock().unwrap().len()
    }

    pub fn abi_fetches(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::GetAbi(_)))
            .count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl ChainApi for MockNode {
    fn get_info(&self) -> BoxFuture<'_, Result<ChainInfo, RpcError>> {
        self.record(Call::GetInfo);
        Box::pin(async move { Ok(self.info.clone()) })
    }

    fn get_abi(&self, account: Name) -> BoxFuture<'_, Result<Option<AbiDefinition>, RpcError>> {
        self.record(Call::GetAbi(account));
        Box::pin(async move { Ok(self.abis.get(&account).cloned()) })
    }

    fn get_required_keys<'a>(
        &'a self,
        transaction: &'a Transaction,
        available_keys: &'a [PublicKey],
    ) -> BoxFuture<'a, Result<Vec<PublicKey>, RpcError>> {
        self.record(Call::GetRequiredKeys(available_keys.to_vec()));
        Box::pin(async move {
            let mut required = Vec::new();
            let actors = transaction
                .actions
                .iter()
                .flat_map(|a| a.authorization.iter().map(|level| level.actor));
            for actor in actors {
                let keys = self.authorities.get(&actor).cloned().unwrap_or_default();
                let key = keys
                    .into_iter()
                    .find(|k| available_keys.contains(k))
                    .ok_or_else(|| {
                        RpcError::node_rejected(
                            3090003,
                            "unsatisfied_authorization",
                            "Provided keys, permissions, and delays do not satisfy declared authorizations",
                            vec![format!("transaction declares authority '{}@active'", actor)],
                        )
                    })?;
                if !required.contains(&key) {
                    required.push(key);
                }
            }
            Ok(required)
        })
    }

    fn push_transaction<'a>(
        &'a self,
        transaction: &'a PackedTransaction,
    ) -> BoxFuture<'a, Result<PushTransactionResponse, RpcError>> {
        self.record(Call::Push);
        Box::pin(async move {
            self.pushed.lock().unwrap().push(transaction.clone());
            if let Some(error) = self.push_error.lock().unwrap().take() {
                return Err(error);
            }
            Ok(PushTransactionResponse {
                transaction_id: transaction.id(),
                processed: json!({"receipt": {"status": "executed"}}),
            })
        })
    }
}

/// A provider that advertises keys it cannot actually sign with.
pub struct WatchOnly(pub Vec<PublicKey>);

impl SignatureProvider for WatchOnly {
    fn available_keys(&self) -> BoxFuture<'_, Result<Vec<PublicKey>, SignerError>> {
        let keys = self.0.clone();
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

pub fn name(s: &str) -> Name {
    s.parse().unwrap()
}

pub fn dev_key() -> SecretKey {
    DEV_WIF.parse().unwrap()
}

/// Head block 0x00012345 at 2024-01-01T00:00:00.
pub fn chain_info() -> ChainInfo {
    serde_json::from_value(json!({
        "server_version": "d1bc8d3",
        "chain_id": "aca376f206b8fc25a6ed44dbdc66547c36c6c33e3a119ffbeaef943642f0e906",
        "head_block_num": 0x00012345,
        "head_block_id": "00012345aabbccdd78563412ffeeddcc0000000000000000000000000000000a",
        "head_block_time": "2024-01-01T00:00:00.000",
        "head_block_producer": "eosio",
        "last_irreversible_block_num": 0x0001ff00,
        "last_irreversible_block_id": "0001ff00000000000403020100000000000000000000000000000000000000ff",
    }))
    .unwrap()
}

pub fn token_abi() -> AbiDefinition {
    serde_json::from_value(json!({
        "version": "eosio::abi/1.2",
        "structs": [{
            "name": "transfer",
            "base": "",
            "fields": [
                {"name": "from", "type": "name"},
                {"name": "to", "type": "name"},
                {"name": "quantity", "type": "asset"},
                {"name": "memo", "type": "string"}
            ]
        }],
        "actions": [{"name": "transfer", "type": "transfer", "ricardian_contract": ""}]
    }))
    .unwrap()
}

pub fn transfer(from: &str, to: &str, quantity: &str) -> Action {
    Action::new(
        name("eosio.token"),
        name("transfer"),
        ActionData::from_json(json!({
            "from": from,
            "to": to,
            "quantity": quantity,
            "memo": "",
        }))
        .unwrap(),
    )
    .authorize(format!("{}@active", from).parse().unwrap())
}
