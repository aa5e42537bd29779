//! Test doubles: an in-process HTTP responder and an in-memory chain.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use super::ChainApi;
use crate::abi::AbiDefinition;
use crate::error::RpcError;
use crate::types::{
    ChainInfo, Name, PackedTransaction, PublicKey, PushTransactionResponse, Transaction,
};

/// Requests seen by the server, as `(path, body)`.
pub(crate) type RequestLog = Arc<Mutex<Vec<(String, String)>>>;

/// Serve canned `(path, status, body)` responses until the runtime shuts down.
///
/// Unknown paths get a 404. Returns the base URL and the request log.
pub(crate) async fn serve(routes: Vec<(&'static str, u16, String)>) -> (String, RequestLog) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let log = RequestLog::default();
    let routes = Arc::new(routes);

    let server_log = log.clone();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let routes = routes.clone();
            let log = server_log.clone();
            tokio::spawn(async move {
                let Some((path, body)) = read_request(&mut socket).await else {
                    return;
                };
                log.lock().unwrap().push((path.clone(), body));

                let (status, response) = routes
                    .iter()
                    .find(|(p, _, _)| *p == path)
                    .map(|(_, status, body)| (*status, body.clone()))
                    .unwrap_or((404, "not found".to_string()));
                let reply = format!(
                    "HTTP/1.1 {} Canned\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    response.len(),
                    response
                );
                let _ = socket.write_all(reply.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (url, log)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> Option<(String, String)> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);

        let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(&buf[..end]).to_string();
        let len = head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if buf.len() >= end + 4 + len {
            let path = head.split_whitespace().nth(1)?.to_string();
            let body = String::from_utf8_lossy(&buf[end + 4..end + 4 + len]).to_string();
            return Some((path, body));
        }
    }
}

// ============================================================================
// In-memory chain
// ============================================================================

pub(crate) const DEV_WIF: &str = "5KQwrPbwdL6PhXujxW37FSSQZ1JiwsST4cqQzDeyXtP79zkvFD3";

/// Head block 0x00012345 whose id carries `0xdeadbeef` (little-endian) at bytes 8..12.
pub(crate) fn sample_info() -> ChainInfo {
    let mut head_id = [0u8; 32];
    head_id[..4].copy_from_slice(&0x00012345u32.to_be_bytes());
    head_id[8..12].copy_from_slice(&0xdeadbeefu32.to_le_bytes());
    let mut lib_id = [0u8; 32];
    lib_id[..4].copy_from_slice(&0x00012300u32.to_be_bytes());
    lib_id[8..12].copy_from_slice(&0x01020304u32.to_le_bytes());

    serde_json::from_value(json!({
        "server_version": "d1bc8d3",
        "chain_id": "aca376f206b8fc25a6ed44dbdc66547c36c6c33e3a119ffbeaef943642f0e906",
        "head_block_num": 0x00012345,
        "head_block_id": hex::encode(head_id),
        "head_block_time": "2024-01-01T00:00:00.500",
        "head_block_producer": "eosio",
        "last_irreversible_block_num": 0x00012300,
        "last_irreversible_block_id": hex::encode(lib_id),
    }))
    .unwrap()
}

/// The `eosio.token` ABI, reduced to `transfer`.
pub(crate) fn token_abi() -> AbiDefinition {
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

/// A node that answers from memory and records what it was asked.
///
/// `get_required_keys` returns the `authority` keys, or rejects with
/// `unsatisfied_authorization` when one of them is not available.
pub(crate) struct MockChain {
    pub info: ChainInfo,
    pub abis: HashMap<Name, AbiDefinition>,
    pub authority: Vec<PublicKey>,
    pub reject_push: Option<(i64, &'static str, &'static str)>,
    pub abi_fetches: AtomicUsize,
    pub required_keys_calls: AtomicUsize,
    pub pushed: Mutex<Vec<PackedTransaction>>,
}

impl MockChain {
    pub fn new(authority: Vec<PublicKey>) -> Self {
        Self {
            info: sample_info(),
            abis: HashMap::from([("eosio.token".parse().unwrap(), token_abi())]),
            authority,
            reject_push: None,
            abi_fetches: AtomicUsize::new(0),
            required_keys_calls: AtomicUsize::new(0),
            pushed: Mutex::new(Vec::new()),
        }
    }

    pub fn push_count(&self) -> usize {
        self.pushed.lock().unwrap().len()
    }
}

impl ChainApi for MockChain {
    fn get_info(&self) -> BoxFuture<'_, Result<ChainInfo, RpcError>> {
        Box::pin(async move { Ok(self.info.clone()) })
    }

    fn get_abi(&self, account: Name) -> BoxFuture<'_, Result<Option<AbiDefinition>, RpcError>> {
        Box::pin(async move {
            self.abi_fetches.fetch_add(1, Ordering::SeqCst);
            Ok(self.abis.get(&account).cloned())
        })
    }

    fn get_required_keys<'a>(
        &'a self,
        _transaction: &'a Transaction,
        available_keys: &'a [PublicKey],
    ) -> BoxFuture<'a, Result<Vec<PublicKey>, RpcError>> {
        Box::pin(async move {
            self.required_keys_calls.fetch_add(1, Ordering::SeqCst);
            if self.authority.iter().all(|k| available_keys.contains(k)) {
                Ok(self.authority.clone())
            } else {
                Err(RpcError::node_rejected(
                    3090003,
                    "unsatisfied_authorization",
                    "Provided keys, permissions, and delays do not satisfy declared authorizations",
                    vec![],
                ))
            }
        })
    }

    fn push_transaction<'a>(
        &'a self,
        transaction: &'a PackedTransaction,
    ) -> BoxFuture<'a, Result<PushTransactionResponse, RpcError>> {
        Box::pin(async move {
            self.pushed.lock().unwrap().push(transaction.clone());
            if let Some((code, name, message)) = self.reject_push {
                return Err(RpcError::node_rejected(code, name, message, vec![]));
            }
            Ok(PushTransactionResponse {
                transaction_id: transaction.id(),
                processed: json!({"receipt": {"status": "executed"}}),
            })
        })
    }
}
