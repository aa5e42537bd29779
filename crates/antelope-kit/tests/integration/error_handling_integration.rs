//! Failure paths: local validation, node rejections and transport errors.

use std::sync::Arc;

use antelope_kit::*;
use serde_json::json;

use crate::common::*;

fn client(node: Arc<MockNode>) -> Client {
    Client::builder("http://127.0.0.1:8888")
        .chain_api(node)
        .provider(InMemoryProvider::new([DEV_WIF]).unwrap())
        .build()
        .unwrap()
}

async fn send_transfer(client: &Client) -> Result<TransactResult, Error> {
    client
        .transact(
            vec![transfer("alice", "bob", "1.0000 TOK")],
            TransactOptions::default(),
        )
        .await
}

// =============================================================================
// Local validation
// =============================================================================

#[tokio::test]
async fn test_undeclared_action_never_reaches_signing() {
    let node = Arc::new(MockNode::new());
    let action = Action::new(
        name("eosio.token"),
        name("issue"),
        ActionData::from_json(json!({"to": "alice"})).unwrap(),
    )
    .authorize("alice@active".parse().unwrap());

    let result = client(node.clone())
        .transact(vec![action], TransactOptions::default())
        .await;

    assert!(matches!(
        result,
        Err(Error::InvalidAction { account, name: action })
            if account == name("eosio.token") && action == name("issue")
    ));
    assert!(
        !node
            .calls()
            .iter()
            .any(|c| matches!(c, Call::GetRequiredKeys(_) | Call::Push))
    );
}

#[tokio::test]
async fn test_contract_without_abi() {
    let node = Arc::new(MockNode::new());
    let action = Action::new(
        name("nocontract"),
        name("hello"),
        ActionData::from_json(json!({})).unwrap(),
    );

    let result = client(node.clone())
        .transact(vec![action], TransactOptions::default())
        .await;
    assert!(matches!(result, Err(Error::AbiUnavailable(account)) if account == name("nocontract")));
    assert_eq!(node.push_count(), 0);
}

#[tokio::test]
async fn test_bad_payload_is_serialization_error() {
    let node = Arc::new(MockNode::new());
    let mut action = transfer("alice", "bob", "1.0000 TOK");
    if let ActionData::Fields(fields) = &mut action.data {
        fields.insert("extra".to_string(), json!(1));
    }

    let result = client(node.clone())
        .transact(vec![action], TransactOptions::default())
        .await;
    assert!(matches!(
        result,
        Err(Error::Serialization(SerializationError::UnknownField { ref field, .. })) if field == "extra"
    ));
    assert_eq!(node.push_count(), 0);
}

#[tokio::test]
async fn test_empty_transaction() {
    let node = Arc::new(MockNode::new());
    let result = client(node.clone()).transaction().send().await;
    assert!(matches!(result, Err(Error::InvalidTransaction(_))));
    assert!(node.calls().is_empty());
}

// =============================================================================
// Node rejections
// =============================================================================

#[tokio::test]
async fn test_expired_rejection() {
    let node = Arc::new(MockNode::new());
    node.fail_push(RpcError::node_rejected(
        3040005,
        "expired_tx_exception",
        "Expired Transaction",
        vec!["expired transaction 6d1f..., expiration 2024-01-01T00:00:30".to_string()],
    ));

    let err = send_transfer(&client(node.clone())).await.unwrap_err();
    assert!(err.is_node_rejected());
    assert!(!err.is_transport_failure());
    match err {
        Error::Rpc(rpc) => {
            assert_eq!(rpc.rejection_kind(), Some(RejectionKind::Expired));
            assert!(rpc.needs_fresh_header());
            if let RpcError::NodeRejected { code, details, .. } = rpc {
                assert_eq!(code, 3040005);
                assert_eq!(details.len(), 1);
            }
        }
        other => panic!("unexpected error {:?}", other),
    }
    // never retried
    assert_eq!(node.push_count(), 1);
}

#[tokio::test]
async fn test_contract_assertion_rejection() {
    let node = Arc::new(MockNode::new());
    node.fail_push(RpcError::node_rejected(
        3050003,
        "eosio_assert_message_exception",
        "eosio_assert_message assertion failure",
        vec!["assertion failure with message: overdrawn balance".to_string()],
    ));

    let err = send_transfer(&client(node)).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Rpc(RpcError::NodeRejected { kind: RejectionKind::ContractAssertion, .. })
    ));
    assert!(err.to_string().contains("eosio_assert_message_exception"));
}

#[tokio::test]
async fn test_unsatisfied_authorization_from_required_keys() {
    // carol has no keys on this node
    let node = Arc::new(MockNode::new());
    let result = client(node.clone())
        .transact(
            vec![transfer("carol", "bob", "1.0000 TOK")],
            TransactOptions::default(),
        )
        .await;

    assert!(matches!(
        result,
        Err(Error::Rpc(RpcError::NodeRejected { kind: RejectionKind::Unauthorized, .. }))
    ));
    assert_eq!(node.push_count(), 0);
}

// =============================================================================
// Transport
// =============================================================================

#[tokio::test]
async fn test_unreachable_node_is_transport_failure() {
    let client = Client::builder("http://127.0.0.1:1")
        .provider(InMemoryProvider::new([DEV_WIF]).unwrap())
        .retry_config(RetryConfig::none())
        .build()
        .unwrap();

    let err = send_transfer(&client).await.unwrap_err();
    assert!(err.is_transport_failure(), "unexpected error {:?}", err);
    assert!(!err.is_node_rejected());
}

#[tokio::test]
async fn test_chain_id_mismatch_is_config_error() {
    let node = Arc::new(MockNode::new());
    let client = Client::builder("http://127.0.0.1:8888")
        .chain_api(node.clone())
        .chain_id(Checksum256::hash(b"some other chain"))
        .provider(InMemoryProvider::new([DEV_WIF]).unwrap())
        .build()
        .unwrap();

    assert!(matches!(send_transfer(&client).await, Err(Error::Config(_))));
    assert_eq!(node.push_count(), 0);
}
