//! Sign now, submit later: the envelope survives a JSON round trip.

use std::sync::Arc;

use antelope_kit::*;
use antelope_kit::client::transaction_header;

use crate::common::*;

#[tokio::test]
async fn test_sign_then_push_later() {
    let node = Arc::new(MockNode::new());
    let signer = Client::builder("http://127.0.0.1:8888")
        .chain_api(node.clone())
        .provider(InMemoryProvider::new([DEV_WIF]).unwrap())
        .build()
        .unwrap();

    let signed = signer
        .transaction()
        .add_action(transfer("alice", "bob", "2.5000 TOK"))
        .sign()
        .await
        .unwrap();
    assert_eq!(node.push_count(), 0);

    let json = serde_json::to_string(&signed.to_packed().unwrap()).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["compression"], "none");
    assert!(value["signatures"][0].as_str().unwrap().starts_with("SIG_K1_"));

    // a client with no signing capability can still submit
    let submitter = Client::builder("http://127.0.0.1:8888")
        .chain_api(node.clone())
        .build()
        .unwrap();
    assert!(!submitter.can_sign());

    let envelope: PackedTransaction = serde_json::from_str(&json).unwrap();
    let result = submitter.push_transaction(&envelope).await.unwrap();

    assert_eq!(result.transaction_id, signed.id().unwrap());
    let pushed = node.pushed.lock().unwrap()[0].clone();
    assert_eq!(pushed, envelope);
    assert_eq!(pushed.unpack().unwrap(), signed);
}

#[tokio::test]
async fn test_sign_and_push_separately() {
    let node = Arc::new(MockNode::new());
    let client = Client::builder("http://127.0.0.1:8888")
        .chain_api(node.clone())
        .provider(InMemoryProvider::new([DEV_WIF]).unwrap())
        .build()
        .unwrap();

    let signed = client
        .transaction()
        .add_action(transfer("alice", "bob", "1.0000 TOK"))
        .sign()
        .await
        .unwrap();
    let id = signed.id().unwrap();

    let pushed = client
        .push_transaction(&signed.to_packed().unwrap())
        .await
        .unwrap();
    assert_eq!(pushed.transaction_id, id);
    assert_eq!(node.push_count(), 1);
}

#[test]
fn test_offline_digest_matches_manual_computation() {
    use sha2::{Digest, Sha256};

    let info = chain_info();
    let header = transaction_header(&info, &TransactOptions::default());
    let tx = Transaction {
        header,
        context_free_actions: vec![],
        actions: vec![],
        transaction_extensions: vec![],
    };

    let packed = tx.pack().unwrap();
    let mut buf = info.chain_id.as_bytes().to_vec();
    buf.extend_from_slice(&packed);
    buf.extend_from_slice(&[0u8; 32]);
    let expected = Sha256::digest(&buf);

    let digest = tx.signing_digest(&info.chain_id, &[]).unwrap();
    assert_eq!(digest.as_bytes(), expected.as_slice());
}
