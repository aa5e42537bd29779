//! End-to-end pipeline: assembly, digest, required keys, signing and submission.

use std::sync::Arc;

use antelope_kit::*;

use crate::common::*;

fn client(node: Arc<MockNode>) -> Client {
    Client::builder("http://127.0.0.1:8888")
        .chain_api(node)
        .provider(InMemoryProvider::new([DEV_WIF]).unwrap())
        .build()
        .unwrap()
}

// =============================================================================
// Transfer scenario
// =============================================================================

#[tokio::test]
async fn test_transfer_end_to_end() {
    let node = Arc::new(MockNode::new());
    let client = client(node.clone());

    let result = client
        .transact(
            vec![transfer("alice", "bob", "1.0000 TOK")],
            TransactOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(node.push_count(), 1);
    let packed = node.pushed.lock().unwrap()[0].clone();
    assert_eq!(result.transaction_id, packed.id());
    assert_eq!(packed.compression, Compression::None);
    assert!(packed.packed_context_free_data.is_empty());

    let signed = packed.unpack().unwrap();
    let tx = &signed.transaction;

    // header
    assert_eq!(tx.header.ref_block_num, 0x2345);
    assert_eq!(tx.header.ref_block_prefix, 0x12345678);
    assert_eq!(tx.header.expiration.to_string(), "2024-01-01T00:00:30");

    // payload: from, to, quantity, memo
    let mut expected = Vec::new();
    expected.extend_from_slice(&0x345c850000000000u64.to_le_bytes());
    expected.extend_from_slice(&0x3d0e000000000000u64.to_le_bytes());
    expected.extend_from_slice(&10_000i64.to_le_bytes());
    expected.extend_from_slice(&[0x04, b'T', b'O', b'K', 0, 0, 0, 0]);
    expected.push(0x00);
    assert_eq!(tx.actions.len(), 1);
    assert_eq!(tx.actions[0].data, expected);
    assert_eq!(tx.actions[0].account.as_u64(), 0x5530ea033482a600);

    // one signature, by the dev key, over the chain-bound digest
    let digest = tx.signing_digest(&node.info.chain_id, &[]).unwrap();
    assert_eq!(signed.signatures.len(), 1);
    assert!(signed.signatures[0].is_canonical());
    assert_eq!(
        signed.signatures[0].recover(&digest),
        Some(DEV_PUBLIC.parse().unwrap())
    );
}

#[tokio::test]
async fn test_stage_order() {
    let node = Arc::new(MockNode::new());
    client(node.clone())
        .transact(
            vec![transfer("alice", "bob", "1.0000 TOK")],
            TransactOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(
        node.calls(),
        vec![
            Call::GetInfo,
            Call::GetAbi(name("eosio.token")),
            Call::GetRequiredKeys(vec![DEV_PUBLIC.parse().unwrap()]),
            Call::Push,
        ]
    );
}

#[tokio::test]
async fn test_abi_fetched_once_across_transactions() {
    let node = Arc::new(MockNode::new());
    let client = client(node.clone());

    for _ in 0..3 {
        client
            .transaction()
            .add_action(transfer("alice", "bob", "0.0001 TOK"))
            .add_action(transfer("alice", "carol", "0.0001 TOK"))
            .send()
            .await
            .unwrap();
    }

    assert_eq!(node.abi_fetches(), 1);
    assert_eq!(node.push_count(), 3);
}

#[tokio::test]
async fn test_refreshed_abi_is_refetched() {
    let node = Arc::new(MockNode::new());
    let client = client(node.clone());

    client.abi(name("eosio.token")).await.unwrap();
    client.abi_registry().invalidate(name("eosio.token"));
    client
        .transact(
            vec![transfer("alice", "bob", "1.0000 TOK")],
            TransactOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(node.abi_fetches(), 2);
}

// =============================================================================
// Header options
// =============================================================================

#[tokio::test]
async fn test_last_irreversible_reference_block() {
    let node = Arc::new(MockNode::new());
    let client = client(node.clone());

    let signed = client
        .transaction()
        .add_action(transfer("alice", "bob", "1.0000 TOK"))
        .tapos(TaposSource::LastIrreversible)
        .expire_seconds(3600)
        .sign()
        .await
        .unwrap();

    let header = &signed.transaction.header;
    assert_eq!(header.ref_block_num, 0xff00);
    assert_eq!(header.ref_block_prefix, 0x01020304);
    // expiration still counts from the head block time
    assert_eq!(header.expiration.to_string(), "2024-01-01T01:00:00");
}

#[tokio::test]
async fn test_resource_limits_and_delay_are_packed() {
    let node = Arc::new(MockNode::new());
    let signed = client(node)
        .transaction()
        .add_action(transfer("alice", "bob", "1.0000 TOK"))
        .max_net_usage_words(1024)
        .max_cpu_usage_ms(5)
        .delay_sec(60)
        .sign()
        .await
        .unwrap();

    let unpacked = Transaction::unpack(&signed.transaction.pack().unwrap()).unwrap();
    assert_eq!(unpacked.header.max_net_usage_words, 1024);
    assert_eq!(unpacked.header.max_cpu_usage_ms, 5);
    assert_eq!(unpacked.header.delay_sec, 60);
}

#[tokio::test]
async fn test_context_free_data_changes_digest() {
    let node = Arc::new(MockNode::new());
    let client = client(node.clone());

    let signed = client
        .transaction()
        .add_action(transfer("alice", "bob", "1.0000 TOK"))
        .context_free_data(b"attachment".to_vec())
        .sign()
        .await
        .unwrap();

    let chain_id = node.info.chain_id;
    let with_cfd = signed
        .transaction
        .signing_digest(&chain_id, &signed.context_free_data)
        .unwrap();
    let without_cfd = signed.transaction.signing_digest(&chain_id, &[]).unwrap();
    assert_ne!(with_cfd, without_cfd);

    let dev: PublicKey = DEV_PUBLIC.parse().unwrap();
    assert!(signed.signatures[0].verify(&with_cfd, &dev));
    assert!(!signed.signatures[0].verify(&without_cfd, &dev));

    let packed = signed.to_packed().unwrap();
    assert!(!packed.packed_context_free_data.is_empty());
    assert_eq!(packed.unpack().unwrap().context_free_data, vec![b"attachment".to_vec()]);
}

// =============================================================================
// Raw payloads
// =============================================================================

#[tokio::test]
async fn test_raw_payload_needs_no_abi() {
    let node = Arc::new(MockNode::new());
    let client = client(node.clone());

    let action = Action::new(name("nocontract"), name("anything"), vec![0xdeu8, 0xad].into())
        .authorize("alice@active".parse().unwrap());
    client
        .transact(vec![action], TransactOptions::default())
        .await
        .unwrap();

    assert_eq!(node.abi_fetches(), 0);
    let pushed = node.pushed.lock().unwrap()[0].unpack().unwrap();
    assert_eq!(pushed.transaction.actions[0].data, vec![0xde, 0xad]);
}
