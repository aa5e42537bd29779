//! Provider selection: combined providers, missing keys and key discovery.

use std::sync::Arc;

use antelope_kit::*;

use crate::common::*;

fn client(node: Arc<MockNode>, provider: impl SignatureProvider + 'static) -> Client {
    Client::builder("http://127.0.0.1:8888")
        .chain_api(node)
        .provider(provider)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_combined_provider_signs_multi_party_transaction() {
    let bob = SecretKey::generate();
    let node = Arc::new(MockNode::new().with_authority("bob", bob.public_key()));

    let provider = CombinedProvider::new()
        .with(InMemoryProvider::new([DEV_WIF]).unwrap())
        .with(InMemoryProvider::from_secret_keys([bob.clone()]));

    let signed = client(node.clone(), provider)
        .transaction()
        .add_action(transfer("alice", "bob", "1.0000 TOK"))
        .add_action(transfer("bob", "alice", "0.5000 TOK"))
        .sign()
        .await
        .unwrap();

    let digest = signed
        .transaction
        .signing_digest(&node.info.chain_id, &[])
        .unwrap();
    let signers: Vec<_> = signed
        .signatures
        .iter()
        .map(|s| s.recover(&digest).unwrap())
        .collect();
    assert_eq!(signers, vec![dev_key().public_key(), bob.public_key()]);
}

#[tokio::test]
async fn test_unsigned_required_key_is_unresolved() {
    let bob = SecretKey::generate();
    let node = Arc::new(MockNode::new().with_authority("bob", bob.public_key()));

    // bob's key is visible but nothing can sign with it
    let provider = CombinedProvider::new()
        .with(InMemoryProvider::new([DEV_WIF]).unwrap())
        .with(WatchOnly(vec![bob.public_key()]));

    let result = client(node.clone(), provider)
        .transact(
            vec![
                transfer("alice", "bob", "1.0000 TOK"),
                transfer("bob", "alice", "0.5000 TOK"),
            ],
            TransactOptions::default(),
        )
        .await;

    match result {
        Err(Error::UnresolvedKeys(keys)) => assert_eq!(keys, vec![bob.public_key()]),
        other => panic!("expected UnresolvedKeys, got {:?}", other.map(|r| r.transaction_id)),
    }
    assert_eq!(node.push_count(), 0);
}

#[tokio::test]
async fn test_no_keys_fails_before_node_is_asked() {
    let node = Arc::new(MockNode::new());
    let result = client(node.clone(), InMemoryProvider::default())
        .transact(
            vec![transfer("alice", "bob", "1.0000 TOK")],
            TransactOptions::default(),
        )
        .await;

    assert!(matches!(result, Err(Error::NoKeysAvailable)));
    assert!(
        !node
            .calls()
            .iter()
            .any(|c| matches!(c, Call::GetRequiredKeys(_) | Call::Push))
    );
}

#[tokio::test]
async fn test_all_available_keys_offered_to_node() {
    let extra = SecretKey::generate();
    let node = Arc::new(MockNode::new());
    let provider = CombinedProvider::new()
        .with(InMemoryProvider::new([DEV_WIF]).unwrap())
        .with(InMemoryProvider::from_secret_keys([extra.clone()]))
        .with(InMemoryProvider::new([DEV_WIF]).unwrap());

    client(node.clone(), provider)
        .transact(
            vec![transfer("alice", "bob", "1.0000 TOK")],
            TransactOptions::default(),
        )
        .await
        .unwrap();

    let offered = node
        .calls()
        .into_iter()
        .find_map(|c| match c {
            Call::GetRequiredKeys(keys) => Some(keys),
            _ => None,
        })
        .unwrap();
    assert_eq!(offered, vec![dev_key().public_key(), extra.public_key()]);
}

#[tokio::test]
async fn test_sign_with_overrides_client_provider() {
    let node = Arc::new(MockNode::new());
    let client = client(node.clone(), InMemoryProvider::default());

    client
        .transaction()
        .add_action(transfer("alice", "bob", "1.0000 TOK"))
        .sign_with(InMemoryProvider::new([DEV_WIF]).unwrap())
        .send()
        .await
        .unwrap();

    assert_eq!(node.push_count(), 1);
}

#[tokio::test]
async fn test_provider_from_key_file() {
    use std::io::Write;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{{\"keys\": [\"{}\"]}}", dev_key()).unwrap();

    let node = Arc::new(MockNode::new());
    client(node.clone(), InMemoryProvider::from_file(file.path()).unwrap())
        .transact(
            vec![transfer("alice", "bob", "1.0000 TOK")],
            TransactOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(node.push_count(), 1);
}
