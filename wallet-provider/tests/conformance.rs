//! End-to-end behaviour of the wallet provider contract.

use std::collections::BTreeSet;
use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use futures::{SinkExt, StreamExt};
use indexmap::IndexMap;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use wallet_provider::account::AccountRegistry;
use wallet_provider::chain::{Chain, ChainId, ChainInfo, RelayChain, SubstrateRelayChain};
use wallet_provider::config::load_config;
use wallet_provider::jsonrpc::INTERNAL_ERROR;
use wallet_provider::keyring::{ChainAccounts, Keyring};
use wallet_provider::provider::{WalletProvider, build_wallet_provider};
use wallet_provider::signer::SignedExtension;
use wallet_provider::transport::Connector;
use wallet_provider::transport::ws::WsConnector;
use wallet_provider::{Account, Error, ErrorKind, SignPayload};

const SEED: [u8; 32] = [0x2a; 32];
const WESTEND: &str = "0xe143f23803ac50e8f6f8e62695d1ce9e4e1d68aa36c1cd2cfd15340213f3423e";
const ASSET_HUB: &str = "0x67f9723393ef76214df0118c34bbbd3dbebc8ed46a10973a8c969d48fe7598c9";

fn westend(keyring: &Keyring) -> SubstrateRelayChain {
    let info = ChainInfo {
        chain_id: WESTEND.parse().unwrap(),
        name: "Westend".to_owned(),
        symbol: "WND".to_owned(),
        decimals: 12,
        ss58_format: 42,
    };
    SubstrateRelayChain::from_endpoints(info, "westend", keyring, &[]).unwrap()
}

fn asset_hub_spec() -> String {
    json!({
        "name": "Westend Asset Hub",
        "id": "asset-hub-westend",
        "relay_chain": "westend",
        "para_id": 1000,
        "properties": { "tokenSymbol": "WND", "tokenDecimals": 12, "ss58Format": 42 },
        "genesisHash": ASSET_HUB,
    })
    .to_string()
}

fn payload(call_len: usize) -> SignPayload {
    let mut signed_extensions = IndexMap::new();
    signed_extensions.insert(
        "CheckMortality".to_owned(),
        SignedExtension {
            identifier: "CheckMortality".to_owned(),
            value: vec![0x00],
            additional_signed: vec![0xab; 32],
        },
    );
    SignPayload {
        call_data: vec![0x04; call_len],
        signed_extensions,
        metadata: b"meta\x0e".to_vec(),
        at_block_number: 42,
        hasher: None,
    }
}

/// Callback forwarding every message into a channel.
fn channel() -> (
    Arc<dyn Fn(String) + Send + Sync>,
    mpsc::UnboundedReceiver<Value>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    let callback = Arc::new(move |message: String| {
        let _ = tx.send(serde_json::from_str(&message).unwrap());
    });
    (callback, rx)
}

async fn next(rx: &mut mpsc::UnboundedReceiver<Value>) -> Value {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for a message")
        .expect("channel closed")
}

#[tokio::test]
async fn account_change_callback_runs_before_registration_returns() {
    let keyring = Keyring::new();
    keyring.add(&SEED, Some("Alice".to_owned()), BTreeSet::new()).unwrap();
    let relay = westend(&keyring);

    let calls = Arc::new(Mutex::new(Vec::<usize>::new()));
    let sink = Arc::clone(&calls);
    let subscription = relay
        .accounts()
        .on_accounts_change(Arc::new(move |accounts: Vec<Account>| {
            sink.lock().unwrap().push(accounts.len());
        }));
    assert_eq!(*calls.lock().unwrap(), vec![1]);

    keyring.add(&[7; 32], None, BTreeSet::new()).unwrap();
    assert_eq!(*calls.lock().unwrap(), vec![1, 2]);

    subscription.unsubscribe();
    subscription.unsubscribe();
    keyring.add(&[8; 32], None, BTreeSet::new()).unwrap();
    assert_eq!(*calls.lock().unwrap(), vec![1, 2]);
    assert_eq!(relay.accounts().get_accounts().await.unwrap().len(), 3);
}

/// Callback recording `(len, first address)` of every account list.
fn account_recorder() -> (
    Arc<Mutex<Vec<(usize, Option<String>)>>>,
    Arc<dyn Fn(Vec<Account>) + Send + Sync>,
) {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&calls);
    let callback = Arc::new(move |accounts: Vec<Account>| {
        let first = accounts.first().map(|a| a.address.clone());
        sink.lock().unwrap().push((accounts.len(), first));
    });
    (calls, callback)
}

#[tokio::test]
async fn account_registrations_are_independent() {
    let keyring = Keyring::new();
    keyring.add(&SEED, None, BTreeSet::new()).unwrap();
    let relay = westend(&keyring);
    let polkadot = ChainAccounts::new(keyring.clone(), 0);

    let (first, first_cb) = account_recorder();
    let (second, second_cb) = account_recorder();
    let (other, other_cb) = account_recorder();
    let a = relay.accounts().on_accounts_change(first_cb);
    let b = relay.accounts().on_accounts_change(second_cb);
    let c = polkadot.on_accounts_change(other_cb);
    assert_eq!(first.lock().unwrap().len(), 1);
    assert_eq!(second.lock().unwrap().len(), 1);
    assert_eq!(other.lock().unwrap().len(), 1);
    assert_eq!(first.lock().unwrap()[0], second.lock().unwrap()[0]);
    assert_ne!(first.lock().unwrap()[0].1, other.lock().unwrap()[0].1);

    a.unsubscribe();
    keyring.add(&[7; 32], None, BTreeSet::new()).unwrap();
    assert_eq!(first.lock().unwrap().len(), 1);
    assert_eq!(second.lock().unwrap().last().unwrap().0, 2);
    assert_eq!(other.lock().unwrap().last().unwrap().0, 2);

    c.unsubscribe();
    keyring.add(&[8; 32], None, BTreeSet::new()).unwrap();
    assert_eq!(second.lock().unwrap().last().unwrap().0, 3);
    assert_eq!(other.lock().unwrap().len(), 2);
    b.unsubscribe();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn no_message_is_delivered_after_disconnect_returns() {
    let relay = westend(&Keyring::new());
    let returned = Arc::new(AtomicBool::new(false));
    let late = Arc::new(AtomicUsize::new(0));
    let flag = Arc::clone(&returned);
    let counter = Arc::clone(&late);
    let connection = relay.connect(Arc::new(move |_: String| {
        if flag.load(Ordering::SeqCst) {
            counter.fetch_add(1, Ordering::SeqCst);
        }
        std::thread::sleep(Duration::from_millis(1));
    }));

    for id in 0..200 {
        connection.send(&format!(
            r#"{{"jsonrpc":"2.0","id":{id},"method":"chainSpec_v1_chainName"}}"#
        ));
    }
    tokio::time::sleep(Duration::from_millis(20)).await;
    let connection = Arc::new(connection);
    let closer = Arc::clone(&connection);
    let flag = Arc::clone(&returned);
    tokio::task::spawn_blocking(move || {
        closer.disconnect();
        flag.store(true, Ordering::SeqCst);
    })
    .await
    .unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(late.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn null_id_requests_are_answered() {
    let relay = westend(&Keyring::new());
    let (callback, mut rx) = channel();
    let connection = relay.connect(callback);
    connection.send(r#"{"jsonrpc":"2.0","id":null,"method":"chainSpec_v1_chainName"}"#);
    let response = next(&mut rx).await;
    assert!(response.as_object().unwrap().contains_key("id"));
    assert_eq!(response["id"], Value::Null);
    assert_eq!(response["result"], "Westend");
    connection.disconnect();
}

#[tokio::test]
async fn connections_never_cross_deliver() {
    let relay = westend(&Keyring::new());
    let (first_cb, mut first) = channel();
    let (second_cb, mut second) = channel();
    let a = relay.connect(first_cb);
    let b = relay.connect(second_cb);

    a.send(r#"{"jsonrpc":"2.0","id":"a1","method":"chainSpec_v1_chainName"}"#);
    b.send(r#"{"jsonrpc":"2.0","id":"b1","method":"chainSpec_v1_genesisHash"}"#);
    a.send(r#"{"jsonrpc":"2.0","id":"a2","method":"rpc_methods"}"#);

    let a1 = next(&mut first).await;
    let a2 = next(&mut first).await;
    let b1 = next(&mut second).await;
    assert_eq!(a1["id"], "a1");
    assert_eq!(a1["result"], "Westend");
    assert_eq!(a2["id"], "a2");
    assert_eq!(b1["id"], "b1");
    assert_eq!(b1["result"], WESTEND);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(first.try_recv().is_err());
    assert!(second.try_recv().is_err());
}

#[tokio::test]
async fn disconnect_is_idempotent_and_final() {
    let relay = westend(&Keyring::new());
    let (callback, mut rx) = channel();
    let connection = relay.connect(callback);
    connection.disconnect();
    connection.disconnect();
    connection.send(r#"{"jsonrpc":"2.0","id":1,"method":"chainSpec_v1_chainName"}"#);
    connection.send("garbage");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(rx.try_recv().is_err());
}

#[test]
fn chain_id_lengths() {
    let genesis = ChainId::genesis([1; 32]);
    assert_eq!(genesis.as_bytes().len(), 32);
    assert_eq!(genesis.to_hex().len(), 2 + 64);
    let forked = ChainId::forked([1; 32], 1_000_000);
    assert!(forked.as_bytes().len() > 32);
    assert_ne!(genesis, forked);
}

#[tokio::test]
async fn add_chain_rejects_invalid_specs_and_lists_valid_ones() {
    let relay = westend(&Keyring::new());
    for spec in ["", "{}", "not json", "[1, 2]"] {
        let err = relay.add_chain(spec).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation, "{spec:?}");
    }

    let chain = relay.add_chain(&asset_hub_spec()).await.unwrap();
    assert_eq!(chain.chain_id().to_hex(), ASSET_HUB);
    let chains = relay.get_chains().await.unwrap();
    assert_eq!(chains.keys().cloned().collect::<Vec<_>>(), vec![chain.chain_id().clone()]);

    let (callback, mut rx) = channel();
    let connection = chain.connect(callback);
    connection.send(r#"{"jsonrpc":"2.0","id":1,"method":"chainSpec_v1_chainName"}"#);
    assert_eq!(next(&mut rx).await["result"], "Westend Asset Hub");
    connection.disconnect();
}

#[tokio::test]
async fn signing_honours_allowlist_revocation_and_removal() {
    let keyring = Keyring::new();
    let public_key = keyring
        .add(&SEED, None, ["https://app.example".to_owned()].into())
        .unwrap();
    let accounts = ChainAccounts::new(keyring.clone(), 0);
    let account = accounts.get_accounts().await.unwrap().remove(0);
    assert!(account.address.starts_with('1'));

    let request = payload(400);
    let signature = account.sign("https://app.example", &request).await.unwrap();
    let signature = Signature::from_slice(&signature).unwrap();
    let message = request.signing_payload().unwrap();
    assert_eq!(message.len(), 32);
    VerifyingKey::from_bytes(&public_key)
        .unwrap()
        .verify(&message, &signature)
        .unwrap();

    assert!(matches!(
        account.sign("https://evil.example", &request).await,
        Err(Error::Unauthorized { .. })
    ));
    let mut bad = payload(4);
    bad.metadata = vec![0; 8];
    assert!(matches!(
        account.sign("https://app.example", &bad).await,
        Err(Error::InvalidPayload(_))
    ));

    assert!(keyring.revoke(&public_key));
    assert!(matches!(
        account.sign("https://app.example", &request).await,
        Err(Error::Revoked(_))
    ));
    assert!(accounts.get_accounts().await.unwrap().is_empty());

    assert!(keyring.remove(&public_key));
    assert!(matches!(
        account.sign("https://app.example", &request).await,
        Err(Error::AccountNotFound(_))
    ));
}

#[tokio::test]
async fn provider_is_built_from_config_files() {
    let dir = tempfile::tempdir().unwrap();
    let spec_path = dir.path().join("asset-hub.json");
    std::fs::write(&spec_path, asset_hub_spec()).unwrap();

    let config_path = dir.path().join("config.toml");
    let mut file = std::fs::File::create(&config_path).unwrap();
    write!(
        file,
        r#"
[chains."{WESTEND}"]
name = "Westend"
id = "westend"
symbol = "WND"
decimals = 12
parachains = ["{}"]

[[accounts]]
name = "Alice"
seed = "0x{}"
allowlist = ["*"]
"#,
        spec_path.display(),
        hex::encode(SEED)
    )
    .unwrap();
    drop(file);

    let config = load_config(&config_path).unwrap();
    let provider = build_wallet_provider(&config).await.unwrap();
    let relays = provider.get_chains().await.unwrap();
    assert_eq!(relays.len(), 1);
    let relay = &relays[&WESTEND.parse::<ChainId>().unwrap()];
    let parachains = relay.get_chains().await.unwrap();
    assert_eq!(parachains.len(), 1);

    let accounts = relay.accounts().get_accounts().await.unwrap();
    assert_eq!(accounts[0].display_name.as_deref(), Some("Alice"));
    assert!(accounts[0].sign("https://any.example", &payload(8)).await.is_ok());
}

/// Answers every request with its method name, except `stall`, on which it
/// closes the socket without replying.
async fn spawn_node() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let Ok(mut socket) = tokio_tungstenite::accept_async(stream).await else {
                    return;
                };
                while let Some(Ok(Message::Text(text))) = socket.next().await {
                    let request: Value = serde_json::from_str(text.as_str()).unwrap();
                    if request["method"] == "stall" {
                        let _ = socket.close(None).await;
                        return;
                    }
                    let response = json!({
                        "jsonrpc": "2.0",
                        "id": request["id"],
                        "result": request["method"],
                    });
                    let _ = socket.send(Message::text(response.to_string())).await;
                }
            });
        }
    });
    format!("ws://{address}")
}

#[tokio::test]
async fn websocket_sessions_are_independent() {
    let connector = WsConnector::new(&[spawn_node().await]).unwrap();
    let (first_cb, mut first) = channel();
    let (second_cb, mut second) = channel();
    let a = connector.connect(first_cb);
    let b = connector.connect(second_cb);

    a.send(r#"{"jsonrpc":"2.0","id":1,"method":"system_name"}"#);
    b.send(r#"{"jsonrpc":"2.0","id":1,"method":"system_version"}"#);
    a.send(r#"{"jsonrpc":"2.0","id":2,"method":"system_chain"}"#);

    assert_eq!(next(&mut first).await["result"], "system_name");
    assert_eq!(next(&mut first).await["result"], "system_chain");
    assert_eq!(next(&mut second).await["result"], "system_version");

    a.disconnect();
    a.disconnect();
    b.disconnect();
}

#[tokio::test]
async fn websocket_failure_answers_pending_requests() {
    let connector = WsConnector::new(&[spawn_node().await]).unwrap();
    let (callback, mut rx) = channel();
    let connection = connector.connect(callback);

    connection.send(r#"{"jsonrpc":"2.0","id":7,"method":"stall"}"#);
    let response = next(&mut rx).await;
    assert_eq!(response["id"], 7);
    assert_eq!(response["error"]["code"], INTERNAL_ERROR);

    connection.send(r#"{"jsonrpc":"2.0","id":8,"method":"system_name"}"#);
    let response = next(&mut rx).await;
    assert_eq!(response["id"], 8);
    assert_eq!(response["error"]["code"], INTERNAL_ERROR);
    connection.disconnect();
}

#[tokio::test]
async fn unreachable_endpoint_fails_queued_requests() {
    // Bind then drop to get a port nothing listens on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    drop(listener);

    let connector = WsConnector::new(&[format!("ws://{address}")]).unwrap();
    let (callback, mut rx) = channel();
    let connection = connector.connect(callback);
    connection.send(r#"{"jsonrpc":"2.0","id":"q","method":"system_name"}"#);
    let response = next(&mut rx).await;
    assert_eq!(response["id"], "q");
    assert_eq!(response["error"]["message"], "transport closed");
}
