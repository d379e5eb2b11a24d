//! End-to-end tests: real server, real sweeper, library client.

use linekv::client::{Client, ClientError};
use linekv::protocol::Response;
use linekv::server::{Server, ServerConfig};
use linekv::storage::{ExpirySweeper, StorageEngine};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

struct TestServer {
    addr: SocketAddr,
    storage: Arc<StorageEngine>,
    sweeper: ExpirySweeper,
    _shutdown: oneshot::Sender<()>,
}

async fn start(ttl: Duration) -> TestServer {
    let config = ServerConfig {
        bind_address: "127.0.0.1:0".to_string(),
        ttl,
        ..Default::default()
    };
    let storage = Arc::new(StorageEngine::new(ttl));
    let sweeper = ExpirySweeper::start(Arc::clone(&storage));
    let server = Server::bind(&config, Arc::clone(&storage)).await.unwrap();
    let addr = server.local_addr().unwrap();

    let (tx, rx) = oneshot::channel::<()>();
    tokio::spawn(server.run_until(async {
        let _ = rx.await;
    }));

    TestServer {
        addr,
        storage,
        sweeper,
        _shutdown: tx,
    }
}

#[tokio::test]
async fn set_get_delete_round_trip() {
    let server = start(Duration::from_secs(60)).await;
    let mut client = Client::connect(server.addr).await.unwrap();

    assert_eq!(
        client.set("greeting", "Hello, World!").await.unwrap(),
        Response::ok("1")
    );
    assert_eq!(
        client.get("greeting").await.unwrap(),
        Response::value("2", "Hello, World!")
    );
    assert_eq!(client.delete("greeting").await.unwrap(), Response::ok("3"));
    assert!(client.get("greeting").await.unwrap().is_not_found());

    client.close().await.unwrap();
}

#[tokio::test]
async fn delete_of_absent_key_succeeds() {
    let server = start(Duration::from_secs(60)).await;
    let mut client = Client::connect(server.addr).await.unwrap();

    assert!(client.delete("never-set").await.unwrap().is_ok());
    assert!(client.get("never-set").await.unwrap().is_not_found());
}

#[tokio::test]
async fn value_expires_after_ttl() {
    let server = start(Duration::from_millis(100)).await;
    let mut client = Client::connect(server.addr).await.unwrap();

    client.set("session", "abc123").await.unwrap();
    assert_eq!(
        client.get("session").await.unwrap().as_value(),
        Some("abc123")
    );

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(client.get("session").await.unwrap().is_not_found());
}

#[tokio::test]
async fn sweeper_reclaims_untouched_entries() {
    let ttl = Duration::from_millis(100);
    let server = start(ttl).await;
    let mut client = Client::connect(server.addr).await.unwrap();

    for i in 0..20 {
        client.set(&format!("k{}", i), "v").await.unwrap();
    }
    assert_eq!(server.storage.len(), 20);

    tokio::time::sleep(ttl * 2 + Duration::from_millis(50)).await;
    assert!(server.storage.keys().is_empty());

    server.sweeper.shutdown().await;
}

#[tokio::test]
async fn concurrent_clients_writing_one_key() {
    let server = start(Duration::from_secs(60)).await;
    let values: Vec<String> = (0..8).map(|i| format!("writer-{}", i)).collect();

    let tasks: Vec<_> = values
        .iter()
        .cloned()
        .map(|value| {
            let addr = server.addr;
            tokio::spawn(async move {
                let mut client = Client::connect(addr).await?;
                for _ in 0..25 {
                    client.set("contended", &value).await?;
                }
                Ok::<_, ClientError>(())
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let mut client = Client::connect(server.addr).await.unwrap();
    let response = client.get("contended").await.unwrap();
    let winner = response.as_value().unwrap().to_string();
    assert!(values.contains(&winner));
}

#[tokio::test]
async fn clients_have_independent_id_sequences() {
    let server = start(Duration::from_secs(60)).await;

    let mut first = Client::connect(server.addr).await.unwrap();
    let mut second = Client::connect(server.addr).await.unwrap();

    first.set("a", "1").await.unwrap();
    first.set("b", "2").await.unwrap();
    let reply = second.get("a").await.unwrap();

    assert_eq!(reply.id.as_deref(), Some("1"));
    assert_eq!(reply.as_value(), Some("1"));
}
