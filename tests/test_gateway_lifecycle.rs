mod common;

use std::time::Duration;

use common::{alice, stub_gateway, test_config, Call, StubServer};
use rowgate::sql::MAX_PLACEHOLDERS;
use rowgate::{DriverError, Error, ErrorKind, Filter, Gateway, GatewayState, Row, Value};

#[tokio::test]
async fn test_connect_then_close() {
    let (mut gateway, server) = stub_gateway();
    assert_eq!(gateway.state(), GatewayState::Disconnected);

    gateway.connect().await.unwrap();
    assert_eq!(gateway.state(), GatewayState::Connected);
    assert_eq!(server.connects(), 1);

    gateway.close().await;
    assert_eq!(gateway.state(), GatewayState::Disconnected);
    assert_eq!(server.calls(), vec![Call::Close]);

    // Closed gateways refuse work
    let err = gateway.query("SELECT * FROM users").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::State);
    assert_eq!(server.calls(), vec![Call::Close]);
}

#[tokio::test]
async fn test_connect_twice_reuses_connection() {
    let (mut gateway, server) = stub_gateway();

    gateway.connect().await.unwrap();
    gateway.connect().await.unwrap();
    assert!(gateway.try_connect().await);

    assert_eq!(server.connects(), 1);
    assert!(gateway.is_connected());
}

#[tokio::test]
async fn test_close_twice_never_fails() {
    let (mut gateway, server) = stub_gateway();
    gateway.connect().await.unwrap();

    gateway.close().await;
    assert_eq!(gateway.state(), GatewayState::Disconnected);
    gateway.close().await;
    assert_eq!(gateway.state(), GatewayState::Disconnected);

    assert_eq!(server.calls(), vec![Call::Close]);
}

#[tokio::test]
async fn test_close_without_connect() {
    let (mut gateway, server) = stub_gateway();
    gateway.close().await;
    assert_eq!(gateway.state(), GatewayState::Disconnected);
    assert_eq!(server.io_count(), 0);
}

#[tokio::test]
async fn test_release_error_still_disconnects() {
    let (mut gateway, server) = stub_gateway();
    server.fail_close(DriverError::Disconnected("broken pipe".to_string()));

    gateway.connect().await.unwrap();
    gateway.close().await;

    assert_eq!(gateway.state(), GatewayState::Disconnected);
}

#[tokio::test]
async fn test_failed_connect_stays_disconnected() {
    let (mut gateway, server) = stub_gateway();
    server.fail_connect(DriverError::Other(
        "Access denied for user 'app'@'10.0.0.2'".to_string(),
    ));

    let err = gateway.connect().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connection);
    match err {
        Error::Connection { address, message } => {
            assert_eq!(address, "db.test:3306");
            assert!(message.contains("Access denied"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(gateway.state(), GatewayState::Disconnected);

    assert!(!gateway.try_connect().await);
    assert_eq!(server.connects(), 2);
}

#[tokio::test]
async fn test_connect_timeout() {
    common::init_logging();
    let server = StubServer::new();
    server.delay_connect(Duration::from_secs(5));
    let config = test_config().with_connect_timeout(Duration::from_millis(20));
    let mut gateway = Gateway::with_connector(config, server.connector());

    let err = gateway.connect().await.unwrap_err();
    assert!(matches!(err, Error::Connection { ref message, .. } if message.contains("timed out")));
    assert_eq!(gateway.state(), GatewayState::Disconnected);
}

#[tokio::test]
async fn test_operations_before_connect_do_no_io() {
    let (mut gateway, server) = stub_gateway();
    let filter = Filter::eq("name", "Alice");

    let results = vec![
        gateway.query("SELECT 1").await.map(|_| ()),
        gateway.find("users", Some(&filter)).await.map(|_| ()),
        gateway.insert("users", &alice()).await.map(|_| ()),
        gateway.insert_many("users", &[alice()]).await.map(|_| ()),
        gateway
            .update("users", &Row::new().with("email", "x@y.z"), &filter)
            .await
            .map(|_| ()),
        gateway.delete("users", &filter).await.map(|_| ()),
        gateway.ping().await,
    ];

    for result in results {
        let err = result.unwrap_err();
        assert!(matches!(err, Error::NotConnected { .. }), "{:?}", err);
        assert_eq!(err.kind(), ErrorKind::State);
    }
    assert_eq!(server.io_count(), 0);
}

#[tokio::test]
async fn test_not_connected_names_operation() {
    let (mut gateway, _server) = stub_gateway();
    let err = gateway
        .delete("users", &Filter::eq("id", 1))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "State error: cannot delete while disconnected");
}

#[tokio::test]
async fn test_session_closes_after_success() {
    let (mut gateway, server) = stub_gateway();
    server.push_rows(vec![alice()]);

    let rows = gateway
        .session(|g| Box::pin(async move { g.find("users", None).await }))
        .await
        .unwrap();

    assert_eq!(rows, vec![alice()]);
    assert_eq!(gateway.state(), GatewayState::Disconnected);
    assert_eq!(server.calls().last(), Some(&Call::Close));
}

#[tokio::test]
async fn test_session_closes_after_failure() {
    let (mut gateway, server) = stub_gateway();
    let row = Row::new().with("nickname", "Al");

    let err = gateway
        .session(move |g| Box::pin(async move { g.insert("users", &row).await }))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::ColumnNotFound(ref column, _) if column == "nickname"));
    assert_eq!(gateway.state(), GatewayState::Disconnected);
    assert_eq!(server.calls(), vec![Call::Close]);
}

#[tokio::test]
async fn test_session_connect_failure() {
    let (mut gateway, server) = stub_gateway();
    server.fail_connect(DriverError::Other("refused".to_string()));

    let err = gateway
        .session(|g| Box::pin(async move { g.ping().await }))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Connection);
    assert!(server.calls().is_empty());
}

#[tokio::test]
async fn test_transport_failure_drops_connection() {
    let (mut gateway, server) = stub_gateway();
    gateway.connect().await.unwrap();
    server.push_fetch_error(DriverError::Disconnected("server has gone away".to_string()));

    let err = gateway.query("SELECT * FROM users").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connection);
    assert_eq!(gateway.state(), GatewayState::Disconnected);

    // Reconnecting opens a fresh connection
    gateway.connect().await.unwrap();
    assert_eq!(server.connects(), 2);
}

#[tokio::test]
async fn test_statement_timeout_drops_connection() {
    common::init_logging();
    let server = StubServer::new();
    server.delay_fetch(Duration::from_secs(5));
    let config = test_config().with_statement_timeout(Some(Duration::from_millis(20)));
    let mut gateway = Gateway::with_connector(config, server.connector());
    gateway.connect().await.unwrap();

    let err = gateway.query("SELECT SLEEP(10)").await.unwrap_err();
    assert!(matches!(err, Error::Timeout { operation: "query", .. }));
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert_eq!(gateway.state(), GatewayState::Disconnected);
}

#[tokio::test]
async fn test_ping() {
    let (mut gateway, server) = stub_gateway();
    gateway.connect().await.unwrap();
    gateway.ping().await.unwrap();
    assert_eq!(server.calls(), vec![Call::Ping]);
}

#[tokio::test]
async fn test_shared_gateway_serializes_tasks() {
    let (gateway, server) = stub_gateway();
    let shared = gateway.into_shared();
    shared.lock().await.connect().await.unwrap();

    let mut handles = Vec::new();
    for i in 0..4 {
        let shared = shared.clone();
        handles.push(tokio::spawn(async move {
            let mut gateway = shared.lock().await;
            gateway
                .find("users", Some(&Filter::eq("id", i)))
                .await
                .map(|rows| rows.len())
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), 0);
    }

    let reads = server
        .calls()
        .into_iter()
        .filter(|c| matches!(c, Call::FetchAll { .. }))
        .count();
    assert_eq!(reads, 4);
    assert_eq!(server.connects(), 1);
}

#[tokio::test]
async fn test_huge_statement_timeout_covers_large_batch() {
    common::init_logging();
    let server = StubServer::new();
    let config = test_config().with_statement_timeout(Some(Duration::from_secs(u64::MAX)));
    let mut gateway = Gateway::with_connector(config, server.connector());
    gateway.register_table(common::users_schema());
    gateway.connect().await.unwrap();

    // Two columns per row, so this needs more than one INSERT
    let count = MAX_PLACEHOLDERS / 2 + 10;
    let rows: Vec<Row> = (0..count)
        .map(|i| Row::new().with("name", format!("user{}", i)).with("email", Value::Null))
        .collect();
    server.push_outcome(count as u64, Some(1));

    assert_eq!(gateway.insert_many("users", &rows).await.unwrap(), count as u64);
    match &server.calls()[0] {
        Call::Batch { statements } => assert_eq!(statements.len(), 2),
        other => panic!("unexpected call: {:?}", other),
    }
    assert!(gateway.is_connected());
}
