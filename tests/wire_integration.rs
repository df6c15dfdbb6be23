
use std::time::Duration;

use pgbridge::server::ServerConfig;
use wire_test_support::{TestServer, tags};

#[tokio::test(flavor = "multi_thread")]
async fn test_startup_handshake() {
    let server = TestServer::start().await;
    let mut client = server.connect().await;

    let messages = client.startup("postgres").await;
    assert_eq!(tags(&messages), b"RSSSSSZ");
    assert_eq!(messages[0].body, [0, 0, 0, 0]);

    let params: Vec<(String, String)> = messages[1..6]
        .iter()
        .map(|m| {
            let mut parts = m.body.split(|&b| b == 0);
            let name = String::from_utf8(parts.next().unwrap().to_vec()).unwrap();
            let value = String::from_utf8(parts.next().unwrap().to_vec()).unwrap();
            (name, value)
        })
        .collect();
    assert_eq!(params[0], ("server_version".into(), "14".into()));
    assert_eq!(params[1], ("server_encoding".into(), "UTF8".into()));
    assert_eq!(params[2], ("client_encoding".into(), "UTF8".into()));
    assert_eq!(params[3], ("DateStyle".into(), "ISO".into()));
    assert_eq!(params[4], ("TimeZone".into(), "UTC".into()));
    assert_eq!(messages[6].body, b"I");

    client.terminate().await;
    client.assert_closed().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_ssl_declined_then_plaintext_startup() {
    let server = TestServer::start().await;
    let mut client = server.connect().await;

    assert_eq!(client.ssl_request().await, b'N');
    let messages = client.startup("postgres").await;
    assert_eq!(tags(&messages), b"RSSSSSZ");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_simple_query() {
    let server = TestServer::start().await;
    let mut client = server.connect_ready().await;

    let messages = client.query("SELECT * FROM people").await;
    assert_eq!(tags(&messages), b"TDDDCZ");

    assert_eq!(
        messages[0].fields(),
        vec![
            ("id".to_string(), 23),
            ("name".to_string(), 1043),
            ("nickname".to_string(), 25),
        ]
    );
    assert_eq!(
        messages[1].values(),
        vec![Some("1".into()), Some("alice".into()), Some("al".into())]
    );
    assert_eq!(
        messages[3].values(),
        vec![Some("3".into()), Some("carol".into()), None]
    );
    assert_eq!(messages[4].text(), "SELECT 3");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_error_then_recovery() {
    let server = TestServer::start().await;
    let mut client = server.connect_ready().await;

    let messages = client.query("SELECT * FROM missing").await;
    assert_eq!(tags(&messages), b"EZ");
    assert_eq!(messages[0].error_field(b'S').as_deref(), Some("ERROR"));
    assert_eq!(messages[0].error_field(b'V').as_deref(), Some("ERROR"));
    assert_eq!(messages[0].error_field(b'C').as_deref(), Some("42601"));
    assert_eq!(
        messages[0].error_field(b'M').as_deref(),
        Some("relation \"missing\" does not exist")
    );

    let messages = client.query("SELECT * FROM people").await;
    assert_eq!(tags(&messages), b"TDDDCZ");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_fatal_error_tears_down_session() {
    let server = TestServer::start().await;
    let mut client = server.connect_ready().await;
    server.wait_for_sessions(1).await;

    client.send(b'Q', b"SELECT crash()\0").await;
    client.assert_closed().await;
    server.wait_for_sessions(0).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unmapped_column_omitted_every_time() {
    let server = TestServer::start().await;
    let mut client = server.connect_ready().await;

    for _ in 0..2 {
        let messages = client.query("SELECT * FROM wide").await;
        assert_eq!(tags(&messages), b"TDDCZ");
        assert_eq!(
            messages[0].fields(),
            vec![("id".to_string(), 23), ("label".to_string(), 1043)]
        );
        assert_eq!(
            messages[1].values(),
            vec![Some("1".into()), Some("first".into())]
        );
        assert_eq!(
            messages[2].values(),
            vec![Some("2".into()), Some("second".into())]
        );
        assert_eq!(messages[3].text(), "SELECT 2");
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_sessions_are_independent() {
    let server = TestServer::start().await;
    let mut a = server.connect_ready().await;
    let mut b = server.connect_ready().await;
    server.wait_for_sessions(2).await;

    let messages = a.query("SELECT * FROM missing").await;
    assert_eq!(tags(&messages), b"EZ");
    let messages = b.query("SELECT * FROM people").await;
    assert_eq!(tags(&messages), b"TDDDCZ");

    a.terminate().await;
    a.assert_closed().await;
    server.wait_for_sessions(1).await;

    let messages = b.query("SELECT * FROM wide").await;
    assert_eq!(tags(&messages), b"TDDCZ");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_client_disconnect_unregisters() {
    let server = TestServer::start().await;
    let client = server.connect_ready().await;
    server.wait_for_sessions(1).await;

    drop(client);
    server.wait_for_sessions(0).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_empty_query() {
    let server = TestServer::start().await;
    let mut client = server.connect_ready().await;

    let messages = client.query("").await;
    assert_eq!(tags(&messages), b"IZ");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_query_text_longer_than_64k() {
    let server = TestServer::start().await;
    let mut client = server.connect_ready().await;

    let sql = format!("SELECT * FROM people /* {} */", "x".repeat(70 * 1024));
    let messages = client.query(&sql).await;
    assert_eq!(tags(&messages), b"TDDDCZ");

    let messages = client.query("SELECT * FROM people").await;
    assert_eq!(tags(&messages), b"TDDDCZ");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_fatal_error_while_producing_rows() {
    let server = TestServer::start().await;
    let mut client = server.connect_ready().await;
    server.wait_for_sessions(1).await;

    client.send(b'Q', b"SELECT * FROM crash_midway\0").await;
    let description = client.recv().await;
    assert_eq!(description.tag, b'T');
    assert_eq!(description.fields(), vec![("id".to_string(), 23)]);

    // No DataRow, ErrorResponse or ReadyForQuery follows.
    client.assert_closed().await;
    server.wait_for_sessions(0).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_idle_session_is_closed() {
    let server = TestServer::start_with(ServerConfig {
        idle_timeout: Some(Duration::from_millis(100)),
        ..ServerConfig::default()
    })
    .await;
    let mut client = server.connect_ready().await;

    client.assert_closed().await;
    server.wait_for_sessions(0).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_repeated_queries_across_sessions() {
    let server = TestServer::start().await;
    let mut clients = Vec::new();
    for _ in 0..4 {
        clients.push(server.connect_ready().await);
    }

    for client in &mut clients {
        for _ in 0..10 {
            let messages = client.query("SELECT * FROM people").await;
            assert_eq!(messages.last().unwrap().body, b"I");
        }
    }
}
