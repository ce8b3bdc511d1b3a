mod support;

use http::HeaderMap;
use http::header::{COOKIE, SET_COOKIE};
use std::sync::Arc;
use std::time::Duration;

use sessioncrab::config::Network;
use sessioncrab::{BackendError, RedisStore, SessionError, Store, StoreConfig};
use support::{MockRedis, within};

fn config_for(mock: &MockRedis) -> StoreConfig {
    let mut config = StoreConfig::default();
    config.redis.address = mock.addr.clone();
    config.redis.io_timeout = Some(Duration::from_secs(2));
    config.redis.connect_timeout = Some(Duration::from_secs(2));
    config
}

#[tokio::test]
async fn handshake_then_round_trip() {
    let mock = MockRedis::start(Some("s3cret")).await;
    let mut config = config_for(&mock);
    config.redis = config.redis.with_password("s3cret");
    config.redis.database = 2;

    let store = Arc::new(RedisStore::from_config(&config));
    let worker = store.spawn();

    let mut session = store.new_session(store.cookie_name());
    session.insert("visits", 7i64);
    let mut response = HeaderMap::new();
    within(store.set(&mut response, &session)).await.unwrap();
    assert!(response.get(SET_COOKIE).is_some());

    let mut request = HeaderMap::new();
    request.insert(COOKIE, format!("session={}", session.id()).parse().unwrap());
    let lookup = within(store.get(&request, "session")).await;
    assert!(lookup.is_found());
    assert_eq!(lookup.session.values, session.values);

    {
        let state = mock.state.lock();
        assert_eq!(state.accepted, 1);
        let commands = state.commands_on(1);
        assert_eq!(commands[0], "AUTH s3cret");
        assert_eq!(commands[1], "SELECT 2");
        assert!(commands[2].starts_with(&format!("SETEX session_:{} 2592000 ", session.id())));
        assert_eq!(commands[3], format!("GET session_:{}", session.id()));
        assert_eq!(state.selected.get(&1), Some(&2));
    }

    store.stop().await;
    within(worker).await.unwrap();
}

#[tokio::test]
async fn username_goes_before_the_password() {
    let mock = MockRedis::start(Some("pw")).await;
    let mut config = config_for(&mock);
    config.redis = config.redis.with_password("pw");
    config.redis.username = Some("app".into());

    let store = Arc::new(RedisStore::from_config(&config));
    let worker = store.spawn();
    within(store.ping()).await.unwrap();

    assert_eq!(mock.state.lock().commands_on(1), vec!["AUTH app pw", "PING"]);

    store.stop().await;
    within(worker).await.unwrap();
}

#[tokio::test]
async fn rejected_password_surfaces_as_auth_error() {
    let mock = MockRedis::start(Some("right")).await;
    let mut config = config_for(&mock);
    config.redis = config.redis.with_password("wrong");

    let store = Arc::new(RedisStore::from_config(&config));
    let worker = store.spawn();

    let err = within(store.ping()).await.unwrap_err();
    assert!(matches!(err, SessionError::Backend(BackendError::Auth(_))));

    // Neither the failed startup lease nor the failed query held on to a slot.
    let stats = store.pool().stats().await;
    assert_eq!(stats.in_use, 0);
    assert_eq!(stats.idle, 0);

    store.stop().await;
    within(worker).await.unwrap();
}

#[tokio::test]
async fn dropped_connection_is_replaced() {
    let mock = MockRedis::start(None).await;
    let store = Arc::new(RedisStore::from_config(&config_for(&mock)));
    let worker = store.spawn();

    within(store.ping()).await.unwrap();

    mock.drop_next();
    let err = within(store.ping()).await.unwrap_err();
    assert!(matches!(err, SessionError::Backend(BackendError::Closed)));

    within(store.ping()).await.unwrap();

    {
        let state = mock.state.lock();
        assert_eq!(state.accepted, 2);
        assert_eq!(state.commands_on(1), vec!["PING", "PING"]);
        assert_eq!(state.commands_on(2), vec!["PING"]);
    }

    store.stop().await;
    within(worker).await.unwrap();
    assert!(store.pool().stats().await.closed);
}

#[tokio::test]
async fn unreachable_backend_reports_io_errors() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);

    let mut config = StoreConfig::default();
    config.redis.address = addr;
    let store = Arc::new(RedisStore::from_config(&config));
    let worker = store.spawn();

    let err = within(store.ping()).await.unwrap_err();
    assert!(matches!(err, SessionError::Backend(BackendError::Io(_))));

    store.stop().await;
    within(worker).await.unwrap();
}

#[tokio::test]
async fn serves_over_a_unix_socket() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.sock");
    let mock = MockRedis::start_unix(&path, None).await;

    let mut config = config_for(&mock);
    config.redis.network = Network::Unix;

    let store = Arc::new(RedisStore::from_config(&config));
    let worker = store.spawn();

    let session = store.new_session("session");
    let mut response = HeaderMap::new();
    within(store.set(&mut response, &session)).await.unwrap();
    assert_eq!(mock.state.lock().kv.len(), 1);

    store.stop().await;
    within(worker).await.unwrap();
}
