//! UAA token fetcher against a local mock token server.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

use tcp_router_configurer::config::{OAuthConfig, RoutingApiConfig, TokenConfig};
use tcp_router_configurer::token::{AuthError, TokenFetcher, UaaTokenFetcher};

mod common;

/// Statuses to answer with, in order; once exhausted every request succeeds.
#[derive(Clone)]
struct MockUaa {
    requests: Arc<AtomicUsize>,
    failures: Arc<Vec<StatusCode>>,
    expires_in: u64,
    delay: Duration,
}

async fn issue_token(
    State(mock): State<MockUaa>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<Value>, StatusCode> {
    let n = mock.requests.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(mock.delay).await;

    if let Some(status) = mock.failures.get(n) {
        return Err(*status);
    }
    if !headers.contains_key("authorization") || body != "grant_type=client_credentials" {
        return Err(StatusCode::BAD_REQUEST);
    }
    Ok(Json(json!({
        "access_token": format!("token-{}", n + 1),
        "token_type": "bearer",
        "expires_in": mock.expires_in,
    })))
}

async fn start_uaa(failures: Vec<StatusCode>, expires_in: u64, delay: Duration) -> (SocketAddr, Arc<AtomicUsize>) {
    let requests = Arc::new(AtomicUsize::new(0));
    let mock = MockUaa {
        requests: requests.clone(),
        failures: Arc::new(failures),
        expires_in,
        delay,
    };
    let router = Router::new()
        .route("/oauth/token", post(issue_token))
        .with_state(mock);
    (common::serve(router).await, requests)
}

fn fetcher(addr: SocketAddr, max_retries: u32, expiration_buffer_secs: u64) -> UaaTokenFetcher {
    let oauth = OAuthConfig {
        token_endpoint: format!("http://{}", addr.ip()),
        port: addr.port(),
        client_name: "router-configurer".into(),
        client_secret: "secret".into(),
    };
    let token = TokenConfig {
        max_retries,
        retry_interval_secs: 0,
        expiration_buffer_secs,
    };
    UaaTokenFetcher::new(&oauth, &token, &RoutingApiConfig::default()).unwrap()
}

#[tokio::test]
async fn test_token_url_from_endpoint_and_port() {
    let f = fetcher("127.0.0.1:8443".parse().unwrap(), 0, 0);
    assert_eq!(f.token_url().as_str(), "http://127.0.0.1:8443/oauth/token");
}

#[tokio::test]
async fn test_token_is_cached() {
    let (addr, requests) = start_uaa(vec![], 3600, Duration::ZERO).await;
    let f = fetcher(addr, 0, 30);

    let first = f.fetch_token(false).await.unwrap();
    let second = f.fetch_token(false).await.unwrap();

    assert_eq!(first.value, "token-1");
    assert_eq!(second, first);
    assert_eq!(requests.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_force_refresh_fetches_new_token() {
    let (addr, requests) = start_uaa(vec![], 3600, Duration::ZERO).await;
    let f = fetcher(addr, 0, 30);

    f.fetch_token(false).await.unwrap();
    let refreshed = f.fetch_token(true).await.unwrap();

    assert_eq!(refreshed.value, "token-2");
    assert_eq!(requests.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_token_inside_buffer_is_refreshed() {
    // Expires in 10s but the buffer is 30s, so it is never good enough to reuse.
    let (addr, requests) = start_uaa(vec![], 10, Duration::ZERO).await;
    let f = fetcher(addr, 0, 30);

    f.fetch_token(false).await.unwrap();
    let second = f.fetch_token(false).await.unwrap();

    assert_eq!(second.value, "token-2");
    assert_eq!(requests.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_concurrent_callers_share_one_refresh() {
    let (addr, requests) = start_uaa(vec![], 3600, Duration::from_millis(100)).await;
    let f = Arc::new(fetcher(addr, 0, 30));

    let callers: Vec<_> = (0..8)
        .map(|_| {
            let f = f.clone();
            tokio::spawn(async move { f.fetch_token(true).await })
        })
        .collect();

    let mut tokens = Vec::new();
    for caller in callers {
        tokens.push(caller.await.unwrap().unwrap().value);
    }

    assert_eq!(requests.load(Ordering::SeqCst), 1);
    assert!(tokens.iter().all(|t| t == "token-1"));
}

#[tokio::test]
async fn test_concurrent_callers_share_one_error() {
    let (addr, requests) = start_uaa(
        vec![StatusCode::UNAUTHORIZED],
        3600,
        Duration::from_millis(100),
    )
    .await;
    let f = Arc::new(fetcher(addr, 3, 30));

    let callers: Vec<_> = (0..4)
        .map(|_| {
            let f = f.clone();
            tokio::spawn(async move { f.fetch_token(false).await })
        })
        .collect();

    for caller in callers {
        let err = caller.await.unwrap().unwrap_err();
        assert!(matches!(err, AuthError::Rejected { status: 401, .. }));
    }
    assert_eq!(requests.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let (addr, requests) = start_uaa(
        vec![StatusCode::SERVICE_UNAVAILABLE, StatusCode::INTERNAL_SERVER_ERROR],
        3600,
        Duration::ZERO,
    )
    .await;
    let f = fetcher(addr, 3, 30);

    let token = f.fetch_token(false).await.unwrap();
    assert_eq!(token.value, "token-3");
    assert_eq!(requests.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_retries_are_bounded() {
    let (addr, requests) = start_uaa(vec![StatusCode::BAD_GATEWAY; 10], 3600, Duration::ZERO).await;
    let f = fetcher(addr, 2, 30);

    let err = f.fetch_token(false).await.unwrap_err();
    assert!(matches!(err, AuthError::Rejected { status: 502, .. }));
    assert_eq!(requests.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let (addr, requests) = start_uaa(vec![StatusCode::UNAUTHORIZED], 3600, Duration::ZERO).await;
    let f = fetcher(addr, 3, 30);

    assert!(f.fetch_token(false).await.is_err());
    assert_eq!(requests.load(Ordering::SeqCst), 1);

    // The failure is not cached; the next call tries again.
    assert_eq!(f.fetch_token(false).await.unwrap().value, "token-2");
}

#[tokio::test]
async fn test_huge_expires_in_yields_non_expiring_token() {
    let (addr, requests) = start_uaa(vec![], u64::MAX, Duration::ZERO).await;
    let f = Arc::new(fetcher(addr, 0, 30));

    // Run on its own task so a panic would surface as a JoinError.
    let task = {
        let f = f.clone();
        tokio::spawn(async move { f.fetch_token(false).await })
    };
    let token = task.await.unwrap().unwrap();
    assert_eq!(token.value, "token-1");
    assert_eq!(token.expires_at, None);

    assert_eq!(f.fetch_token(false).await.unwrap(), token);
    assert_eq!(requests.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_huge_expiration_buffer_refreshes_instead_of_panicking() {
    let (addr, requests) = start_uaa(vec![], 3600, Duration::ZERO).await;
    let f = fetcher(addr, 0, u64::MAX);

    f.fetch_token(false).await.unwrap();
    let second = f.fetch_token(false).await.unwrap();
    assert_eq!(second.value, "token-2");
    assert_eq!(requests.load(Ordering::SeqCst), 2);
}
