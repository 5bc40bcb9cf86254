use std::time::Duration;
use turnstile_common_http::{HttpClient, HttpConfig, HttpError};

#[tokio::test]
async fn test_http_client_functionality() {
    let client = HttpClient::new().expect("Failed to create client");
    let _inner = client.inner();

    let config = HttpConfig {
        connect_timeout: Duration::from_millis(500),
        pool_idle_timeout: Duration::from_secs(30),
        user_agent: "test-turnstile/1.0".to_string(),
        pool_max_idle_per_host: 4,
        follow_redirects: true,
    };

    let custom_client = HttpClient::with_config(config).expect("Failed to create custom client");
    let _custom_inner = custom_client.inner();
}

#[tokio::test]
async fn test_deadline_maps_to_timeout() {
    // Accepts the connection but never answers.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let _hold = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let client = HttpClient::new().unwrap();
    let request = client.inner().get(format!("http://{}/slow", addr));
    let err = client
        .send(request, Duration::from_millis(100))
        .await
        .unwrap_err();

    assert!(err.is_timeout());
}

#[test]
fn test_error_display() {
    assert_eq!(HttpError::Timeout.to_string(), "request timed out");
}
