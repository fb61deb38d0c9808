use super::*;

#[test]
fn ws_url_maps_http_schemes() {
    assert_eq!(ClientConfig::new("http://localhost:3000").ws_url().unwrap(), "ws://localhost:3000/api/ws");
    assert_eq!(ClientConfig::new("https://chat.example.com/").ws_url().unwrap(), "wss://chat.example.com/api/ws");
}

#[test]
fn ws_url_rejects_other_schemes() {
    let err = ClientConfig::new("ftp://example.com").ws_url().unwrap_err();
    assert!(matches!(err, ClientError::InvalidBaseUrl(url) if url == "ftp://example.com"));
}

#[test]
fn defaults_match_reconnect_policy() {
    let config = ClientConfig::default();
    assert_eq!(config.reconnect_attempts, 5);
    assert_eq!(config.reconnect_delay, Duration::from_secs(1));
    assert_eq!(config.typing_expiry, Duration::from_secs(3));
}

#[test]
fn env_parse_falls_back_on_garbage() {
    unsafe { std::env::set_var("__TEST_BOARDCHAT_CLIENT_ATTEMPTS__", "many") };
    assert_eq!(env_parse("__TEST_BOARDCHAT_CLIENT_ATTEMPTS__", 5u32), 5);
    unsafe { std::env::set_var("__TEST_BOARDCHAT_CLIENT_ATTEMPTS__", "9") };
    assert_eq!(env_parse("__TEST_BOARDCHAT_CLIENT_ATTEMPTS__", 5u32), 9);
    unsafe { std::env::remove_var("__TEST_BOARDCHAT_CLIENT_ATTEMPTS__") };
}
