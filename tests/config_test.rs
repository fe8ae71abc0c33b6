use std::{collections::HashMap, time::Duration};

use playlist_tuner::config::{Config, DEFAULT_API_URL, DEFAULT_SERVER_ADDRESS};
use playlist_tuner::error::AppError;

fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key: &str| map.get(key).cloned()
}

const REQUIRED: [(&str, &str); 4] = [
    ("SPOTIFY_CLIENT_ID", "client-id"),
    ("SPOTIFY_CLIENT_SECRET", "client-secret"),
    ("SPOTIFY_REDIRECT_URI", "http://127.0.0.1:8080/callback"),
    ("SESSION_SECRET", "a very secret value"),
];

#[test]
fn test_defaults_apply_to_optional_settings() {
    let config = Config::from_lookup(lookup(&REQUIRED)).unwrap();

    assert_eq!(config.client_id, "client-id");
    assert_eq!(config.server_address, DEFAULT_SERVER_ADDRESS);
    assert_eq!(config.api_url, DEFAULT_API_URL);
    assert_eq!(config.session_lifetime_hours, 24);
    assert_eq!(config.rate_limit_per_minute, 100);
    assert_eq!(config.feature_batch_size, 50);
    assert_eq!(config.batch_delay, Duration::from_secs(1));
    assert_eq!(config.upstream_timeout, Duration::from_secs(30));
    assert_eq!(config.upstream_max_attempts, 3);
    assert_eq!(config.upstream_backoff, Duration::from_secs(1));
}

#[test]
fn test_every_missing_variable_is_named() {
    let err = Config::from_lookup(lookup(&[
        ("SPOTIFY_CLIENT_ID", "client-id"),
        ("SPOTIFY_REDIRECT_URI", "   "),
    ]))
    .unwrap_err();

    let AppError::Config(message) = err else {
        panic!("expected a configuration error, got {:?}", err);
    };
    assert!(message.contains("SPOTIFY_CLIENT_SECRET"));
    assert!(message.contains("SPOTIFY_REDIRECT_URI"));
    assert!(message.contains("SESSION_SECRET"));
    assert!(!message.contains("SPOTIFY_CLIENT_ID"));
}

#[test]
fn test_overrides_are_parsed() {
    let mut vars = REQUIRED.to_vec();
    vars.extend([
        ("SERVER_ADDRESS", "0.0.0.0:9000"),
        ("SPOTIFY_API_URL", "http://localhost:3000/v1/"),
        ("RATE_LIMIT_PER_MINUTE", "10"),
        ("FEATURE_BATCH_SIZE", "100"),
        ("BATCH_DELAY_MS", "0"),
        ("UPSTREAM_MAX_ATTEMPTS", "5"),
    ]);
    let config = Config::from_lookup(lookup(&vars)).unwrap();

    assert_eq!(config.server_address, "0.0.0.0:9000");
    assert_eq!(config.api_url, "http://localhost:3000/v1");
    assert_eq!(config.rate_limit_per_minute, 10);
    assert_eq!(config.feature_batch_size, 100);
    assert_eq!(config.batch_delay, Duration::ZERO);
    assert_eq!(config.upstream_max_attempts, 5);
}

#[test]
fn test_invalid_values_are_rejected() {
    for (key, value) in [
        ("FEATURE_BATCH_SIZE", "0"),
        ("FEATURE_BATCH_SIZE", "101"),
        ("RATE_LIMIT_PER_MINUTE", "lots"),
        ("UPSTREAM_MAX_ATTEMPTS", "0"),
    ] {
        let mut vars = REQUIRED.to_vec();
        vars.push((key, value));
        let result = Config::from_lookup(lookup(&vars));
        assert!(
            matches!(result, Err(AppError::Config(_))),
            "{}={} should be rejected",
            key,
            value
        );
    }
}
