//! Configuration: defaults, env overrides, fail-fast validation.

use sluice::config::Config;
use std::time::Duration;

#[test]
fn defaults_describe_a_runnable_relay() {
    let config = Config::default();
    assert!(config.queue_capacity > 0);
    assert!(config.validate().is_ok());

    let policy = config.retry_policy();
    assert_eq!(policy.max_retries, 3);
    assert_eq!(policy.initial_delay, Duration::from_millis(100));
    assert_eq!(policy.max_delay, Duration::from_millis(10_000));
    assert_eq!(config.dedup_ttl(), Duration::from_secs(600));
}

#[test]
fn zero_queue_capacity_fails_validation() {
    let config = Config {
        queue_capacity: 0,
        ..Config::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn env_overrides_are_applied() {
    unsafe {
        std::env::set_var("SLUICE_MAX_RETRIES", "7");
        std::env::set_var("SLUICE_INITIAL_DELAY_MS", "250");
    }

    let config = Config::from_env().unwrap();
    assert_eq!(config.max_retries, 7);
    assert_eq!(config.initial_delay_ms, 250);

    unsafe {
        std::env::remove_var("SLUICE_MAX_RETRIES");
        std::env::remove_var("SLUICE_INITIAL_DELAY_MS");
    }
}

#[test]
fn malformed_env_value_is_a_config_error() {
    unsafe {
        std::env::set_var("SLUICE_DEDUP_TTL_SECS", "ten minutes");
    }

    let result = Config::from_env();
    assert!(result.is_err());

    unsafe {
        std::env::remove_var("SLUICE_DEDUP_TTL_SECS");
    }
}
