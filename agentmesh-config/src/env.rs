//! Small helpers for reading typed values out of the process environment,
//! falling back to a default and logging a warning on any parse failure
//! rather than failing configuration loading outright.

use std::env;
use std::time::Duration;

use tracing::warn;

pub(crate) fn string(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

pub(crate) fn bool_with_default(key: &str, default: bool) -> bool {
    match env::var(key) {
        Err(_) => default,
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => {
                warn!(key, value = %raw, default, "unrecognized boolean env var, using default");
                default
            }
        },
    }
}

pub(crate) fn u16_with_default(key: &str, default: u16) -> u16 {
    match env::var(key) {
        Err(_) => default,
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, default, "invalid port env var, using default");
            default
        }),
    }
}

pub(crate) fn seconds_with_default(key: &str, default_secs: f64) -> Duration {
    match env::var(key) {
        Err(_) => Duration::from_secs_f64(default_secs),
        Ok(raw) => match raw.trim().parse::<f64>() {
            Ok(secs) if secs.is_finite() && secs >= 0.0 => Duration::from_secs_f64(secs),
            _ => {
                warn!(key, value = %raw, default_secs, "invalid duration env var, using default");
                Duration::from_secs_f64(default_secs)
            }
        },
    }
}

pub(crate) fn string_with_default(key: &str, default: &str) -> String {
    string(key).unwrap_or_else(|| default.to_owned())
}
