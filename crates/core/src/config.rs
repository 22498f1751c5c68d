//! Client runtime configuration.
//!
//! Configuration is resolved once at process startup and passed into the HTTP client and the
//! edit coordinator. Nothing in this crate reads environment variables while an operation is
//! running; the `*_from_env_value` helpers take the raw value so the binary decides where it
//! comes from.

use crate::constants::{
    DEFAULT_BASE_URL, DEFAULT_POLL_INTERVAL_MS, DEFAULT_REQUEST_TIMEOUT_SECS,
};
use crate::{DriveError, DriveResult};
use std::time::Duration;
use url::Url;

/// Client configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    base_url: Url,
    poll_interval: Duration,
    edit_timeout: Option<Duration>,
    request_timeout: Duration,
}

impl ClientConfig {
    /// Create a new `ClientConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`DriveError::InvalidConfig`] if:
    /// - `base_url` is not an `http`/`https` URL that can carry paths
    /// - `poll_interval` or `request_timeout` is zero
    /// - `edit_timeout` is shorter than `poll_interval`
    pub fn new(
        base_url: Url,
        poll_interval: Duration,
        edit_timeout: Option<Duration>,
        request_timeout: Duration,
    ) -> DriveResult<Self> {
        if !matches!(base_url.scheme(), "http" | "https") || base_url.cannot_be_a_base() {
            return Err(DriveError::InvalidConfig(format!(
                "base URL must be an http(s) URL, got {base_url}"
            )));
        }
        if poll_interval.is_zero() {
            return Err(DriveError::InvalidConfig(
                "poll interval cannot be zero".into(),
            ));
        }
        if request_timeout.is_zero() {
            return Err(DriveError::InvalidConfig(
                "request timeout cannot be zero".into(),
            ));
        }
        if let Some(timeout) = edit_timeout {
            if timeout < poll_interval {
                return Err(DriveError::InvalidConfig(
                    "edit timeout must not be shorter than the poll interval".into(),
                ));
            }
        }

        Ok(Self {
            base_url: with_trailing_slash(base_url),
            poll_interval,
            edit_timeout,
            request_timeout,
        })
    }

    /// Configuration pointing at `base_url` with every other setting at its default.
    pub fn with_base_url(base_url: Url) -> DriveResult<Self> {
        Self::new(
            base_url,
            Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            None,
            Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }

    /// Base URL of the backend, always ending in `/`.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn edit_timeout(&self) -> Option<Duration> {
        self.edit_timeout
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Returns a copy with a different poll interval, re-validated.
    pub fn with_poll_interval(self, poll_interval: Duration) -> DriveResult<Self> {
        Self::new(
            self.base_url,
            poll_interval,
            self.edit_timeout,
            self.request_timeout,
        )
    }

    /// Returns a copy with a different edit timeout, re-validated.
    pub fn with_edit_timeout(self, edit_timeout: Option<Duration>) -> DriveResult<Self> {
        Self::new(
            self.base_url,
            self.poll_interval,
            edit_timeout,
            self.request_timeout,
        )
    }
}

// `Url::join` replaces the last segment unless the base ends in `/`.
fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse the backend base URL from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns [`DEFAULT_BASE_URL`].
pub fn base_url_from_env_value(value: Option<String>) -> DriveResult<Url> {
    let raw = trimmed(value).unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
    Ok(Url::parse(&raw)?)
}

/// Parse a millisecond duration, falling back to `default_ms` when unset.
pub fn millis_from_env_value(value: Option<String>, default_ms: u64) -> DriveResult<Duration> {
    match trimmed(value) {
        None => Ok(Duration::from_millis(default_ms)),
        Some(v) => v.parse::<u64>().map(Duration::from_millis).map_err(|e| {
            DriveError::InvalidConfig(format!("expected milliseconds, got {v:?}: {e}"))
        }),
    }
}

/// Parse an optional duration in whole seconds; unset means "no limit".
pub fn optional_secs_from_env_value(value: Option<String>) -> DriveResult<Option<Duration>> {
    trimmed(value)
        .map(|v| {
            v.parse::<u64>().map(Duration::from_secs).map_err(|e| {
                DriveError::InvalidConfig(format!("expected seconds, got {v:?}: {e}"))
            })
        })
        .transpose()
}

/// Split a foreground surface command into program and leading arguments.
///
/// Returns `None` if `value` is `None` or empty/whitespace; callers then fall back to the
/// desktop launcher ([`DEFAULT_LAUNCHER_COMMAND`](crate::constants::DEFAULT_LAUNCHER_COMMAND))
/// with an explicit end-of-editing signal.
pub fn surface_command_from_env_value(value: Option<String>) -> Option<(String, Vec<String>)> {
    let raw = trimmed(value)?;
    let mut parts = raw.split_whitespace().map(str::to_string);
    let program = parts.next()?;
    Some((program, parts.collect()))
}
