//! Availability probing for backends

use std::time::Duration;

use tracing::debug;

use crate::gateway::backend::Backend;

/// Minimum plausible length of a provider API key
pub const MIN_CREDENTIAL_LEN: usize = 20;

const PLACEHOLDER_CREDENTIALS: &[&str] = &["your_api_key_here", "your-api-key-here", "changeme"];

/// Whether an API key looks real: present, not a placeholder, long enough
pub fn is_credential_valid(key: Option<&str>) -> bool {
    let Some(key) = key.map(str::trim) else {
        return false;
    };

    !PLACEHOLDER_CREDENTIALS
        .iter()
        .any(|placeholder| key.eq_ignore_ascii_case(placeholder))
        && key.len() >= MIN_CREDENTIAL_LEN
}

/// Decides whether a backend is usable right now
#[derive(Debug, Clone, Copy)]
pub struct AvailabilityProber {
    timeout: Duration,
}

impl AvailabilityProber {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Static configuration gate, then a time-bounded probe when required
    ///
    /// Never fails: probe errors, non-success statuses and timeouts all
    /// collapse to `false`.
    pub async fn is_available(&self, backend: &dyn Backend) -> bool {
        if !backend.is_configured() {
            debug!("Backend {} is not configured", backend.name());
            return false;
        }

        if !backend.requires_probe() {
            return true;
        }

        match tokio::time::timeout(self.timeout, backend.probe()).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                debug!("Backend {} probe failed: {}", backend.name(), e);
                false
            }
            Err(_) => {
                debug!(
                    "Backend {} probe timed out after {:?}",
                    backend.name(),
                    self.timeout
                );
                false
            }
        }
    }
}
