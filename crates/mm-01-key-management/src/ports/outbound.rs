//! # Outbound Ports (Driven Ports)
//!
//! | Port | Production adapter |
//! |------|--------------------|
//! | `HardwareFingerprintProvider` | `adapters::SystemFingerprintProvider` |
//! | `KeyRotationNotifier` | node-runtime `ChannelTransport` |

use crate::domain::RotationEvent;
use async_trait::async_trait;

/// Identifies the current machine.
pub trait HardwareFingerprintProvider: Send + Sync {
    /// SHA-256 hex of machine characteristics. Stable across restarts.
    fn fingerprint(&self) -> String;
}

/// Tells clients that a key they hold was rotated.
#[async_trait]
pub trait KeyRotationNotifier: Send + Sync {
    /// Deliver one notification. Failures are logged by the caller.
    async fn notify(&self, client_id: &str, event: &RotationEvent) -> Result<(), String>;
}

/// Notifier that drops every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRotationNotifier;

#[async_trait]
impl KeyRotationNotifier for NoopRotationNotifier {
    async fn notify(&self, _client_id: &str, _event: &RotationEvent) -> Result<(), String> {
        Ok(())
    }
}

/// Fixed fingerprint for tests.
#[cfg(test)]
pub struct FixedFingerprint(pub String);

#[cfg(test)]
impl HardwareFingerprintProvider for FixedFingerprint {
    fn fingerprint(&self) -> String {
        self.0.clone()
    }
}
