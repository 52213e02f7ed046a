//! Machine fingerprint from host characteristics.

use crate::ports::HardwareFingerprintProvider;
use shared_crypto::sha256_hex;
use std::fs;

const MACHINE_ID_PATHS: &[&str] = &["/etc/machine-id", "/var/lib/dbus/machine-id"];

/// Hashes hostname, machine id, OS, architecture and CPU count.
///
/// The value is computed once at construction.
#[derive(Debug, Clone)]
pub struct SystemFingerprintProvider {
    fingerprint: String,
}

impl SystemFingerprintProvider {
    /// Probe the host.
    pub fn new() -> Self {
        let components = [
            hostname(),
            machine_id(),
            std::env::consts::OS.to_string(),
            std::env::consts::ARCH.to_string(),
            num_cpus::get().to_string(),
        ];
        Self {
            fingerprint: sha256_hex(components.join("|").as_bytes()),
        }
    }
}

impl Default for SystemFingerprintProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl HardwareFingerprintProvider for SystemFingerprintProvider {
    fn fingerprint(&self) -> String {
        self.fingerprint.clone()
    }
}

fn hostname() -> String {
    fs::read_to_string("/etc/hostname")
        .map(|s| s.trim().to_string())
        .ok()
        .filter(|s| !s.is_empty())
        .or_else(|| std::env::var("HOSTNAME").ok())
        .or_else(|| std::env::var("COMPUTERNAME").ok())
        .unwrap_or_default()
}

fn machine_id() -> String {
    MACHINE_ID_PATHS
        .iter()
        .find_map(|path| fs::read_to_string(path).ok())
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}
