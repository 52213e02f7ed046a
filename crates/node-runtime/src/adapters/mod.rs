//! # Adapter Implementations
//!
//! Concrete implementations of the subsystems' outbound ports, each backed by
//! another subsystem or by node-local infrastructure.
//!
//! ```text
//! ┌───────────────────────┬──────────────────────────┬─────────────────────────┐
//! │ Port (owner)          │ Adapter                  │ Backed by               │
//! ├───────────────────────┼──────────────────────────┼─────────────────────────┤
//! │ IdentityVerifier (5)  │ CertificateIdentity...   │ AuthenticationManager   │
//! │ ResourceReserver (5)  │ AllocatorReserver        │ ResourceAllocator       │
//! │ LicenseValidator (5,1)│ StoreLicenseTable        │ KeyValueStore           │
//! │ TransferKeyProvider(6)│ ManagedTransferKeys      │ KeyManager              │
//! │ LinkMonitor (6)       │ RecoveryLinkMonitor      │ ConnectionRecovery      │
//! │ BlockTransport (6)    │ ChannelTransport         │ tokio mpsc + oneshot    │
//! │ KeyRotationNotifier(1)│ ChannelTransport         │ tokio mpsc              │
//! │ ConnectionProbe (4)   │ ChannelProbe             │ ChannelTransport        │
//! └───────────────────────┴──────────────────────────┴─────────────────────────┘
//! ```

pub mod identity;
pub mod keys;
pub mod license;
pub mod link;
pub mod reserver;
pub mod transport;

pub use identity::CertificateIdentityVerifier;
pub use keys::ManagedTransferKeys;
pub use license::{LicenseGrant, LicenseImportError, StoreLicenseTable, LICENSES_COLLECTION};
pub use link::RecoveryLinkMonitor;
pub use reserver::{request_priority, AllocatorReserver, ReservationPolicy};
pub use transport::{ChannelProbe, ChannelTransport, Frame, DEFAULT_FRAME_CAPACITY};
