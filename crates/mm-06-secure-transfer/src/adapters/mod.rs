//! Adapters for driven ports.

pub mod staging;

pub use staging::{StagedBlock, StoreStagingArea, STAGED_BLOCKS_COLLECTION};
