//! Ports for the resource allocation subsystem.

pub mod inbound;

pub use inbound::ResourceAllocationApi;
