//! infrascan-api: Shared record types
//!
//! Contains the value records produced by one scan (hosts, guests, workloads,
//! storage pools, network interfaces), the scan run bookkeeping and the
//! non-fatal scan error log entries. Every other crate in the workspace speaks
//! in these types.

pub mod errors;
pub mod records;
pub mod run;

pub use errors::{ScanComponent, ScanError};
pub use records::{
    GuestKind, GuestRecord, HostSnapshot, NetworkInterfaceRecord, ResourceUsage, ScanDataset,
    StorageRecord, WorkloadRecord, WorkloadState,
};
pub use run::{RunCounts, RunId, RunStatus, ScanRun};
