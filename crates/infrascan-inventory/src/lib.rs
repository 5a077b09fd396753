//! infrascan-inventory: workload and address discovery
//!
//! Collects container-engine workloads over a remote shell, derives guest
//! IPv4 addresses from the hypervisor API and turns a hub's update entities
//! into add-on workload records.

pub mod containers;
pub mod error;
pub mod guest_address;
pub mod hub;

pub use containers::{ContainerInventory, ContainerScan};
pub use error::{HubCollectError, InventoryError};
pub use guest_address::GuestAddressResolver;
pub use hub::HubCollector;
