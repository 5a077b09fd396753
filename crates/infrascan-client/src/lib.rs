//! infrascan-client: REST clients for hypervisor and hub APIs
//!
//! Provides an authenticated client for a hypervisor's management API
//! (ticket login, read-only `data` calls) and a bearer-token client for a
//! smart-home hub's state API. Both sit behind small traits so scanners can
//! be exercised without a network.
//!
//! # Examples
//!
//! ```no_run
//! use infrascan_client::{ManagementApi, PveClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = PveClient::login("192.168.1.10", 8006, "root@pam", "secret", true).await?;
//! let nodes = client.get("/nodes").await?;
//! println!("{nodes}");
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod http;
pub mod hub;
pub mod pve;
pub mod traits;

pub use error::{ClientError, Result};
pub use hub::{HubClient, HubEntityState, HubInstanceConfig};
pub use pve::{AuthSession, PveClient};
pub use traits::{HubApi, ManagementApi};
