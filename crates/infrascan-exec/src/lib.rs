//! infrascan-exec: Remote execution abstraction
//!
//! Provides the `RemoteExecutor` trait, a password-authenticated SSH executor,
//! a local shell executor and the credential fallback chain used to reach
//! fleet machines with more than one candidate login.

pub mod chain;
pub mod error;
pub mod local;
pub mod result;
pub mod ssh;
pub mod traits;

pub use chain::{ChainError, CredentialChain};
pub use error::ExecError;
pub use local::LocalExecutor;
pub use result::{CommandResult, ConnectionInfo};
pub use ssh::{HostKeyPolicy, SshExecutor};
pub use traits::RemoteExecutor;
