//! KCM shim (Secure Core, C8).

pub mod error;
pub mod policy;
pub mod shim;

pub use error::{KcmResult, KcmStatus};
pub use shim::{delete, read, write};
