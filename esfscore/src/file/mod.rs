//! File lifecycle API (Secure Core, C6).

pub mod error;
pub mod handle;
pub mod lifecycle;

pub use error::{EsfsError, EsfsResult};
pub use handle::{FileHandle, OpenMode, SeekOrigin};
pub use lifecycle::{Storage, StorageCore};
