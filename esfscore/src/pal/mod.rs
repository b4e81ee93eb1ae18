//! Platform abstraction layer (Secure Core, C1).
//!
//! The concrete bindings to mbed TLS, BSD sockets, and RTOS threading
//! are out of scope; this module specifies only the
//! capability surface the storage core consumes: filesystem, crypto
//! primitives, a CSPRNG, a clock, and device-key derivation.

pub mod clock;
pub mod crypto;
pub mod fs;
pub mod mem_fs;
pub mod rng;
pub mod rot;

pub use clock::{Clock, InstantClock, SystemClock};
pub use fs::{FileSystem, FsFile, Partition};
pub use mem_fs::MemFileSystem;
pub use rng::{Csprng, FixedRng, OsCsprng};
pub use rot::DeviceRoot;
