//! Client side of PI's General Command Set (GCS 2.0).
//!
//! GCS is a line-oriented ASCII protocol: three-letter commands (`MOV`,
//! `SVO`), queries with a trailing `?` (`POS?`), answers of the form
//! `<axis>=<value>`. After every command the client polls `ERR?` to learn
//! whether the controller accepted it.

pub mod codec;
pub mod device;
pub mod e754;
pub mod error;

pub use device::{GcsDevice, DEFAULT_PORT, DEFAULT_TIMEOUT};
pub use e754::E754;
pub use error::{GcsError, GcsResult};
