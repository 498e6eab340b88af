//! Shared ring buffer, error taxonomy and counters for the bridge and the
//! generator binaries.

pub mod cid;
pub mod constants;
pub mod counters;
pub mod error;
pub mod ring;

pub use cid::default_container_id;
pub use counters::Counters;
pub use error::{Result, SgError};
pub use ring::{Ring, RingGuard, Slot};
