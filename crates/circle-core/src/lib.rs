//! Donation lifecycle, projections and coordination-channel rules.
//!
//! Everything here is synchronous and free of I/O; the API and gateway crates
//! call into it with records loaded from the store.

pub mod channel;
pub mod donation;
pub mod error;
pub mod lifecycle;
pub mod location;
pub mod projection;
pub mod prompts;

pub use error::{ChannelError, LifecycleError, ValidationError};
