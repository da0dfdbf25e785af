//! Foundation types for herald.
//!
//! This crate contains the host-agnostic types shared by every herald crate:
//! source identities, the closed set of platform sources, user-facing
//! messages, and the error taxonomy.

pub mod error;
pub mod id;
pub mod message;
pub mod source;

pub use error::{ErrorKind, ExecutionFailure, HeraldError, Result};
pub use id::SourceId;
pub use message::{Message, Tone};
pub use source::PlatformSource;
