//! Host service abstractions for herald.
//!
//! The dispatch core never talks to a host runtime directly. Everything it
//! needs (who issued a command, whether they hold a permission, how to reach
//! them, where operator diagnostics go) arrives through the traits here.

pub mod memory;
pub mod services;

pub use memory::{MemoryHost, MemorySink};
pub use services::{
    DiagnosticSink, EntityService, HostServices, LogSink, MessageService, PermissionService,
    ReportLevel,
};
