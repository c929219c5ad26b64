//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → server stops accepting → in-flight requests drain → exit
//! ```
//!
//! # Design Decisions
//! - Draining waits for the supervisor's answer, not for abandoned handler
//!   tasks that outlived their deadline

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
