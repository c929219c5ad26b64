//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Supervisor and server produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout (plain or JSON lines)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through log events and responses
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
