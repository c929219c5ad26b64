//! sense-backend execution core.
//!
//! Runs request handlers under a hard deadline with panic isolation, and
//! provides causally linked errors that carry the call stack of their origin.

// Core subsystems
pub mod config;
pub mod errors;
pub mod http;
pub mod pool;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::schema::AppConfig;
pub use errors::{ErrChain, ErrorType, ResultExt};
pub use http::{HttpServer, JsonResponse, ResponseWriter, Routes};
pub use lifecycle::Shutdown;
pub use pool::Pools;
