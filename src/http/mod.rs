//! HTTP serving subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, route table)
//!     → supervisor.rs (deadline, panic isolation, single response)
//!         → request.rs (context handed to the handler)
//!         → handler
//!     → response.rs (JSON envelope, write-once sink)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;
pub mod supervisor;

pub use request::{RequestContext, RequestContextExt, X_REQUEST_ID, X_ROUTE_PATH};
pub use response::{status_for, JsonResponse, ResponseWriter};
pub use server::{HttpServer, Routes};
pub use supervisor::{panic_response, Handle, PanicPayload, Supervisor, SupervisorStats};
