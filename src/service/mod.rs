//! Narrative REST Service
//!
//! Exposes reading sessions and shared-path replay over HTTP.
//!
//! ## Endpoints
//!
//! - `POST /api/sessions` - Start a reading or preview session
//! - `GET /api/sessions/:id` - Current session snapshot
//! - `POST /api/sessions/:id/choose` - Apply a choice
//! - `POST /api/sessions/:id/finish` - Finish from an ending
//! - `POST /api/sessions/:id/restart` - Start over from the first part
//! - `DELETE /api/sessions/:id` - Leave a session
//! - `POST /api/replay` - Replay a shared path
//! - `GET /health` - Detailed service health check
//! - `GET /health/live` - Liveness probe
//! - `GET /health/ready` - Readiness probe

pub mod middleware;
pub mod routes;
pub mod state;

pub use middleware::{metrics_middleware, record_session_event};
pub use routes::create_router;
pub use state::{ServiceState, SessionHandle, SessionRegistry};
