pub mod admin_gate;
pub mod middleware;
pub mod session_service;

pub use admin_gate::AdminGate;
pub use middleware::{AdminGuard, TokenExt, ADMIN_TOKEN_HEADER};
pub use session_service::{token_digest, ActiveSession, SessionService};
