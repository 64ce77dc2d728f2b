//! # bff-session
//!
//! Server-side ledgers bridging the OAuth flow: short-lived
//! pending-authorization records keyed by `state`, and long-lived sessions
//! keyed by an opaque high-entropy id. Both live in the `bff-store`
//! abstraction; the browser only ever holds the session id, inside an
//! HttpOnly cookie set by the server.

#![warn(clippy::all)]

pub mod errors;
pub mod pending;
pub mod session;
pub mod types;

pub use errors::{Result, SessionError};
pub use pending::PendingLedger;
pub use session::SessionLedger;
pub use types::{PendingAuthorization, SessionRecord, SessionTokens};
