//! Authentication and portal authorization: password credentials, opaque
//! session tokens, and the per-portal access gate.

pub mod credentials;
pub mod gate;
pub mod session;

pub use credentials::CredentialError;
pub use gate::{authorize, GateRejection, RejectionKind};
pub use session::SessionStore;
