//! Bearer-token authentication.

pub mod middleware;
pub mod tokens;

pub use middleware::{require_bearer, AuthUser};
pub use tokens::{TokenIssuer, TokenKind, TokenPair};
