//! Credentials, sessions, and the authentication provider contract.

pub mod provider;
pub mod session;
pub mod token;

pub use provider::*;
pub use session::*;
pub use token::*;
