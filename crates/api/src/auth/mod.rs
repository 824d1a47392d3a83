//! Bearer token handling.
//!
//! Tokens are issued by the sign-in service; the API only validates them.

pub mod jwt;
