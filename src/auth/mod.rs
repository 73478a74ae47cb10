//! Authentication primitives
//!
//! - JWT signing and verification for the session cookie
//! - Password hashing with Argon2

pub mod password;
pub mod token;

pub use password::{hash_password, verify_password};
pub use token::{Claims, TokenAuthority, AUTH_COOKIE};
