//! Digest auth data types shared by the parser and `sipt-transaction`'s
//! `AuthController`/`AuthHandlerDigest` (spec.md §3, §4.6).

pub mod challenge;
pub mod credentials;
pub mod params;

pub use challenge::Challenge;
pub use credentials::{AuthOrigin, Credentials};
pub use params::{Algorithm, Qop};
