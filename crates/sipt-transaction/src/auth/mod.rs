//! RFC 2617 Digest authentication driven across a transaction retry chain
//! (spec.md §3 `AuthController`/`AuthHandlerDigest`, §4.6).

mod cache;
mod controller;
mod digest;

pub use cache::AuthCache;
pub use controller::AuthController;
pub use digest::{AuthHandlerDigest, DigestAnswer, DigestRequest, DynamicNonceGenerator, FixedNonceGenerator, NonceGenerator};
