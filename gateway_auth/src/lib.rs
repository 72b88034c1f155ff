//! File-backed API key store and sliding-window rate limiter.
//!
//! [`Authenticator`] is the single entry point request handlers use; it
//! composes [`store::KeyStore`] (atomic hot-reload) and
//! [`rate_limiter::RateLimiter`] (per-identity sliding window) per the
//! authentication contract in the component design.

pub mod authenticator;
pub mod constant_time;
pub mod error;
pub mod key;
pub mod rate_limiter;
pub mod store;

pub use authenticator::{ Authenticated, Authenticator };
pub use error::{ AuthError, Result };
pub use key::ApiKey;
pub use rate_limiter::RateLimiter;
pub use store::KeyStore;
