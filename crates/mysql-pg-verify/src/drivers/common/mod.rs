//! Utilities shared by both drivers.
//!
//! - [`tls`]: rustls connector for PostgreSQL
//! - [`guard`]: per-query timeout and retry decorator

pub mod guard;
pub mod tls;

pub use guard::GuardedExecutor;
pub use tls::{SslMode, TlsBuilder};
