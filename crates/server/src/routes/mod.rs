//! Route handlers, one module per endpoint.

pub mod cache;
pub mod compress;
pub mod extensions;
pub mod health;
pub mod proxy;
