pub mod cache;
pub mod config;
pub mod events;
pub mod hash;
pub mod legacy;
pub mod middleware;
pub mod payload;
pub mod projection;
pub mod store;
pub mod types;

#[cfg(any(test, feature = "testing"))]
pub mod testing;
