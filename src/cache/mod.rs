//! Home-page response cache.
//!
//! Caches the rendered home page for a fixed TTL, keyed by path, query and
//! the request's `Cookie` header, so a signed-in user and an anonymous
//! visitor never share an entry. Invalidation is purely time-based: within
//! the TTL window a hit returns the stored byte-for-byte response even if
//! posts changed underneath it.
//!
//! ```toml
//! [cache]
//! enabled = true
//! ttl_seconds = 20
//! response_limit = 200
//! ```

mod config;
mod keys;
mod lock;
mod middleware;
mod store;

pub use config::CacheConfig;
pub use keys::{ResponseKey, hash_cookie_header, hash_query};
pub use middleware::{CacheState, response_cache_layer};
pub use store::{CachedResponse, ResponseStore};
