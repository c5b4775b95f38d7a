//! Session store adapters.
//!
//! - `RedisSessionStore` - durable store with TTL-based expiry
//! - `InMemorySessionStore` - serialize-through store for tests and dev

mod memory_store;
mod redis_store;

pub use memory_store::InMemorySessionStore;
pub use redis_store::RedisSessionStore;
