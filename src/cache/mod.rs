//! Cache module - read-through caching with Moka.
//!
//! Repositories own their caches and invalidate them on every write,
//! so a cache never outlives the data it mirrors in this process.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let settings: TypedCache<i64, ChatSettings> =
//!     TypedCache::new("chat_settings", CacheConfig::chat_settings());
//!
//! settings.insert(chat_id, value);
//! let value = settings.get(&chat_id);
//! ```

mod config;
mod typed;

pub use config::CacheConfig;
pub use typed::TypedCache;
