mod error_handler;
mod page_cache;
mod rate_limit;

pub use error_handler::log_errors;
pub use page_cache::{PageCache, cache_page, no_store_headers};
pub use rate_limit::{RateLimiter, rate_limit};
