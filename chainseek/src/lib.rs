// Include handlers module directly from handlers.rs
#[path = "handlers.rs"]
pub mod handlers;

// Re-export the input helpers for convenience
pub use handlers::{expand_path, load_headers, normalize_handle, parse_keywords};

// Re-export search functionality from chainseek-core
pub use chainseek_core::search::{SearchOptions, SearchOutcome, execute_search};
