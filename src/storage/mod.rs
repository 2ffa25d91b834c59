pub mod config;
pub mod token_cache;
