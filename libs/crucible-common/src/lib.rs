pub mod codec;
pub mod config;
pub mod redis;
pub mod types;
