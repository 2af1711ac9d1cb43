pub mod config;
pub mod debounce;
pub mod error;
pub mod limiter;
pub mod models;
pub mod rank;
pub mod storage;
