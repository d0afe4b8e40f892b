pub mod allocation;
pub mod config;
pub mod errors; // Structured error handling
pub mod journal; // Shared JSONL journals
pub mod logger;
pub mod market;
pub mod mode;
pub mod observer;
pub mod paths;
pub mod pipeline;
pub mod run;
pub mod scoring;
pub mod shutdown;
pub mod signals;
pub mod types;
pub mod version;
