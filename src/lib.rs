pub mod analyzer;
pub mod batch;
pub mod cli;
pub mod config;
pub mod error;
pub mod ingest;
pub mod render;
pub mod segmentation;
pub mod services;
