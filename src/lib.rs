pub mod api;
pub mod cache;
pub mod config;
pub mod engine;
pub mod fetcher;
pub mod ident;
pub mod init;
pub mod resolver;
pub mod settings;
pub mod stats;
