pub mod api;
pub mod app;
pub mod clean;
pub mod config;
pub mod forecast;
pub mod ingest;
pub mod models;
pub mod pipeline;
pub mod presenter;
pub mod services;
