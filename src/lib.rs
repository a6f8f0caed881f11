//! Core library for radio-playlist-updater
pub mod config;
pub mod error;
pub mod models;
pub mod api;
pub mod sources;
pub mod sanitize;
pub mod pipeline;
