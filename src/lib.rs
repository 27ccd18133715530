pub mod api;
pub mod app_state;
pub mod auth;
pub mod config;
pub mod db;
pub mod models;
pub mod registration;
pub mod scheduler;
pub mod tips;
