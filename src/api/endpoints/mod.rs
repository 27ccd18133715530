//! HTTP endpoint handlers, grouped by portal.

pub mod admin;
pub mod auth;
pub mod dashboard;
pub mod doctor;
pub mod patient;
