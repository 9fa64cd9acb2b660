pub mod api;
pub mod domain;
pub mod infrastructure;
pub mod repository;
pub mod services;
pub mod telemetry;
