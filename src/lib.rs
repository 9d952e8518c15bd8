pub mod baseline_store;
pub mod capture;
pub mod configuration;
pub mod controller;
pub mod discovery;
pub mod error_handling;
pub mod reporting;
