//! GeoIP lookup service library
//!
//! The crate centers on the database lifecycle: the update pipeline fetches
//! and atomically installs database files, the manager exposes a cached
//! lookup path over the current handle, and the scheduler keeps the data
//! fresh in the background.

pub mod cache;
pub mod config;
pub mod errors;
pub mod geoip;
pub mod models;
pub mod scheduler;
pub mod updater;
pub mod web;
