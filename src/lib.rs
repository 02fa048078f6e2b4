pub mod booking;
pub mod calendar;
pub mod config;
pub mod engine;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod planner;
pub mod ports;
pub mod store;
pub mod wal;
