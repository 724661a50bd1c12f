//! Typed, TOML-backed node configuration: committee parameters, timer
//! cadence, the admin HTTP bind address, the datadir, and the set of
//! chains to preload and activate at startup.

pub mod config;

pub use config::Config;
