//! Headless host for the `sm83-core` CPU.
//!
//! Loads a raw program image into a flat address space with a serial port,
//! runs it, and reports how execution ended.

/// Runner settings and their TOML file.
pub mod config;

/// Stepping loop and stop conditions.
pub mod runner;

/// Serial-capturing bus.
pub mod serial;
