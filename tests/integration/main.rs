//! Integration test suite
//!
//! Exercises the public API end to end: real HTTP crawls against wiremock,
//! full audits over in-memory sites, and configuration loading from disk.

mod audit_tests;
mod config_tests;
mod crawl_tests;
mod style_tests;
