//! backstopper - BackstopJS scenario generation and progress monitoring.
//!
//! Builds `backstop.json` from URL lists, sitemaps and Puppeteer recordings,
//! and runs BackstopJS with a live progress bar.

pub mod backstop;
pub mod config;
pub mod discovery;
pub mod progress;
pub mod recording;
pub mod sources;
