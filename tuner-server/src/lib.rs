//! HTTP and console front ends for the fretscope analyzer.

pub mod config;
pub mod logging;
pub mod server;
pub mod storage;
