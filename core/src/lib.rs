//! Shared pieces of cdefgen: the configuration model, log setup and test helpers.

pub mod config;
pub mod logging;
pub mod test_util;
