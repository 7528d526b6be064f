pub mod backend;
pub mod backup;
pub mod codec;
pub mod commands;
pub mod config;
pub mod doctor;
pub mod error;
pub mod paths;
pub mod reload;
pub mod status;
pub mod switch;
pub mod target;
pub mod ui;

#[cfg(test)]
pub mod test_utils;
