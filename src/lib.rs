pub mod cache;
pub mod commands;
pub mod config;
pub mod controls;
pub mod output;
pub mod telegram;
pub mod wire;
