pub mod cli;
pub mod cognito;
pub mod commands;
pub mod config;
pub mod constants;
pub mod session;
