pub mod check_config;
pub mod export;
pub mod list;
