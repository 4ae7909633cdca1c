pub mod commands;
pub mod config;
pub mod http;
pub mod mirror;
pub mod package;
pub mod registry;
pub mod resolver;
pub mod runtime;
pub mod satis;
pub mod set;
pub mod work;
