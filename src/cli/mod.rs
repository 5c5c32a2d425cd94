pub mod config;
pub mod evidence;
pub mod server;
