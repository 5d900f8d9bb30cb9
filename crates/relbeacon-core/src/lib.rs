pub mod config;
pub mod logging;

pub mod download;
pub mod driver;
pub mod error;
pub mod net;
pub mod release;
pub mod resolver;
pub mod sink;
pub mod sources;
pub mod validator;
