extern crate self as shopkit;

pub use shopkit_macros::HttpError;

pub use http;

pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod jobs;
pub mod logging;
pub mod mail;
pub mod serve;

pub use config::{AppEnv, EnvConfig};
pub use serve::{serve, shutdown_signal};
