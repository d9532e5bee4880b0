pub mod background;
pub mod config;
pub mod error;
pub mod notifications;
pub mod orders;
pub mod routes;
pub mod state;
pub mod store;
pub mod users;
pub mod verification;

pub use config::Config;
pub use error::{Error, Result};
pub use state::AppState;
