pub mod config;
pub mod error;
pub mod paths;
pub mod types;

pub use error::{CoreError, CoreResult};
pub use types::{Direction, KeyFormat, CONTAINER_EXTENSION, KEY_EXTENSION, KEY_LEN};
