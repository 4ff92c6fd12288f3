pub mod context;
pub mod error;

pub use context::{build_http_client, AppContext};
pub use error::{Result, SkyhookError};
