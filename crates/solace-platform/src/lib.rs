pub mod config;
pub mod http;
pub mod persist;
pub mod traits;

pub use config::{ClientConfig, PlatformConfig};
pub use http::HttpPlatform;
pub use persist::PersistenceMode;
pub use traits::{Authenticator, DocumentStore};
