pub mod config;
pub mod validate;
pub mod utils;
pub mod http_client;
pub mod concurrent;
pub mod discover;
pub mod probe;
pub mod external;
pub mod parse;
pub mod output;

// re-export the types callers touch most
pub use crate::config::ReconConfig;
pub use crate::validate::{validate_domain, validate_ipv4, validate_url, Target, ValidationError};
