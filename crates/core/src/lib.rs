pub mod config;
pub mod paths;

pub use config::{AwsConfig, Config};
pub use paths::{s3_path_join, S3Uri, S3UriError};
