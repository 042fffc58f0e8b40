pub mod ingest;
pub mod toml_loader;

pub use ingest::{parse_encoded_options, RawOptions, RawQuestion};
pub use toml_loader::{load_pool_dir, load_pool_file};
