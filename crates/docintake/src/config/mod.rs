pub mod loader;
pub mod schema;

pub use loader::{default_config_path, load_config, parse_config, ConfigFormat};
pub use schema::{
    BlobStoreConfig, CategoryPolicy, Config, ExtractionProfile, FieldPattern, HttpParserConfig,
    LogFormat, LoggingConfig, ParserConfig, ProgressConfig,
};
