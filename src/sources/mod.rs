//! Sources a container can be loaded from.

mod config_source;
mod env;
mod file;
mod value;

pub use config_source::{ConfigSource, SourceValues};
pub use env::EnvSource;
pub use file::FileSource;
pub use value::ValueSource;
