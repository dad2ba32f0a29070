pub mod toml_loader;

pub use toml_loader::{load_scope_catalog, parse_scope_catalog};
