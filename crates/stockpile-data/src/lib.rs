pub mod config;
pub mod content;
pub mod dependents;
pub mod groups;
pub mod item;
pub mod loader;
pub mod migration;
pub mod pipeline;
pub mod pockets;
pub mod reader;
pub mod slots;
pub mod vocab;

pub use config::{OptionsError, load_options};
pub use content::{ContentLoader, LoadReport};
pub use loader::LoadError;
pub use pipeline::{BuildError, LoadedCatalog, load_catalog};
