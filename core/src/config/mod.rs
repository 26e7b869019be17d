mod load;
mod types;

pub use load::{default_config_path, load_default, load_from, CONFIG_ENV};
pub use types::*;
