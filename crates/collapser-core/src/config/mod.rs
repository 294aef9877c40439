pub mod resolve;
pub mod types;

pub use resolve::{load_config, resolve_config, ConfigSource, ResolvedConfig};
pub use types::{CollapseConfig, NormalizeConfig};
