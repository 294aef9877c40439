use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::types::CollapseConfig;

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG: &str = ".collapser.toml";

/// Config file looked up under the home directory.
pub const GLOBAL_CONFIG: &str = ".config/collapser/config.toml";

/// Where the effective configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Explicit(PathBuf),
    Local(PathBuf),
    Global(PathBuf),
    Default,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::Explicit(path) => write!(f, "{}", path.display()),
            ConfigSource::Local(path) => write!(f, "{} (local)", path.display()),
            ConfigSource::Global(path) => write!(f, "{} (global)", path.display()),
            ConfigSource::Default => f.write_str("built-in default"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: CollapseConfig,
    pub source: ConfigSource,
}

/// Resolve the configuration, first hit wins:
/// 1. `explicit` (an error if it cannot be loaded)
/// 2. `.collapser.toml` in the working directory
/// 3. `~/.config/collapser/config.toml`
/// 4. Built-in default
///
/// Implicitly discovered files that fail to load are skipped with a warning.
pub fn resolve_config(explicit: Option<&Path>) -> Result<ResolvedConfig> {
    resolve_from(explicit, Path::new("."), home_dir().as_deref())
}

fn resolve_from(
    explicit: Option<&Path>,
    cwd: &Path,
    home: Option<&Path>,
) -> Result<ResolvedConfig> {
    if let Some(path) = explicit {
        return Ok(ResolvedConfig {
            config: load_config(path)?,
            source: ConfigSource::Explicit(path.to_path_buf()),
        });
    }

    let mut candidates = vec![ConfigSource::Local(cwd.join(LOCAL_CONFIG))];
    if let Some(home) = home {
        candidates.push(ConfigSource::Global(home.join(GLOBAL_CONFIG)));
    }

    for source in candidates {
        let path = match &source {
            ConfigSource::Local(path) | ConfigSource::Global(path) => path.clone(),
            _ => continue,
        };
        if !path.is_file() {
            continue;
        }
        match load_config(&path) {
            Ok(config) => return Ok(ResolvedConfig { config, source }),
            Err(e) => eprintln!("collapser: skipping {}: {e:#}", path.display()),
        }
    }

    log::debug!("no config file found, using defaults");
    Ok(ResolvedConfig {
        config: CollapseConfig::default(),
        source: ConfigSource::Default,
    })
}

pub fn load_config(path: &Path) -> Result<CollapseConfig> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let config: CollapseConfig =
        toml::from_str(&contents).with_context(|| format!("parsing {}", path.display()))?;
    log::debug!("loaded config from {}", path.display());
    Ok(config)
}

/// Platform-aware home directory lookup.
pub fn home_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE").ok().map(PathBuf::from)
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME").ok().map(PathBuf::from)
    }
}
