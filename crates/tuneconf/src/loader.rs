//! Config file discovery, loading, and environment variable overlay.

use crate::{ConfigError, TuneConfig};
use std::env;
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files, optionally with a CLI override path.
///
/// Returns existing paths in load order (system, user, local/cli). An
/// explicit `cli_path` replaces the local override and must exist.
pub fn discover_config_files_with_override(
    cli_path: Option<&Path>,
) -> Result<Vec<PathBuf>, ConfigError> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/tunestep/config.toml");
    if system.exists() {
        files.push(system);
    }

    // XDG_CONFIG_HOME or ~/.config
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("tunestep/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        if !path.exists() {
            return Err(ConfigError::FileRead {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
            });
        }
        files.push(path.to_path_buf());
        return Ok(files);
    }

    let local = PathBuf::from("tunestep.toml");
    if local.exists() {
        files.push(local);
    }

    Ok(files)
}

/// Overlay the keys set in a TOML file onto `config`.
pub fn load_from_file(config: &mut TuneConfig, path: &Path) -> Result<(), ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    *config = overlay_toml(config, &contents, path)?;
    Ok(())
}

/// Parse `contents` and lay it over `base`, key by key.
fn overlay_toml(base: &TuneConfig, contents: &str, path: &Path) -> Result<TuneConfig, ConfigError> {
    let parse_error = |message: String| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    };

    let overlay: toml::Table = contents
        .parse()
        .map_err(|e: toml::de::Error| parse_error(e.to_string()))?;

    let mut merged = match toml::Value::try_from(base) {
        Ok(toml::Value::Table(table)) => table,
        Ok(_) => return Err(parse_error("config did not serialize as a table".to_string())),
        Err(e) => return Err(parse_error(e.to_string())),
    };
    merge_tables(&mut merged, overlay);

    let mut config: TuneConfig = toml::Value::Table(merged)
        .try_into()
        .map_err(|e: toml::de::Error| parse_error(e.to_string()))?;
    expand_paths(&mut config);
    Ok(config)
}

/// Recursively merge `overlay` into `base`; non-table values replace.
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match value {
            toml::Value::Table(nested) => match base.get_mut(&key) {
                Some(toml::Value::Table(existing)) => merge_tables(existing, nested),
                _ => {
                    base.insert(key, toml::Value::Table(nested));
                }
            },
            value => {
                base.insert(key, value);
            }
        }
    }
}

fn expand_paths(config: &mut TuneConfig) {
    let paths = &mut config.paths;
    for path in [
        &mut paths.dataset_dir,
        &mut paths.corpus_file,
        &mut paths.vocab_file,
        &mut paths.model_file,
    ] {
        if let Some(s) = path.to_str() {
            *path = expand_path(s);
        }
    }
}

/// Apply environment variable overrides to config.
pub fn apply_env_overrides(
    config: &mut TuneConfig,
    sources: &mut ConfigSources,
) -> Result<(), ConfigError> {
    apply_env_vars(config, sources, env::vars())
}

/// Apply overrides from an explicit variable list.
pub fn apply_env_vars<I>(
    config: &mut TuneConfig,
    sources: &mut ConfigSources,
    vars: I,
) -> Result<(), ConfigError>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut rust_log = None;

    for (key, value) in vars {
        match key.as_str() {
            "TUNESTEP_DATASET_DIR" => config.paths.dataset_dir = expand_path(&value),
            "TUNESTEP_CORPUS_FILE" => config.paths.corpus_file = expand_path(&value),
            "TUNESTEP_VOCAB_FILE" => config.paths.vocab_file = expand_path(&value),
            "TUNESTEP_MODEL_FILE" => config.paths.model_file = expand_path(&value),
            "TUNESTEP_TIME_STEP" => config.encoding.time_step = parse_var(&key, &value)?,
            "TUNESTEP_SEQUENCE_LENGTH" => {
                config.encoding.sequence_length = parse_var(&key, &value)?
            }
            "TUNESTEP_NUM_STEPS" => config.generation.num_steps = parse_var(&key, &value)?,
            "TUNESTEP_MAX_CONTEXT_LENGTH" => {
                config.generation.max_context_length = parse_var(&key, &value)?
            }
            "TUNESTEP_TEMPERATURE" => config.generation.temperature = parse_var(&key, &value)?,
            "TUNESTEP_NGRAM_ORDER" => config.generation.ngram_order = parse_var(&key, &value)?,
            "TUNESTEP_TEMPO_BPM" => config.generation.tempo_bpm = parse_var(&key, &value)?,
            "TUNESTEP_RNG_SEED" => config.generation.rng_seed = Some(parse_var(&key, &value)?),
            "TUNESTEP_LOG_LEVEL" => config.telemetry.log_level = value,
            "RUST_LOG" => {
                rust_log = Some(value);
                continue;
            }
            _ => continue,
        }
        sources.env_overrides.push(key);
    }

    // RUST_LOG wins over TUNESTEP_LOG_LEVEL regardless of iteration order.
    if let Some(value) = rust_log {
        config.telemetry.log_level = value;
        sources.env_overrides.push("RUST_LOG".to_string());
    }

    Ok(())
}

fn parse_var<T: std::str::FromStr>(var: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Env {
        var: var.to_string(),
        value: value.to_string(),
    })
}

/// Expand `~/` and a leading `$VAR` in a path.
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        return match directories::BaseDirs::new() {
            Some(dirs) => dirs.home_dir().join(stripped),
            None => PathBuf::from(path),
        };
    }

    if let Some(stripped) = path.strip_prefix('$') {
        let (var_name, rest) = match stripped.find('/') {
            Some(slash) => (&stripped[..slash], Some(&stripped[slash + 1..])),
            None => (stripped, None),
        };
        return match (env::var(var_name), rest) {
            (Ok(value), Some(rest)) => PathBuf::from(value).join(rest),
            (Ok(value), None) => PathBuf::from(value),
            (Err(_), _) => PathBuf::from(path),
        };
    }

    PathBuf::from(path)
}
