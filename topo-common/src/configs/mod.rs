use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("I/O error reading settings: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// A structure to hold environment settings. Backed by a settings.json file,
/// by default in the current working directory.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub verbose_mode: bool,
    /// Upper bound on worker threads; zero or negative means every logical CPU.
    pub max_procs: isize,
}

impl Default for Settings {
    fn default() -> Settings {
        Settings {
            verbose_mode: false,
            max_procs: -1,
        }
    }
}

impl Settings {
    /// Number of worker threads the engine should use.
    pub fn num_procs(&self) -> usize {
        let num_procs = num_cpus::get();
        if self.max_procs > 0 && (self.max_procs as usize) < num_procs {
            return self.max_procs as usize;
        }
        num_procs
    }
}

fn default_settings_file() -> Result<PathBuf, SettingsError> {
    Ok(std::env::current_dir()?.join("settings.json"))
}

/// Reads the settings file. A missing file yields the default settings; a file
/// that exists but can't be parsed is an error.
pub fn get_settings(file: Option<&Path>) -> Result<Settings, SettingsError> {
    let config_file = match file {
        Some(f) => f.to_path_buf(),
        None => default_settings_file()?,
    };
    match fs::read_to_string(&config_file) {
        Ok(contents) => serde_json::from_str(&contents).map_err(|source| SettingsError::Parse {
            path: config_file,
            source,
        }),
        Err(_) => {
            tracing::debug!("no settings file at {}, using defaults", config_file.display());
            Ok(Settings::default())
        }
    }
}

pub fn save_settings(settings: &Settings, file: &Path) -> Result<(), SettingsError> {
    let json = serde_json::to_string_pretty(settings).map_err(|source| SettingsError::Parse {
        path: file.to_path_buf(),
        source,
    })?;
    fs::write(file, json)?;
    Ok(())
}
