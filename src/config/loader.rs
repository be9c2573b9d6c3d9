use crate::config::schema::{PatchConfig, ValidationError};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Toml {
        path: Option<PathBuf>,
        source: toml_edit::de::Error,
    },
    Validation {
        path: Option<PathBuf>,
        source: ValidationError,
    },
    Discovery {
        path: PathBuf,
        source: walkdir::Error,
    },
    NoPlans {
        searched: Vec<PathBuf>,
    },
}

impl ConfigError {
    fn with_path(self, path: &Path) -> Self {
        let path = path.to_path_buf();
        match self {
            ConfigError::Toml { path: None, source } => ConfigError::Toml {
                path: Some(path),
                source,
            },
            ConfigError::Validation { path: None, source } => ConfigError::Validation {
                path: Some(path),
                source,
            },
            other => other,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "failed to read plan file {}: {}", path.display(), source)
            }
            ConfigError::Toml { path, source } => match path {
                Some(path) => write!(
                    f,
                    "failed to parse plan file TOML ({}): {}",
                    path.display(),
                    source
                ),
                None => write!(f, "failed to parse plan file TOML: {}", source),
            },
            ConfigError::Validation { path, source } => match path {
                Some(path) => write!(f, "invalid plan file ({}):\n{}", path.display(), source),
                None => write!(f, "invalid plan file:\n{}", source),
            },
            ConfigError::Discovery { path, source } => {
                write!(f, "failed to scan {}: {}", path.display(), source)
            }
            ConfigError::NoPlans { searched } => {
                write!(f, "no .toml plan files found in")?;
                for (idx, dir) in searched.iter().enumerate() {
                    let sep = if idx == 0 { " " } else { " or " };
                    write!(f, "{sep}{}", dir.display())?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Toml { source, .. } => Some(source),
            ConfigError::Validation { source, .. } => Some(source),
            ConfigError::Discovery { source, .. } => Some(source),
            ConfigError::NoPlans { .. } => None,
        }
    }
}

pub fn load_from_str(input: &str) -> Result<PatchConfig, ConfigError> {
    let config: PatchConfig = toml_edit::de::from_str(input)
        .map_err(|source| ConfigError::Toml { path: None, source })?;
    config
        .validate()
        .map_err(|source| ConfigError::Validation { path: None, source })?;
    Ok(config)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<PatchConfig, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_from_str(&contents).map_err(|error| error.with_path(path))
}

/// Find `*.toml` plan files in the first of `dirs` that has any.
///
/// Only the top level of each directory is scanned; results are sorted so
/// plans apply in a stable order.
pub fn discover_plan_files(dirs: &[PathBuf]) -> Result<Vec<PathBuf>, ConfigError> {
    for dir in dirs {
        if !dir.is_dir() {
            continue;
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(dir).max_depth(1) {
            let entry = entry.map_err(|source| ConfigError::Discovery {
                path: dir.clone(),
                source,
            })?;
            if entry.file_type().is_file()
                && entry.path().extension().and_then(|s| s.to_str()) == Some("toml")
            {
                files.push(entry.path().to_path_buf());
            }
        }

        files.sort();

        if !files.is_empty() {
            return Ok(files);
        }
    }

    Err(ConfigError::NoPlans {
        searched: dirs.to_vec(),
    })
}
