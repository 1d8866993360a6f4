//! Script discovery on the local file system.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use super::name::ScriptNameParser;
use super::{check_unique_indexes, ScriptSource};
use crate::config::ScriptsConfig;
use crate::core::{Qualifier, Script};
use crate::error::{MaintainError, Result};

/// Reads scripts from the configured locations.
///
/// Each call walks the directories again, so the sequence is restartable and
/// always reflects the current repository.
#[derive(Debug, Clone)]
pub struct FileSystemScriptSource {
    locations: Vec<PathBuf>,
    extensions: Vec<String>,
    names: ScriptNameParser,
}

impl FileSystemScriptSource {
    pub fn new(config: &ScriptsConfig, registered: BTreeSet<Qualifier>) -> Self {
        Self {
            locations: config.locations.clone(),
            extensions: config
                .extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
            names: ScriptNameParser::new(config, registered),
        }
    }

    /// Resolve relative locations against `base` (the config file directory).
    pub fn with_base_dir(mut self, base: &Path) -> Self {
        self.locations = self
            .locations
            .into_iter()
            .map(|l| if l.is_relative() { base.join(l) } else { l })
            .collect();
        self
    }

    fn has_script_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| self.extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
            .unwrap_or(false)
    }

    fn load_location(&self, location: &Path, scripts: &mut Vec<Script>) -> Result<()> {
        if !location.is_dir() {
            return Err(MaintainError::Config(format!(
                "Script location does not exist or is not a directory: {}",
                location.display()
            )));
        }

        for entry in WalkDir::new(location).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                MaintainError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    format!("Failed to walk {}: {}", location.display(), e),
                ))
            })?;
            let path = entry.path();
            if !entry.file_type().is_file() || !self.has_script_extension(path) {
                continue;
            }

            let relative = path.strip_prefix(location).unwrap_or(path);
            let file_name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            let content = std::fs::read_to_string(path)?;

            debug!("Discovered script {}", file_name);
            scripts.push(self.names.parse(&file_name, content)?);
        }
        Ok(())
    }
}

impl ScriptSource for FileSystemScriptSource {
    fn load_scripts(&self) -> Result<Vec<Script>> {
        let mut scripts = Vec::new();
        for location in &self.locations {
            self.load_location(location, &mut scripts)?;
        }
        check_unique_indexes(&scripts)?;
        Ok(scripts)
    }

    fn describe(&self) -> String {
        self.locations
            .iter()
            .map(|l| l.display().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}
