//! YAML configuration for keyword tables, canonical labels and the artifact workspace.
//!
//! Every field has a default, so an empty file (or no file at all) yields the stock
//! bilingual keyword tables and a `recon-data` workspace next to the current directory.

use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    error::{ReconError, Result},
    roles::KeywordTable,
};

pub const DEFAULT_CONFIG_FILE: &str = "billing-recon.yml";
pub const DEFAULT_WORKSPACE: &str = "recon-data";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconConfig {
    pub workspace: PathBuf,
    pub keywords: KeywordTables,
    pub labels: Labels,
    pub sanitize: SanitizeOptions,
}

impl Default for ReconConfig {
    fn default() -> Self {
        Self {
            workspace: PathBuf::from(DEFAULT_WORKSPACE),
            keywords: KeywordTables::default(),
            labels: Labels::default(),
            sanitize: SanitizeOptions::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordTables {
    /// Primary-side roles for the price join, ingestion cleanup and export cleanup.
    pub join: KeywordTable,
    /// Reference (price catalog) roles.
    pub reference: KeywordTable,
    /// Roles used for filtering and summaries of the persisted dataset.
    pub query: KeywordTable,
}

impl Default for KeywordTables {
    fn default() -> Self {
        Self {
            join: KeywordTable::join_defaults(),
            reference: KeywordTable::reference_defaults(),
            query: KeywordTable::query_defaults(),
        }
    }
}

/// Labels used when enrichment has to create a column the primary table lacks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Labels {
    pub unit_value: String,
    pub total: String,
}

impl Default for Labels {
    fn default() -> Self {
        Self {
            unit_value: "Valor Unitario".to_string(),
            total: "Total".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SanitizeOptions {
    /// Label fragments marking a column as holding dates.
    pub date_keywords: Vec<String>,
    pub max_cell_chars: usize,
}

impl Default for SanitizeOptions {
    fn default() -> Self {
        Self {
            date_keywords: ["fecha", "inicio", "fin", "date"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_cell_chars: 32_700,
        }
    }
}

impl ReconConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|err| ReconError::io(path, err))?;
        serde_yaml::from_reader(BufReader::new(file)).map_err(|source| ReconError::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads `explicit` when given, else `billing-recon.yml` inside `workspace` when it
    /// exists, else the defaults. A `workspace` override always wins over the file.
    pub fn discover(explicit: Option<&Path>, workspace: Option<&Path>) -> Result<Self> {
        let candidate = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => {
                let root = workspace.unwrap_or_else(|| Path::new(DEFAULT_WORKSPACE));
                let path = root.join(DEFAULT_CONFIG_FILE);
                path.is_file().then_some(path)
            }
        };
        let mut config = match candidate {
            Some(path) => {
                debug!("Loading configuration from {path:?}");
                Self::load(&path)?
            }
            None => Self::default(),
        };
        if let Some(workspace) = workspace {
            config.workspace = workspace.to_path_buf();
        }
        Ok(config)
    }
}
