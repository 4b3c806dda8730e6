use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use zip::result::ZipError;

pub mod archive;
pub mod block;
pub mod paths;

pub use archive::{rewrite_archive, transcode, EntryEdit, TranscodeReport};
pub use block::{locate_block, replace_in_block, Block, BlockEdit};

/// Archive entry that holds the mission table inside a `.miz`.
pub const MISSION_ENTRY: &str = "mission";

/// Keyword that introduces the module dependency table in the mission entry.
pub const REQUIRED_MODULES_MARKER: &str = "requiredModules";

/// Built-in search/replace pair, used when the caller does not supply one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchDefaults {
    pub search: String,
    pub replace: String,
}

impl Default for SearchDefaults {
    fn default() -> Self {
        SearchDefaults {
            search: "Vietnam Assets Pack by EightBall & Tobi".to_string(),
            replace: "[VWV] Vietnam Assets Pack".to_string(),
        }
    }
}

impl SearchDefaults {
    /// Apply caller overrides. A search override alone keeps the default
    /// replacement; a replacement is only honoured together with a search.
    pub fn resolve(&self, search: Option<String>, replace: Option<String>) -> (String, String) {
        match search {
            Some(search) => (search, replace.unwrap_or_else(|| self.replace.clone())),
            None => (self.search.clone(), self.replace.clone()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplaceSettings {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub search: String,
    pub replace: String,
    pub target_entry: String,
    pub marker: String,
    pub debug: bool,
}

impl Default for ReplaceSettings {
    fn default() -> Self {
        let defaults = SearchDefaults::default();
        ReplaceSettings {
            input_path: PathBuf::new(),
            output_path: PathBuf::new(),
            search: defaults.search,
            replace: defaults.replace,
            target_entry: MISSION_ENTRY.to_string(),
            marker: REQUIRED_MODULES_MARKER.to_string(),
            debug: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum MizError {
    #[error("input and output .miz must be different files ({})", .0.display())]
    SamePath(PathBuf),

    #[error("error opening input {}: {source}", .path.display())]
    OpenInput {
        path: PathBuf,
        #[source]
        source: ZipError,
    },

    #[error("error creating output {}: {source}", .path.display())]
    CreateOutput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("error reading entry {name}: {source}")]
    ReadEntry {
        name: String,
        #[source]
        source: ZipError,
    },

    #[error("error writing entry {name}: {source}")]
    WriteEntry {
        name: String,
        #[source]
        source: ZipError,
    },

    #[error("error finalising output archive: {source}")]
    Finalize {
        #[source]
        source: ZipError,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("report serialisation error: {0}")]
    Report(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MizError>;

/// Sidecar path for the debug run report: `<output>.report.json`.
pub fn report_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_owned();
    name.push(".report.json");
    PathBuf::from(name)
}

pub fn run(settings: &ReplaceSettings) -> Result<TranscodeReport> {
    if settings.search.is_empty() {
        tracing::warn!("empty search string, the mission entry will be copied unchanged");
    }

    let report = transcode(settings)?;

    if settings.debug {
        let path = report_path(&settings.output_path);
        fs::write(&path, serde_json::to_vec_pretty(&report)?)?;
        tracing::debug!(report = %path.display(), "wrote run report");
    }

    Ok(report)
}
