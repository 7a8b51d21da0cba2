use std::fs;
use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;
use directories::ProjectDirs;

use crate::config_models::network::Network;

pub const SWAP_STORE_FILE_NAME: &str = "swaps.json";
pub const LEDGER_SNAPSHOT_FILE_NAME: &str = "ledger.json";

#[derive(Debug, Clone)]
pub struct DataDirectory {
    data_dir: PathBuf,
}

impl DataDirectory {
    ///////////////////////////////////////////////////////////////////////////
    ///
    /// The data directory that contains persisted swap records and ledger
    /// snapshots.
    ///
    /// The default varies by operating system, and includes the network, e.g.
    ///
    /// - Linux:   /home/alice/.local/share/glyph-engine/main
    /// - Windows: C:\Users\Alice\AppData\Roaming\glyph\glyph-engine\data\main
    /// - macOS:   /Users/Alice/Library/Application Support/org.glyph.glyph-engine/main
    pub fn get(root_dir: Option<PathBuf>, network: Network) -> Result<Self> {
        let project_dirs = root_dir
            .map(ProjectDirs::from_path)
            .unwrap_or_else(|| ProjectDirs::from("org", "glyph", "glyph-engine"))
            .context("Could not determine data directory")?;

        let network_dir = network.to_string();
        let data_dir = project_dirs.data_dir().join(Path::new(&network_dir));

        Ok(DataDirectory { data_dir })
    }

    /// Create directory if it does not exist
    pub fn create_dir_if_not_exists(dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create data directory {}", dir.to_string_lossy()))
    }

    /// The root data directory path
    pub fn root_dir_path(&self) -> PathBuf {
        self.data_dir.clone()
    }

    /// The swap record file path
    pub fn swap_store_file_path(&self) -> PathBuf {
        self.data_dir.join(Path::new(SWAP_STORE_FILE_NAME))
    }

    /// Default location of a serialized ledger snapshot
    pub fn ledger_snapshot_file_path(&self) -> PathBuf {
        self.data_dir.join(Path::new(LEDGER_SNAPSHOT_FILE_NAME))
    }
}

impl std::fmt::Display for DataDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.data_dir.display())
    }
}
