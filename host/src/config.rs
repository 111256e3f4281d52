use genui_runtime::Capability;
use std::error::Error;
use std::path::{Path, PathBuf};

const DEFAULT_SID: &str = "S1";
const DEFAULT_OUTBOUND_QUEUE_CAP: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    pub sid: String,
    pub outbound_queue_cap: usize,
    /// Extra capabilities registered after the built-in catalog.
    pub catalog_path: Option<PathBuf>,
}

impl HostConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            sid: lookup("GENUI_SID")
                .filter(|sid| !sid.is_empty())
                .unwrap_or_else(|| DEFAULT_SID.to_string()),
            outbound_queue_cap: lookup("GENUI_OUTBOUND_QUEUE_CAP")
                .and_then(|raw| raw.parse::<usize>().ok())
                .filter(|value| *value > 0)
                .unwrap_or(DEFAULT_OUTBOUND_QUEUE_CAP),
            catalog_path: lookup("GENUI_CATALOG")
                .filter(|path| !path.is_empty())
                .map(PathBuf::from),
        }
    }
}

pub fn load_catalog(path: &Path) -> Result<Vec<Capability>, Box<dyn Error>> {
    let raw = std::fs::read(path)
        .map_err(|err| format!("failed to read catalog {}: {err}", path.display()))?;
    let capabilities = serde_json::from_slice(&raw)
        .map_err(|err| format!("invalid catalog {}: {err}", path.display()))?;
    Ok(capabilities)
}
