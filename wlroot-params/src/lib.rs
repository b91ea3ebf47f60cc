use serde::{Serialize, Deserialize};
use std::{fs, path::{Path, PathBuf}};
use thiserror::Error;

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Params {
    /// Whitelist CSV to read entries from
    pub whitelist: Option<PathBuf>,
    /// chrono format for onboarding dates
    pub date_format: Option<String>,
    /// tracing filter directive, e.g. "info" or "wlroot_merkle=trace"
    pub log: Option<String>,
    /// Where `prove` writes its proof file
    pub proof_out: Option<PathBuf>,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            whitelist: None,
            date_format: Some("%Y-%m-%d".to_string()),
            log: Some("info".to_string()),
            proof_out: Some(PathBuf::from("proof.bin")),
        }
    }
}

#[derive(Debug, Error)]
pub enum ParamsError {
    #[error("failed to read params file {path}: {source}")]
    Io { path: PathBuf, #[source] source: std::io::Error },
    #[error("invalid params: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Parse run parameters from TOML text. Missing keys keep their defaults.
pub fn load_params_toml(input: &str) -> Result<Params, toml::de::Error> {
    toml::from_str::<Params>(input)
}

pub fn load_params_file(path: &Path) -> Result<Params, ParamsError> {
    let txt = fs::read_to_string(path).map_err(|source| ParamsError::Io { path: path.to_path_buf(), source })?;
    Ok(load_params_toml(&txt)?)
}
