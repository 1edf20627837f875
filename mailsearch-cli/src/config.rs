//! Optional on-disk configuration (spec.md §5 "Shared resources" is
//! silent on configuration; this mirrors the teacher's own
//! `toml`-backed `read_config` so the ambient stack isn't bare stdlib).

use std::io::Read;
use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Everything this binary needs beyond what's already on the command
/// line: the set of keyword (custom flag) names a deployment wants
/// registered, since a bare maildir carries no keyword registry of its
/// own (spec.md §9 "Keyword lookup").
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub keyword_names: Vec<String>,
}

pub fn read_config(config_file: PathBuf) -> Result<Config> {
    let mut file = std::fs::OpenOptions::new()
        .read(true)
        .open(config_file.as_path())?;

    let mut contents = String::new();
    file.read_to_string(&mut contents)?;

    Ok(toml::from_str(&contents)?)
}
