use anyhow::Result;
use serde::Deserialize;

use crate::session::RecorderConfig;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub recorder: RecorderConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory new captures are written to
    pub recordings_path: String,
    /// WAV file the replay backend records from
    pub replay_source: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            recordings_path: "recordings".to_string(),
            replay_source: None,
        }
    }
}

impl Config {
    /// Load `path` (any extension the `config` crate knows; optional) with
    /// `VOICE_MEMOS__SECTION__KEY` environment overrides
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("VOICE_MEMOS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
