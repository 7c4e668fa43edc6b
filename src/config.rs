use std::{
    env, fmt,
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::writer::OverwriteMode;

pub const ACCESS_KEY_ENV: &str = "AWS_ACCESS_KEY_ID";
pub const SECRET_KEY_ENV: &str = "AWS_SECRET_ACCESS_KEY";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
#[value(rename_all = "kebab-case")]
pub enum InputFormat {
    #[default]
    Parquet,
    Csv,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImmigrationInput {
    pub path: PathBuf,
    pub format: InputFormat,
}

impl Default for ImmigrationInput {
    fn default() -> Self {
        Self {
            path: PathBuf::from("sas_data"),
            format: InputFormat::Parquet,
        }
    }
}

/// Access key pair handed to the pipeline. Held opaquely; never printed.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Credentials {
    pub access_key: String,
    pub secret_key: String,
}

impl Credentials {
    pub fn from_env() -> Option<Self> {
        let access_key = env::var(ACCESS_KEY_ENV).ok()?;
        let secret_key = env::var(SECRET_KEY_ENV).ok()?;
        Some(Self {
            access_key,
            secret_key,
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &"<redacted>")
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub input_root: PathBuf,
    pub output_root: PathBuf,
    pub immigration: ImmigrationInput,
    pub temperature: PathBuf,
    pub countries: PathBuf,
    pub states: PathBuf,
    /// Delimiter for text inputs (`,`, `tab`, `;`, `|`); resolved from the
    /// file extension when absent.
    pub delimiter: Option<String>,
    pub input_encoding: Option<String>,
    pub overwrite: OverwriteMode,
    pub credentials: Option<Credentials>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_root: PathBuf::from("data/input"),
            output_root: PathBuf::from("data/output"),
            immigration: ImmigrationInput::default(),
            temperature: PathBuf::from("GlobalLandTemperaturesByCity.csv"),
            countries: PathBuf::from("countries.csv"),
            states: PathBuf::from("states.csv"),
            delimiter: None,
            input_encoding: None,
            overwrite: OverwriteMode::default(),
            credentials: None,
        }
    }
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening config file {path:?}"))?;
        let reader = BufReader::new(file);
        let config = serde_yaml::from_reader(reader)
            .with_context(|| format!("Parsing config file {path:?}"))?;
        Ok(config)
    }

    pub fn input_path(&self, relative: &Path) -> PathBuf {
        if relative.is_absolute() {
            relative.to_path_buf()
        } else {
            self.input_root.join(relative)
        }
    }

    pub fn output_path(&self, table: &str) -> PathBuf {
        self.output_root.join(table)
    }
}
