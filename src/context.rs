use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use encoding_rs::Encoding;

use crate::{
    cli::parse_delimiter,
    config::{Credentials, InputFormat, PipelineConfig},
    io_utils,
    source::SourceFormat,
    writer::OverwriteMode,
};

#[derive(Debug, Clone)]
pub struct ExecutionContext {
    config: PipelineConfig,
    delimiter: Option<u8>,
    encoding: &'static Encoding,
    credentials: Option<Credentials>,
}

impl ExecutionContext {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let delimiter = config
            .delimiter
            .as_deref()
            .map(|value| parse_delimiter(value).map_err(|err| anyhow!("Invalid delimiter: {err}")))
            .transpose()?;
        let encoding = io_utils::resolve_encoding(config.input_encoding.as_deref())?;
        let credentials = config.credentials.clone().or_else(Credentials::from_env);
        Ok(Self {
            config,
            delimiter,
            encoding,
            credentials,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub fn overwrite(&self) -> OverwriteMode {
        self.config.overwrite
    }

    pub fn text_format(&self) -> SourceFormat {
        SourceFormat::Delimited {
            delimiter: self.delimiter,
            encoding: self.encoding,
        }
    }

    pub fn immigration_source(&self) -> (PathBuf, SourceFormat) {
        let input = &self.config.immigration;
        let format = match input.format {
            InputFormat::Parquet => SourceFormat::Parquet,
            InputFormat::Csv => self.text_format(),
        };
        (self.config.input_path(&input.path), format)
    }

    pub fn input_path(&self, relative: &Path) -> PathBuf {
        self.config.input_path(relative)
    }

    pub fn output_path(&self, table: &str) -> PathBuf {
        self.config.output_path(table)
    }
}
