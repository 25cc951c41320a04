use std::path::PathBuf;
use std::{env, fs};

use polars::prelude::*;

use crate::config::Config;
use crate::error::{Co2setError, Co2setResult};

pub(crate) struct Project {
    /// The root directory of the project.
    root_dir: PathBuf,
}

impl Project {
    pub(crate) const CONFIG: &'static str = "co2set.toml";
    pub(crate) const SOURCES_DIR: &'static str = "sources";
    pub(crate) const OUTPUT_DIR: &'static str = "output";
    pub(crate) const DATA_CSV: &'static str = "co2-data.csv";
    pub(crate) const DATA_XLSX: &'static str = "co2-data.xlsx";
    pub(crate) const DATA_JSON: &'static str = "co2-data.json";
    pub(crate) const CODEBOOK: &'static str = "co2-codebook.csv";

    /// Discovers the root of the project.
    ///
    /// This function fails, if neither the current directory nor any
    /// parent directory contains a project [Config].
    pub(crate) fn discover() -> Co2setResult<Self> {
        let mut root_dir = env::current_dir()?;

        loop {
            if let Ok(metadata) =
                fs::metadata(root_dir.join(Self::CONFIG))
            {
                if metadata.is_file() {
                    break;
                }
            }

            if !root_dir.pop() {
                return Err(Co2setError::Other(
                    "not a co2set project (or any parent directory)"
                        .into(),
                ));
            }
        }

        Ok(Self { root_dir })
    }

    /// Returns the config associated with the project.
    #[inline]
    pub(crate) fn config(&self) -> Co2setResult<Config> {
        Config::from_path(self.root_dir.join(Self::CONFIG))
    }

    /// Returns the base directory of the project.
    #[inline]
    pub(crate) fn base_dir(&self) -> &PathBuf {
        &self.root_dir
    }

    /// Returns the output directory of the project.
    #[inline]
    pub(crate) fn output_dir(&self) -> PathBuf {
        self.root_dir.join(Self::OUTPUT_DIR)
    }

    /// Reads the dataset built by a previous run.
    pub(crate) fn dataset(&self) -> Co2setResult<DataFrame> {
        Ok(CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(
                self.output_dir().join(Self::DATA_CSV),
            ))?
            .finish()?)
    }

    /// Reads the codebook built by a previous run.
    pub(crate) fn codebook(&self) -> Co2setResult<DataFrame> {
        Ok(CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(
                self.output_dir().join(Self::CODEBOOK),
            ))?
            .finish()?)
    }
}
