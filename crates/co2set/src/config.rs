use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use semver::Version;
use serde::{Deserialize, Serialize};

use crate::error::Co2setResult;
use crate::unit::Unit;

/// Project config.
#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct Config {
    /// The path of the config.
    #[serde(skip)]
    path: PathBuf,

    /// Dataset metadata.
    pub(crate) metadata: Metadata,

    /// Runtime options.
    pub(crate) runtime: Option<Runtime>,

    /// Entity metadata (canonical names and ISO 3166-1 alpha-3
    /// codes).
    pub(crate) entities: Option<Entities>,

    /// The source tables the dataset is built from.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub(crate) sources: Vec<SourceSpec>,

    /// Columns derived from the merged table (per-capita, per-GDP).
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub(crate) derived: Vec<DerivedSpec>,

    /// This structure should always be constructed using a public
    /// constructor or using the update syntax:
    ///
    /// ```ignore
    /// use crate::config::Config;
    ///
    /// let config = Config {
    ///     ..Default::default()
    /// };
    /// ```
    #[doc(hidden)]
    #[serde(skip)]
    __non_exhaustive: (),
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Metadata {
    /// The name of the dataset.
    pub(crate) name: String,

    /// The version of the dataset.
    pub(crate) version: Version,

    /// A short blurb about the dataset.
    pub(crate) description: Option<String>,

    /// A list of people or organizations, which are considered as the
    /// authors of the dataset.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub(crate) authors: Vec<String>,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            name: "".into(),
            version: Version::new(0, 1, 0),
            description: None,
            authors: vec![],
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct Runtime {
    /// Number of threads to use. If this options isn't set or a value
    /// of "0" is chosen, the maximum number of available threads
    /// is used.
    pub(crate) num_jobs: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Entities {
    /// A CSV file (`entity,iso_code`) mapping canonical entity names
    /// to ISO 3166-1 alpha-3 codes. Entities without a code (regions,
    /// aggregates) may be omitted.
    pub(crate) path: PathBuf,
}

/// A per-source input table, keyed by (entity, year).
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct SourceSpec {
    /// The name of the source.
    pub(crate) name: String,

    /// The location of the table (CSV or Arrow IPC), relative to the
    /// project root.
    pub(crate) path: PathBuf,

    /// Precedence among sources that contribute the same column; the
    /// value of the source with the highest priority wins, lower
    /// priorities fill its gaps. Two sources contributing the same
    /// column must not share a priority.
    pub(crate) priority: u32,

    /// An optional alias table (`alias,canonical`) mapping the raw
    /// entity labels of this source to canonical names. Labels
    /// without an alias rule are reported and their rows excluded.
    pub(crate) aliases: Option<PathBuf>,

    /// The header of the entity column in the source table.
    #[serde(default = "default_entity_column")]
    pub(crate) entity_column: String,

    /// The header of the year column in the source table.
    #[serde(default = "default_year_column")]
    pub(crate) year_column: String,

    /// The metric columns this source contributes.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub(crate) columns: Vec<ColumnSpec>,
}

fn default_entity_column() -> String {
    "entity".into()
}

fn default_year_column() -> String {
    "year".into()
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ColumnSpec {
    /// The column name in the merged dataset.
    pub(crate) name: String,

    /// The header of the column in the source table; defaults to
    /// `name`.
    pub(crate) from: Option<String>,

    /// The unit of the column as stored in the source table. Columns
    /// in tonnes of elemental carbon are converted to tonnes of CO2
    /// at load time.
    pub(crate) unit: Unit,

    /// Codebook description of the column.
    pub(crate) description: String,

    /// Codebook attribution of the column.
    pub(crate) source: String,
}

impl ColumnSpec {
    /// Returns the header of the column in the source table.
    #[inline]
    pub(crate) fn from(&self) -> &str {
        self.from.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct DerivedSpec {
    /// The column name in the merged dataset.
    pub(crate) name: String,

    /// The column holding the absolute metric.
    pub(crate) numerator: String,

    /// The column holding the denominator (population or GDP). Rows
    /// where this column is missing or zero get no data.
    pub(crate) denominator: String,

    /// A factor applied after the division to reconcile units (e.g.
    /// million tonnes per person to tonnes per person).
    #[serde(default = "default_scale")]
    pub(crate) scale: f64,

    /// The unit of the derived column.
    pub(crate) unit: Unit,

    /// Codebook description of the column.
    pub(crate) description: String,

    /// Codebook attribution of the column.
    pub(crate) source: String,
}

fn default_scale() -> f64 {
    1.0
}

impl Config {
    /// Creates a new default config and sets the file location.
    pub(crate) fn create<P>(path: P) -> Co2setResult<Self>
    where
        P: AsRef<Path>,
    {
        Ok(Self {
            path: path.as_ref().into(),
            ..Default::default()
        })
    }

    /// Loads an existing config from a path.
    pub(crate) fn from_path<P>(path: P) -> Co2setResult<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref().into();
        let content = fs::read_to_string(&path)?;
        let mut config: Self = toml::from_str(&content)?;
        config.path = path;

        Ok(config)
    }

    /// Saves the config.
    pub(crate) fn save(&self) -> Co2setResult<()> {
        let content = toml::to_string(self).expect("valid toml");
        let mut out = File::create(&self.path)?;
        out.write_all(content.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::Unit;

    const CONFIG: &str = r#"
[metadata]
name = "co2-data"
version = "1.2.0"
description = "CO2 and greenhouse gas emissions"

[entities]
path = "entities.csv"

[[sources]]
name = "gcp"
path = "sources/gcp.csv"
priority = 1
aliases = "aliases/gcp.csv"
entity_column = "Country"
year_column = "Year"

[[sources.columns]]
name = "co2"
from = "Territorial Emissions"
unit = "tonnes carbon"
description = "Annual production-based emissions of CO2."
source = "Global Carbon Project"

[[derived]]
name = "co2_per_capita"
numerator = "co2"
denominator = "population"
unit = "tonnes CO2 per capita"
description = "Annual CO2 emissions per capita."
source = "Global Carbon Project"
"#;

    #[test]
    fn config_from_toml() {
        let config: Config = toml::from_str(CONFIG).unwrap();

        assert_eq!(config.metadata.name, "co2-data");
        assert_eq!(
            config.metadata.version,
            Version::new(1, 2, 0)
        );

        assert_eq!(config.sources.len(), 1);
        let source = &config.sources[0];
        assert_eq!(source.name, "gcp");
        assert_eq!(source.priority, 1);
        assert_eq!(source.entity_column, "Country");
        assert_eq!(source.columns.len(), 1);
        assert_eq!(source.columns[0].from(), "Territorial Emissions");
        assert_eq!(source.columns[0].unit, Unit::TonnesCarbon);

        assert_eq!(config.derived.len(), 1);
        assert_eq!(config.derived[0].scale, 1.0);
    }

    #[test]
    fn source_column_defaults() {
        let config: Config = toml::from_str(
            r#"
[metadata]
name = "test"
version = "0.1.0"

[[sources]]
name = "pop"
path = "sources/pop.csv"
priority = 0

[[sources.columns]]
name = "population"
unit = "persons"
description = "Population by country."
source = "HYDE"
"#,
        )
        .unwrap();

        let source = &config.sources[0];
        assert_eq!(source.entity_column, "entity");
        assert_eq!(source.year_column, "year");
        assert_eq!(source.columns[0].from(), "population");
    }
}
