use std::collections::BTreeMap;

use polars::prelude::*;

use crate::config::Config;
use crate::prelude::*;

/// The companion codebook: one row per output column, in data-column
/// order, documenting description, unit and source attribution.
#[derive(Debug)]
pub(crate) struct Codebook {
    entries: Vec<Entry>,
}

#[derive(Debug, Clone)]
struct Entry {
    column: String,
    description: String,
    unit: String,
    source: String,
}

impl Codebook {
    /// Builds the codebook for the given output columns.
    ///
    /// The entries are emitted in `columns` order; a column without
    /// metadata is an error, so codebook and data cannot drift
    /// apart.
    pub(crate) fn new(
        config: &Config,
        columns: &[String],
    ) -> Co2setResult<Self> {
        let dataset = config.metadata.name.as_str();
        let mut known: BTreeMap<String, Entry> = BTreeMap::new();

        known.insert(
            "entity".into(),
            Entry {
                column: "entity".into(),
                description: "Geographic location.".into(),
                unit: "".into(),
                source: dataset.into(),
            },
        );
        known.insert(
            "year".into(),
            Entry {
                column: "year".into(),
                description: "Year of observation.".into(),
                unit: "".into(),
                source: dataset.into(),
            },
        );
        known.insert(
            "iso_code".into(),
            Entry {
                column: "iso_code".into(),
                description: "ISO 3166-1 alpha-3 three-letter \
                    country codes."
                    .into(),
                unit: "".into(),
                source: "International Organization for \
                    Standardization"
                    .into(),
            },
        );

        // metric columns; sources contributing the same column are
        // ordered by descending priority, the description of the
        // winning source is kept and the attributions are combined
        let mut contributed: BTreeMap<String, Vec<_>> =
            BTreeMap::new();

        for source in config.sources.iter() {
            for column in source.columns.iter() {
                contributed
                    .entry(column.name.clone())
                    .or_default()
                    .push((source.priority, column));
            }
        }

        for (name, mut specs) in contributed {
            specs.sort_by(|a, b| b.0.cmp(&a.0));

            let mut sources: Vec<&str> = vec![];
            for (_, spec) in specs.iter() {
                if !sources.contains(&spec.source.as_str()) {
                    sources.push(&spec.source);
                }
            }

            let (_, winner) = specs[0];
            known.insert(
                name.clone(),
                Entry {
                    column: name,
                    description: winner.description.clone(),
                    unit: winner.unit.converted().to_string(),
                    source: sources.join("; "),
                },
            );
        }

        for spec in config.derived.iter() {
            known.insert(
                spec.name.clone(),
                Entry {
                    column: spec.name.clone(),
                    description: spec.description.clone(),
                    unit: spec.unit.to_string(),
                    source: spec.source.clone(),
                },
            );
        }

        let mut entries = vec![];
        for column in columns {
            match known.get(column) {
                Some(entry) => entries.push(entry.clone()),
                None => bail!(
                    "column '{column}' has no codebook entry"
                ),
            }
        }

        Ok(Self { entries })
    }

    /// The documented column names, in data-column order.
    #[cfg(test)]
    pub(crate) fn columns(&self) -> Vec<&str> {
        self.entries
            .iter()
            .map(|entry| entry.column.as_str())
            .collect()
    }

    pub(crate) fn to_frame(&self) -> Co2setResult<DataFrame> {
        let column: Vec<&str> = self
            .entries
            .iter()
            .map(|e| e.column.as_str())
            .collect();
        let description: Vec<&str> = self
            .entries
            .iter()
            .map(|e| e.description.as_str())
            .collect();
        let unit: Vec<&str> =
            self.entries.iter().map(|e| e.unit.as_str()).collect();
        let source: Vec<&str> = self
            .entries
            .iter()
            .map(|e| e.source.as_str())
            .collect();

        Ok(DataFrame::new(vec![
            Series::new("column", column),
            Series::new("description", description),
            Series::new("unit", unit),
            Series::new("source", source),
        ])?)
    }
}
