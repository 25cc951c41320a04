use std::io::Read;
use std::path::Path;

use hashbrown::HashMap;
use polars::prelude::*;
use serde::Deserialize;

use crate::prelude::*;

/// An immutable table mapping raw source-specific entity labels to
/// canonical entity names.
///
/// The mapping is a function: a raw alias bound to two different
/// canonical names is rejected when the table is loaded. Repeated
/// rows binding an alias to the same canonical name are tolerated.
#[derive(Debug, Default)]
pub(crate) struct AliasTable {
    map: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct Record {
    alias: String,
    canonical: String,
}

impl AliasTable {
    /// Loads an alias table from a CSV file (`alias,canonical`).
    pub(crate) fn from_path<P>(path: P) -> Co2setResult<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        Self::from_reader(std::fs::File::open(path)?)
    }

    pub(crate) fn from_reader<R: Read>(
        reader: R,
    ) -> Co2setResult<Self> {
        let mut map: HashMap<String, String> = HashMap::new();
        let mut rdr = csv::Reader::from_reader(reader);

        for result in rdr.deserialize() {
            let record: Record = result?;

            if let Some(existing) = map.get(&record.alias) {
                if existing != &record.canonical {
                    bail!(
                        "alias '{}' maps to both '{}' and '{}'",
                        record.alias,
                        existing,
                        record.canonical
                    );
                }
            } else {
                map.insert(record.alias, record.canonical);
            }
        }

        Ok(Self { map })
    }

    #[cfg(test)]
    pub(crate) fn get(&self, alias: &str) -> Option<&str> {
        self.map.get(alias).map(String::as_str)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.map.len()
    }

    /// Converts the table into a two-column frame (`alias`,
    /// `canonical`), sorted by alias.
    pub(crate) fn to_frame(&self) -> Co2setResult<DataFrame> {
        let mut entries: Vec<(&str, &str)> = self
            .map
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        entries.sort_unstable();

        let alias: Vec<&str> =
            entries.iter().map(|(k, _)| *k).collect();
        let canonical: Vec<&str> =
            entries.iter().map(|(_, v)| *v).collect();

        Ok(DataFrame::new(vec![
            Series::new("alias", alias),
            Series::new("canonical", canonical),
        ])?)
    }
}
