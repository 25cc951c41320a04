use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::fs::File;
use std::path::Path;

use polars::prelude::*;

use crate::aliases::AliasTable;
use crate::config::{ColumnSpec, SourceSpec};
use crate::prelude::*;
use crate::unit::{Unit, CARBON_TO_CO2};

/// A per-source table, standardized and converted, keyed by
/// (entity, year).
#[derive(Debug)]
pub(crate) struct SourceTable {
    pub(crate) name: String,
    pub(crate) priority: u32,
    /// Metric columns and their units after carbon-mass conversion.
    pub(crate) columns: Vec<(String, Unit)>,
    pub(crate) df: DataFrame,
}

fn read_table(path: &Path) -> Co2setResult<DataFrame> {
    Ok(match path.extension().and_then(OsStr::to_str) {
        Some("ipc" | "arrow") => IpcReader::new(File::open(path)?)
            .memory_mapped(None)
            .finish()?,
        _ => CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(path.into()))?
            .finish()?,
    })
}

impl SourceTable {
    /// Loads a source table from disk and prepares it for the merge.
    ///
    /// Returns the table together with the raw entity labels that
    /// have no alias rule; their rows are excluded from the table.
    pub(crate) fn load(
        spec: &SourceSpec,
        base_dir: &Path,
    ) -> Co2setResult<(Self, Vec<String>)> {
        let df = read_table(&base_dir.join(&spec.path))?;

        let aliases = spec
            .aliases
            .as_ref()
            .map(|path| AliasTable::from_path(base_dir.join(path)))
            .transpose()?;

        Self::prepare(df, spec, aliases.as_ref())
    }

    /// Prepares a raw source frame: selects and casts the declared
    /// columns, standardizes entity names, collapses duplicate keys
    /// and converts carbon-mass columns to CO2.
    pub(crate) fn prepare(
        df: DataFrame,
        spec: &SourceSpec,
        aliases: Option<&AliasTable>,
    ) -> Co2setResult<(Self, Vec<String>)> {
        let mut selection = vec![
            col(&spec.entity_column)
                .cast(DataType::String)
                .alias("entity"),
            col(&spec.year_column)
                .cast(DataType::Int64)
                .alias("year"),
        ];

        for column in spec.columns.iter() {
            selection.push(
                col(column.from())
                    .cast(DataType::Float64)
                    .alias(&column.name),
            );
        }

        let df = df.lazy().select(selection).collect()?;

        let (df, unmapped) = match aliases {
            Some(aliases) => standardize(df, aliases)?,
            None => (df, vec![]),
        };

        let df = collapse_duplicates(df, &spec.columns)?;
        let df = convert_carbon_mass(df, &spec.columns)?;

        let columns = spec
            .columns
            .iter()
            .map(|c| (c.name.clone(), c.unit.converted()))
            .collect();

        Ok((
            Self {
                name: spec.name.clone(),
                priority: spec.priority,
                columns,
                df,
            },
            unmapped,
        ))
    }
}

/// Replaces raw entity labels by their canonical names.
///
/// Rows whose label has no alias rule are excluded; the distinct
/// unmapped labels are returned so the caller can surface them.
fn standardize(
    df: DataFrame,
    aliases: &AliasTable,
) -> Co2setResult<(DataFrame, Vec<String>)> {
    let joined = df
        .lazy()
        .join(
            aliases.to_frame()?.lazy(),
            [col("entity")],
            [col("alias")],
            JoinArgs::new(JoinType::Left),
        )
        .collect()?;

    let missing = joined.column("canonical")?.is_null();

    let unmapped: Vec<String> = joined
        .filter(&missing)?
        .column("entity")?
        .str()?
        .into_iter()
        .flatten()
        .map(String::from)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let df = joined
        .filter(&!missing)?
        .lazy()
        .drop(["entity"])
        .rename(["canonical"], ["entity"])
        .collect()?;

    Ok((df, unmapped))
}

/// Collapses rows that share a (entity, year) key by a null-aware
/// sum: groups without any value stay null instead of becoming zero.
///
/// Standardization may fold several raw labels onto one canonical
/// entity, which is where such duplicates come from.
fn collapse_duplicates(
    df: DataFrame,
    columns: &[ColumnSpec],
) -> Co2setResult<DataFrame> {
    let mut aggs = vec![];
    let mut masked = vec![];
    let mut counts = vec![];

    for column in columns {
        let name = column.name.as_str();
        let count = format!("{name}:count");

        aggs.push(col(name).sum().alias(name));
        aggs.push(col(name).count().alias(&count));
        masked.push(
            when(col(&count).gt(lit(0)))
                .then(col(name))
                .otherwise(lit(NULL))
                .alias(name),
        );
        counts.push(count);
    }

    Ok(df
        .lazy()
        .group_by([col("entity"), col("year")])
        .agg(aggs)
        .with_columns(masked)
        .drop(counts)
        .sort(["entity", "year"], Default::default())
        .collect()?)
}

/// Multiplies carbon-mass columns by the fixed carbon→CO2 factor.
///
/// Conversion is driven by the declared unit tag and happens here
/// only; the in-memory table carries the post-conversion unit, so the
/// factor cannot be applied twice.
fn convert_carbon_mass(
    df: DataFrame,
    columns: &[ColumnSpec],
) -> Co2setResult<DataFrame> {
    let conversions: Vec<_> = columns
        .iter()
        .filter(|c| c.unit.is_carbon_mass())
        .map(|c| {
            (col(&c.name) * lit(CARBON_TO_CO2)).alias(&c.name)
        })
        .collect();

    if conversions.is_empty() {
        return Ok(df);
    }

    Ok(df.lazy().with_columns(conversions).collect()?)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::config::{ColumnSpec, SourceSpec};

    fn spec(unit: Unit) -> SourceSpec {
        SourceSpec {
            name: "test".into(),
            path: "sources/test.csv".into(),
            priority: 0,
            aliases: None,
            entity_column: "entity".into(),
            year_column: "year".into(),
            columns: vec![ColumnSpec {
                name: "co2".into(),
                from: None,
                unit,
                description: "".into(),
                source: "".into(),
            }],
        }
    }

    #[test]
    fn prepare_converts_carbon_mass_once() {
        let df = df!(
            "entity" => &["Kuwait"],
            "year" => &[1991i64],
            "co2" => &[100.0],
        )
        .unwrap();

        let (table, unmapped) =
            SourceTable::prepare(df, &spec(Unit::TonnesCarbon), None)
                .unwrap();

        assert!(unmapped.is_empty());
        assert_eq!(table.columns[0].1, Unit::TonnesCo2);

        let co2 = table.df.column("co2").unwrap().f64().unwrap();
        assert_relative_eq!(co2.get(0).unwrap(), 366.4);
    }

    #[test]
    fn prepare_leaves_co2_mass_untouched() {
        let df = df!(
            "entity" => &["Kuwait"],
            "year" => &[1991i64],
            "co2" => &[100.0],
        )
        .unwrap();

        let (table, _) =
            SourceTable::prepare(df, &spec(Unit::TonnesCo2), None)
                .unwrap();

        let co2 = table.df.column("co2").unwrap().f64().unwrap();
        assert_relative_eq!(co2.get(0).unwrap(), 100.0);
    }

    #[test]
    fn prepare_excludes_and_reports_unmapped() {
        let aliases = AliasTable::from_reader(
            "alias,canonical\n\
             KUWAIT,Kuwait\n"
                .as_bytes(),
        )
        .unwrap();

        let df = df!(
            "entity" => &["KUWAIT", "ATLANTIS", "ATLANTIS"],
            "year" => &[1991i64, 1991, 1992],
            "co2" => &[100.0, 1.0, 2.0],
        )
        .unwrap();

        let (table, unmapped) = SourceTable::prepare(
            df,
            &spec(Unit::TonnesCo2),
            Some(&aliases),
        )
        .unwrap();

        assert_eq!(unmapped, vec!["ATLANTIS".to_string()]);
        assert_eq!(table.df.height(), 1);

        let entity =
            table.df.column("entity").unwrap().str().unwrap();
        assert_eq!(entity.get(0), Some("Kuwait"));
    }

    #[test]
    fn prepare_sums_collapsed_duplicates() {
        let aliases = AliasTable::from_reader(
            "alias,canonical\n\
             GERMANY (EAST),Germany\n\
             GERMANY (WEST),Germany\n"
                .as_bytes(),
        )
        .unwrap();

        let df = df!(
            "entity" => &["GERMANY (EAST)", "GERMANY (WEST)"],
            "year" => &[1980i64, 1980],
            "co2" => &[10.0, 20.0],
        )
        .unwrap();

        let (table, unmapped) = SourceTable::prepare(
            df,
            &spec(Unit::TonnesCo2),
            Some(&aliases),
        )
        .unwrap();

        assert!(unmapped.is_empty());
        assert_eq!(table.df.height(), 1);

        let co2 = table.df.column("co2").unwrap().f64().unwrap();
        assert_relative_eq!(co2.get(0).unwrap(), 30.0);
    }

    #[test]
    fn prepare_keeps_all_null_groups_null() {
        let df = df!(
            "entity" => &["Palau", "Palau"],
            "year" => &[1990i64, 1990],
            "co2" => &[None::<f64>, None::<f64>],
        )
        .unwrap();

        let (table, _) =
            SourceTable::prepare(df, &spec(Unit::TonnesCo2), None)
                .unwrap();

        assert_eq!(table.df.height(), 1);

        let co2 = table.df.column("co2").unwrap().f64().unwrap();
        assert_eq!(co2.get(0), None);
    }

    #[test]
    fn prepare_renames_declared_headers() {
        let df = df!(
            "Nation" => &["Kuwait"],
            "Year" => &[1991i64],
            "Territorial Emissions" => &[100.0],
        )
        .unwrap();

        let spec = SourceSpec {
            entity_column: "Nation".into(),
            year_column: "Year".into(),
            columns: vec![ColumnSpec {
                name: "co2".into(),
                from: Some("Territorial Emissions".into()),
                unit: Unit::TonnesCo2,
                description: "".into(),
                source: "".into(),
            }],
            ..spec(Unit::TonnesCo2)
        };

        let (table, _) =
            SourceTable::prepare(df, &spec, None).unwrap();

        assert_eq!(
            table.df.get_column_names(),
            &["entity", "year", "co2"]
        );
    }
}
