use clap::Parser;
use comfy_table::{presets, Row, Table};
use polars::prelude::*;

use crate::config::DerivedSpec;
use crate::prelude::*;

/// Rounding to 3 decimal places in the CSV rendition bounds the
/// reconstruction error of a derived cell.
const ABS_TOLERANCE: f64 = 2e-3;
const REL_TOLERANCE: f64 = 1e-4;

/// Verify the built dataset against the sanity checks: unique
/// (entity, year) keys, no all-null rows, codebook/data agreement
/// and consistency of the derived columns.
#[derive(Debug, Default, Parser)]
pub(crate) struct Check {
    /// Run verbosely. Print additional progress information to the
    /// standard error stream. This option conflicts with the
    /// `--quiet` option.
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Operate quietly; do not show progress. This option conflicts
    /// with the `--verbose` option.
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

/// Counts (entity, year) keys that occur more than once.
fn duplicate_keys(df: &DataFrame) -> Co2setResult<usize> {
    let dups = df
        .clone()
        .lazy()
        .group_by([col("entity"), col("year")])
        .agg([len().alias("rows")])
        .filter(col("rows").gt(lit(1)))
        .collect()?;

    Ok(dups.height())
}

/// Counts rows without any value across the metric columns.
fn empty_rows(df: &DataFrame) -> Co2setResult<usize> {
    let metrics: Vec<Expr> = df
        .get_column_names()
        .into_iter()
        .filter(|name| {
            !matches!(*name, "entity" | "year" | "iso_code")
        })
        .map(|name| col(name).is_null())
        .collect();

    if metrics.is_empty() {
        return Ok(df.height());
    }

    let empty = df
        .clone()
        .lazy()
        .filter(all_horizontal(metrics)?)
        .collect()?;

    Ok(empty.height())
}

/// Counts cells of a derived column that disagree with
/// numerator ÷ denominator × scale, or that are present/absent when
/// they should not be.
fn derived_violations(
    df: &DataFrame,
    spec: &DerivedSpec,
) -> Co2setResult<usize> {
    for column in
        [&spec.name, &spec.numerator, &spec.denominator]
    {
        if !df.get_column_names().contains(&column.as_str()) {
            bail!(
                "dataset has no column '{column}'; was it built \
                with the current config?"
            );
        }
    }

    let denominator = col(&spec.denominator);
    let expected = when(
        denominator
            .clone()
            .is_not_null()
            .and(denominator.neq(lit(0.0))),
    )
    .then(
        col(&spec.numerator) / col(&spec.denominator)
            * lit(spec.scale),
    )
    .otherwise(lit(NULL));

    let mismatch = col(&spec.name)
        .is_null()
        .neq(expected.clone().is_null())
        .or((col(&spec.name) - expected.clone())
            .abs()
            .gt(lit(ABS_TOLERANCE)
                + lit(REL_TOLERANCE) * expected.abs()));

    let violations = df
        .clone()
        .lazy()
        .filter(mismatch.fill_null(lit(false)))
        .collect()?;

    Ok(violations.height())
}

/// Compares the codebook rows against the data columns; both must
/// agree one-to-one and in order.
fn codebook_mismatch(
    df: &DataFrame,
    codebook: &DataFrame,
) -> Co2setResult<Option<String>> {
    let documented: Vec<&str> = codebook
        .column("column")?
        .str()?
        .into_iter()
        .flatten()
        .collect();

    let columns = df.get_column_names();

    if documented != columns {
        return Ok(Some(format!(
            "codebook documents {} columns, dataset has {}",
            documented.len(),
            columns.len(),
        )));
    }

    Ok(None)
}

impl Check {
    pub(crate) fn execute(self) -> Co2setResult<()> {
        let project = Project::discover()?;
        let config = project.config()?;
        let df = project.dataset()?;
        let codebook = project.codebook()?;

        let mut table = Table::new();
        table.load_preset(presets::UTF8_FULL_CONDENSED);
        table.set_header(Row::from(vec!["check", "result"]));

        let mut failures = 0;

        let dups = duplicate_keys(&df)?;
        table.add_row(vec![
            "unique (entity, year) keys".into(),
            verdict(dups, "duplicate keys"),
        ]);
        failures += dups;

        let empty = empty_rows(&df)?;
        table.add_row(vec![
            "no all-null rows".into(),
            verdict(empty, "empty rows"),
        ]);
        failures += empty;

        let agreement = match codebook_mismatch(&df, &codebook)? {
            Some(reason) => {
                failures += 1;
                reason
            }
            None => "✓".to_string(),
        };
        table.add_row(vec![
            "codebook matches data columns".to_string(),
            agreement,
        ]);

        for spec in config.derived.iter() {
            let violations = derived_violations(&df, spec)?;
            table.add_row(vec![
                format!("derived column '{}'", spec.name),
                verdict(violations, "inconsistent cells"),
            ]);
            failures += violations;
        }

        if self.quiet {
            if failures > 0 {
                bail!("one or more checks failed");
            }

            return Ok(());
        }

        eprintln!(
            "dataset '{}', version {}.\n",
            config.metadata.name, config.metadata.version
        );
        println!("{table}");

        if failures > 0 {
            bail!("one or more checks failed");
        }

        Ok(())
    }
}

fn verdict(count: usize, what: &str) -> String {
    if count == 0 {
        "✓".into()
    } else {
        format!("{count} {what}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::Unit;

    fn derived() -> DerivedSpec {
        DerivedSpec {
            name: "co2_per_capita".into(),
            numerator: "co2".into(),
            denominator: "population".into(),
            scale: 1.0,
            unit: Unit::TonnesCo2PerCapita,
            description: "".into(),
            source: "".into(),
        }
    }

    #[test]
    fn duplicate_keys_found() {
        let df = df!(
            "entity" => &["Kuwait", "Kuwait", "Palau"],
            "year" => &[1991i64, 1991, 1990],
            "co2" => &[1.0, 2.0, 3.0],
        )
        .unwrap();

        assert_eq!(duplicate_keys(&df).unwrap(), 1);
    }

    #[test]
    fn duplicate_keys_absent() {
        let df = df!(
            "entity" => &["Kuwait", "Kuwait"],
            "year" => &[1990i64, 1991],
            "co2" => &[1.0, 2.0],
        )
        .unwrap();

        assert_eq!(duplicate_keys(&df).unwrap(), 0);
    }

    #[test]
    fn empty_rows_found() {
        let df = df!(
            "entity" => &["Kuwait", "Palau"],
            "year" => &[1991i64, 1990],
            "iso_code" => &[Some("KWT"), None::<&str>],
            "co2" => &[Some(1.0), None],
            "population" => &[Some(2.0), None],
        )
        .unwrap();

        assert_eq!(empty_rows(&df).unwrap(), 1);
    }

    #[test]
    fn derived_consistent() {
        let df = df!(
            "entity" => &["Kuwait", "Palau"],
            "year" => &[1991i64, 1990],
            "co2" => &[Some(366.4), Some(10.0)],
            "population" => &[Some(2.0), None],
            "co2_per_capita" => &[Some(183.2), None],
        )
        .unwrap();

        assert_eq!(derived_violations(&df, &derived()).unwrap(), 0);
    }

    #[test]
    fn derived_tolerates_rounding() {
        // 1.0 / 3.0 rounded to 3 decimals in the CSV rendition
        let df = df!(
            "entity" => &["Kuwait"],
            "year" => &[1991i64],
            "co2" => &[1.0],
            "population" => &[3.0],
            "co2_per_capita" => &[0.333],
        )
        .unwrap();

        assert_eq!(derived_violations(&df, &derived()).unwrap(), 0);
    }

    #[test]
    fn derived_inconsistent_value() {
        let df = df!(
            "entity" => &["Kuwait"],
            "year" => &[1991i64],
            "co2" => &[366.4],
            "population" => &[2.0],
            "co2_per_capita" => &[200.0],
        )
        .unwrap();

        assert_eq!(derived_violations(&df, &derived()).unwrap(), 1);
    }

    #[test]
    fn derived_fabricated_cell() {
        // a value where the denominator is missing must count as a
        // violation
        let df = df!(
            "entity" => &["Palau"],
            "year" => &[1990i64],
            "co2" => &[10.0],
            "population" => &[None::<f64>],
            "co2_per_capita" => &[Some(5.0)],
        )
        .unwrap();

        assert_eq!(derived_violations(&df, &derived()).unwrap(), 1);
    }

    #[test]
    fn verdict_marks_clean_and_failing_checks() {
        assert_eq!(verdict(0, "duplicate keys"), "✓");
        assert_eq!(verdict(2, "duplicate keys"), "2 duplicate keys");
    }

    #[test]
    fn codebook_agreement() {
        let df = df!(
            "entity" => &["Kuwait"],
            "year" => &[1991i64],
            "co2" => &[366.4],
        )
        .unwrap();

        let codebook = df!(
            "column" => &["entity", "year", "co2"],
            "description" => &["", "", ""],
            "unit" => &["", "", "tonnes CO2"],
            "source" => &["", "", "GCP"],
        )
        .unwrap();

        assert!(codebook_mismatch(&df, &codebook)
            .unwrap()
            .is_none());

        let reordered = df!(
            "column" => &["year", "entity", "co2"],
            "description" => &["", "", ""],
            "unit" => &["", "", ""],
            "source" => &["", "", ""],
        )
        .unwrap();

        assert!(codebook_mismatch(&df, &reordered)
            .unwrap()
            .is_some());
    }
}
