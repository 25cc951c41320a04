use polars::prelude::*;

use crate::config::DerivedSpec;
use crate::prelude::*;

/// Adds the derived columns (per-capita, per-GDP) to the merged
/// table.
///
/// A derived cell is numerator ÷ denominator × scale for the same
/// (entity, year). Rows where the denominator is missing or zero get
/// no data; they never abort the run and never affect other rows.
pub(crate) fn apply(
    df: DataFrame,
    specs: &[DerivedSpec],
) -> Co2setResult<DataFrame> {
    if specs.is_empty() {
        return Ok(df);
    }

    let columns = df.get_column_names();
    let mut exprs = vec![];

    for spec in specs {
        if columns.contains(&spec.name.as_str()) {
            bail!(
                "derived column '{}' collides with an existing \
                column",
                spec.name
            );
        }

        for column in [&spec.numerator, &spec.denominator] {
            if !columns.contains(&column.as_str()) {
                bail!(
                    "derived column '{}' refers to unknown column \
                    '{column}'",
                    spec.name
                );
            }
        }

        let denominator = col(&spec.denominator);

        exprs.push(
            when(
                denominator
                    .clone()
                    .is_not_null()
                    .and(denominator.clone().neq(lit(0.0))),
            )
            .then(
                col(&spec.numerator) / denominator
                    * lit(spec.scale),
            )
            .otherwise(lit(NULL))
            .alias(&spec.name),
        );
    }

    Ok(df.lazy().with_columns(exprs).collect()?)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::unit::Unit;

    fn spec(scale: f64) -> DerivedSpec {
        DerivedSpec {
            name: "co2_per_capita".into(),
            numerator: "co2".into(),
            denominator: "population".into(),
            scale,
            unit: Unit::TonnesCo2PerCapita,
            description: "".into(),
            source: "".into(),
        }
    }

    #[test]
    fn derive_per_capita() {
        let df = df!(
            "entity" => &["Kuwait"],
            "year" => &[1991i64],
            "co2" => &[366.4],
            "population" => &[2.0],
        )
        .unwrap();

        let df = apply(df, &[spec(1.0)]).unwrap();
        let per_capita =
            df.column("co2_per_capita").unwrap().f64().unwrap();

        assert_relative_eq!(per_capita.get(0).unwrap(), 183.2);
    }

    #[test]
    fn derive_applies_scale() {
        let df = df!(
            "entity" => &["Kuwait"],
            "year" => &[1991i64],
            "co2" => &[2.0],
            "population" => &[4_000_000.0],
        )
        .unwrap();

        // million tonnes over persons, scaled to tonnes per person
        let df = apply(df, &[spec(1e6)]).unwrap();
        let per_capita =
            df.column("co2_per_capita").unwrap().f64().unwrap();

        assert_relative_eq!(per_capita.get(0).unwrap(), 0.5);
    }

    #[test]
    fn derive_missing_denominator_is_no_data() {
        let df = df!(
            "entity" => &["Palau", "Kuwait"],
            "year" => &[1990i64, 1991],
            "co2" => &[10.0, 366.4],
            "population" => &[None, Some(2.0)],
        )
        .unwrap();

        let df = apply(df, &[spec(1.0)]).unwrap();
        let per_capita =
            df.column("co2_per_capita").unwrap().f64().unwrap();

        // Palau has no population; the cell is null and the other
        // rows are unaffected.
        assert_eq!(per_capita.get(0), None);
        assert_relative_eq!(per_capita.get(1).unwrap(), 183.2);
    }

    #[test]
    fn derive_zero_denominator_is_no_data() {
        let df = df!(
            "entity" => &["Palau"],
            "year" => &[1990i64],
            "co2" => &[10.0],
            "population" => &[0.0],
        )
        .unwrap();

        let df = apply(df, &[spec(1.0)]).unwrap();
        let per_capita =
            df.column("co2_per_capita").unwrap().f64().unwrap();

        assert_eq!(per_capita.get(0), None);
    }

    #[test]
    fn derive_rejects_unknown_columns() {
        let df = df!(
            "entity" => &["Kuwait"],
            "year" => &[1991i64],
            "co2" => &[366.4],
        )
        .unwrap();

        assert!(apply(df, &[spec(1.0)]).is_err());
    }

    #[test]
    fn derive_rejects_column_collision() {
        let df = df!(
            "entity" => &["Kuwait"],
            "year" => &[1991i64],
            "co2" => &[366.4],
            "population" => &[2.0],
            "co2_per_capita" => &[1.0],
        )
        .unwrap();

        assert!(apply(df, &[spec(1.0)]).is_err());
    }
}
