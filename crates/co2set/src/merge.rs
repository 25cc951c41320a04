use std::collections::{BTreeMap, BTreeSet};

use polars::prelude::*;

use crate::prelude::*;
use crate::source::SourceTable;
use crate::unit::Unit;

/// A metric column together with the sources contributing it,
/// ordered by descending priority.
#[derive(Debug, Clone)]
struct Contributors {
    unit: Unit,
    sources: Vec<(String, u32)>,
}

fn column_contributors(
    tables: &[SourceTable],
) -> Co2setResult<BTreeMap<String, Contributors>> {
    let mut contributors: BTreeMap<String, Contributors> =
        BTreeMap::new();

    for table in tables {
        for (column, unit) in table.columns.iter() {
            match contributors.get_mut(column) {
                Some(entry) => {
                    if entry.unit != *unit {
                        bail!(
                            "column '{column}' has unit '{}' in \
                            source '{}', but '{unit}' elsewhere",
                            entry.unit,
                            table.name,
                        );
                    }

                    entry
                        .sources
                        .push((table.name.clone(), table.priority));
                }
                None => {
                    contributors.insert(
                        column.clone(),
                        Contributors {
                            unit: *unit,
                            sources: vec![(
                                table.name.clone(),
                                table.priority,
                            )],
                        },
                    );
                }
            }
        }
    }

    for (column, entry) in contributors.iter_mut() {
        entry.sources.sort_by(|a, b| b.1.cmp(&a.1));

        for pair in entry.sources.windows(2) {
            if pair[0].1 == pair[1].1 {
                bail!(
                    "column '{column}' is contributed by source \
                    '{}' and '{}' with equal priority {}; declare \
                    an explicit precedence",
                    pair[0].0,
                    pair[1].0,
                    pair[0].1,
                );
            }
        }
    }

    Ok(contributors)
}

/// Outer-joins all source tables on (entity, year).
///
/// The result holds the union of all keys and the union of all metric
/// columns; cells without data are null. Columns contributed by more
/// than one source are resolved per cell: the value of the source
/// with the highest priority wins, lower priorities fill its gaps.
/// Rows are sorted by (entity, year) and metric columns by name, so
/// the result does not depend on the declaration order of the
/// sources.
pub(crate) fn merge(
    mut tables: Vec<SourceTable>,
) -> Co2setResult<DataFrame> {
    if tables.is_empty() {
        bail!("no sources configured");
    }

    tables.sort_by(|a, b| a.name.cmp(&b.name));

    let contributors = column_contributors(&tables)?;
    let shared: BTreeSet<&str> = contributors
        .iter()
        .filter(|(_, entry)| entry.sources.len() > 1)
        .map(|(column, _)| column.as_str())
        .collect();

    let mut merged: Option<LazyFrame> = None;

    for table in tables.iter() {
        let mut lf = table.df.clone().lazy();

        // colliding columns get a per-source name until resolution
        let renames: Vec<(String, String)> = table
            .columns
            .iter()
            .filter(|(column, _)| shared.contains(column.as_str()))
            .map(|(column, _)| {
                (column.clone(), format!("{column}:{}", table.name))
            })
            .collect();

        if !renames.is_empty() {
            let existing: Vec<&String> =
                renames.iter().map(|(old, _)| old).collect();
            let new: Vec<&String> =
                renames.iter().map(|(_, new)| new).collect();
            lf = lf.rename(existing, new);
        }

        merged = Some(match merged {
            None => lf,
            Some(acc) => acc.join(
                lf,
                [col("entity"), col("year")],
                [col("entity"), col("year")],
                JoinArgs::new(JoinType::Full)
                    .with_coalesce(JoinCoalesce::CoalesceColumns),
            ),
        });
    }

    let mut lf = merged.expect("at least one source");

    for (column, entry) in contributors.iter() {
        if entry.sources.len() < 2 {
            continue;
        }

        let candidates: Vec<Expr> = entry
            .sources
            .iter()
            .map(|(source, _)| col(&format!("{column}:{source}")))
            .collect();

        let temps: Vec<String> = entry
            .sources
            .iter()
            .map(|(source, _)| format!("{column}:{source}"))
            .collect();

        lf = lf
            .with_column(coalesce(&candidates).alias(column))
            .drop(temps);
    }

    let mut selection = vec![col("entity"), col("year")];
    selection.extend(contributors.keys().map(|column| col(column)));

    Ok(lf
        .select(selection)
        .sort(["entity", "year"], Default::default())
        .collect()?)
}
