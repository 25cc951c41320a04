use clap::Parser;
use comfy_table::{presets, Row, Table};
use indicatif::ParallelProgressIterator;
use rayon::prelude::*;

use crate::prelude::*;
use crate::source::SourceTable;

const PBAR_SCAN: &str =
    "Scanning sources: {human_pos} ({percent}%) | \
        elapsed: {elapsed_precise}{msg}";

/// Report raw entity labels that have no alias rule, per source.
///
/// Rows with such labels would be excluded from a build; extend the
/// alias tables until this report is empty.
#[derive(Debug, Default, Parser)]
pub(crate) struct Entities {
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

impl Entities {
    pub(crate) fn execute(self) -> Co2setResult<()> {
        let project = Project::discover()?;
        let base_dir = project.base_dir();
        let config = project.config()?;

        let pbar = ProgressBarBuilder::new(PBAR_SCAN, self.quiet)
            .len(config.sources.len() as u64)
            .build();

        let reports = config
            .sources
            .par_iter()
            .progress_with(pbar)
            .map(|spec| {
                SourceTable::load(spec, base_dir).map(
                    |(table, unmapped)| (table.name, unmapped),
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut table = Table::new();
        table.load_preset(presets::UTF8_FULL_CONDENSED);
        table.set_header(Row::from(vec!["source", "label"]));

        for (source, unmapped) in reports.iter() {
            for label in unmapped.iter() {
                table.add_row(vec![source.as_str(), label.as_str()]);
            }
        }

        if table.is_empty() {
            println!("OK, all entity labels are mapped.");
        } else {
            println!("{table}");
        }

        Ok(())
    }
}
