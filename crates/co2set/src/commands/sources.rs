use std::fs;

use clap::Parser;
use comfy_table::{presets, Row, Table};
use humansize::{make_format, BINARY};

use crate::prelude::*;
use crate::utils::relpath;

/// List the configured sources and whether their files are present.
#[derive(Debug, Default, Parser)]
pub(crate) struct Sources {
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

impl Sources {
    pub(crate) fn execute(self) -> Co2setResult<()> {
        let project = Project::discover()?;
        let base_dir = project.base_dir();
        let config = project.config()?;

        let formatter = make_format(BINARY);

        let mut table = Table::new();
        table.load_preset(presets::UTF8_FULL_CONDENSED);
        table.set_header(Row::from(vec![
            "source", "priority", "columns", "size", "path",
        ]));

        let mut missing = 0;

        for source in config.sources.iter() {
            let path = base_dir.join(&source.path);

            let size = match fs::metadata(&path) {
                Ok(metadata) => formatter(metadata.len()),
                Err(_) => {
                    missing += 1;
                    "missing".to_string()
                }
            };

            table.add_row(vec![
                source.name.clone(),
                source.priority.to_string(),
                source.columns.len().to_string(),
                size,
                relpath(&path, base_dir),
            ]);
        }

        eprintln!(
            "dataset '{}', version {}.\n",
            config.metadata.name, config.metadata.version
        );
        println!("{table}");

        if missing > 0 {
            bail!("{missing} source file(s) missing");
        }

        Ok(())
    }
}
