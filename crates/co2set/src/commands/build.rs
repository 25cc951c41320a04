use std::fs;
use std::path::Path;

use clap::Parser;
use indicatif::ParallelProgressIterator;
use polars::prelude::*;
use rayon::prelude::*;

use crate::codebook::Codebook;
use crate::prelude::*;
use crate::source::SourceTable;
use crate::{derive, export, merge};

const PBAR_LOAD: &str =
    "Loading sources: {human_pos} ({percent}%) | \
        elapsed: {elapsed_precise}{msg}";

/// Build the dataset: load, standardize and convert all sources,
/// merge them into one wide table, derive per-capita/per-GDP columns
/// and export CSV, XLSX, JSON and the codebook.
#[derive(Debug, Default, Parser)]
pub(crate) struct Build {
    /// Run verbosely. Print additional progress information to the
    /// standard error stream. This option conflicts with the
    /// `--quiet` option.
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Operate quietly; do not show progress. This option conflicts
    /// with the `--verbose` option.
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Fail the build if any source contains entity labels without
    /// an alias rule. By default unmapped labels are reported and
    /// their rows excluded from the output.
    #[arg(long)]
    strict: bool,
}

fn entity_metadata(path: &Path) -> Co2setResult<DataFrame> {
    let meta = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.into()))?
        .finish()?
        .lazy()
        .select([
            col("entity").cast(DataType::String),
            col("iso_code").cast(DataType::String),
        ])
        .collect()?;

    if meta.column("entity")?.n_unique()? != meta.height() {
        bail!(
            "entity metadata '{}' contains duplicate entities",
            path.display()
        );
    }

    Ok(meta)
}

impl Build {
    pub(crate) fn execute(self) -> Co2setResult<()> {
        let project = Project::discover()?;
        let base_dir = project.base_dir();
        let config = project.config()?;

        if config.sources.is_empty() {
            bail!("no sources configured");
        }

        let pbar = ProgressBarBuilder::new(PBAR_LOAD, self.quiet)
            .len(config.sources.len() as u64)
            .build();

        let tables = config
            .sources
            .par_iter()
            .progress_with(pbar)
            .map(|spec| SourceTable::load(spec, base_dir))
            .collect::<Result<Vec<_>, _>>()?;

        let mut sources = vec![];
        let mut excluded = 0;

        for (table, unmapped) in tables {
            if !unmapped.is_empty() {
                if self.strict {
                    bail!(
                        "source '{}' contains {} unmapped entity \
                        labels (e.g. '{}')",
                        table.name,
                        unmapped.len(),
                        unmapped[0],
                    );
                }

                eprintln!(
                    "warning: source '{}' contains {} unmapped \
                    entity labels; their rows are excluded:",
                    table.name,
                    unmapped.len(),
                );
                for label in unmapped.iter() {
                    eprintln!("  - {label}");
                }

                excluded += unmapped.len();
            }

            sources.push(table);
        }

        let df = merge::merge(sources)?;
        let df = derive::apply(df, &config.derived)?;

        let mut lf = df.lazy();
        let mut first_columns = vec!["entity", "year"];

        if let Some(ref entities) = config.entities {
            let meta =
                entity_metadata(&base_dir.join(&entities.path))?;
            lf = lf.join(
                meta.lazy(),
                [col("entity")],
                [col("entity")],
                JoinArgs::new(JoinType::Left),
            );
            first_columns.push("iso_code");
        }

        let df = lf.collect()?;

        // deterministic output: index columns first, metric columns
        // sorted by name, rows sorted by (entity, year)
        let mut metric_columns: Vec<String> = df
            .get_column_names()
            .into_iter()
            .filter(|name| !first_columns.contains(name))
            .map(String::from)
            .collect();
        metric_columns.sort_unstable();

        let mut selection: Vec<Expr> =
            first_columns.iter().map(|name| col(name)).collect();
        selection
            .extend(metric_columns.iter().map(|name| col(name)));

        let mut df = df
            .lazy()
            .select(selection)
            .with_columns([dtype_col(&DataType::Float64).round(3)])
            .sort(["entity", "year"], Default::default())
            .collect()?;

        let columns: Vec<String> = df
            .get_column_names()
            .into_iter()
            .map(String::from)
            .collect();
        let codebook = Codebook::new(&config, &columns)?;
        let mut codebook = codebook.to_frame()?;

        let output_dir = project.output_dir();
        if !output_dir.exists() {
            fs::create_dir_all(&output_dir)?;
        }

        export::write_csv(
            &mut df,
            &output_dir.join(Project::DATA_CSV),
        )?;
        export::write_xlsx(
            &df,
            &codebook,
            &output_dir.join(Project::DATA_XLSX),
        )?;
        export::write_json(
            &df,
            &["iso_code"],
            &output_dir.join(Project::DATA_JSON),
        )?;
        export::write_codebook(
            &mut codebook,
            &output_dir.join(Project::CODEBOOK),
        )?;

        if self.verbose {
            eprintln!(
                "built '{}' {}: {} rows, {} columns, {} unmapped \
                labels excluded",
                config.metadata.name,
                config.metadata.version,
                df.height(),
                df.width(),
                excluded,
            );
        }

        Ok(())
    }
}
