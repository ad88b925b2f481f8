//! Command-line front end: read libraries, optionally deduplicate, write them out.

use std::fs::{self, File};
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;

use anyhow::{Context, bail};
use clap::{Args, Parser};
use colored::Colorize;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use refdedupe::dedupe::{
    BlockingKey, CancellationToken, DedupeEvent, Deduplicator, DeduplicatorConfig, Dimension,
    ResolutionPolicy, RunResult,
};
use refdedupe::json::to_tab_indented;
use refdedupe::{Format, Reference, read_file};

/// Read, deduplicate and convert reference libraries
#[derive(Parser, Debug)]
#[command(name = "refdedupe", version)]
#[command(after_help = "\
Examples:
  refdedupe library.ris --count
  refdedupe a.ris b.xml -f merged.csv
  refdedupe library.xml --dedupe remove --threshold 0.8 -f clean.ris
  refdedupe library.ris -d mark --weight journal=0.1 --block first_author_year -x")]
struct Cli {
    /// Library files to read; the format is taken from each file's extension
    files: Vec<PathBuf>,

    /// Don't output references, only their count (sets `-o count`)
    #[arg(short, long)]
    count: bool,

    /// Output JSON (sets `-o json`)
    #[arg(short, long)]
    json: bool,

    /// Output an EndNote XML library (sets `-o endnotexml`)
    #[arg(short = 'x', long)]
    xml: bool,

    /// Output mode: any library format, or inspect, json, count
    #[arg(short, long, value_name = "MODE")]
    output: Option<String>,

    /// Write output to a file instead of stdout (sets `-o` from the file type when possible)
    #[arg(short = 'f', long, value_name = "PATH")]
    output_file: Option<PathBuf>,

    /// Be verbose
    #[arg(short, long)]
    verbose: bool,

    /// Force disable color
    #[arg(long)]
    no_color: bool,

    #[command(flatten)]
    dedupe: DedupeArgs,
}

#[derive(Args, Debug)]
#[command(next_help_heading = "Deduplication")]
struct DedupeArgs {
    /// Deduplicate the combined library: count, mark or remove
    #[arg(short, long, value_name = "POLICY")]
    dedupe: Option<ResolutionPolicy>,

    /// Minimum weighted score for a duplicate (0..=1)
    #[arg(long)]
    threshold: Option<f64>,

    /// Largest year difference still treated as the same year
    #[arg(long, value_name = "YEARS")]
    year_tolerance: Option<u32>,

    /// Weight of one dimension, e.g. `title=0.5` (repeatable)
    #[arg(long = "weight", value_name = "DIM=VALUE", value_parser = parse_weight)]
    weights: Vec<(Dimension, f64)>,

    /// Only compare references sharing a blocking key (first_author_year)
    #[arg(long, value_name = "KEY")]
    block: Option<BlockingKey>,

    /// Comparisons between progress updates
    #[arg(long, value_name = "N")]
    batch_size: Option<usize>,

    /// Score each batch on all cores
    #[arg(long)]
    parallel: bool,

    /// JSON file with a full deduplication config; flags override its values
    #[arg(long, value_name = "FILE")]
    dedupe_config: Option<PathBuf>,
}

fn parse_weight(value: &str) -> Result<(Dimension, f64), String> {
    let (dimension, weight) = value
        .split_once('=')
        .ok_or_else(|| format!("expected DIM=VALUE, got \"{value}\""))?;
    let dimension = dimension.parse::<Dimension>().map_err(|e| e.to_string())?;
    let weight = weight
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid weight \"{weight}\": {e}"))?;
    Ok((dimension, weight))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Json,
    Inspect,
    Count,
    Library(Format),
}

impl FromStr for OutputMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "json" => Ok(OutputMode::Json),
            "inspect" => Ok(OutputMode::Inspect),
            "count" => Ok(OutputMode::Count),
            other => other
                .parse::<Format>()
                .map(OutputMode::Library)
                .map_err(|_| anyhow::anyhow!("Invalid output mode \"{other}\"")),
        }
    }
}

impl Cli {
    /// Resolves the aliased flags, `-o` and the output file into one mode.
    fn output_mode(&self) -> anyhow::Result<OutputMode> {
        let aliases = [
            (self.count, "count"),
            (self.json, "json"),
            (self.xml, "endnotexml"),
        ];
        let mut chosen = aliases.iter().filter(|(set, _)| *set).map(|(_, mode)| *mode);
        let alias = chosen.next();
        if chosen.next().is_some() || (alias.is_some() && self.output.is_some()) {
            bail!("Only one output mode can be used");
        }

        if let Some(mode) = alias.or(self.output.as_deref()) {
            return mode.parse();
        }
        match &self.output_file {
            Some(path) => {
                debug!(path = %path.display(), "determining output format from file path");
                let format = Format::identify(path).with_context(|| {
                    format!(
                        "Unknown output file format for \"{}\", specify one with `-o <format>`",
                        path.display()
                    )
                })?;
                info!(%format, "using output format");
                Ok(OutputMode::Library(format))
            }
            None => Ok(OutputMode::Json),
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("REFDEDUPE_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose {
            "refdedupe=info"
        } else {
            "refdedupe=warn"
        })
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(io::stderr))
        .init();
}

fn check_readable(files: &[PathBuf]) -> anyhow::Result<()> {
    for file in files {
        if File::open(file).is_err() {
            bail!("File \"{}\" is not readable", file.display());
        }
    }
    Ok(())
}

fn check_writable(path: &Path) -> anyhow::Result<()> {
    let read_only = fs::metadata(path)
        .map(|meta| meta.permissions().readonly())
        .unwrap_or(false);
    if read_only {
        bail!("File \"{}\" is not writable", path.display());
    }
    Ok(())
}

fn read_libraries(files: &[PathBuf]) -> anyhow::Result<Vec<Reference>> {
    let mut progress = ProgressLine::new("Reading", "files");
    let mut references = Vec::new();
    for (done, file) in files.iter().enumerate() {
        let library =
            read_file(file).with_context(|| format!("Failed to read \"{}\"", file.display()))?;
        info!(path = %file.display(), count = library.len(), "read library");
        references.extend(library);
        progress.update(done as u64 + 1, files.len() as u64);
    }
    progress.clear();
    Ok(references)
}

/// Builds the deduplication config, or `None` when no deduplication was asked for.
fn dedupe_config(args: &DedupeArgs) -> anyhow::Result<Option<DeduplicatorConfig>> {
    let mut config = match (&args.dedupe_config, args.dedupe) {
        (Some(path), _) => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("File \"{}\" is not readable", path.display()))?;
            serde_json::from_str::<DeduplicatorConfig>(&content)
                .with_context(|| format!("Invalid dedupe config \"{}\"", path.display()))?
        }
        (None, Some(_)) => DeduplicatorConfig::default(),
        (None, None) => return Ok(None),
    };

    if let Some(policy) = args.dedupe {
        config.policy = policy;
    }
    if let Some(threshold) = args.threshold {
        config.threshold = threshold;
    }
    if let Some(tolerance) = args.year_tolerance {
        config.year_tolerance = tolerance;
    }
    for &(dimension, weight) in &args.weights {
        config.weights.set(dimension, weight);
    }
    if let Some(block) = &args.block {
        config.blocking = Some(block.clone());
    }
    if let Some(batch_size) = args.batch_size {
        config.batch_size = batch_size;
    }
    config.run_in_parallel |= args.parallel;
    Ok(Some(config))
}

/// Single-line progress display on a terminal's stderr.
struct ProgressLine {
    label: &'static str,
    unit: &'static str,
    enabled: bool,
    last_percent: Option<u64>,
}

impl ProgressLine {
    fn new(label: &'static str, unit: &'static str) -> Self {
        Self {
            label,
            unit,
            enabled: io::stderr().is_terminal(),
            last_percent: None,
        }
    }

    /// Percentage to draw, or `None` when it has not changed since the last draw.
    fn advance(&mut self, completed: u64, total: u64) -> Option<u64> {
        if total == 0 {
            return None;
        }
        let percent = completed * 100 / total;
        if self.last_percent == Some(percent) {
            return None;
        }
        self.last_percent = Some(percent);
        Some(percent)
    }

    fn update(&mut self, completed: u64, total: u64) {
        if !self.enabled {
            return;
        }
        let Some(percent) = self.advance(completed, total) else {
            return;
        };
        let mut stderr = io::stderr().lock();
        let _ = write!(
            stderr,
            "\r{} {completed}/{total} {} ({percent}%)",
            self.label.bright_black(),
            self.unit
        );
        let _ = stderr.flush();
    }

    fn clear(&self) {
        if self.enabled && self.last_percent.is_some() {
            let _ = write!(io::stderr(), "\r\x1b[2K");
        }
    }
}

fn deduplicate(records: Vec<Reference>, config: DeduplicatorConfig) -> anyhow::Result<RunResult> {
    let deduplicator = Deduplicator::with_config(config).context("Invalid dedupe settings")?;
    let mut progress = ProgressLine::new("Deduplicating", "comparisons");
    let mut result = None;

    for event in deduplicator.compare(records, CancellationToken::new())? {
        match event {
            DedupeEvent::Progress(snapshot) => progress.update(snapshot.completed, snapshot.total),
            DedupeEvent::DuplicatePair(pair) => info!(
                earlier = %pair.earlier.stable_id,
                later = %pair.later.stable_id,
                reason = %pair.verdict.reason,
                "duplicate found"
            ),
            DedupeEvent::End(run) | DedupeEvent::Cancelled(run) => result = Some(run),
        }
    }
    progress.clear();

    let result = result.context("Deduplication ended without a result")?;
    if result.scorer_errors > 0 {
        warn!(
            pairs = result.scorer_errors,
            "some pairs could not be scored and were treated as distinct"
        );
    }
    Ok(result)
}

fn render(
    mode: OutputMode,
    references: &[Reference],
    duplicates: Option<usize>,
) -> anyhow::Result<String> {
    Ok(match mode {
        OutputMode::Json => to_tab_indented(references)?,
        OutputMode::Inspect => format!("{references:#?}"),
        OutputMode::Count => {
            let mut out = format!("Found {} references", references.len().to_string().cyan());
            if let Some(duplicates) = duplicates {
                out.push_str(&format!(
                    "\nFound {} duplicates",
                    duplicates.to_string().yellow()
                ));
            }
            out
        }
        OutputMode::Library(format) => format.codec().write(references)?,
    })
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let mode = cli.output_mode()?;
    let config = dedupe_config(&cli.dedupe)?;

    check_readable(&cli.files)?;
    if let Some(path) = &cli.output_file {
        check_writable(path)?;
    }

    let mut references = read_libraries(&cli.files)?;
    let mut duplicates = None;
    if let Some(config) = config {
        if references.len() < 2 {
            info!(count = references.len(), "too few references to deduplicate");
        } else {
            let result = deduplicate(references, config)?;
            info!(
                duplicates = result.duplicates_found,
                remaining = result.records.len(),
                "deduplication finished"
            );
            duplicates = Some(result.duplicates_found);
            references = result.records;
        }
    }

    let output = render(mode, &references, duplicates)?;
    match &cli.output_file {
        Some(path) => fs::write(path, output)
            .with_context(|| format!("File \"{}\" is not writable", path.display()))?,
        None => {
            let mut stdout = io::stdout().lock();
            writeln!(stdout, "{output}")?;
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if cli.no_color {
        colored::control::set_override(false);
    }
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {err:#}", "ERROR".red());
            ExitCode::FAILURE
        }
    }
}
