//! pdfanchor CLI - entity extraction with page coordinates

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use pdfanchor::batch::extract_batch_with;
use pdfanchor::export::{self, write_json};
use pdfanchor::{
    BatchReport, CancellationToken, DocumentOutcome, EntityConfig, EntityKind, ExtractOptions,
    Extractor, JsonFormat, MemorySource, PatternEngine, StructuredDocument,
};

#[derive(Parser)]
#[command(name = "pdfanchor")]
#[command(author = "pdfanchor contributors")]
#[command(version)]
#[command(about = "Extract entities from PDF text runs, anchored to page coordinates", long_about = None)]
struct Cli {
    /// Show debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by the extraction commands.
#[derive(clap::Args)]
struct ExtractArgs {
    /// Entity kinds to extract (default: date, person, organization, account)
    #[arg(long, value_enum, value_delimiter = ',')]
    kinds: Vec<KindArg>,

    /// Abort a document when the NLP engine takes longer than this
    #[arg(long, value_name = "MS", env = "PDFANCHOR_TIMEOUT_MS")]
    timeout_ms: Option<u64>,

    /// Read numeric dates as month/day instead of day/month
    #[arg(long)]
    month_first: bool,

    /// Disable parallel page processing
    #[arg(long)]
    sequential: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract one run file to structured JSON
    Extract {
        /// Input run file (JSON)
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Output compact JSON
        #[arg(long)]
        compact: bool,

        #[command(flatten)]
        args: ExtractArgs,
    },

    /// Extract every run file of a directory in parallel
    Batch {
        /// Directory of run files (JSON)
        #[arg(value_name = "DIR")]
        input: PathBuf,

        /// Output directory
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// Also write NER training data (training.json)
        #[arg(long)]
        training: bool,

        #[command(flatten)]
        args: ExtractArgs,
    },

    /// Show a summary of the extracted document
    Info {
        /// Input run file (JSON)
        #[arg(value_name = "FILE")]
        input: PathBuf,

        #[command(flatten)]
        args: ExtractArgs,
    },

    /// Show version information
    Version,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum KindArg {
    /// Calendar dates
    Date,
    /// Person names
    Person,
    /// Organizations
    Org,
    /// Monetary amounts
    Money,
    /// Account numbers
    Account,
    /// Places
    Location,
}

impl From<KindArg> for EntityKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Date => EntityKind::Date,
            KindArg::Person => EntityKind::Person,
            KindArg::Org => EntityKind::Organization,
            KindArg::Money => EntityKind::MonetaryAmount,
            KindArg::Account => EntityKind::AccountNumber,
            KindArg::Location => EntityKind::Location,
        }
    }
}

impl ExtractArgs {
    fn options(&self) -> ExtractOptions {
        let mut entities = EntityConfig::default().with_day_first(!self.month_first);
        if !self.kinds.is_empty() {
            entities = entities.with_kinds(self.kinds.iter().map(|&k| EntityKind::from(k)));
        }
        let mut options = ExtractOptions::new()
            .with_entities(entities)
            .with_parallel(!self.sequential);
        if let Some(ms) = self.timeout_ms {
            options = options.with_engine_timeout(Duration::from_millis(ms));
        }
        options
    }

    fn extractor(&self) -> Result<Extractor, Box<dyn std::error::Error>> {
        Ok(Extractor::with_options(
            Arc::new(PatternEngine::new()),
            self.options(),
        )?)
    }
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let result = match cli.command {
        Commands::Extract {
            input,
            output,
            compact,
            args,
        } => cmd_extract(&input, output.as_deref(), compact, &args),
        Commands::Batch {
            input,
            output,
            training,
            args,
        } => cmd_batch(&input, output.as_deref(), training, &args),
        Commands::Info { input, args } => cmd_info(&input, &args),
        Commands::Version => {
            cmd_version();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn cmd_extract(
    input: &Path,
    output: Option<&Path>,
    compact: bool,
    args: &ExtractArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let source = MemorySource::from_path(input)?;
    let doc = args.extractor()?.extract(&source)?;

    let format = if compact {
        JsonFormat::Compact
    } else {
        JsonFormat::Pretty
    };
    let json = export::to_json(&doc, format)?;

    if let Some(path) = output {
        write_json(path, &json)?;
        println!("{} {}", "Saved to".green(), path.display());
    } else {
        println!("{}", json);
    }

    for page in doc.pages().iter().filter(|p| p.is_degraded()) {
        eprintln!("{} page {}: {:?}", "Warning:".yellow(), page.page, page.status);
    }

    Ok(())
}

/// Run files of a directory, sorted by name.
fn run_files(dir: &Path) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();
    Ok(files)
}

fn cmd_batch(
    input: &Path,
    output: Option<&Path>,
    training: bool,
    args: &ExtractArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let start = Instant::now();
    let output_dir = output.map(|p| p.to_path_buf()).unwrap_or_else(|| {
        let name = input.file_name().unwrap_or_default().to_string_lossy();
        PathBuf::from(format!("{}_output", name))
    });
    fs::create_dir_all(&output_dir)?;

    let files = run_files(input)?;
    if files.is_empty() {
        println!("{} {}", "No run files found in".yellow(), input.display());
        return Ok(());
    }

    let mut sources = Vec::with_capacity(files.len());
    let mut outcomes = Vec::new();
    for path in &files {
        match MemorySource::from_path(path) {
            Ok(source) => sources.push(source),
            Err(e) => {
                log::warn!("Skipping {}: {}", path.display(), e);
                outcomes.push(DocumentOutcome::failed(path.display().to_string(), e.to_string()));
            }
        }
    }

    let extractor = args.extractor()?;
    let pb = ProgressBar::new(sources.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );

    let report = extract_batch_with(&extractor, &sources, &CancellationToken::new(), |outcome| {
        pb.set_message(outcome.source_id.clone());
        pb.inc(1);
    });
    pb.finish_with_message("Done!");

    outcomes.extend(report.outcomes);
    let report = BatchReport::from_outcomes(outcomes, start.elapsed());

    println!("\n{}", "Output files:".green().bold());
    for doc in report.documents() {
        let name = format!("{}.json", doc.source_id());
        write_json(output_dir.join(&name), &export::to_json(doc, JsonFormat::Pretty)?)?;
        println!("  {} {}", "├─".dimmed(), name);
    }
    if training {
        write_json(
            output_dir.join("training.json"),
            &export::training_data_to_json(&report, JsonFormat::Pretty)?,
        )?;
        println!("  {} training.json", "├─".dimmed());
    }
    write_json(
        output_dir.join("summary.json"),
        &export::batch_to_json(&report, JsonFormat::Pretty)?,
    )?;
    println!("  {} summary.json", "└─".dimmed());

    print_summary(&report);
    Ok(())
}

fn print_summary(report: &BatchReport) {
    let summary = report.summary;
    println!();
    println!("{}", "Batch Summary".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    println!("{}: {}", "Documents".bold(), summary.total_documents);
    println!("{}: {}", "Successful".bold(), summary.successful.to_string().green());
    println!("{}: {}", "Failed".bold(), summary.failed.to_string().red());
    println!("{}: {}", "Entities".bold(), summary.total_entities);
    println!("{}: {:.2?}", "Elapsed".bold(), report.elapsed);

    for failure in report.failures() {
        println!(
            "  {} {}: {}",
            "✗".red(),
            failure.source_id,
            failure.error.as_deref().unwrap_or("unknown error")
        );
    }
}

fn cmd_info(input: &Path, args: &ExtractArgs) -> Result<(), Box<dyn std::error::Error>> {
    let source = MemorySource::from_path(input)?;
    let doc = args.extractor()?.extract(&source)?;
    print_info(input, &doc);
    Ok(())
}

fn print_info(input: &Path, doc: &StructuredDocument) {
    println!("{}", "Document Information".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());

    println!("{}: {}", "File".bold(), input.display());
    println!("{}: {}", "Source".bold(), doc.source_id());
    println!("{}: {}", "Engine".bold(), doc.metadata().engine);
    println!("{}: {}", "Pages".bold(), doc.page_count());
    println!("{}: {}", "Blocks".bold(), doc.blocks().len());
    println!("{}: {}", "Characters".bold(), doc.text().chars().count());

    let degraded = doc.degraded_pages();
    if !degraded.is_empty() {
        println!("{}: {:?}", "Degraded pages".bold().yellow(), degraded);
    }

    println!();
    println!("{}", "Entities".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());

    let mut counts: BTreeMap<EntityKind, usize> = BTreeMap::new();
    for anchored in doc.entities() {
        *counts.entry(anchored.entity.kind).or_default() += 1;
    }
    for (kind, count) in &counts {
        println!("{}: {}", kind.to_string().bold(), count);
    }
    for anchored in doc.entities() {
        let pages: Vec<String> = anchored.pages().iter().map(|p| (p + 1).to_string()).collect();
        println!(
            "  {} {} {} (page {})",
            "•".dimmed(),
            anchored.entity.kind,
            anchored.entity.text.escape_debug(),
            pages.join(", ")
        );
    }
    if !doc.unanchored().is_empty() {
        println!("{}: {}", "Unanchored".bold().yellow(), doc.unanchored().len());
    }
    if !doc.warnings().is_empty() {
        println!("{}: {}", "Normalization warnings".bold().yellow(), doc.warnings().len());
    }
}

fn cmd_version() {
    println!("{} {}", "pdfanchor".cyan().bold(), env!("CARGO_PKG_VERSION"));
    println!("Layout-aware entity extraction tool");
    println!();
    println!("Library: {}", pdfanchor::VERSION.dimmed());
    println!("License: MIT");
}
