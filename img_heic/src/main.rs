use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use img_heic::config::{DEFAULT_MAX_BATCH, DEFAULT_QUALITY};
use img_heic::{
    default_decoder, sniff_container, BatchEvent, BatchObserver, BatchReport, ConcurrencyPolicy,
    ConversionOutcome, ConvertConfig, DecodeError, ExtensionPolicy, HandleRegistry, ImageEncoder,
    InputFile, Orchestrator, OutputFormat, StagedBatch, ZipArchiveWriter,
};
use serde_json::json;
use shared_utils::{
    collect_inputs, handle_error, print_summary_report, report_error, BatchResult, ErrorAction,
    ErrorCategory, UnifiedProgressBar,
};
use std::collections::HashSet;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "img-heic")]
#[command(version, about = "Batch HEIC/HEIF to JPEG converter", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert HEIC/HEIF files to JPEG (PNG when JPEG is not possible)
    Convert(ConvertArgs),

    /// Show what each file actually contains, whatever its extension
    Probe {
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,

        #[arg(long = "output-format", value_enum, default_value = "human")]
        output_format: ReportFormat,
    },
}

#[derive(Args)]
struct ConvertArgs {
    /// Files or directories
    #[arg(value_name = "INPUT", required = true)]
    inputs: Vec<PathBuf>,

    /// Directory for converted files (default: current directory, unless --zip is given)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Also bundle all converted files into this zip archive
    #[arg(short, long, value_name = "FILE")]
    zip: Option<PathBuf>,

    /// Accept only .heic, not .heif
    #[arg(long)]
    heic_only: bool,

    /// Convert one file at a time
    #[arg(long, conflicts_with = "workers")]
    sequential: bool,

    /// Number of parallel workers (default: 3, or IMG_HEIC_WORKERS)
    #[arg(short, long)]
    workers: Option<usize>,

    /// JPEG quality, 0.0 to 1.0
    #[arg(short, long, default_value_t = DEFAULT_QUALITY)]
    quality: f32,

    /// Encode PNG instead of JPEG
    #[arg(long)]
    png: bool,

    /// Files beyond this count are ignored
    #[arg(long, default_value_t = DEFAULT_MAX_BATCH)]
    max_files: usize,

    /// Overwrite existing output files
    #[arg(short, long)]
    force: bool,

    #[arg(short, long)]
    recursive: bool,

    #[arg(long = "output-format", value_enum, default_value = "human")]
    output_format: ReportFormat,

    #[arg(short, long)]
    verbose: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum ReportFormat {
    Human,
    Json,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let verbose = matches!(&cli.command, Commands::Convert(args) if args.verbose);
    let log_config = shared_utils::logging::LogConfig::default()
        .with_stderr(verbose)
        .with_level(if verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        });
    if let Err(e) = shared_utils::logging::init_logging("img_heic", log_config) {
        eprintln!("⚠️  Logging disabled: {:#}", e);
    }
    shared_utils::install_panic_handler();

    match cli.command {
        Commands::Convert(args) => convert(args),
        Commands::Probe {
            files,
            output_format,
        } => probe(&files, output_format),
    }
}

fn build_config(args: &ConvertArgs) -> ConvertConfig {
    let concurrency = if args.sequential {
        ConcurrencyPolicy::Sequential
    } else {
        match args.workers {
            Some(0) | Some(1) => ConcurrencyPolicy::Sequential,
            Some(workers) => ConcurrencyPolicy::Pooled { workers },
            None => ConcurrencyPolicy::from_env(),
        }
    };

    ConvertConfig::new()
        .with_extensions(if args.heic_only {
            ExtensionPolicy::HeicOnly
        } else {
            ExtensionPolicy::HeicAndHeif
        })
        .with_max_batch(args.max_files)
        .with_concurrency(concurrency)
        .with_output_format(if args.png {
            OutputFormat::Png
        } else {
            OutputFormat::Jpeg
        })
        .with_quality(args.quality)
}

/// Paths that will be read, plus what was left out before any file is opened.
struct Selection {
    paths: Vec<PathBuf>,
    dropped_by_filter: usize,
    dropped_by_cap: usize,
}

/// Apply the extension filter and the batch cap to the path list, so at most
/// `max_batch` files are ever read into memory.
fn select_paths(paths: Vec<PathBuf>, policy: ExtensionPolicy, max_batch: usize) -> Selection {
    let total = paths.len();
    let matching: Vec<PathBuf> = paths
        .into_iter()
        .filter(|p| {
            p.file_name()
                .is_some_and(|n| policy.accepts(&n.to_string_lossy()))
        })
        .collect();
    let dropped_by_filter = total - matching.len();
    let dropped_by_cap = matching.len().saturating_sub(max_batch);

    Selection {
        paths: matching.into_iter().take(max_batch).collect(),
        dropped_by_filter,
        dropped_by_cap,
    }
}

fn read_inputs(paths: &[PathBuf], result: &mut BatchResult) -> Vec<InputFile> {
    let mut inputs = Vec::with_capacity(paths.len());
    for path in paths {
        match InputFile::read(path) {
            Ok(file) => inputs.push(file),
            Err(e) => {
                handle_error(
                    ErrorCategory::Optional,
                    &format!("Failed to read {}", path.display()),
                    e,
                    None,
                );
                result.skip();
            }
        }
    }
    inputs
}

fn convert(args: ConvertArgs) -> anyhow::Result<()> {
    let human = args.output_format == ReportFormat::Human;
    let config = build_config(&args);
    info!(config = ?config, "starting conversion");

    let mut result = BatchResult::new();
    let paths = collect_inputs(&args.inputs, config.extensions.extensions(), args.recursive);
    let selection = select_paths(paths, config.extensions, config.max_batch);
    let inputs = read_inputs(&selection.paths, &mut result);

    let orchestrator = Orchestrator::new(config.clone());
    let batch = orchestrator
        .stage(inputs)
        .context("Nothing to convert")?;
    let dropped_by_cap = selection.dropped_by_cap + batch.dropped_by_cap();
    let dropped_by_filter = selection.dropped_by_filter + batch.dropped_by_filter();

    if human {
        println!("📂 Staged {} file(s)", batch.len());
        if dropped_by_cap > 0 {
            println!(
                "⚠️  {} file(s) over the limit of {} were ignored",
                dropped_by_cap, config.max_batch
            );
        }
        if dropped_by_filter > 0 && args.verbose {
            println!("ℹ️  {} non-HEIC file(s) ignored", dropped_by_filter);
        }
    }

    let pb = UnifiedProgressBar::new(batch.len() as u64, "Converting", !human);
    orchestrator.add_observer(progress_observer(Arc::clone(&pb)));

    let decoder = default_decoder(config.output_format);
    let start = Instant::now();
    let report = orchestrator
        .run(&batch, decoder.as_ref(), &ImageEncoder)
        .context("Conversion run failed")?;
    pb.finish_with_message("Complete!");

    let write_files = args.output.is_some() || args.zip.is_none();
    let existing = if write_files {
        let dir = args.output.clone().unwrap_or_else(|| PathBuf::from("."));
        write_outputs(&report, &dir, args.force)?
    } else {
        HashSet::new()
    };

    let mut archive_path = None;
    if let Some(zip_path) = &args.zip {
        match orchestrator.archive(&ZipArchiveWriter::new()) {
            Ok(bytes) => {
                std::fs::write(zip_path, &bytes)
                    .with_context(|| format!("Failed to write archive {}", zip_path.display()))?;
                if human {
                    println!("📦 Archive: {} ({})", zip_path.display(), shared_utils::format_bytes(bytes.len() as u64));
                }
                archive_path = Some(zip_path.clone());
            }
            Err(e) => report_error(&e),
        }
    }

    tally(&report, &existing, &mut result);
    let summary = report.summary();
    if human {
        print_summary_report(
            &result,
            start.elapsed(),
            batch.total_bytes(),
            summary.output_bytes,
            "HEIC Conversion",
        );
    } else {
        let dropped = Dropped {
            by_cap: dropped_by_cap,
            by_filter: dropped_by_filter,
        };
        print_json_report(&batch, dropped, &report, &result, archive_path.as_deref())?;
    }

    if result.has_failures() {
        warn!(failed = result.failed, total = result.total, "some files failed to convert");
    }

    if let Some(cause) = report.aborted {
        if let ErrorAction::Abort(e) = handle_error(
            ErrorCategory::Fatal,
            "HEIC decoder",
            DecodeError::Unavailable(cause),
            Some("Build with the default `libheif` feature and make sure libheif is installed"),
        ) {
            return Err(e);
        }
    }

    Ok(())
}

fn progress_observer(pb: Arc<UnifiedProgressBar>) -> Arc<dyn BatchObserver> {
    Arc::new(move |event: &BatchEvent| match event {
        BatchEvent::Progress { completed, .. } => pb.set_position(*completed as u64),
        BatchEvent::Outcome { outcome, .. } => match outcome {
            ConversionOutcome::Success(s) => pb.set_message(s.output_name.clone()),
            ConversionOutcome::Failure(f) => {
                pb.println(&format!("❌ {}: {}", f.input_name, f.reason));
            }
        },
        _ => {}
    })
}

/// Write each success into `dir` through a result handle.
///
/// Returns the output names left alone because the file already existed.
fn write_outputs(
    report: &BatchReport,
    dir: &Path,
    force: bool,
) -> anyhow::Result<HashSet<String>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

    let mut skipped = HashSet::new();
    let registry = HandleRegistry::new();
    for success in report.successes() {
        let handle = registry.issue(success);
        let target = dir.join(handle.name());
        if target.exists() && !force {
            warn!(path = ?target, "output exists, skipping (use --force to overwrite)");
            eprintln!("⏭️  Exists, skipped: {}", target.display());
            skipped.insert(success.output_name.clone());
            continue;
        }
        let bytes = handle
            .bytes()
            .with_context(|| format!("Result {} was released before writing", handle.uri()))?;
        std::fs::write(&target, &bytes[..])
            .with_context(|| format!("Failed to write {}", target.display()))?;
    }
    registry.release_all();
    Ok(skipped)
}

/// Count each outcome once; a success whose file was not written is a skip.
fn tally(report: &BatchReport, existing: &HashSet<String>, result: &mut BatchResult) {
    for outcome in &report.outcomes {
        match outcome {
            ConversionOutcome::Success(s) if existing.contains(&s.output_name) => result.skip(),
            ConversionOutcome::Success(_) => result.success(),
            ConversionOutcome::Failure(f) => result.fail(f.input_name.clone(), f.reason.to_string()),
        }
    }
}

#[derive(Clone, Copy)]
struct Dropped {
    by_cap: usize,
    by_filter: usize,
}

fn print_json_report(
    batch: &StagedBatch,
    dropped: Dropped,
    report: &BatchReport,
    result: &BatchResult,
    archive: Option<&Path>,
) -> anyhow::Result<()> {
    let value = json!({
        "generation": report.generation,
        "staged": batch.len(),
        "dropped_by_cap": dropped.by_cap,
        "dropped_by_filter": dropped.by_filter,
        "input_bytes": batch.total_bytes(),
        "summary": report.summary(),
        "counts": result,
        "outcomes": report.outcomes,
        "aborted": report.aborted,
        "archive": archive.map(|p| p.display().to_string()),
    });
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

fn probe(files: &[PathBuf], format: ReportFormat) -> anyhow::Result<()> {
    let mut rows = Vec::with_capacity(files.len());
    for path in files {
        let mut head = Vec::with_capacity(64);
        std::fs::File::open(path)
            .and_then(|f| f.take(64).read_to_end(&mut head))
            .with_context(|| format!("Failed to read {}", path.display()))?;
        rows.push((path, sniff_container(&head)));
    }

    match format {
        ReportFormat::Human => {
            for (path, kind) in &rows {
                println!("{:<8} {}", kind.to_string(), path.display());
            }
        }
        ReportFormat::Json => {
            let value: Vec<_> = rows
                .iter()
                .map(|(path, kind)| json!({ "path": path.display().to_string(), "container": kind }))
                .collect();
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
    }
    Ok(())
}
