//! CLI for citemap - map numeric citations in Markdown papers to their references.

use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{info, warn};

use citemap::{
    builtin_preset, builtin_preset_names, load_document, load_options, parse_references,
    reference_rows, references_json, render_summary, resolve_document, write_csv, write_json,
    Document, OptionsError, OutputError, ResolveError, ResolveOptions, ResolvedMap, Severity,
};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// Map numeric in-text citations to bibliography entries
#[derive(Parser)]
#[command(name = "citemap")]
#[command(version)]
#[command(after_help = "\
Examples:
  citemap map paper.md
  citemap map paper.md --format summary --top 5
  citemap map paper.md --out-dir reports/
  cat paper.md | citemap refs -
  citemap presets")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Show debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve every citation in a document and write the citation map
    #[command(after_help = "\
Examples:
  citemap map paper.md -o mapping.csv
  citemap map paper.md --format json --preset window
  citemap map paper.md --out-dir reports/ --samples 5

Citation forms: [7], [3, 7, 9], [5-9], [ 1 2 ], Smith et al. (2020) [4]")]
    Map {
        /// Input Markdown file (use '-' for stdin)
        input: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Csv)]
        format: Format,

        /// Output file (default: stdout)
        #[arg(short, long, conflicts_with = "out_dir")]
        output: Option<PathBuf>,

        /// Write citation_mapping.csv, citation_report.md and references.json here
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Number of sample context columns in the CSV
        #[arg(long, default_value_t = 3)]
        samples: usize,

        /// Length of the most-cited list in the summary
        #[arg(long, default_value_t = 10)]
        top: usize,

        #[command(flatten)]
        options: OptionArgs,
    },

    /// Print the parsed bibliography as JSON
    Refs {
        /// Input Markdown file (use '-' for stdin)
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        options: OptionArgs,
    },

    /// List available builtin option presets
    Presets,
}

#[derive(Args)]
struct OptionArgs {
    /// Builtin option preset (see 'presets' command)
    #[arg(long, conflicts_with = "config")]
    preset: Option<String>,

    /// Options TOML file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Occurrences of one reference closer than this many characters collapse
    #[arg(long)]
    dedup_radius: Option<usize>,

    /// Maximum number of references a range marker expands to
    #[arg(long)]
    range_cap: Option<usize>,

    /// Never read '[ 1 2 ]' as reference 12
    #[arg(long)]
    no_spaced_digits: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Csv,
    Json,
    Summary,
}

// ---------------------------------------------------------------------------
// AppError: semantic exit codes
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum AppError {
    /// Exit 10: input document not found / unreadable / empty
    InputFile(String),
    /// Exit 11: preset unknown, options file unreadable or invalid
    Options(String),
    /// Exit 12: cannot write output
    OutputFile(String),
}

impl AppError {
    fn exit_code(&self) -> i32 {
        match self {
            AppError::InputFile(_) => 10,
            AppError::Options(_) => 11,
            AppError::OutputFile(_) => 12,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::InputFile(msg) => {
                write!(
                    f,
                    "{}\n  hint: the input must be a non-empty UTF-8 Markdown file",
                    msg
                )
            }
            AppError::Options(msg) => {
                let names = builtin_preset_names().join(", ");
                write!(
                    f,
                    "{}\n  available builtin presets: {}\n  hint: use a builtin preset name, or a TOML file of option fields",
                    msg, names
                )
            }
            AppError::OutputFile(msg) => {
                write!(
                    f,
                    "{}\n  hint: check that the output directory exists and is writable",
                    msg
                )
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if let Err(e) = run(cli.command) {
        eprintln!("Error: {}", e);
        process::exit(e.exit_code());
    }
}

fn run(command: Commands) -> Result<(), AppError> {
    match command {
        Commands::Map {
            input,
            format,
            output,
            out_dir,
            samples,
            top,
            options,
        } => {
            let options = build_options(&options)?;
            let report = Report {
                format,
                samples,
                top,
            };
            map_command(&input, &options, &report, output.as_deref(), out_dir.as_deref())?;
        }
        Commands::Refs {
            input,
            output,
            options,
        } => {
            let options = build_options(&options)?;
            refs_command(&input, &options, output.as_deref())?;
        }
        Commands::Presets => {
            presets_command();
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Resolves the preset or config file, then applies flag overrides.
fn build_options(args: &OptionArgs) -> Result<ResolveOptions, AppError> {
    let mut options = match (&args.preset, &args.config) {
        (Some(name), _) => builtin_preset(name).map_err(map_options_error)?,
        (None, Some(path)) => load_options(path)
            .map_err(|e| AppError::Options(format!("'{}': {}", path.display(), e)))?,
        (None, None) => ResolveOptions::default(),
    };

    if let Some(radius) = args.dedup_radius {
        options.dedup_radius = radius;
    }
    if let Some(cap) = args.range_cap {
        options.range_cap = cap;
    }
    if args.no_spaced_digits {
        options.spaced_digits = false;
    }

    options.validate().map_err(AppError::Options)?;
    Ok(options)
}

fn map_options_error(e: OptionsError) -> AppError {
    AppError::Options(e.to_string())
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

struct Report {
    format: Format,
    samples: usize,
    top: usize,
}

/// Resolve a document and write the requested report(s).
fn map_command(
    input: &Path,
    options: &ResolveOptions,
    report: &Report,
    output: Option<&Path>,
    out_dir: Option<&Path>,
) -> Result<(), AppError> {
    let document = read_document(input, options)?;
    let map = resolve_document(&document, options);
    log_diagnostics(&map);

    info!(
        "{} references, {} citation instances, {:.1}% coverage",
        map.stats.total_references,
        map.stats.total_occurrences,
        map.stats.coverage_percent()
    );

    if let Some(dir) = out_dir {
        return write_report_dir(&map, report, dir);
    }

    let mut buffer = Vec::new();
    let rendered = match report.format {
        Format::Csv => write_csv(&reference_rows(&map, report.samples), &mut buffer, report.samples),
        Format::Json => write_json(&map, &mut buffer),
        Format::Summary => {
            buffer.extend_from_slice(render_summary(&map, report.top).as_bytes());
            Ok(())
        }
    };
    rendered.map_err(|e| map_output_error(e, "report"))?;

    emit(&buffer, output)
}

/// Parse a document's bibliography and print it as JSON.
fn refs_command(
    input: &Path,
    options: &ResolveOptions,
    output: Option<&Path>,
) -> Result<(), AppError> {
    let document = read_document(input, options)?;
    let parsed = parse_references(&document, options);
    for diagnostic in &parsed.diagnostics {
        log_diagnostic(diagnostic.severity(), diagnostic);
    }

    let mut json = references_json(&parsed.table).map_err(|e| map_output_error(e, "JSON"))?;
    json.push('\n');
    emit(json.as_bytes(), output)
}

/// List available builtin option presets.
fn presets_command() {
    for name in builtin_preset_names() {
        println!("{}", name);
    }
}

// ---------------------------------------------------------------------------
// I/O helpers
// ---------------------------------------------------------------------------

/// Read the input (support '-' for stdin) and build the document model.
fn read_document(input: &Path, options: &ResolveOptions) -> Result<Document, AppError> {
    let text = if input == Path::new("-") {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| AppError::InputFile(format!("failed to read from stdin: {}", e)))?;
        buf
    } else {
        load_document(input).map_err(|e| map_resolve_error(e, &input.display().to_string()))?
    };

    Document::parse(&text, options).map_err(|e| map_resolve_error(e, &input.display().to_string()))
}

/// Maps a ResolveError to an AppError using type-safe matching.
fn map_resolve_error(e: ResolveError, source: &str) -> AppError {
    match e {
        ResolveError::Io(_) | ResolveError::EmptyDocument => {
            AppError::InputFile(format!("'{}': {}", source, e))
        }
        ResolveError::InvalidPattern { .. } | ResolveError::InvalidOptions(_) => {
            AppError::Options(e.to_string())
        }
    }
}

fn map_output_error(e: OutputError, what: &str) -> AppError {
    AppError::OutputFile(format!("failed to render {}: {}", what, e))
}

/// Write to file or stdout.
fn emit(content: &[u8], output: Option<&Path>) -> Result<(), AppError> {
    if let Some(output_path) = output {
        fs::write(output_path, content)
            .map_err(|e| AppError::OutputFile(format!("'{}': {}", output_path.display(), e)))?;
        info!("wrote {}", output_path.display());
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(content)
            .map_err(|e| AppError::OutputFile(format!("stdout: {}", e)))?;
    }
    Ok(())
}

fn write_report_dir(map: &ResolvedMap, report: &Report, dir: &Path) -> Result<(), AppError> {
    if !dir.is_dir() {
        return Err(AppError::OutputFile(format!(
            "'{}' is not a directory",
            dir.display()
        )));
    }

    let csv_path = dir.join("citation_mapping.csv");
    let file = File::create(&csv_path)
        .map_err(|e| AppError::OutputFile(format!("'{}': {}", csv_path.display(), e)))?;
    write_csv(
        &reference_rows(map, report.samples),
        BufWriter::new(file),
        report.samples,
    )
    .map_err(|e| map_output_error(e, "CSV"))?;
    info!("wrote {}", csv_path.display());

    let summary_path = dir.join("citation_report.md");
    emit(render_summary(map, report.top).as_bytes(), Some(&summary_path))?;

    let mut json = references_json(&map.reference_table()).map_err(|e| map_output_error(e, "JSON"))?;
    json.push('\n');
    emit(json.as_bytes(), Some(&dir.join("references.json")))
}

fn log_diagnostics(map: &ResolvedMap) {
    for diagnostic in &map.diagnostics {
        log_diagnostic(diagnostic.severity(), diagnostic);
    }
}

fn log_diagnostic(severity: Severity, diagnostic: &dyn fmt::Display) {
    match severity {
        Severity::Warning => warn!("{}", diagnostic),
        Severity::Info => info!("{}", diagnostic),
    }
}
