//! CLI binary for toolhub-client.
//!
//! A thin shim over the library crate that maps subcommands onto the typed
//! services and prints results.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use toolhub_client::services::data_validator::DataFormat;
use toolhub_client::{
    ApiClient, CancelToken, ClientConfig, ConversionOrchestrator, ConversionProgressCallback,
    ConversionRequest, FileItem, FileStatus, Notification, Notifier, Phase, Progress,
    ProgressCallback, Results, ToastVariant,
};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── Batch progress bar ───────────────────────────────────────────────────────

/// Terminal progress callback: a live bar plus one log line per file.
struct BatchProgressBar {
    bar: ProgressBar,
}

impl BatchProgressBar {
    /// Spinner until the backend reports the batch size.
    fn spinner() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Connecting");
        bar.set_message("Waiting for the backend…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }

    /// Switch to the full progress-bar style once `total` is known.
    fn switch_to_bar(&self, total: usize) {
        if self.bar.length() == Some(total as u64) {
            return;
        }
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} files  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Converting");
        self.bar.reset_eta();
    }
}

impl ConversionProgressCallback for BatchProgressBar {
    fn on_conversion_start(&self, total_files: usize) {
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Submitting {total_files} file(s)…"))
        ));
    }

    fn on_progress(&self, progress: &Progress) {
        if progress.total > 0 {
            self.switch_to_bar(progress.total);
            self.bar.set_position(progress.current as u64);
        }
    }

    fn on_file_start(&self, file: &str, _index: usize, _total: usize) {
        self.bar.set_message(file.to_string());
    }

    fn on_file_complete(&self, item: &FileItem) {
        let mark = match item.status {
            FileStatus::Success => green("✓"),
            FileStatus::Skipped => yellow("↷"),
            FileStatus::Failed => red("✗"),
        };
        // Truncate very long messages to keep output tidy.
        let msg = if item.message.chars().count() > 80 {
            let cut: String = item.message.chars().take(79).collect();
            format!("{cut}\u{2026}")
        } else {
            item.message.clone()
        };
        self.bar
            .println(format!("  {}  {:<40}  {}", mark, item.name, dim(&msg)));
        // `progress` frames only report the start; completions move the bar.
        self.bar.inc(1);
    }

    fn on_conversion_complete(&self, _results: &Results) {
        self.bar.finish_and_clear();
    }

    fn on_conversion_failed(&self, _message: &str) {
        self.bar.abandon();
    }
}

// ── Notifications ────────────────────────────────────────────────────────────

/// Prints notifications to stderr.
struct CliNotifier {
    quiet: bool,
}

impl Notifier for CliNotifier {
    fn notify(&self, n: &Notification) {
        if self.quiet && n.variant != ToastVariant::Destructive {
            return;
        }
        let mark = match n.variant {
            ToastVariant::Success => green("✔"),
            ToastVariant::Destructive => red("✘"),
            ToastVariant::Default => cyan("ℹ"),
        };
        eprintln!("{} {}  {}", mark, bold(&n.title), n.description);
    }
}

// ── Arguments ────────────────────────────────────────────────────────────────

const AFTER_HELP: &str = r#"EXAMPLES:
  # Is the backend up?
  toolhub health

  # List the tool catalogue as JSON
  toolhub --json tools

  # Convert scans to PDFs (paths as seen by the backend)
  toolhub convert ~/scans/*.jpg -o ~/scans/pdf

  # Upload local scans first, then combine into one PDF
  toolhub convert --upload --combine page1.png page2.png -o /tmp/out

  # Markdown to PDF
  toolhub md2pdf README.md -o README.pdf

  # Validate a YAML file
  toolhub validate config.yaml --format yaml

ENVIRONMENT VARIABLES:
  TOOLHUB_API_URL   Backend origin (default: http://127.0.0.1:8000)
  RUST_LOG          Override the log filter (e.g. toolhub_client=debug)
"#;

/// Command-line client for the ToolHub processing service.
#[derive(Parser, Debug)]
#[command(
    name = "toolhub",
    version,
    about = "Command-line client for the ToolHub processing service",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Backend origin, e.g. http://127.0.0.1:8000.
    #[arg(long, global = true, env = "TOOLHUB_API_URL")]
    api_url: Option<String>,

    /// Print machine-readable JSON instead of text.
    #[arg(long, global = true, env = "TOOLHUB_JSON")]
    json: bool,

    /// Disable the progress bar.
    #[arg(long, global = true, env = "TOOLHUB_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "TOOLHUB_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "TOOLHUB_QUIET")]
    quiet: bool,

    /// Whole-request timeout in seconds (not applied to conversions).
    #[arg(long, global = true, env = "TOOLHUB_TIMEOUT", default_value_t = 60)]
    timeout: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the available tools.
    Tools,

    /// Check backend health.
    Health,

    /// Convert images to PDF with live progress.
    Convert {
        /// Input images.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output directory for the generated PDFs.
        #[arg(short, long)]
        output: PathBuf,

        /// Upload the files first instead of passing their paths.
        #[arg(long)]
        upload: bool,

        /// Merge all generated PDFs into combined.pdf.
        #[arg(long)]
        combine: bool,

        /// Re-convert files whose PDF already exists.
        #[arg(long)]
        overwrite: bool,
    },

    /// Render a Markdown file to PDF.
    Md2pdf {
        /// Markdown input file.
        input: PathBuf,

        /// PDF output path.
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Validate a structured text file.
    Validate {
        /// File to validate.
        input: PathBuf,

        /// json, xml, yaml, csv or toml. Guessed from the extension if omitted.
        #[arg(short, long)]
        format: Option<DataFormat>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar and notifier lines already cover warnings.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "warn"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = BatchProgressBar::spinner();
        Some(cb as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb)?;
    let client = ApiClient::new(config).context("Failed to create HTTP client")?;

    match &cli.command {
        Command::Tools => {
            let tools = client.list_tools().await.context("Failed to list tools")?;
            if cli.json {
                print_json(&tools)?;
            } else {
                for t in &tools {
                    println!("{:<16} {}  {}", bold(&t.id), t.display_name, dim(&t.description));
                }
            }
        }

        Command::Health => {
            let health = client.health().await.context("Health check failed")?;
            if cli.json {
                print_json(&health)?;
            } else {
                println!(
                    "{} {} {}",
                    if health.is_ok() { green("✔") } else { red("✘") },
                    health.status,
                    dim(health.version.as_deref().unwrap_or(""))
                );
            }
        }

        Command::Convert {
            files,
            output,
            upload,
            combine,
            overwrite,
        } => {
            let input_files = if *upload {
                client
                    .image_to_pdf()
                    .upload_files(files.as_slice(), None)
                    .await
                    .context("Upload failed")?
                    .files
            } else {
                files.iter().map(|p| absolute(p)).collect()
            };

            let request = ConversionRequest::new(input_files, absolute(output))
                .combine_pdfs(*combine)
                .skip_existing(!*overwrite);

            // Ctrl-C cancels the stream instead of killing the process mid-line.
            let cancel = CancelToken::new();
            {
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        cancel.cancel();
                    }
                });
            }

            let state = ConversionOrchestrator::new(client).run(&request, Some(cancel)).await;

            if cli.json {
                print_json(&state)?;
            } else if !cli.quiet && state.phase == Phase::Completed {
                eprintln!(
                    "{}  {} ok  {} failed  {} skipped  →  {}",
                    if state.results.failed == 0 { green("✔") } else { cyan("⚠") },
                    state.results.successful,
                    state.results.failed,
                    state.results.skipped,
                    bold(&request.output_path),
                );
            }
            if state.phase == Phase::Failed {
                bail!(state.error.unwrap_or_else(|| "Conversion failed".to_string()));
            }
        }

        Command::Md2pdf { input, output } => {
            let markdown = tokio::fs::read_to_string(input)
                .await
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let pdf = client
                .md_to_pdf()
                .convert_text_to_file(&markdown, output)
                .await
                .context("Conversion failed")?;
            if !cli.quiet {
                eprintln!(
                    "{}  {} bytes  →  {}",
                    green("✔"),
                    pdf.len(),
                    bold(&output.display().to_string())
                );
            }
        }

        Command::Validate { input, format } => {
            let format = match format {
                Some(f) => *f,
                None => guess_format(input)?,
            };
            let content = tokio::fs::read_to_string(input)
                .await
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let outcome = client
                .data_validator()
                .validate(&content, format)
                .await
                .context("Validation request failed")?;

            if cli.json {
                print_json(&outcome.data)?;
            } else if outcome.data.valid {
                println!("{} {}", green("✔"), outcome.message);
            } else {
                println!(
                    "{} {} is not valid {}: {}",
                    red("✘"),
                    input.display(),
                    format,
                    outcome.data.error.as_deref().unwrap_or("unknown error")
                );
            }
            if !outcome.data.valid {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn build_config(cli: &Cli, progress_cb: Option<ProgressCallback>) -> Result<ClientConfig> {
    let mut builder = ClientConfig::builder()
        .request_timeout_secs(cli.timeout)
        .notifier(Arc::new(CliNotifier { quiet: cli.quiet }));

    if let Some(ref url) = cli.api_url {
        builder = builder.base_url(url.clone());
    }
    if let Some(cb) = progress_cb {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialise output")?;
    println!("{json}");
    Ok(())
}

/// The backend resolves paths itself, so relative paths are made absolute here.
fn absolute(path: &Path) -> String {
    std::path::absolute(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .display()
        .to_string()
}

fn guess_format(path: &Path) -> Result<DataFormat> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    ext.parse::<DataFormat>()
        .map_err(|_| anyhow::anyhow!("Cannot guess the format of {}; pass --format", path.display()))
}
