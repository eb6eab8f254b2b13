//! CLI entry point for `msg2eml`.

use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use msg2eml::config::{self, Config, ConvertOptions};
use msg2eml::convert::Converter;
use msg2eml::export::batch::{BatchConverter, BatchEvent, BatchSummary, ConversionOutcome, OutputSettings};
use msg2eml::inspect::{self, HeaderCategory};
use msg2eml::parser::msg::read_msg_file;

#[derive(Parser)]
#[command(
    name = "msg2eml",
    version,
    about = "Convert Outlook MSG files to standard EML",
    long_about = "Convert Outlook MSG files to RFC 5322 / MIME EML, keeping the original \
                  transport headers, Outlook metadata and attachments."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Configuration file (overrides $MSG2EML_CONFIG and the default location)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Machine-readable JSON output
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert MSG files (or directories of them) to EML
    Convert {
        /// MSG files or directories containing them
        #[arg(required = true, value_name = "PATH")]
        inputs: Vec<PathBuf>,
        /// Output directory (default: next to each source file)
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,
        /// Overwrite existing .eml files instead of adding _1, _2, ...
        #[arg(long)]
        overwrite: bool,
        /// Leave attachments out of the output
        #[arg(long)]
        no_attachments: bool,
        /// Do not emit Thread-* and X- MSG attribute headers
        #[arg(long)]
        no_extended_headers: bool,
        /// Do not undo Base64 / Quoted-Printable / RFC 2047 wrapping in fields
        #[arg(long)]
        no_auto_decode: bool,
        /// Decode 8-bit fields as UTF-8 without charset detection
        #[arg(long)]
        no_detect_encoding: bool,
        /// Do not copy the original transport headers
        #[arg(long)]
        no_transport_headers: bool,
        /// Do not emit SMTP address and timing diagnostics
        #[arg(long)]
        no_ip_info: bool,
    },
    /// Show the headers of an EML file by category
    Headers {
        path: PathBuf,
        /// Only these categories (converter, ip, transport, extended, basic)
        #[arg(short, long, value_delimiter = ',')]
        category: Vec<String>,
    },
    /// Dump the fields and original headers of an MSG file
    Attributes { path: PathBuf },
    /// Convert an MSG file under each header preset and compare
    Compare { path: PathBuf },
    /// Print the effective configuration
    Config {
        /// Write it to the default config location
        #[arg(long)]
        write: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = config::load_config(cli.config.as_deref());

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    let json = cli.json;

    match cli.command {
        Commands::Convert {
            inputs,
            output,
            overwrite,
            no_attachments,
            no_extended_headers,
            no_auto_decode,
            no_detect_encoding,
            no_transport_headers,
            no_ip_info,
        } => {
            let base = config.convert;
            let options = ConvertOptions {
                include_attachments: base.include_attachments && !no_attachments,
                preserve_headers: base.preserve_headers && !no_extended_headers,
                auto_decode: base.auto_decode && !no_auto_decode,
                detect_encoding: base.detect_encoding && !no_detect_encoding,
                preserve_transport_headers: base.preserve_transport_headers && !no_transport_headers,
                show_ip_info: base.show_ip_info && !no_ip_info,
            };
            let settings = OutputSettings {
                output_dir: output.or_else(|| config.output.output_dir.clone()),
                overwrite: overwrite || config.output.overwrite,
            };
            cmd_convert(&inputs, options, settings, &config, json)
        }
        Commands::Headers { path, category } => cmd_headers(&path, &category, json),
        Commands::Attributes { path } => cmd_attributes(&path, &config, json),
        Commands::Compare { path } => cmd_compare(&path, &config, json),
        Commands::Config { write } => cmd_config(&config, write),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    // Try to set up file logging
    let log_path = config::log_file_path(config);
    let log_dir = log_path.parent().map(Path::to_path_buf).unwrap_or_default();
    let file_name = log_path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, file_name);
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "msg2eml", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

fn cmd_config(config: &Config, write: bool) -> anyhow::Result<()> {
    if write {
        config::save_config(config)?;
        if let Some(path) = config::config_file_path() {
            println!("  Wrote {}", path.display());
        }
        return Ok(());
    }
    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

/// Expand directories to the `.msg` files they contain (not recursive).
fn collect_sources(inputs: &[PathBuf]) -> anyhow::Result<Vec<PathBuf>> {
    let mut sources = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut found: Vec<PathBuf> = std::fs::read_dir(input)?
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| {
                    p.is_file()
                        && p.extension()
                            .and_then(|e| e.to_str())
                            .is_some_and(|e| e.eq_ignore_ascii_case("msg"))
                })
                .collect();
            found.sort();
            tracing::info!(dir = %input.display(), files = found.len(), "Scanned directory");
            sources.extend(found);
        } else {
            // Missing files are reported per item rather than aborting the batch
            sources.push(input.clone());
        }
    }
    Ok(sources)
}

/// Convert every input, with a progress bar and a summary.
fn cmd_convert(
    inputs: &[PathBuf],
    options: ConvertOptions,
    settings: OutputSettings,
    config: &Config,
    json: bool,
) -> anyhow::Result<()> {
    let sources = collect_sources(inputs)?;
    if sources.is_empty() {
        anyhow::bail!("No .msg files found in the given paths");
    }

    let converter = Converter::from_config(config).with_options(options);

    let pb = ProgressBar::new(sources.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} Converting [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );
    if json {
        pb.set_draw_target(indicatif::ProgressDrawTarget::hidden());
    }

    let batch = BatchConverter::spawn(converter, sources, settings);
    for event in batch.events() {
        match event {
            BatchEvent::Started { source, .. } => {
                let name = source
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                pb.set_message(truncate_str(&name, 40));
            }
            BatchEvent::Finished { .. } => pb.inc(1),
            BatchEvent::Done(_) => break,
        }
    }
    pb.finish_and_clear();
    let summary = batch.join();

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary_table(&summary);
    }

    if summary.failed > 0 {
        anyhow::bail!("{} of {} file(s) failed to convert", summary.failed, summary.outcomes.len());
    }
    Ok(())
}

fn print_summary_table(summary: &BatchSummary) {
    println!();
    for outcome in &summary.outcomes {
        let name = outcome
            .source()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        match outcome {
            ConversionOutcome::Success {
                output, degraded, ..
            } => {
                let status = if degraded.is_some() { "DEGRADED" } else { "OK" };
                println!(
                    "  {:<9} {:<40} {}",
                    status,
                    truncate_str(&name, 40),
                    output.display()
                );
            }
            ConversionOutcome::Failure { .. } => {
                println!(
                    "  {:<9} {:<40} {}",
                    "FAILED",
                    truncate_str(&name, 40),
                    outcome.short_error().unwrap_or_default()
                );
            }
        }
    }
    println!();
    println!("  {:<25} {}", "Converted", summary.succeeded);
    if summary.degraded > 0 {
        println!("  {:<25} {}", "Degraded", summary.degraded);
    }
    println!("  {:<25} {}", "Failed", summary.failed);
    if summary.cancelled {
        println!("  {:<25} yes", "Cancelled");
    }
    println!("  {:<25} {:.2?}", "Elapsed", summary.elapsed);
    println!();
}

/// Categorized headers of an EML file.
fn cmd_headers(path: &Path, categories: &[String], json: bool) -> anyhow::Result<()> {
    if !path.exists() {
        anyhow::bail!("File not found: {}", path.display());
    }
    let filter = categories
        .iter()
        .map(|c| c.parse::<HeaderCategory>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(anyhow::Error::msg)?;

    let raw = std::fs::read(path)?;
    let Some(headers) = inspect::categorize_headers(&raw) else {
        anyhow::bail!("Not a parseable email message: {}", path.display());
    };
    let headers = inspect::filter_headers(headers, &filter);

    if json {
        println!("{}", serde_json::to_string_pretty(&headers)?);
        return Ok(());
    }

    println!();
    println!("  {} header(s)", headers.len());
    println!();
    for category in HeaderCategory::ALL {
        let group: Vec<_> = headers.iter().filter(|h| h.category == category).collect();
        if group.is_empty() {
            continue;
        }
        println!("  [{category}]");
        for h in group {
            println!("    {:<30} {}", truncate_str(&h.name, 30), truncate_str(&h.value, 90));
        }
        println!();
    }
    Ok(())
}

/// Fields and original headers of an MSG file.
fn cmd_attributes(path: &Path, config: &Config, json: bool) -> anyhow::Result<()> {
    use humansize::{format_size, BINARY};

    let message = read_msg_file(path)?;
    let converter = Converter::from_config(config);
    let description = inspect::describe_source(&message, &converter);

    if json {
        println!("{}", serde_json::to_string_pretty(&description)?);
        return Ok(());
    }

    println!();
    println!("  {:<28} {}", "File", path.display());
    for field in &description.fields {
        let value = field.value.replace(['\r', '\n'], " ");
        println!(
            "  {:<28} {}",
            format!("{} ({})", field.name, field.kind),
            truncate_str(&value, 90)
        );
    }
    println!("  {:<28} {}", "recipients", description.recipients);

    if !description.attachments.is_empty() {
        println!();
        println!("  Attachments:");
        for att in &description.attachments {
            println!(
                "    {:<50} {:>10}",
                truncate_str(&att.filename, 50),
                format_size(att.size, BINARY)
            );
        }
    }

    if !description.original_headers.is_empty() {
        println!();
        println!("  Original headers:");
        for (name, value) in &description.original_headers {
            println!("    {:<30} {}", truncate_str(name, 30), truncate_str(value, 90));
        }
    }
    println!();
    Ok(())
}

/// Header output of the four presets side by side.
fn cmd_compare(path: &Path, config: &Config, json: bool) -> anyhow::Result<()> {
    let message = read_msg_file(path)?;
    let converter = Converter::from_config(config);
    let reports = inspect::compare_presets(&message, &converter);

    if json {
        let items: Vec<serde_json::Value> = reports
            .iter()
            .map(|r| {
                serde_json::json!({
                    "preset": r.label,
                    "header_count": r.count(),
                    "headers": r.headers,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    println!();
    for report in &reports {
        println!("  {:<25} {} header(s)", report.label, report.count());
    }
    for report in &reports {
        println!();
        println!("  [{}]", report.label);
        for h in &report.headers {
            println!("    {:<30} {}", truncate_str(&h.name, 30), truncate_str(&h.value, 60));
        }
    }
    println!();
    Ok(())
}

/// Truncate to a display width, adding `...` when cut.
fn truncate_str(s: &str, max_width: usize) -> String {
    let width = UnicodeWidthStr::width(s);
    if width <= max_width {
        s.to_string()
    } else if max_width <= 3 {
        s.chars().take(max_width).collect()
    } else {
        let mut result = String::new();
        let mut current_width = 0;
        for ch in s.chars() {
            let ch_width = UnicodeWidthChar::width(ch).unwrap_or(0);
            if current_width + ch_width + 3 > max_width {
                break;
            }
            result.push(ch);
            current_width += ch_width;
        }
        result.push_str("...");
        result
    }
}
