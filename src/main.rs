//! CLI entry point for `mailsift`.

use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use mailsift::config::{self, Config};
use mailsift::export::jsonl::{self, ExportSummary};
use mailsift::mailbox::mboxdir::{MboxDirectory, MboxFolder};
use mailsift::mailbox::walker::Traversal;
use mailsift::mailbox::{join_folder_path, MailFolder, Mailbox};
use mailsift::pipeline::{Pipeline, RunReport};
use mailsift::{checkpoint, classify};

#[derive(Parser)]
#[command(
    name = "mailsift",
    version,
    about = "Parse, thread and enrich archived mailbox exports"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline over a mailbox export and write JSON Lines output
    Run {
        /// Directory of mbox folders, or a single mbox file
        path: PathBuf,
        /// Output directory
        #[arg(short, long, default_value = "mailsift-out")]
        output: PathBuf,
        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
        /// Ignore and do not write the parse checkpoint
        #[arg(long)]
        no_checkpoint: bool,
        /// Walk sub-folders too
        #[arg(short, long)]
        recursive: bool,
    },
    /// List folders and message counts
    Folders {
        path: PathBuf,
        #[arg(long)]
        json: bool,
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

    let mut config = config::load_config();

    let log_level = match cli.verbose {
        0 => config.general.log_level.clone(),
        1 => "info".to_string(),
        2 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    setup_logging(&log_level, &config);

    match cli.command {
        Commands::Run {
            path,
            output,
            json,
            no_checkpoint,
            recursive,
        } => {
            if recursive {
                config.pipeline.traversal = Traversal::Recursive;
            }
            if no_checkpoint {
                config.pipeline.checkpoint = false;
            }
            cmd_run(&path, &output, json, config)
        }
        Commands::Folders { path, json } => cmd_folders(&path, json),
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

    let log_path = config::log_file_path(config);
    let log_dir = log_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_name = log_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "mailsift.log".to_string());
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
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mailsift", &mut std::io::stdout());
    Ok(())
}

fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

/// Run the pipeline and export its output.
fn cmd_run(path: &Path, output: &Path, json: bool, config: Config) -> anyhow::Result<()> {
    let mailbox = MboxDirectory::open(path)?;

    let use_checkpoint = config.pipeline.checkpoint;
    let ckpt_path = checkpoint::checkpoint_path(&config::cache_dir(&config), path);
    let classifier = classify::from_rules(&config.classifier.rules);
    let mut pipeline = Pipeline::new(config, classifier);
    if use_checkpoint {
        pipeline = pipeline.with_checkpoint(ckpt_path, path.to_path_buf());
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} Parsing: {pos} messages, batch {msg} ({elapsed})")
            .expect("valid template"),
    );

    let result = pipeline.run_with_progress(
        &mailbox,
        Some(&|parsed: u64, batch: u64| {
            pb.set_position(parsed);
            pb.set_message(batch.to_string());
        }),
    )?;
    pb.finish_and_clear();

    let summary = jsonl::export_output(&result, output)?;

    if json {
        print_report_json(&result.report, &summary)?;
    } else {
        print_report_table(path, &result.report, &summary);
    }
    Ok(())
}

/// One row of the folder listing.
#[derive(serde::Serialize)]
struct FolderRow {
    path: String,
    messages: Option<usize>,
    size: u64,
    error: Option<String>,
}

/// List every folder of the container, depth-first.
fn cmd_folders(path: &Path, json: bool) -> anyhow::Result<()> {
    let mailbox = MboxDirectory::open(path)?;
    let mut rows = Vec::new();
    let mut pending: Vec<(String, MboxFolder)> = mailbox
        .root_folders()?
        .into_iter()
        .rev()
        .map(|f| (f.name().to_string(), f))
        .collect();

    while let Some((folder_path, folder)) = pending.pop() {
        let size = folder
            .file()
            .and_then(|f| std::fs::metadata(f).ok())
            .map_or(0, |m| m.len());
        let (messages, error) = match folder.message_count() {
            Ok(count) => (Some(count), None),
            Err(e) => (None, Some(e.to_string())),
        };
        match folder.sub_folders() {
            Ok(children) => {
                for child in children.into_iter().rev() {
                    pending.push((join_folder_path(&folder_path, child.name()), child));
                }
            }
            Err(e) => tracing::warn!(folder = %folder_path, error = %e, "Cannot list sub-folders"),
        }
        rows.push(FolderRow {
            path: folder_path,
            messages,
            size,
            error,
        });
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    use humansize::{format_size, BINARY};
    println!();
    for row in &rows {
        let count = match (row.messages, &row.error) {
            (Some(n), _) => n.to_string(),
            (None, Some(e)) => format!("error: {e}"),
            (None, None) => "-".to_string(),
        };
        println!(
            "  {:<40} {:>10}  {}",
            row.path,
            format_size(row.size, BINARY),
            count
        );
    }
    println!();
    Ok(())
}

/// Print the run summary in a human-readable table.
fn print_report_table(path: &Path, report: &RunReport, summary: &ExportSummary) {
    use humansize::{format_size, BINARY};

    let file_size = |p: &Path| std::fs::metadata(p).map_or(0, |m| m.len());

    println!();
    println!("  {:<22} {}", "Source:", path.display());
    println!("  {:<22} {}", "Messages found:", report.messages_found);
    println!("  {:<22} {}", "Messages parsed:", report.messages_parsed);
    println!("  {:<22} {}", "Invalid messages:", report.message_errors.len());
    println!(
        "  {:<22} {} walked, {} skipped",
        "Folders:", report.folders_walked, report.folders_skipped
    );
    println!("  {:<22} {}", "Missing ancestors:", report.missing_ancestors);
    if report.from_checkpoint {
        println!("  {:<22} reused", "Checkpoint:");
    }
    println!("  {:<22} {:.2?}", "Elapsed:", report.elapsed);

    println!();
    for stats in [&summary.messages, &summary.sub_messages, &summary.texts, &summary.missing] {
        let duplicates = if stats.duplicates > 0 {
            format!(" ({} duplicates dropped)", stats.duplicates)
        } else {
            String::new()
        };
        println!(
            "  {:<40} {:>8} records {:>10}{}",
            stats.path.display(),
            stats.written,
            format_size(file_size(&stats.path), BINARY),
            duplicates
        );
    }

    if !report.folder_errors.is_empty() {
        println!();
        println!("  Folder errors:");
        for e in &report.folder_errors {
            println!("    {}: {}", e.folder, e.error);
        }
    }
    if !report.message_errors.is_empty() {
        println!();
        println!("  Message errors:");
        for e in &report.message_errors {
            println!("    {} #{}: {}", e.folder, e.provider_email_id, e.error);
        }
    }
    println!();
}

fn print_report_json(report: &RunReport, summary: &ExportSummary) -> anyhow::Result<()> {
    let value = serde_json::json!({
        "report": report,
        "export": summary,
    });
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
