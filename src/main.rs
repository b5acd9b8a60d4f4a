/*!
 * gitgallery CLI
 *
 * Thin front end over the library: parses flags, loads configuration,
 * runs one gallery operation and maps the result onto an exit code.
 */

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use gitgallery::{
    config::{BatchMode, GalleryConfig, LogLevel, RepositorySettings},
    error::{GalleryError, EXIT_FATAL, EXIT_PARTIAL, EXIT_SUCCESS},
    logging,
    sync::{BatchReport, Gallery, ItemState, SubmitItem, UploadOutcome},
};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "gitgallery")]
#[command(version, about = "Store images with descriptions in a GitHub repository and browse them", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Repository as owner/name (overrides GITHUB_REPO)
    #[arg(long, global = true)]
    repo: Option<String>,

    /// Target branch (overrides GITHUB_BRANCH)
    #[arg(long, global = true)]
    branch: Option<String>,

    /// Content directory inside the repository (overrides GITHUB_PATH)
    #[arg(long, global = true)]
    path: Option<String>,

    /// REST API base URL
    #[arg(long, value_name = "URL", global = true)]
    api_base: Option<String>,

    /// Raw-content base URL
    #[arg(long, value_name = "URL", global = true)]
    raw_base: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECS", global = true)]
    timeout: Option<u64>,

    /// Log level
    #[arg(long, value_enum, global = true)]
    log_level: Option<LogLevelArg>,

    /// Write JSON logs to this file instead of stderr
    #[arg(long = "log", value_name = "FILE", global = true)]
    log_file: Option<PathBuf>,

    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload one or more images; -d descriptions pair with files in order
    Submit {
        /// Image files
        #[arg(required = true, value_name = "FILE")]
        files: Vec<PathBuf>,

        /// Description for the file in the same position
        #[arg(short = 'd', long = "description", value_name = "TEXT")]
        descriptions: Vec<String>,

        /// Treat overwriting an existing file as success
        #[arg(long)]
        accept_overwrite: bool,

        /// Stop the batch at the first image that fails
        #[arg(long)]
        abort_on_failure: bool,
    },

    /// List stored images with their descriptions
    Browse {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Report descriptions without images and images without descriptions
    Orphans {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevelArg> for LogLevel {
    fn from(arg: LogLevelArg) -> Self {
        match arg {
            LogLevelArg::Error => LogLevel::Error,
            LogLevelArg::Warn => LogLevel::Warn,
            LogLevelArg::Info => LogLevel::Info,
            LogLevelArg::Debug => LogLevel::Debug,
            LogLevelArg::Trace => LogLevel::Trace,
        }
    }
}

fn main() {
    let code = match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            e.downcast_ref::<GalleryError>()
                .map_or(EXIT_FATAL, GalleryError::exit_code)
        }
    };
    std::process::exit(code);
}

fn run() -> anyhow::Result<i32> {
    let cli = Cli::parse();

    let overrides = RepositorySettings {
        repo: cli.repo.clone(),
        branch: cli.branch.clone(),
        path: cli.path.clone(),
        api_base: cli.api_base.clone(),
        raw_base: cli.raw_base.clone(),
        timeout_secs: cli.timeout,
        ..Default::default()
    };

    let mut config = GalleryConfig::load(cli.config.as_deref(), overrides)?;
    if let Some(level) = cli.log_level {
        config.log_level = level.into();
    }
    if cli.log_file.is_some() {
        config.log_file = cli.log_file.clone();
    }
    config.verbose |= cli.verbose;

    if let Commands::Submit {
        accept_overwrite,
        abort_on_failure,
        ..
    } = &cli.command
    {
        config.upload.accept_overwrite |= *accept_overwrite;
        if *abort_on_failure {
            config.upload.batch_mode = BatchMode::Abort;
        }
    }

    if let Err(e) = logging::init_logging(&config) {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    let gallery = Gallery::from_config(&config)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    runtime.block_on(async {
        match cli.command {
            Commands::Submit {
                files,
                descriptions,
                ..
            } => handle_submit(&gallery, files, descriptions).await,
            Commands::Browse { json } => handle_browse(&gallery, json).await,
            Commands::Orphans { json } => handle_orphans(&gallery, json).await,
        }
    })
}

async fn handle_submit(
    gallery: &Gallery,
    files: Vec<PathBuf>,
    descriptions: Vec<String>,
) -> anyhow::Result<i32> {
    if descriptions.len() > files.len() {
        return Err(GalleryError::Config(format!(
            "{} descriptions given for {} files",
            descriptions.len(),
            files.len()
        ))
        .into());
    }

    let mut items = Vec::with_capacity(files.len());
    let mut descriptions = descriptions.into_iter();
    for file in &files {
        let mut item = read_item(file).await?;
        item.description = descriptions.next();
        items.push(item);
    }

    if items.len() == 1 {
        let item = items.remove(0);
        let outcome = gallery.submit_item(item).await;
        print_outcome(&files[0], &outcome);
        return Ok(match outcome.error() {
            None => EXIT_SUCCESS,
            Some(e) if e.is_auth_error() => EXIT_FATAL,
            Some(_) => EXIT_PARTIAL,
        });
    }

    let report = gallery.submit_batch(items).await;
    for item in &report.items {
        match &item.outcome {
            Some(outcome) => print_outcome(&files[item.index], outcome),
            None => println!("{}: skipped", files[item.index].display()),
        }
    }
    print_summary(&report);

    Ok(if report.is_success() {
        EXIT_SUCCESS
    } else if report.has_auth_failure() {
        EXIT_FATAL
    } else {
        EXIT_PARTIAL
    })
}

async fn read_item(file: &Path) -> anyhow::Result<SubmitItem> {
    let bytes = tokio::fs::read(file)
        .await
        .map_err(GalleryError::from)
        .with_context(|| format!("failed to read {}", file.display()))?;

    let mut item = SubmitItem::new(bytes);
    item.file_name = file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned());
    Ok(item)
}

fn print_outcome(file: &Path, outcome: &UploadOutcome) {
    let file = file.display();
    let key = &outcome.key;
    match (outcome.error(), &outcome.image) {
        (None, Ok(image)) if outcome.description.is_some() => {
            println!("{}: stored at {} (with description)", file, image.url)
        }
        (None, Ok(image)) => println!("{}: stored at {}", file, image.url),
        (Some(e), _) if outcome.state() == ItemState::Overwritten => {
            println!("{}: stored as {} but replaced an existing file: {}", file, key, e)
        }
        (Some(e), _) if outcome.state() == ItemState::DescriptionFailed => {
            println!("{}: stored as {} but description failed: {}", file, key, e)
        }
        (Some(e), _) | (None, Err(e)) => println!("{}: failed: {}", file, e),
    }
}

fn print_summary(report: &BatchReport) {
    println!(
        "{} submitted, {} completed, {} failed, {} description failures, {} overwritten, {} skipped",
        report.len(),
        report.count(ItemState::Completed),
        report.count(ItemState::Failed),
        report.count(ItemState::DescriptionFailed),
        report.count(ItemState::Overwritten),
        report.count(ItemState::Skipped),
    );
}

async fn handle_browse(gallery: &Gallery, json: bool) -> anyhow::Result<i32> {
    let entries = gallery.browse().await.map_err(GalleryError::from)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else if entries.is_empty() {
        println!("No images found");
    } else {
        for entry in &entries {
            println!("{}  {}", entry.image.name, entry.image.url);
            if let Some(ref description) = entry.description {
                for line in description.lines() {
                    println!("    {}", line);
                }
            }
        }
    }

    Ok(EXIT_SUCCESS)
}

async fn handle_orphans(gallery: &Gallery, json: bool) -> anyhow::Result<i32> {
    let report = gallery.orphans().await.map_err(GalleryError::from)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Orphaned descriptions: {}", report.orphaned_descriptions.len());
        for name in &report.orphaned_descriptions {
            println!("    {}", name);
        }
        println!("Images without description: {}", report.undescribed_images.len());
        for name in &report.undescribed_images {
            println!("    {}", name);
        }
    }

    Ok(EXIT_SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_submit_pairs_descriptions() {
        let cli = Cli::try_parse_from([
            "gitgallery", "submit", "a.jpg", "b.png", "-d", "first", "--repo", "o/r",
        ])
        .unwrap();
        assert_eq!(cli.repo.as_deref(), Some("o/r"));
        match cli.command {
            Commands::Submit {
                files, descriptions, ..
            } => {
                assert_eq!(files.len(), 2);
                assert_eq!(descriptions, vec!["first"]);
            }
            _ => panic!("expected submit"),
        }
    }

    #[test]
    fn test_submit_requires_a_file() {
        assert!(Cli::try_parse_from(["gitgallery", "submit"]).is_err());
    }
}
