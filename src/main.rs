use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{error, info};
use simplelog::{Config, LevelFilter, WriteLogger};

use folio::event_source::Script;
use folio::prefetch::{ComicReader, PageCommand, compute_window};
use folio::{replay, settings};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Write logs to this file
    #[arg(long, default_value = "folio.log")]
    log_file: PathBuf,

    #[arg(long, default_value_t = LevelFilter::Info)]
    log_level: LevelFilter,

    /// Settings file to use instead of the user config
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a recorded input script and print what the reader did
    Replay { script: PathBuf },

    /// Load a page and its prefetch window from an image directory or .cbz
    Pages {
        path: PathBuf,

        #[arg(long, default_value_t = 0)]
        page: usize,

        #[arg(long)]
        two_page: bool,

        #[arg(long)]
        radius: Option<usize>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    WriteLogger::init(
        cli.log_level,
        Config::default(),
        File::create(&cli.log_file)
            .with_context(|| format!("Cannot create log file {}", cli.log_file.display()))?,
    )?;
    info!("Starting folio");

    match &cli.config {
        Some(path) => {
            if !settings::load_settings_from_path(path) {
                error!("Using default settings");
            }
        }
        None => settings::load_settings(),
    }

    let result = match cli.command {
        Command::Replay { script } => run_replay(&script),
        Command::Pages {
            path,
            page,
            two_page,
            radius,
        } => run_pages(&path, page, two_page, radius),
    };

    if let Err(err) = &result {
        error!("{err:?}");
    }
    info!("Shutting down folio");
    result
}

fn run_replay(path: &Path) -> Result<()> {
    let script = Script::from_path(path)?;
    let report = replay::run(script, &settings::current());

    for event in &report.events {
        println!("{}", serde_json::to_string(event)?);
    }
    for command in &report.commands {
        println!("{}", serde_json::to_string(command)?);
    }
    println!(
        "{} annotations, finished at {}ms",
        report.annotations,
        report.finished_at.as_millis()
    );
    Ok(())
}

fn run_pages(path: &Path, page: usize, two_page: bool, radius: Option<usize>) -> Result<()> {
    let mut config = settings::current().prefetch;
    config.two_page |= two_page;
    if let Some(radius) = radius {
        config.radius = radius;
    }

    let mut comic = ComicReader::open(path, &config)?;
    let count = comic.pages().page_count();
    println!(
        "{count} pages, window around {page}: {:?}",
        compute_window(page, config.radius, config.two_page, count)
    );

    comic.apply(PageCommand::GoTo(page));
    if !comic.wait_idle(Duration::from_secs(30)) {
        println!("timed out waiting for page images");
    }
    comic.pump();

    println!("showing {:?}", comic.shown());
    let mut cached: Vec<String> = comic.pages().cache().urls();
    cached.sort_by(|a, b| natord::compare(a, b));
    for url in cached {
        match comic.image(&url) {
            Some(image) => println!("  {url}: {}x{}", image.width, image.height),
            None => println!("  {url}: not loaded"),
        }
    }
    Ok(())
}
