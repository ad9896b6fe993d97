use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::Parser;

use plexmend::backend::MediaBackend;
use plexmend::config::Config;
use plexmend::confirm::{Confirm, ConsoleConfirm, ConsolePicker, DeclineAll, SectionPicker};
use plexmend::csv_input;
use plexmend::driver::Driver;
use plexmend::index::CandidateIndex;
use plexmend::matcher::Matcher;
use plexmend::plex::PlexBackend;
use plexmend::progress;

#[derive(Parser)]
#[command(name = "plexmend")]
#[command(about = "Reconcile Plex playlists with CSV lists of missing tracks")]
struct Args {
    /// Path to the JSON config file
    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    /// Music library section to index (skips the interactive menu)
    #[arg(long)]
    section: Option<String>,

    /// Never prompt; ambiguous matches are skipped
    #[arg(long)]
    non_interactive: bool,

    /// Hide progress bars for tail-friendly output
    #[arg(long)]
    no_progress: bool,
}

fn main() -> Result<()> {
    colog::init();
    let args = Args::parse();
    progress::set_no_progress(args.no_progress);

    let config = Config::load(&args.config)?;

    if config.concurrency > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(config.concurrency)
            .build_global()
            .context("failed to set thread pool size")?;
    }

    let start = Instant::now();
    let backend = PlexBackend::new(&config.plex);

    let sections = backend
        .sections()
        .context("cannot list library sections")?;
    if sections.is_empty() {
        bail!("server has no music library sections");
    }
    let section = match &args.section {
        Some(wanted) => sections
            .iter()
            .find(|s| s.title.eq_ignore_ascii_case(wanted))
            .cloned()
            .with_context(|| format!("no music section named '{wanted}'"))?,
        None if sections.len() == 1 => sections[0].clone(),
        None if args.non_interactive => {
            bail!("multiple music sections found; pass --section to choose one")
        }
        None => ConsolePicker
            .pick(&sections)
            .context("no library section selected")?,
    };

    let jobs = csv_input::load_jobs(Path::new(&config.csv.directory), &config.csv)?;
    let total_queries: usize = jobs.iter().map(|j| j.queries.len()).sum();
    println!(
        "Loaded {} playlist job(s), {} track(s), from {}",
        jobs.len(),
        total_queries,
        config.csv.directory
    );

    let spinner = progress::spinner(&format!("Indexing section '{}'", section.title));
    let index = CandidateIndex::build(&backend, &section)
        .with_context(|| format!("cannot index section '{}'", section.title))?;
    spinner.finish_and_clear();
    if index.is_empty() {
        bail!("section '{}' has no tracks", section.title);
    }
    println!("Indexed {} track(s) from '{}'", index.len(), section.title);

    let console_confirm;
    let confirm: &dyn Confirm = if args.non_interactive {
        &DeclineAll
    } else {
        console_confirm = ConsoleConfirm::new(Duration::from_secs(config.confirm_timeout_secs));
        &console_confirm
    };

    let driver = Driver::new(Matcher::new(&index, config.matching), &backend, confirm);
    let (results, stats) = driver.run(&jobs);

    println!("\n{:=<60}", "");
    for result in &results {
        println!(
            "{}: {} added, {} skipped, {} failed",
            result.playlist_name,
            result.added.len(),
            result.skipped.len(),
            result.failed.len()
        );
        for (query, reason) in &result.skipped {
            println!("  skipped {}: {reason}", query.label());
        }
        for (query, reason) in &result.failed {
            println!("  FAILED  {}: {reason}", query.label());
        }
    }
    println!("{:=<60}", "");
    println!(
        "Matched {:.1}% of queries, added {} track(s) in {}",
        stats.match_rate(),
        stats.added,
        progress::format_duration(start.elapsed())
    );
    stats.log_summary();

    if stats.mutation_failures > 0 {
        bail!("{} playlist mutation(s) failed", stats.mutation_failures);
    }
    Ok(())
}
