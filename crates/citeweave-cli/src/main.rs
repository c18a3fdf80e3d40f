use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use rand::SeedableRng;
use rand::rngs::StdRng;

use citeweave_core::{AppConfig, Checkpoint, Database, ExitCode, RecordStore, SCHEMA_VERSION};
use citeweave_science::enrichment::{fill_missing, relabel};
use citeweave_science::graph::{DegreeSummary, LabelDegrees, LabelMixing};
use citeweave_science::{
    AuthorCitationGraph, CitationGraph, CrossRefSource, MatchCriterion, QuotaFloors, ScienceError,
    ScopusSource, SweepOutcome, Vocabulary, run_keyword_sweep, run_merge_sweep, run_reference_sweep,
};

// ─── CLI Definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "citeweave",
    about = "Bibliographic record collection and duplicate reconciliation",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output in JSON format.
    /// Also enabled by setting CITEWEAVE_JSON=1.
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Search every vocabulary keyword and ingest the results.
    Ingest {
        /// Vocabulary file (defaults to keywords.txt in the data dir).
        #[arg(long)]
        vocabulary: Option<PathBuf>,
    },

    /// Fetch reference lists of publications that have none yet.
    References {
        /// Only publications carrying this label tag.
        #[arg(long)]
        label: Option<String>,
    },

    /// Merge pending records into the publications they duplicate.
    Merge {
        #[arg(value_enum)]
        by: MergeBy,
        /// Seed for the candidate order.
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Fill untitled pending records from CrossRef by DOI.
    FillMissing,

    /// Rename a label tag on every publication.
    Relabel { old: String, new: String },

    /// Citation graph statistics.
    Stats {
        /// Author-to-author citation graph instead of the paper graph.
        #[arg(long)]
        authors: bool,
    },

    /// Store counts and checkpoint state.
    Status,

    /// Set the remaining API quota in the checkpoint.
    Quota { remaining: u32 },

    /// Config management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Run diagnostics.
    Doctor,

    /// Show version information.
    Version,
}

#[derive(Clone, Copy, ValueEnum)]
enum MergeBy {
    Doi,
    Title,
}

impl From<MergeBy> for MatchCriterion {
    fn from(by: MergeBy) -> Self {
        match by {
            MergeBy::Doi => MatchCriterion::Doi,
            MergeBy::Title => MatchCriterion::Title,
        }
    }
}

// ─── Config Actions ──────────────────────────────────────────────────────────

#[derive(Subcommand)]
enum ConfigAction {
    /// Show all config values.
    List,
    /// Get a specific config key.
    Get { key: String },
}

// ─── Main ────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let start = Instant::now();
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let json_output = cli.json || std::env::var("CITEWEAVE_JSON").as_deref() == Ok("1");

    let mut config = AppConfig::load()?;
    if let Ok(dir) = std::env::var("CITEWEAVE_DATA_DIR") {
        config.set_data_dir(dir.into());
    }

    match cli.command {
        // ── Sweeps ─────────────────────────────────────────────────────────

        Commands::Ingest { vocabulary } => {
            let path = vocabulary.unwrap_or_else(|| config.vocabulary_path());
            let vocabulary = Vocabulary::load(&path)
                .with_context(|| format!("reading vocabulary {}", path.display()))?;
            let db = open_db(&config)?;
            let source = scopus(&config)?;
            let cancel = install_cancel_handler();
            let mut checkpoint = load_checkpoint(&config)?;

            let result = run_keyword_sweep(
                &db,
                &source,
                &vocabulary,
                &mut checkpoint,
                QuotaFloors::from(&config.scopus),
                &cancel,
            );
            let outcome = finish_sweep(&config, &mut checkpoint, result)?;
            report_sweep(json_output, start, outcome, &checkpoint)?;
        }

        Commands::References { label } => {
            let db = open_db(&config)?;
            let source = scopus(&config)?;
            let cancel = install_cancel_handler();
            let mut checkpoint = load_checkpoint(&config)?;

            let result = run_reference_sweep(
                &db,
                &source,
                &mut checkpoint,
                label.as_deref(),
                QuotaFloors::from(&config.scopus),
                &cancel,
            );
            let outcome = finish_sweep(&config, &mut checkpoint, result)?;
            report_sweep(json_output, start, outcome, &checkpoint)?;
        }

        Commands::Merge { by, seed } => {
            let db = open_db(&config)?;
            let cancel = install_cancel_handler();
            let mut rng = match seed.or(config.merge.seed) {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };

            let report = run_merge_sweep(&db, by.into(), &mut rng, &cancel)?;
            let dur = start.elapsed().as_millis();
            if json_output {
                print_json(&serde_json::json!({"status":"ok","data":report,"meta":{"duration_ms":dur}}))?;
            } else {
                println!("Candidates: {}", report.candidates);
                println!("  merged:  {}", report.merged);
                println!("  skipped: {}", report.skipped);
                println!("  flagged: {}", report.flagged);
                println!("  invalid: {}", report.invalid);
                if report.cancelled {
                    println!("Interrupted; run again to continue.");
                }
            }
        }

        Commands::FillMissing => {
            let db = open_db(&config)?;
            let crossref = CrossRefSource::with_params(
                &config.crossref.base_url,
                Duration::from_millis(config.crossref.min_interval_ms),
                config.crossref.polite_email.clone(),
            )?;
            let cancel = install_cancel_handler();
            let mut checkpoint = load_checkpoint(&config)?;

            let result = fill_missing(&db, &crossref, &mut checkpoint, &cancel);
            let report = finish_sweep(&config, &mut checkpoint, result)?;
            let dur = start.elapsed().as_millis();
            if json_output {
                print_json(&serde_json::json!({"status":"ok","data":report,"meta":{"duration_ms":dur}}))?;
            } else {
                println!(
                    "Checked {}, updated {}, unresolved {}, new authors {}",
                    report.checked, report.updated, report.unresolved, report.authors_minted
                );
            }
        }

        // ── Maintenance ────────────────────────────────────────────────────

        Commands::Relabel { old, new } => {
            let db = open_db(&config)?;
            let changed = relabel(&db, &old, &new)?;
            let dur = start.elapsed().as_millis();
            if json_output {
                print_json(&serde_json::json!({"status":"ok","data":{"old":old,"new":new,"affected_publications":changed},"meta":{"duration_ms":dur}}))?;
            } else {
                println!("Relabelled {changed} publications: {old} → {new}");
            }
        }

        Commands::Stats { authors: false } => {
            let db = open_db(&config)?;
            let stats = CitationGraph::build(&db)?.stats();
            let dur = start.elapsed().as_millis();

            if json_output {
                print_json(&serde_json::json!({"status":"ok","data":stats,"meta":{"duration_ms":dur}}))?;
            } else {
                println!("Citation graph: {} nodes, {} edges", stats.nodes, stats.edges);
                print_degree_summary("in-degree", &stats.in_degree);
                print_degree_summary("out-degree", &stats.out_degree);
                println!("  author self-citations: {}", stats.self_citations);
                print_label_table(&stats.labels);
                print_mixing(&stats.mixing);
            }
        }

        Commands::Stats { authors: true } => {
            let db = open_db(&config)?;
            let stats = AuthorCitationGraph::build(&db)?.stats();
            let dur = start.elapsed().as_millis();

            if json_output {
                print_json(&serde_json::json!({"status":"ok","data":stats,"meta":{"duration_ms":dur}}))?;
            } else {
                println!(
                    "Author citation graph: {} authors, {} edges, total weight {}",
                    stats.nodes, stats.edges, stats.total_weight
                );
                print_degree_summary("in-degree", &stats.in_degree);
                print_degree_summary("out-degree", &stats.out_degree);
                print_degree_summary("edge weight", &stats.edge_weight);
                print_label_table(&stats.labels);
                print_mixing(&stats.mixing);
            }
        }

        Commands::Status => {
            let db = open_db(&config)?;
            let counts = db.counts()?;
            let checkpoint = load_checkpoint(&config)?;
            let dur = start.elapsed().as_millis();

            if json_output {
                print_json(&serde_json::json!({
                    "status":"ok",
                    "data":{"store":counts,"checkpoint":checkpoint},
                    "meta":{"duration_ms":dur}
                }))?;
            } else {
                println!("Store:");
                println!("  Publications:        {}", counts.publications);
                println!("  Pending records:     {}", counts.pending);
                println!("  Authors:             {}", counts.authors);
                println!("  Awaiting references: {}", counts.awaiting_references);
                println!("Checkpoint:");
                println!("  Remaining quota:     {}", checkpoint.remaining_quota);
                println!("  Completed keywords:  {}", checkpoint.completed_keywords.len());
                if let Some(kw) = &checkpoint.current_keyword {
                    println!("  Current keyword:     {kw}");
                }
                println!("  Citing queue:        {}", checkpoint.citing_queue.len());
                if let Some(at) = checkpoint.saved_at {
                    println!("  Saved at:            {}", at.to_rfc3339());
                }
            }
        }

        Commands::Quota { remaining } => {
            let mut checkpoint = load_checkpoint(&config)?;
            checkpoint.remaining_quota = remaining;
            checkpoint.save(&config.checkpoint_path())?;
            let dur = start.elapsed().as_millis();
            if json_output {
                print_json(&serde_json::json!({"status":"ok","data":{"remaining_quota":remaining},"meta":{"duration_ms":dur}}))?;
            } else {
                println!("Remaining quota set to {remaining}");
            }
        }

        // ── Config ─────────────────────────────────────────────────────────

        Commands::Config { action } => {
            let dur = start.elapsed().as_millis();
            match action {
                ConfigAction::List => {
                    let kv = config_key_values(&config);
                    if json_output {
                        print_json(&serde_json::json!({"status":"ok","data":kv,"meta":{"duration_ms":dur}}))?;
                    } else {
                        for (k, v) in &kv {
                            println!("{k} = {v}");
                        }
                    }
                }
                ConfigAction::Get { key } => {
                    let kv = config_key_values(&config);
                    match kv.get(key.as_str()) {
                        Some(val) => {
                            if json_output {
                                print_json(&serde_json::json!({"status":"ok","data":{"key":key,"value":val},"meta":{"duration_ms":dur}}))?;
                            } else {
                                println!("{val}");
                            }
                        }
                        None => {
                            eprintln!("Unknown config key: {key}");
                            std::process::exit(ExitCode::NotFound as i32);
                        }
                    }
                }
            }
        }

        // ── Doctor ─────────────────────────────────────────────────────────

        Commands::Doctor => {
            let config_path = AppConfig::config_path();
            if config_path.exists() {
                println!("✓ Config: {}", config_path.display());
            } else {
                println!("○ Config: not found (using defaults)");
            }

            let mut issues = 0;
            match open_db(&config) {
                Ok(db) => {
                    let schema = db.applied_versions()?.last().copied().unwrap_or(0);
                    let pending = db.pending_ids().map(|ids| ids.len()).unwrap_or(0);
                    let path = db.path().unwrap_or(":memory:").to_string();
                    if schema == SCHEMA_VERSION {
                        println!("✓ Database: {path} (schema v{schema}, {pending} pending records)");
                    } else {
                        issues += 1;
                        println!("✗ Database: {path} at schema v{schema}, expected v{SCHEMA_VERSION}");
                    }
                }
                Err(e) => {
                    issues += 1;
                    println!("✗ Database: {e}");
                }
            }

            match Checkpoint::load(&config.checkpoint_path()) {
                Ok(cp) => println!("✓ Checkpoint: quota {}", cp.remaining_quota),
                Err(e) => {
                    issues += 1;
                    println!("✗ Checkpoint: {e}");
                }
            }

            let vocab_path = config.vocabulary_path();
            match Vocabulary::load(&vocab_path) {
                Ok(v) => println!("✓ Vocabulary: {} ({} keywords)", vocab_path.display(), v.len()),
                Err(e) => println!("○ Vocabulary: {e}"),
            }

            if std::env::var(&config.scopus.api_key_env).is_ok() {
                println!("✓ API key: ${} set", config.scopus.api_key_env);
            } else {
                println!("○ API key: ${} not set", config.scopus.api_key_env);
            }

            if issues == 0 { println!("\nAll checks passed ✓"); }
            else { println!("\n{issues} issues found"); std::process::exit(ExitCode::GeneralError as i32); }
        }

        // ── Version ────────────────────────────────────────────────────────

        Commands::Version => {
            let version = env!("CARGO_PKG_VERSION");
            let dur = start.elapsed().as_millis();
            if json_output {
                print_json(&serde_json::json!({"status":"ok","data":{"version":version},"meta":{"duration_ms":dur}}))?;
            } else {
                println!("citeweave v{version}");
            }
        }
    }

    Ok(())
}

// ─── Helpers ────────────────────────────────────────────────────────────────

fn print_json(val: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(val)?);
    Ok(())
}

fn open_db(config: &AppConfig) -> Result<Database> {
    let db_path = config.database_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(Database::open(&db_path)?)
}

fn load_checkpoint(config: &AppConfig) -> Result<Checkpoint> {
    let path = config.checkpoint_path();
    Checkpoint::load(&path).with_context(|| format!("reading checkpoint {}", path.display()))
}

fn scopus(config: &AppConfig) -> Result<ScopusSource> {
    let api_key = std::env::var(&config.scopus.api_key_env)
        .with_context(|| format!("${} is not set", config.scopus.api_key_env))?;
    let inst_token = std::env::var(&config.scopus.inst_token_env).ok();
    Ok(ScopusSource::with_params(
        &config.scopus.base_url,
        &api_key,
        inst_token.as_deref(),
        Duration::from_millis(config.scopus.min_interval_ms),
        config.scopus.max_retries,
        config.scopus.page_size,
    )?)
}

/// Sets the returned flag on Ctrl-C. Sweeps check it between records.
fn install_cancel_handler() -> Arc<AtomicBool> {
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = cancel.clone();
    std::thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
            Ok(rt) => rt,
            Err(e) => {
                tracing::warn!("no Ctrl-C handler: {e}");
                return;
            }
        };
        runtime.block_on(async {
            while tokio::signal::ctrl_c().await.is_ok() {
                match on_interrupt(&flag) {
                    Interrupt::Graceful => {
                        tracing::warn!("interrupt received; stopping after the current record");
                    }
                    Interrupt::Force => {
                        eprintln!("second interrupt; exiting without saving the checkpoint");
                        std::process::exit(130);
                    }
                }
            }
        });
    });
    cancel
}

#[derive(Debug, PartialEq, Eq)]
enum Interrupt {
    Graceful,
    Force,
}

/// The first interrupt asks the sweep to stop; any later one forces an exit.
fn on_interrupt(flag: &AtomicBool) -> Interrupt {
    if flag.swap(true, Ordering::Relaxed) {
        Interrupt::Force
    } else {
        Interrupt::Graceful
    }
}

/// Persists the checkpoint whatever the sweep returned. A malformed
/// response is dumped to stderr and ends the process.
fn finish_sweep<T>(
    config: &AppConfig,
    checkpoint: &mut Checkpoint,
    result: citeweave_science::Result<T>,
) -> Result<T> {
    let saved = checkpoint.save(&config.checkpoint_path());
    match result {
        Ok(value) => {
            saved?;
            Ok(value)
        }
        Err(ScienceError::MalformedResponse { url, reason, payload }) => {
            if let Err(e) = saved {
                eprintln!("checkpoint not saved: {e}");
            }
            eprintln!("Malformed response from {url}: {reason}");
            eprintln!("{payload}");
            std::process::exit(ExitCode::MalformedResponse as i32);
        }
        Err(e) => {
            if let Err(save_err) = saved {
                eprintln!("checkpoint not saved: {save_err}");
            }
            Err(e.into())
        }
    }
}

fn report_sweep(
    json_output: bool,
    start: Instant,
    outcome: SweepOutcome,
    checkpoint: &Checkpoint,
) -> Result<()> {
    let dur = start.elapsed().as_millis();
    if json_output {
        print_json(&serde_json::json!({
            "status":"ok",
            "data":{
                "outcome":outcome,
                "records_checked":checkpoint.records_checked,
                "newly_added":checkpoint.newly_added,
                "in_database":checkpoint.in_database,
                "remaining_quota":checkpoint.remaining_quota
            },
            "meta":{"duration_ms":dur}
        }))?;
    } else {
        let status = match outcome {
            SweepOutcome::Completed => "completed",
            SweepOutcome::QuotaExhausted => "paused: quota exhausted",
            SweepOutcome::Cancelled => "paused: interrupted",
        };
        println!("Sweep {status}");
        println!("  Records checked:  {}", checkpoint.records_checked);
        println!("  Newly added:      {}", checkpoint.newly_added);
        println!("  Already stored:   {}", checkpoint.in_database);
        println!("  Remaining quota:  {}", checkpoint.remaining_quota);
    }
    Ok(())
}

fn config_key_values(config: &AppConfig) -> std::collections::BTreeMap<&'static str, String> {
    let mut map = std::collections::BTreeMap::new();
    map.insert("core.data_dir", config.core.data_dir.clone());
    map.insert("database_path", config.database_path().to_string_lossy().to_string());
    map.insert("checkpoint_path", config.checkpoint_path().to_string_lossy().to_string());
    map.insert("vocabulary_path", config.vocabulary_path().to_string_lossy().to_string());
    map.insert("scopus.base_url", config.scopus.base_url.clone());
    map.insert("scopus.api_key_env", config.scopus.api_key_env.clone());
    map.insert("scopus.inst_token_env", config.scopus.inst_token_env.clone());
    map.insert("scopus.min_interval_ms", config.scopus.min_interval_ms.to_string());
    map.insert("scopus.max_retries", config.scopus.max_retries.to_string());
    map.insert("scopus.page_size", config.scopus.page_size.to_string());
    map.insert("scopus.search_quota_floor", config.scopus.search_quota_floor.to_string());
    map.insert("scopus.citing_quota_floor", config.scopus.citing_quota_floor.to_string());
    map.insert("scopus.references_quota_floor", config.scopus.references_quota_floor.to_string());
    map.insert("crossref.base_url", config.crossref.base_url.clone());
    map.insert(
        "crossref.polite_email",
        config.crossref.polite_email.clone().unwrap_or_default(),
    );
    map.insert(
        "merge.seed",
        config.merge.seed.map(|s| s.to_string()).unwrap_or_default(),
    );
    map
}

// ─── Stats Output ───────────────────────────────────────────────────────────

fn print_degree_summary(name: &str, d: &DegreeSummary) {
    println!(
        "  {name}: max {}, mean {:.3}, stdev {:.3}, mode {} ({:.1}%)",
        d.max,
        d.mean,
        d.stdev,
        d.mode,
        d.mode_share * 100.0
    );
}

fn print_label_table(labels: &[LabelDegrees]) {
    println!(
        "\n{:<12} {:>6} {:>9} {:>9} {:>7} {:>9} {:>9} {:>7}",
        "label", "size", "in mean", "in sd", "in", "out mean", "out sd", "out"
    );
    for l in labels {
        println!(
            "{:<12} {:>6} {:>9.3} {:>9.3} {:>7} {:>9.3} {:>9.3} {:>7}",
            l.label,
            l.size,
            l.in_degree.mean,
            l.in_degree.stdev,
            l.in_degree.total,
            l.out_degree.mean,
            l.out_degree.stdev,
            l.out_degree.total
        );
    }
}

fn print_mixing(mixing: &[LabelMixing]) {
    println!("\nCitation proportions (from → to: count, outgoing share, incoming share):");
    for m in mixing {
        println!(
            "  {:<12} → {:<12} {:>6} {:.3} {:.3}",
            m.from, m.to, m.edges, m.proportion, m.incoming_proportion
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_interrupt_forces_exit() {
        let flag = AtomicBool::new(false);
        assert_eq!(on_interrupt(&flag), Interrupt::Graceful);
        assert!(flag.load(Ordering::Relaxed));
        assert_eq!(on_interrupt(&flag), Interrupt::Force);
    }
}
