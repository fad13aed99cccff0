mod aggregator;
mod client;
mod error;
mod fetcher;
mod parser;
mod profile;
mod settings;
mod stats;
mod store;

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info};

use fetcher::{CollectionFilter, CollectionItem, CollectionKind, PagedFetcher};
use profile::{FailedProfile, OrganizationProfile, ProfileRecord};
use settings::Settings;

#[derive(Parser)]
#[command(name = "hf_org_profile", about = "Hub organization profile aggregator")]
struct Cli {
    #[command(flatten)]
    overrides: Overrides,
    #[command(subcommand)]
    command: Commands,
}

/// Flags that take precedence over config file and HF_* environment.
#[derive(Args)]
struct Overrides {
    /// Hub base URL
    #[arg(long, global = true)]
    base_url: Option<String>,
    /// Per-request timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,
    /// Records per API page (max 1000)
    #[arg(long, global = true)]
    page_size: Option<usize>,
    /// Retries for transient failures
    #[arg(long, global = true)]
    retries: Option<u32>,
    /// Requests per second (0 = unlimited)
    #[arg(long, global = true)]
    rps: Option<u32>,
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Models,
    Datasets,
    Spaces,
}

impl From<KindArg> for CollectionKind {
    fn from(k: KindArg) -> Self {
        match k {
            KindArg::Models => CollectionKind::Models,
            KindArg::Datasets => CollectionKind::Datasets,
            KindArg::Spaces => CollectionKind::Spaces,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Build one organization profile and write it as JSON
    Profile {
        /// Organization name
        org: String,
        /// Output path (default: data/<org>.json)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Build profiles for several organizations into a JSONL file
    Orgs {
        /// Organization names
        #[arg(required_unless_present = "from_models")]
        orgs: Vec<String>,
        /// Also profile every author found in a models JSONL listing
        #[arg(long)]
        from_models: Option<PathBuf>,
        #[arg(short, long, default_value = "data/organizations.jsonl")]
        output: PathBuf,
    },
    /// Fetch the top N records of a collection into a JSONL file
    Models {
        #[arg(long, value_enum, default_value = "models")]
        kind: KindArg,
        /// Number of records to fetch
        #[arg(short = 'n', long, default_value = "100")]
        limit: usize,
        #[arg(long)]
        author: Option<String>,
        #[arg(long)]
        search: Option<String>,
        /// Task filter (e.g. text-classification)
        #[arg(long)]
        filter: Option<String>,
        #[arg(long)]
        pipeline_tag: Option<String>,
        #[arg(long)]
        library: Option<String>,
        #[arg(long)]
        language: Option<String>,
        /// Comma-separated tags
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
        #[arg(long, default_value = "downloads")]
        sort: String,
        #[arg(long, default_value = "-1", allow_hyphen_values = true)]
        direction: i32,
        /// Request full records
        #[arg(long)]
        full: bool,
        /// Resume a listing at this offset
        #[arg(long, default_value = "0")]
        offset: usize,
        /// Output path (default: data/<kind>.jsonl)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Summary statistics over a JSONL listing or organizations file
    Stats {
        file: PathBuf,
        /// Read FILE as organization profiles rather than listing records
        #[arg(long)]
        orgs: bool,
        /// Only count records with at least this many downloads
        #[arg(long, default_value = "0")]
        min_downloads: u64,
        /// Rows per ranking
        #[arg(long, default_value = "10")]
        top: usize,
    },
    /// Top models, then a profile for each of their authors, then statistics
    Run {
        /// Number of top models to fetch
        #[arg(short = 'n', long, default_value = "100")]
        limit: usize,
        /// Directory for models.jsonl and organizations.jsonl
        #[arg(long, default_value = store::DATA_DIR)]
        dir: PathBuf,
        /// Rows per ranking
        #[arg(long, default_value = "10")]
        top: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = apply_overrides(Settings::load()?, &cli.overrides);

    let result = match cli.command {
        Commands::Profile { org, output } => {
            let path = output.unwrap_or_else(|| default_path(&org, "json"));
            let profile = aggregator::build_profile(&org, &settings).await?;
            store::write_json(&path, &profile)?;
            report_incomplete(&profile);
            println!(
                "Wrote {} ({} models, {} datasets, {} spaces)",
                path.display(),
                profile.api_data.models.count,
                profile.api_data.datasets.count,
                profile.api_data.spaces.count
            );
            Ok(())
        }
        Commands::Orgs {
            mut orgs,
            from_models,
            output,
        } => {
            if let Some(models) = from_models {
                let items: Vec<CollectionItem> = store::read_jsonl(&models)?;
                orgs.extend(stats::authors_from_items(&items));
                orgs.sort();
                orgs.dedup();
            }
            profile_orgs(&settings, &orgs, &output).await
        }
        Commands::Models {
            kind,
            limit,
            author,
            search,
            filter,
            pipeline_tag,
            library,
            language,
            tags,
            sort,
            direction,
            full,
            offset,
            output,
        } => {
            let kind = CollectionKind::from(kind);
            let path = output.unwrap_or_else(|| default_path(kind.as_str(), "jsonl"));
            let filter = CollectionFilter {
                author,
                search,
                filter,
                pipeline_tag,
                library,
                language,
                tags,
                sort: Some(sort),
                direction: Some(direction),
                full,
            };
            fetch_listing(&settings, kind, &filter, offset, limit, &path).await
        }
        Commands::Stats {
            file,
            orgs: true,
            top,
            ..
        } => {
            let records: Vec<ProfileRecord> = store::read_jsonl(&file)?;
            print_org_stats(&stats::compute_orgs(&records, top));
            Ok(())
        }
        Commands::Stats {
            file,
            min_downloads,
            top,
            ..
        } => {
            let items: Vec<CollectionItem> = store::read_jsonl(&file)?;
            let kept = stats::filter_min_downloads(&items, min_downloads);
            print_stats(&stats::compute(&kept, top), items.len());
            Ok(())
        }
        Commands::Run { limit, dir, top } => run_pipeline(&settings, limit, &dir, top).await,
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        info!("Done in {}", format_duration(elapsed));
    }

    result
}

fn apply_overrides(mut settings: Settings, o: &Overrides) -> Settings {
    if let Some(url) = &o.base_url {
        settings.base_url = url.clone();
    }
    if let Some(t) = o.timeout {
        settings.timeout_secs = t;
    }
    if let Some(p) = o.page_size {
        settings.page_size = p;
    }
    if let Some(r) = o.retries {
        settings.max_retries = r;
    }
    if let Some(rps) = o.rps {
        settings.requests_per_second = rps;
    }
    settings.normalized()
}

fn default_path(stem: &str, ext: &str) -> PathBuf {
    Path::new(store::DATA_DIR).join(format!("{}.{}", stem, ext))
}

/// Incomplete collections go to stderr; the run still exits 0.
fn report_incomplete(profile: &OrganizationProfile) {
    for kind in &profile.incomplete_collections {
        let summary = profile.api_data.get(*kind);
        eprintln!(
            "warning: {}: {} incomplete ({} items fetched): {}",
            profile.organization,
            kind,
            summary.count,
            summary.error.as_deref().unwrap_or("unknown error")
        );
    }
}

/// Profile each org in turn. Failures are logged and written as
/// `{organization, error}` lines; the run fails only if every org failed.
async fn profile_orgs(settings: &Settings, orgs: &[String], output: &Path) -> anyhow::Result<()> {
    let mut writer = store::JsonlWriter::create(output)?;
    let pb = ProgressBar::new(orgs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );

    let (mut ok, mut partial, mut failed) = (0usize, 0usize, 0usize);
    for org in orgs {
        pb.set_message(org.clone());
        match aggregator::build_profile(org, settings).await {
            Ok(profile) => {
                if profile.is_complete() {
                    ok += 1;
                } else {
                    partial += 1;
                    pb.suspend(|| report_incomplete(&profile));
                }
                writer.write(&profile)?;
            }
            Err(e) => {
                failed += 1;
                pb.suspend(|| error!("{}", e));
                writer.write(&FailedProfile {
                    organization: org.clone(),
                    error: e.to_string(),
                })?;
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    println!(
        "Done: {} organizations ({} complete, {} partial, {} failed) -> {}",
        orgs.len(),
        ok,
        partial,
        failed,
        output.display()
    );
    if failed > 0 && ok + partial == 0 {
        anyhow::bail!("every organization failed");
    }
    Ok(())
}

/// Top `limit` models by downloads, their authors' profiles, then both reports.
async fn run_pipeline(
    settings: &Settings,
    limit: usize,
    dir: &Path,
    top: usize,
) -> anyhow::Result<()> {
    let models_path = dir.join("models.jsonl");
    let orgs_path = dir.join("organizations.jsonl");

    let filter = CollectionFilter {
        sort: Some("downloads".into()),
        direction: Some(-1),
        ..Default::default()
    };
    fetch_listing(settings, CollectionKind::Models, &filter, 0, limit, &models_path).await?;

    let items: Vec<CollectionItem> = store::read_jsonl(&models_path)?;
    let orgs = stats::authors_from_items(&items);
    info!("{} organizations found in {} models", orgs.len(), items.len());
    profile_orgs(settings, &orgs, &orgs_path).await?;

    println!("\n=== Models ===");
    let all: Vec<&CollectionItem> = items.iter().collect();
    print_stats(&stats::compute(&all, top), items.len());

    println!("\n=== Organizations ===");
    let records: Vec<ProfileRecord> = store::read_jsonl(&orgs_path)?;
    print_org_stats(&stats::compute_orgs(&records, top));
    Ok(())
}

async fn fetch_listing(
    settings: &Settings,
    kind: CollectionKind,
    filter: &CollectionFilter,
    offset: usize,
    limit: usize,
    path: &Path,
) -> anyhow::Result<()> {
    let client = client::HubClient::new(settings)?;
    let mut fetcher =
        PagedFetcher::new(client, kind, filter, settings.page_size.min(limit.max(1)))
            .with_max_items(offset + limit)
            .resume_at(offset);
    let mut writer = store::JsonlWriter::create(path)?;

    let pb = ProgressBar::new(limit as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec})")?
            .progress_chars("=> "),
    );

    let mut written = 0usize;
    let outcome = loop {
        match fetcher.next_page().await {
            Ok(Some(page)) => {
                for item in &page {
                    writer.write(item)?;
                }
                written += page.len();
                pb.inc(page.len() as u64);
            }
            Ok(None) => break Ok(()),
            Err(e) => break Err(e),
        }
    };
    pb.finish_and_clear();

    println!("Wrote {} {} to {}", written, kind, path.display());
    outcome.with_context(|| {
        format!(
            "{} listing stopped at offset {}; {} records kept",
            kind,
            fetcher.offset(),
            written
        )
    })
}

fn print_stats(s: &stats::ListingStats, loaded: usize) {
    println!("Records:   {} (of {} loaded)", s.total, loaded);
    println!("Downloads: {} (avg {:.1})", s.total_downloads, s.avg_downloads);
    println!("Likes:     {} (avg {:.1})", s.total_likes, s.avg_likes);

    println!("\n--- Top by downloads ---");
    for (i, item) in s.top_by_downloads.iter().enumerate() {
        println!(
            "{:>3} | {:<48} | {:>12} | {:>6}",
            i + 1,
            truncate(&item.id, 48),
            item.downloads,
            item.likes
        );
    }
    println!("\n--- Top by likes ---");
    for (i, item) in s.top_by_likes.iter().enumerate() {
        println!(
            "{:>3} | {:<48} | {:>6} | {:>12}",
            i + 1,
            truncate(&item.id, 48),
            item.likes,
            item.downloads
        );
    }

    for (title, rows) in [
        ("Pipeline tags", &s.by_pipeline_tag),
        ("Libraries", &s.by_library),
        ("Authors", &s.by_author),
    ] {
        println!("\n--- {} ---", title);
        for (key, count) in rows {
            println!("  {:<32} {}", truncate(key, 32), count);
        }
    }
}

fn print_org_stats(s: &stats::OrgStats) {
    println!(
        "Organizations: {} ({} valid, {} failed)",
        s.total, s.valid, s.failed
    );
    println!(
        "Models: {}  Datasets: {}  Spaces: {}  Followers: {}",
        s.total_models, s.total_datasets, s.total_spaces, s.total_followers
    );

    println!("\n--- Top by models ---");
    for (i, p) in s.top_by_models.iter().enumerate() {
        println!(
            "{:>3} | {:<32} | {:>6} models | {:>12} downloads",
            i + 1,
            truncate(&p.organization, 32),
            p.api_data.models.count,
            p.api_data.models.total_downloads
        );
    }
    println!("\n--- Top by model downloads ---");
    for (i, p) in s.top_by_downloads.iter().enumerate() {
        println!(
            "{:>3} | {:<32} | {:>12}",
            i + 1,
            truncate(&p.organization, 32),
            p.api_data.models.total_downloads
        );
    }
    println!("\n--- Top by followers ---");
    for (i, p) in s.top_by_followers.iter().enumerate() {
        println!(
            "{:>3} | {:<32} | {:>8}",
            i + 1,
            truncate(&p.organization, 32),
            p.follower_info.follower_count.unwrap_or(0)
        );
    }

    println!("\n--- Plans ---");
    for (plan, count) in &s.by_plan {
        println!("  {:<32} {}", truncate(plan, 32), count);
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orgs_need_names_or_a_models_file() {
        assert!(Cli::try_parse_from(["hf_org_profile", "orgs"]).is_err());
        let cli = Cli::try_parse_from(["hf_org_profile", "orgs", "--from-models", "m.jsonl"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Orgs { ref orgs, from_models: Some(_), .. } if orgs.is_empty()
        ));
    }

    #[test]
    fn overrides_reach_settings() {
        let cli = Cli::try_parse_from(["hf_org_profile", "--rps", "0", "--retries", "99", "run"])
            .unwrap();
        let s = apply_overrides(Settings::default(), &cli.overrides);
        assert_eq!(s.requests_per_second, 0);
        assert_eq!(s.max_retries, settings::MAX_RETRIES);
    }
}
