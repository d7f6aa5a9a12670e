use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use intro_analyzer::config::Config;
use intro_analyzer::llm::{create_llm, LLM};
use intro_analyzer::models::{IngestRequest, SubmitterMetadata};
use intro_analyzer::search::{RelevanceSearchEngine, SearchFilters};
use intro_analyzer::store::{IntroStore, JsonFileStore};
use intro_analyzer::{ClipAcquirer, IngestionPipeline, TempFileJanitor};

fn cli() -> Command {
    Command::new("Intro Analyzer")
        .version(env!("CARGO_PKG_VERSION"))
        .author("TigreRoll")
        .about("Video intro acquisition, AI analysis and relevance search")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file (TOML)")
                .value_parser(value_parser!(PathBuf))
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(Command::new("serve").about("Start the HTTP API and the scratch directory janitor"))
        .subcommand(
            Command::new("ingest")
                .about("Download, analyze and store one intro")
                .arg(Arg::new("url").long("url").required(true).help("Video URL"))
                .arg(
                    Arg::new("start")
                        .long("start")
                        .required(true)
                        .allow_negative_numbers(true)
                        .value_parser(value_parser!(i64))
                        .help("Intro start, in seconds"),
                )
                .arg(
                    Arg::new("end")
                        .long("end")
                        .required(true)
                        .allow_negative_numbers(true)
                        .value_parser(value_parser!(i64))
                        .help("Intro end, in seconds"),
                )
                .arg(Arg::new("category").long("category").required(true))
                .arg(Arg::new("channel").long("channel").required(true).help("Channel name"))
                .arg(Arg::new("title").long("title").required(true).help("Video title"))
                .arg(Arg::new("thumbnail").long("thumbnail").help("Thumbnail URL")),
        )
        .subcommand(
            Command::new("search")
                .about("Rank stored intros for a free-text query")
                .arg(Arg::new("query").required(true).num_args(1..).help("Search query"))
                .arg(Arg::new("context").long("context").help("Describe yourself or your channel"))
                .arg(Arg::new("category").long("category"))
                .arg(
                    Arg::new("min-duration")
                        .long("min-duration")
                        .value_parser(value_parser!(u32)),
                )
                .arg(
                    Arg::new("max-duration")
                        .long("max-duration")
                        .value_parser(value_parser!(u32)),
                ),
        )
        .subcommand(
            Command::new("suggest")
                .about("Suggest tags, moods, styles and categories")
                .arg(Arg::new("partial").required(true)),
        )
        .subcommand(
            Command::new("sweep")
                .about("Delete old files from the scratch directory once")
                .arg(
                    Arg::new("max-age-minutes")
                        .long("max-age-minutes")
                        .value_parser(value_parser!(u64)),
                ),
        )
        .subcommand(Command::new("check").about("Check external tools, model access and storage"))
}

fn init_logging(config: &Config, verbose: bool) {
    let level = if verbose { "debug" } else { config.logging.level.as_str() };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("intro_analyzer={},tower_http={},warn", level, level)));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Load and validate the configuration, returning the file it came from
fn load_config(matches: &ArgMatches) -> Result<(Config, Option<PathBuf>)> {
    let (config, source) = match matches.get_one::<PathBuf>("config") {
        Some(path) => (Config::load_from(path)?, Some(path.clone())),
        None => (Config::load()?, Config::find_file()),
    };
    config.validate().context("Invalid configuration")?;
    Ok((config, source))
}

fn build_llm(config: &Config) -> Result<Arc<dyn LLM>> {
    let llm = create_llm(&config.llm).context("Cannot create model client (is GEMINI_API_KEY set?)")?;
    Ok(Arc::from(llm))
}

async fn open_store(config: &Config) -> Result<Arc<dyn IntroStore>> {
    let store = JsonFileStore::open(&config.storage.data_file)
        .await
        .with_context(|| format!("Cannot open data file {}", config.storage.data_file.display()))?;
    Ok(Arc::new(store))
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    let (config, source) = load_config(&matches)?;
    init_logging(&config, matches.get_flag("verbose"));

    info!("🚀 Intro Analyzer v{} starting...", env!("CARGO_PKG_VERSION"));
    match &source {
        Some(path) => info!("📄 Loaded configuration from: {}", path.display()),
        None => info!("📄 No configuration file found, using defaults and environment"),
    }
    for line in config.summary().lines() {
        info!("{}", line);
    }

    let result = match matches.subcommand() {
        Some(("serve", _)) => serve(config).await,
        Some(("ingest", sub)) => ingest(config, sub).await,
        Some(("search", sub)) => search(config, sub).await,
        Some(("suggest", sub)) => suggest(config, sub).await,
        Some(("sweep", sub)) => sweep(config, sub).await,
        Some(("check", _)) => check(config).await,
        _ => Err(anyhow::anyhow!("unknown command")),
    };

    if let Err(e) = &result {
        error!("❌ {:#}", e);
    }
    result
}

#[cfg(feature = "api")]
async fn serve(config: Config) -> Result<()> {
    use intro_analyzer::api::{ApiServer, AppState};

    let store = open_store(&config).await?;
    let llm = build_llm(&config)?;

    let tools = ClipAcquirer::new(&config.acquisition).check_tools().await;
    if !tools.downloader {
        warn!("⚠️ {} not found, downloads will fail", config.acquisition.downloader_bin);
    }
    if !tools.extractor {
        warn!("⚠️ {} not found, clip extraction will fail", config.acquisition.extractor_bin);
    }

    let janitor = TempFileJanitor::new(config.acquisition.scratch_dir.clone());
    let _sweeper = janitor.schedule(config.janitor.interval(), config.janitor.max_age());

    let state = AppState::new(&config, llm, store);
    ApiServer::new(state, config.server.host.clone(), config.server.port)
        .start()
        .await
}

#[cfg(not(feature = "api"))]
async fn serve(_config: Config) -> Result<()> {
    anyhow::bail!("this build does not include the HTTP API (enable the `api` feature)")
}

async fn ingest(config: Config, matches: &ArgMatches) -> Result<()> {
    let arg = |name: &str| matches.get_one::<String>(name).cloned().unwrap_or_default();

    let request = IngestRequest {
        video_url: arg("url"),
        start_time: matches.get_one::<i64>("start").copied().unwrap_or_default(),
        end_time: matches.get_one::<i64>("end").copied().unwrap_or_default(),
        submitter: SubmitterMetadata {
            channel_name: arg("channel"),
            video_title: arg("title"),
            category: arg("category"),
            thumbnail_url: matches.get_one::<String>("thumbnail").cloned(),
        },
    };

    let store = open_store(&config).await?;
    let llm = build_llm(&config)?;
    let pipeline = IngestionPipeline::from_config(&config, llm, store);

    let record = pipeline.ingest(request).await.map_err(|e| {
        anyhow::anyhow!("{:?}: {}", e.kind(), e)
    })?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

async fn search(config: Config, matches: &ArgMatches) -> Result<()> {
    let query = matches
        .get_many::<String>("query")
        .map(|words| words.cloned().collect::<Vec<_>>().join(" "))
        .unwrap_or_default();
    let filters = SearchFilters {
        category: matches.get_one::<String>("category").cloned(),
        min_duration: matches.get_one::<u32>("min-duration").copied(),
        max_duration: matches.get_one::<u32>("max-duration").copied(),
    };

    let store = open_store(&config).await?;
    let corpus = store.all().await?;
    let engine = RelevanceSearchEngine::new();
    let results = engine.search(
        &query,
        &corpus,
        matches.get_one::<String>("context").map(String::as_str),
        &filters,
    );

    if results.is_empty() {
        println!("No matching intros for \"{}\"", query);
        return Ok(());
    }

    println!("{:>5}  {:>5}  {:<40}  {}", "SCORE", "ID", "TITLE", "TAGS");
    for scored in &results {
        let intro = &scored.record.intro;
        println!(
            "{:>5}  {:>5}  {:<40}  {}",
            scored.relevance_score,
            scored.record.id,
            intro.video_title.chars().take(40).collect::<String>(),
            intro.analysis.keywords.join(", ")
        );
    }
    Ok(())
}

async fn suggest(config: Config, matches: &ArgMatches) -> Result<()> {
    let partial = matches.get_one::<String>("partial").cloned().unwrap_or_default();
    let store = open_store(&config).await?;
    let corpus = store.all().await?;

    for suggestion in RelevanceSearchEngine::new().suggest(&partial, &corpus) {
        println!("{}", suggestion);
    }
    Ok(())
}

async fn sweep(config: Config, matches: &ArgMatches) -> Result<()> {
    let max_age = matches
        .get_one::<u64>("max-age-minutes")
        .map(|m| Duration::from_secs(m * 60))
        .unwrap_or_else(|| config.janitor.max_age());

    let janitor = TempFileJanitor::new(config.acquisition.scratch_dir.clone());
    let report = janitor.sweep(max_age).await;
    println!(
        "Scanned {} file(s), deleted {}, errors {}",
        report.scanned, report.deleted, report.errors
    );
    Ok(())
}

async fn check(config: Config) -> Result<()> {
    let mut healthy = true;

    let tools = ClipAcquirer::new(&config.acquisition).check_tools().await;
    for (name, ok) in [
        (&config.acquisition.downloader_bin, tools.downloader),
        (&config.acquisition.extractor_bin, tools.extractor),
    ] {
        println!("{} {}", if ok { "✅" } else { "❌" }, name);
        healthy &= ok;
    }

    match build_llm(&config) {
        Ok(llm) => {
            let ok = llm.is_available().await;
            println!("{} model {} ({:?})", if ok { "✅" } else { "❌" }, config.llm.model, llm.provider_type());
            healthy &= ok;
        }
        Err(e) => {
            println!("❌ model: {:#}", e);
            healthy = false;
        }
    }

    match open_store(&config).await {
        Ok(store) => println!("✅ data file {} ({} intros)", config.storage.data_file.display(), store.count(None, None).await?),
        Err(e) => {
            println!("❌ {:#}", e);
            healthy = false;
        }
    }

    if healthy {
        Ok(())
    } else {
        anyhow::bail!("one or more checks failed")
    }
}
