use chrono::Utc;
use clap::{Parser, Subcommand};
use legal_search_core::{
    BackendId, BackendSettings, CoreConfig, DateRange, HttpBackendFactory, LegalSearchCore,
    SearchRequest, SortOrder, DEFAULT_USER_AGENT,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "legal-search", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Brave Search API token, enables the KVKK backend.
    #[arg(long, env = "BRAVE_API_TOKEN", hide_env_values = true)]
    brave_api_token: Option<String>,

    /// Tavily API key, enables the BDDK backend.
    #[arg(long, env = "TAVILY_API_KEY", hide_env_values = true)]
    tavily_api_key: Option<String>,

    /// Bound on a whole multi-backend search, in seconds.
    #[arg(long, env = "LEGAL_SEARCH_SEARCH_TIMEOUT", default_value = "30")]
    search_timeout: u64,

    /// Bound on one backend answer, in seconds.
    #[arg(long, env = "LEGAL_SEARCH_BACKEND_TIMEOUT", default_value = "20")]
    backend_timeout: u64,

    /// Bound on converting one document, in seconds.
    #[arg(long, env = "LEGAL_SEARCH_CONVERSION_TIMEOUT", default_value = "30")]
    conversion_timeout: u64,

    /// HTTP request timeout, in seconds.
    #[arg(long, env = "LEGAL_SEARCH_REQUEST_TIMEOUT", default_value = "20")]
    request_timeout: u64,

    #[arg(long, env = "LEGAL_SEARCH_USER_AGENT", default_value = DEFAULT_USER_AGENT)]
    user_agent: String,
}

#[derive(Subcommand)]
enum Command {
    /// Search every selected backend and print the merged results as JSON.
    Search {
        /// Search phrase; wrap in double quotes for an exact phrase.
        #[arg(long, default_value = "")]
        phrase: String,
        /// Backend to query, repeatable. Defaults to every configured backend.
        #[arg(long = "backend")]
        backends: Vec<BackendId>,
        /// Chamber, board or decision type, e.g. "3. Hukuk Dairesi" or "H3".
        #[arg(long)]
        unit: Option<String>,
        /// Earliest decision date, RFC 3339.
        #[arg(long)]
        start: Option<String>,
        /// Latest decision date, RFC 3339.
        #[arg(long)]
        end: Option<String>,
        #[arg(long, default_value = "1")]
        page: u32,
        #[arg(long, default_value = "10")]
        page_size: u32,
        /// `asc` or `desc`.
        #[arg(long, value_parser = parse_sort)]
        sort: Option<SortOrder>,
    },
    /// Fetch a decision by id and print the requested markdown pages as JSON.
    Fetch {
        #[arg(long)]
        id: String,
        /// Page number, repeatable.
        #[arg(long = "page", default_values_t = [1u32])]
        pages: Vec<u32>,
    },
    /// List backends and whether they are configured.
    Backends,
}

fn parse_sort(value: &str) -> Result<SortOrder, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "asc" => Ok(SortOrder::Asc),
        "desc" => Ok(SortOrder::Desc),
        other => Err(format!("unknown sort order {other:?}, expected asc or desc")),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let settings = BackendSettings {
        request_timeout: Duration::from_secs(cli.request_timeout),
        user_agent: cli.user_agent.clone(),
        brave_api_token: cli.brave_api_token.clone(),
        tavily_api_key: cli.tavily_api_key.clone(),
        ..BackendSettings::default()
    };
    let config = CoreConfig {
        search_timeout: Duration::from_secs(cli.search_timeout),
        backend_timeout: Duration::from_secs(cli.backend_timeout),
        conversion_timeout: Duration::from_secs(cli.conversion_timeout),
        default_backends: settings.configured_backends(),
    };

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        backends = config.default_backends.len(),
        "legal-search boot"
    );

    if let Command::Backends = cli.command {
        let configured = settings.configured_backends();
        let listing: Vec<_> = BackendId::ALL
            .iter()
            .map(|backend| {
                let capabilities = backend.capabilities();
                json!({
                    "backend": backend,
                    "name": backend.display_name(),
                    "configured": configured.contains(backend),
                    "exact_phrase": capabilities.exact_phrase,
                    "date_filter": capabilities.date_filter,
                    "max_page_size": capabilities.max_page_size,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    let factory = HttpBackendFactory::new(settings)?;
    let core = LegalSearchCore::new(Arc::new(factory), config)?;

    let outcome = run(&core, cli.command).await;

    let report = core.shutdown().await;
    for (backend, reason) in &report.failures {
        warn!(backend = %backend, reason = %reason, "backend client did not close cleanly");
    }

    outcome
}

async fn run(core: &LegalSearchCore, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Search {
            phrase,
            backends,
            unit,
            start,
            end,
            page,
            page_size,
            sort,
        } => {
            let request = SearchRequest {
                backends,
                unit,
                date_range: DateRange::parse(start.as_deref(), end.as_deref())?,
                page,
                page_size,
                sort,
                ..SearchRequest::new(phrase)
            };
            let outcome = core.search(&request).await?;
            for (backend, failure) in &outcome.backend_errors {
                warn!(backend = %backend, kind = %failure.kind, "backend failed: {}", failure.message);
            }
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Command::Fetch { id, pages } => {
            let pages = core.fetch_document_pages(&id, &pages).await?;
            println!("{}", serde_json::to_string_pretty(&pages)?);
        }
        Command::Backends => {}
    }
    Ok(())
}
