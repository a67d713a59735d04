//! # rq-cli — The "Console" of REQUIEM
//!
//! Event search against the forensic query service, from the terminal.
//!
//! - `rq search <case> [query]`: one page of results.
//! - `rq aggregate <case> <field>`: top values of a field.
//! - `rq timeline <case> --interval 1h`: date histogram.
//! - `rq fields <case>`: the field directory of the first page.
//! - `rq stats <case>`: document count and size of the case's index.
//! - `rq explore <case>`: interactive session on the live explorer engine.

mod explore;
mod render;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rq_core::time::resolve_range;
use rq_core::{
    build_field_catalog, FilterOperator, Mutation, QueryState, SearchResult, SortOrder,
    TimelineBucket,
};
use rq_explorer::{ExplorerConfig, SearchBackend};

/// Query a case's events, build filters from what you see, and page through.
#[derive(Parser)]
#[command(name = "rq", version, about, long_about = None)]
struct Cli {
    /// Path to config file.
    #[arg(long, global = true, default_value = rq_explorer::config::DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Query service base URL (overrides config and RQ_BASE_URL).
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Bearer key (overrides config and RQ_API_KEY).
    #[arg(long, global = true)]
    api_key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch one page of matching events.
    Search {
        #[command(flatten)]
        query: QueryArgs,

        /// Page number, starting at 1.
        #[arg(long, default_value_t = 1)]
        page: usize,

        /// Results per page (25, 50 or 100).
        #[arg(long)]
        page_size: Option<usize>,

        /// Sort field.
        #[arg(long)]
        sort: Option<String>,

        /// Sort order (asc or desc).
        #[arg(long)]
        order: Option<SortOrder>,

        /// Columns to show, comma separated.
        #[arg(long, value_delimiter = ',')]
        columns: Vec<String>,

        /// Print the raw response as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Top values of one field over the matching events.
    Aggregate {
        #[command(flatten)]
        query: QueryArgs,

        /// Field to aggregate.
        #[arg(long)]
        field: String,

        /// Number of buckets (1-100).
        #[arg(long)]
        size: Option<usize>,
    },

    /// Date histogram of the matching events.
    Timeline {
        #[command(flatten)]
        query: QueryArgs,

        /// Bucket width, e.g. 15m, 1h, 1d.
        #[arg(long, default_value = "1h")]
        interval: String,
    },

    /// Fields discovered on the first page of results.
    Fields {
        #[command(flatten)]
        query: QueryArgs,

        /// Only fields whose path contains this term.
        #[arg(long)]
        search: Option<String>,
    },

    /// Document count and size of a case's index.
    Stats {
        /// Case identifier.
        case: String,
    },

    /// Interactive exploration session.
    Explore {
        /// Case identifier.
        case: String,
    },
}

#[derive(Args)]
struct QueryArgs {
    /// Case identifier.
    case: String,

    /// Query string; empty or `*` matches everything.
    #[arg(default_value = "")]
    query: String,

    /// Field filter `field:operator[:value]`, repeatable.
    #[arg(long = "filter", short = 'f')]
    filters: Vec<String>,

    /// Lower time bound, RFC 3339 or relative (15m, 24h, 7d).
    #[arg(long)]
    since: Option<String>,

    /// Upper time bound, RFC 3339 or relative.
    #[arg(long)]
    until: Option<String>,
}

/// Parse `field:operator[:value]`. The value may itself contain colons.
fn parse_filter(raw: &str) -> Result<(String, FilterOperator, String)> {
    let mut parts = raw.splitn(3, ':');
    let field = parts.next().unwrap_or_default().trim();
    let op = parts
        .next()
        .ok_or_else(|| anyhow!("filter '{}' is missing an operator", raw))?;
    let operator: FilterOperator = op.parse().map_err(|e: String| anyhow!(e))?;
    let value = parts.next().unwrap_or_default();
    if field.is_empty() {
        bail!("filter '{}' is missing a field", raw);
    }
    if operator.takes_value() && value.trim().is_empty() {
        bail!("filter '{}' needs a value for '{}'", raw, operator);
    }
    Ok((field.to_string(), operator, value.to_string()))
}

/// Starting state of a one-shot command: config defaults plus arguments.
fn build_state(config: &ExplorerConfig, args: &QueryArgs) -> Result<QueryState> {
    let mut state = config.initial_state().context("invalid [explorer] config")?;
    let range = resolve_range(args.since.as_deref(), args.until.as_deref(), chrono::Utc::now())
        .map_err(|e| anyhow!(e))?;

    let mut mutations = vec![
        Mutation::SetCase(Some(args.case.clone())),
        Mutation::SetQuery(args.query.clone()),
        Mutation::SetTimeRange(range),
    ];
    for raw in &args.filters {
        let (field, operator, value) = parse_filter(raw)?;
        mutations.push(Mutation::AddFilter {
            field,
            operator,
            value,
        });
    }
    for m in mutations {
        state = state.apply(m)?;
    }
    Ok(state)
}

fn load_config(cli: &Cli) -> Result<ExplorerConfig> {
    let mut config = ExplorerConfig::load_with_env(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    config.apply_overrides(cli.base_url.clone(), cli.api_key.clone());
    Ok(config)
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "rq_cli=info,rq_explorer=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    let http = config.backend().context("failed to build HTTP client")?;
    let backend: Arc<dyn SearchBackend> = Arc::new(http.clone());
    tracing::debug!(base_url = %config.service.base_url, "query service");

    match cli.command {
        Commands::Search {
            query,
            page,
            page_size,
            sort,
            order,
            columns,
            json,
        } => {
            let mut state = build_state(&config, &query)?;
            if let Some(size) = page_size {
                state = state.apply(Mutation::SetPageSize(size))?;
            }
            if sort.is_some() || order.is_some() {
                let field = sort.unwrap_or_else(|| state.sort_field.clone());
                let order = order.unwrap_or(state.sort_order);
                state = state.apply(Mutation::SetSort { field, order })?;
            }
            state = state.apply(Mutation::SetPage(page.saturating_sub(1)))?;

            let request = state
                .search_request()
                .ok_or_else(|| anyhow!("no case selected"))?;
            let from = request.from;
            let resp = backend.search(request).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&resp.hits)?);
                return Ok(());
            }

            let mut column_config = state.columns.clone();
            column_config.reconcile(build_field_catalog(&resp.hits).field_names());
            if !columns.is_empty() {
                column_config.set_visible(columns);
            }

            let results: Vec<SearchResult> = resp
                .hits
                .into_iter()
                .enumerate()
                .map(|(i, doc)| SearchResult::from_hit(doc, from + i))
                .collect();
            println!(
                "{}",
                render::results_table(&column_config.definitions(), &results)
            );
            println!(
                "{}{}",
                rq_core::state::page_info(state.page, state.page_size.get(), resp.total),
                resp.took.map(|t| format!("  ({} ms)", t)).unwrap_or_default()
            );
        }

        Commands::Aggregate { query, field, size } => {
            let mut state = build_state(&config, &query)?;
            state = state.apply(Mutation::SetAggregationField(Some(field.clone())))?;
            if let Some(size) = size {
                state = state.apply(Mutation::SetAggregationSize(size))?;
            }
            let request = state
                .aggregate_request()
                .ok_or_else(|| anyhow!("no case or field selected"))?;
            let resp = backend.aggregate(request).await?;
            println!("{}", render::buckets_table(&field, &resp.buckets));
        }

        Commands::Timeline { query, interval } => {
            let state = build_state(&config, &query)?
                .apply(Mutation::SetTimelineInterval(Some(interval)))?;
            let request = state
                .timeline_request()
                .ok_or_else(|| anyhow!("no case or interval selected"))?;
            let resp = backend.timeline(request).await?;
            let buckets: Vec<TimelineBucket> =
                resp.buckets.into_iter().map(TimelineBucket::from).collect();
            println!("{}", render::timeline_table(&buckets));
        }

        Commands::Fields { query, search } => {
            let state = build_state(&config, &query)?;
            let request = state
                .search_request()
                .ok_or_else(|| anyhow!("no case selected"))?;
            let resp = backend.search(request).await?;
            let catalog = build_field_catalog(&resp.hits);
            let samples = catalog.search(search.as_deref().unwrap_or(""));
            println!("{}", render::fields_table(&samples));
            println!("{} of {} fields", samples.len(), catalog.len());
        }

        Commands::Stats { case } => {
            let stats = http.stats(&case).await?;
            println!("{}", render::stats_table(&stats));
        }

        Commands::Explore { case } => {
            let mut state = config.initial_state().context("invalid [explorer] config")?;
            state = state.apply(Mutation::SetCase(Some(case)))?;
            explore::run(backend, state).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(filters: &[&str]) -> QueryArgs {
        QueryArgs {
            case: "CASE-1".into(),
            query: "svchost".into(),
            filters: filters.iter().map(|s| s.to_string()).collect(),
            since: None,
            until: None,
        }
    }

    #[test]
    fn test_parse_filter() {
        assert_eq!(
            parse_filter("event.type:equals:file").unwrap(),
            ("event.type".into(), FilterOperator::Equals, "file".into())
        );
        assert_eq!(
            parse_filter("@timestamp:prefix:2024-05-01T10:").unwrap().2,
            "2024-05-01T10:"
        );
        assert_eq!(
            parse_filter("user.name:exists").unwrap().1,
            FilterOperator::Exists
        );
        assert!(parse_filter("user.name").is_err());
        assert!(parse_filter("user.name:equals").is_err());
        assert!(parse_filter(":exists").is_err());
        assert!(parse_filter("a:like:b").is_err());
    }

    #[test]
    fn test_build_state_applies_arguments() {
        let state = build_state(
            &ExplorerConfig::default(),
            &args(&["event.type:equals:file", "user.name:missing"]),
        )
        .unwrap();
        let req = state.search_request().unwrap();
        assert_eq!(req.case_id, "CASE-1");
        assert_eq!(req.query, "svchost");
        assert_eq!(req.field_filters.len(), 2);
        assert_eq!(req.field_filters[1].value, None);
        assert_eq!(req.time_range, None);
    }

    #[test]
    fn test_build_state_rejects_bad_time() {
        let mut a = args(&[]);
        a.since = Some("last tuesday".into());
        assert!(build_state(&ExplorerConfig::default(), &a).is_err());
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from([
            "rq", "search", "CASE-1", "cmd.exe", "-f", "event.type:equals:file", "--since", "24h",
            "--page", "2", "--order", "asc",
        ])
        .unwrap();
        match cli.command {
            Commands::Search { query, page, order, .. } => {
                assert_eq!(query.filters.len(), 1);
                assert_eq!(page, 2);
                assert_eq!(order, Some(SortOrder::Asc));
            }
            _ => panic!("expected search"),
        }

        let cli = Cli::try_parse_from(["rq", "stats", "CASE-1"]).unwrap();
        assert!(matches!(&cli.command, Commands::Stats { case } if case == "CASE-1"));
    }
}
