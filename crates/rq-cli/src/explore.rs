//! Interactive session: one line per command, the view is redrawn whenever
//! the last outstanding fetch lands.

use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use tokio::io::{AsyncBufReadExt, BufReader};

use rq_core::time::resolve_range;
use rq_core::{FilterOperator, FilterPatch, QueryState, SortOrder};
use rq_explorer::{Explorer, SearchBackend};

use crate::render;

const HELP: &str = "\
  q <text>                 set query (empty matches all)
  case <id> | case -       switch case / close case
  f <field> <op> [value]   add filter (equals, not_equals, contains, prefix, wildcard, exists, missing)
  blank                    add an empty filter row
  set <id> field|op|value <x>   edit a filter row
  rm <id> | clear          remove one / all filters
  qf <field>               filter on the sampled value of a field
  qb <key>                 filter on an aggregation bucket
  range <since> [until]    time range, RFC 3339 or 15m/24h/7d; `range -` clears
  n | p | page <n>         next / previous / jump to page
  size <25|50|100>         page size
  sort <field> [asc|desc]  sort order
  agg <field> | agg -      aggregation field
  aggsize <n>              number of buckets
  tl <interval> | tl -     timeline interval (e.g. 1h)
  col <field>              show / hide a column
  mv <field> <target>      move a column to another column's slot
  cols-reset               default columns
  i <row> | fi <n> | close inspect a row / filter on its entry / close
  fields [term]            field directory
  filters | show           current filters / redraw
  refresh | dismiss        refetch everything / dismiss errors
  help | quit";

#[derive(Debug, Clone, PartialEq)]
enum ReplCommand {
    Query(String),
    Case(Option<String>),
    Filter {
        field: String,
        operator: FilterOperator,
        value: String,
    },
    Blank,
    Edit {
        id: String,
        patch: FilterPatch,
    },
    Remove(String),
    Clear,
    QuickField(String),
    QuickBucket(String),
    Range(Option<String>, Option<String>),
    Next,
    Prev,
    Page(usize),
    Size(usize),
    Sort(String, SortOrder),
    Aggregate(Option<String>),
    AggregateSize(usize),
    Timeline(Option<String>),
    Column(String),
    Move(String, String),
    ResetColumns,
    Inspect(usize),
    InspectFilter(usize),
    Close,
    Fields(Option<String>),
    Filters,
    Show,
    Refresh,
    Dismiss,
    Help,
    Quit,
}

/// `-` stands for "unset".
fn optional(arg: &str) -> Option<String> {
    match arg.trim() {
        "" | "-" => None,
        s => Some(s.to_string()),
    }
}

fn number(arg: Option<&str>, what: &str) -> Result<usize> {
    let raw = arg.ok_or_else(|| anyhow!("missing {}", what))?;
    raw.parse()
        .map_err(|_| anyhow!("'{}' is not a valid {}", raw, what))
}

fn required<'a>(arg: Option<&'a str>, what: &str) -> Result<&'a str> {
    arg.filter(|s| !s.is_empty())
        .ok_or_else(|| anyhow!("missing {}", what))
}

fn parse_command(line: &str) -> Result<ReplCommand> {
    let line = line.trim();
    let (cmd, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();
    let mut args = rest.split_whitespace();

    let command = match cmd {
        "q" | "query" => ReplCommand::Query(rest.to_string()),
        "case" => ReplCommand::Case(optional(rest)),
        "f" | "filter" => {
            let field = required(args.next(), "field")?.to_string();
            let operator: FilterOperator = required(args.next(), "operator")?
                .parse()
                .map_err(|e: String| anyhow!(e))?;
            let value = args.collect::<Vec<_>>().join(" ");
            ReplCommand::Filter {
                field,
                operator,
                value,
            }
        }
        "blank" => ReplCommand::Blank,
        "set" => {
            let id = required(args.next(), "filter id")?.to_string();
            let attr = required(args.next(), "attribute")?;
            let value = args.collect::<Vec<_>>().join(" ");
            let patch = match attr {
                "field" => FilterPatch {
                    field: Some(value),
                    ..FilterPatch::default()
                },
                "op" | "operator" => FilterPatch {
                    operator: Some(value.parse().map_err(|e: String| anyhow!(e))?),
                    ..FilterPatch::default()
                },
                "value" => FilterPatch {
                    value: Some(value),
                    ..FilterPatch::default()
                },
                other => bail!("unknown filter attribute '{}'", other),
            };
            ReplCommand::Edit { id, patch }
        }
        "rm" => ReplCommand::Remove(required(args.next(), "filter id")?.to_string()),
        "clear" => ReplCommand::Clear,
        "qf" => ReplCommand::QuickField(required(args.next(), "field")?.to_string()),
        "qb" => ReplCommand::QuickBucket(required(Some(rest), "bucket key")?.to_string()),
        "range" => {
            let since = args.next().and_then(optional);
            let until = args.next().and_then(optional);
            ReplCommand::Range(since, until)
        }
        "n" | "next" => ReplCommand::Next,
        "p" | "prev" => ReplCommand::Prev,
        "page" => ReplCommand::Page(number(args.next(), "page")?),
        "size" => ReplCommand::Size(number(args.next(), "page size")?),
        "sort" => {
            let field = required(args.next(), "sort field")?.to_string();
            let order = match args.next() {
                Some(o) => o.parse().map_err(|e: String| anyhow!(e))?,
                None => SortOrder::default(),
            };
            ReplCommand::Sort(field, order)
        }
        "agg" => ReplCommand::Aggregate(optional(rest)),
        "aggsize" => ReplCommand::AggregateSize(number(args.next(), "aggregation size")?),
        "tl" | "timeline" => ReplCommand::Timeline(optional(rest)),
        "col" => ReplCommand::Column(required(args.next(), "column")?.to_string()),
        "mv" => {
            let source = required(args.next(), "column")?.to_string();
            let target = required(args.next(), "target column")?.to_string();
            ReplCommand::Move(source, target)
        }
        "cols-reset" => ReplCommand::ResetColumns,
        "i" | "inspect" => ReplCommand::Inspect(number(args.next(), "row")?),
        "fi" => ReplCommand::InspectFilter(number(args.next(), "entry")?),
        "close" => ReplCommand::Close,
        "fields" => ReplCommand::Fields(optional(rest)),
        "filters" => ReplCommand::Filters,
        "show" | "" => ReplCommand::Show,
        "refresh" => ReplCommand::Refresh,
        "dismiss" => ReplCommand::Dismiss,
        "help" | "?" => ReplCommand::Help,
        "quit" | "exit" => ReplCommand::Quit,
        other => bail!("unknown command '{}', try `help`", other),
    };
    Ok(command)
}

fn execute(explorer: &mut Explorer, command: ReplCommand) -> Result<()> {
    match command {
        ReplCommand::Query(text) => explorer.set_query(text)?,
        ReplCommand::Case(case) => explorer.set_case(case)?,
        ReplCommand::Filter {
            field,
            operator,
            value,
        } => explorer.add_filter(field, operator, value)?,
        ReplCommand::Blank => {
            let id = explorer.add_blank_filter()?;
            println!("added {}", id);
        }
        ReplCommand::Edit { id, patch } => explorer.update_filter(&id, patch)?,
        ReplCommand::Remove(id) => explorer.remove_filter(&id)?,
        ReplCommand::Clear => explorer.clear_filters()?,
        ReplCommand::QuickField(field) => explorer.quick_filter_from_field(&field)?,
        ReplCommand::QuickBucket(key) => explorer.quick_filter_from_bucket(&key)?,
        ReplCommand::Range(since, until) => {
            let range = resolve_range(since.as_deref(), until.as_deref(), chrono::Utc::now())
                .map_err(|e| anyhow!(e))?;
            explorer.set_time_range(range)?;
        }
        ReplCommand::Next => {
            if !explorer.next_page()? {
                println!("already on the last page");
            }
        }
        ReplCommand::Prev => {
            if !explorer.prev_page()? {
                println!("already on the first page");
            }
        }
        ReplCommand::Page(n) => explorer.set_page(n.saturating_sub(1))?,
        ReplCommand::Size(size) => explorer.set_page_size(size)?,
        ReplCommand::Sort(field, order) => explorer.set_sort(field, order)?,
        ReplCommand::Aggregate(field) => explorer.set_aggregation_field(field)?,
        ReplCommand::AggregateSize(size) => explorer.set_aggregation_size(size)?,
        ReplCommand::Timeline(interval) => explorer.set_timeline_interval(interval)?,
        ReplCommand::Column(field) => explorer.toggle_column(&field)?,
        ReplCommand::Move(source, target) => explorer.reorder_column(&source, &target)?,
        ReplCommand::ResetColumns => explorer.reset_columns()?,
        ReplCommand::Inspect(row) => {
            let event = explorer.inspect(row)?;
            println!("{}", event.result.id);
            println!("{}", render::entries_table(&event.entries));
            return Ok(());
        }
        ReplCommand::InspectFilter(entry) => explorer.quick_filter_from_inspector(entry)?,
        ReplCommand::Close => explorer.close_inspector(),
        ReplCommand::Fields(term) => {
            let samples = explorer.catalog().search(term.as_deref().unwrap_or(""));
            println!("{}", render::fields_table(&samples));
            return Ok(());
        }
        ReplCommand::Filters => {
            println!("{}", render::filters_table(explorer.state().filters.rows()));
            return Ok(());
        }
        ReplCommand::Show => {}
        ReplCommand::Refresh => explorer.refresh(),
        ReplCommand::Dismiss => {
            explorer.dismiss_search_error();
            explorer.dismiss_aggregation_error();
            explorer.dismiss_timeline_error();
        }
        ReplCommand::Help => {
            println!("{}", HELP);
            return Ok(());
        }
        ReplCommand::Quit => return Ok(()),
    }

    if !explorer.is_loading() {
        draw(explorer);
    }
    Ok(())
}

fn draw(explorer: &Explorer) {
    let state: &QueryState = explorer.state();
    let Some(case) = state.case_id.as_deref() else {
        println!("no case selected");
        return;
    };

    println!(
        "{}",
        render::results_table(&state.columns.definitions(), explorer.results())
    );
    println!(
        "[{}] query: {}  page {}  {}",
        case,
        state.effective_query(),
        state.page + 1,
        explorer.page_info()
    );
    if !state.filters.is_empty() {
        println!("{}", render::filters_table(state.filters.rows()));
    }
    if let Some(field) = state.aggregation_field.as_deref() {
        if !explorer.buckets().is_empty() {
            println!("{}", render::buckets_table(field, explorer.buckets()));
        }
    }
    if !explorer.timeline_buckets().is_empty() {
        println!("{}", render::timeline_table(explorer.timeline_buckets()));
    }
    for (panel, error) in [
        ("search", explorer.search_error()),
        ("aggregation", explorer.aggregation_error()),
        ("timeline", explorer.timeline_error()),
    ] {
        if let Some(e) = error {
            println!("! {} error: {}  (`dismiss` to clear)", panel, e);
        }
    }
}

pub async fn run(backend: Arc<dyn SearchBackend>, state: QueryState) -> Result<()> {
    let mut explorer = Explorer::new(backend, state);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("type `help` for commands");

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match parse_command(&line) {
                    Ok(ReplCommand::Quit) => break,
                    Ok(command) => {
                        if let Err(e) = execute(&mut explorer, command) {
                            eprintln!("Error: {}", e);
                        }
                    }
                    Err(e) => eprintln!("Error: {}", e),
                }
            }
            Some(outcome) = explorer.next_outcome() => {
                if explorer.apply(outcome) && !explorer.is_loading() {
                    draw(&explorer);
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_filter_commands() {
        assert_eq!(
            parse_command("f message contains failed logon").unwrap(),
            ReplCommand::Filter {
                field: "message".into(),
                operator: FilterOperator::Contains,
                value: "failed logon".into(),
            }
        );
        assert_eq!(
            parse_command("set filter-2 op missing").unwrap(),
            ReplCommand::Edit {
                id: "filter-2".into(),
                patch: FilterPatch {
                    operator: Some(FilterOperator::Missing),
                    ..FilterPatch::default()
                },
            }
        );
        assert!(parse_command("f message like x").is_err());
        assert!(parse_command("set filter-2 colour red").is_err());
    }

    #[test]
    fn test_parse_unset_forms() {
        assert_eq!(parse_command("agg -").unwrap(), ReplCommand::Aggregate(None));
        assert_eq!(parse_command("case -").unwrap(), ReplCommand::Case(None));
        assert_eq!(
            parse_command("range 24h -").unwrap(),
            ReplCommand::Range(Some("24h".into()), None)
        );
        assert_eq!(parse_command("q").unwrap(), ReplCommand::Query(String::new()));
    }

    #[test]
    fn test_parse_navigation() {
        assert_eq!(parse_command("page 3").unwrap(), ReplCommand::Page(3));
        assert!(parse_command("page three").is_err());
        assert_eq!(
            parse_command("sort file.size asc").unwrap(),
            ReplCommand::Sort("file.size".into(), SortOrder::Asc)
        );
        assert_eq!(
            parse_command("mv parser timestamp").unwrap(),
            ReplCommand::Move("parser".into(), "timestamp".into())
        );
        assert_eq!(parse_command("").unwrap(), ReplCommand::Show);
        assert!(parse_command("frobnicate").is_err());
    }
}
