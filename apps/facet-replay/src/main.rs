mod script;

use script::ReplayScript;
use script::Route;
use script::Step;
use serde::Serialize;
use sf_core::SyncError;
use sf_core::SyncResult;
use sf_dom::NodeId;
use sf_facets::EngineBuilder;
use sf_facets::EngineConfig;
use sf_facets::FacetEngine;
use sf_facets::HistoryEntry;
use sf_facets::RenderOutcome;
use sf_facets::SectionOutcome;
use sf_facets::SessionHistory;
use sf_net::FragmentResponse;
use sf_net::PageLocation;
use sf_net::ScriptedTransport;
use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "FACET_REPLAY_LOG";
const SUBMIT_DEBOUNCE_ENV: &str = "FACET_REPLAY_SUBMIT_DEBOUNCE_MS";
const CHIP_DEBOUNCE_ENV: &str = "FACET_REPLAY_CHIP_DEBOUNCE_MS";
const USAGE: &str = "usage: facet-replay --page FILE --url PAGE_URL \
[--route URL=FILE]... [--status URL=CODE]... [--default FILE] \
[--check ID | --uncheck ID | --set ID=VALUE | --chip ID | --color-group FAMILY | --wait MS | --back | --forward]...";

type ReplayEngine = FacetEngine<ScriptedTransport, SessionHistory>;

#[derive(Debug, Serialize)]
struct ReplayReport {
    page: String,
    renders: Vec<RenderReport>,
    history: Vec<HistoryEntry>,
    navigations: Vec<String>,
    cached_fragments: usize,
    product_count: Option<String>,
}

#[derive(Debug, Serialize)]
struct RenderReport {
    step: String,
    query: String,
    history_pushed: bool,
    sections: Vec<SectionReport>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
enum SectionReport {
    Rendered {
        section_id: String,
        url: String,
        source: &'static str,
    },
    FellBack {
        section_id: String,
        url: String,
        navigated_to: String,
        error: String,
    },
}

impl RenderReport {
    fn new(step: String, outcome: RenderOutcome) -> Self {
        let sections = outcome
            .sections
            .into_iter()
            .map(|section| match section {
                SectionOutcome::Rendered {
                    section_id,
                    url,
                    source,
                } => SectionReport::Rendered {
                    section_id,
                    url,
                    source: source.as_str(),
                },
                SectionOutcome::FellBack {
                    section_id,
                    url,
                    navigated_to,
                    error,
                } => SectionReport::FellBack {
                    section_id,
                    url,
                    navigated_to,
                    error: error.to_string(),
                },
            })
            .collect();
        Self {
            step,
            query: outcome.query.to_string(),
            history_pushed: outcome.history_pushed,
            sections,
        }
    }
}

fn main() -> ExitCode {
    init_logging();

    let script = match script::parse(std::env::args().skip(1)) {
        Ok(script) => script,
        Err(error) => {
            eprintln!("facet-replay: {error}\n{USAGE}");
            return ExitCode::from(2);
        }
    };

    let report = match replay(&script) {
        Ok(report) => report,
        Err(error) => {
            tracing::error!(%error, "replay aborted");
            eprintln!("facet-replay: {error}");
            return ExitCode::FAILURE;
        }
    };

    match serde_json::to_string_pretty(&report) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(error) => {
            eprintln!("facet-replay: failed to encode report: {error}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    if let Err(error) = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
    {
        eprintln!("facet-replay: logging disabled: {error}");
    }
}

fn replay(script: &ReplayScript) -> SyncResult<ReplayReport> {
    let page = PageLocation::parse(&script.page_url)?;
    let document = sf_html::parse_document(&read_file(&script.page_file)?);
    let history = SessionHistory::new(page.path_with_query(&page.query()));
    let mut engine = EngineBuilder::new(page.href(), document)
        .config(config_from_env()?)
        .build(build_transport(script)?, history)?;

    let mut clock = Duration::ZERO;
    let mut renders = Vec::new();
    for step in &script.steps {
        tracing::debug!(step = %step, at = ?clock, "replaying step");
        match step {
            Step::Toggle { id, checked } => {
                let control = element(&engine, id)?;
                if *checked {
                    engine.document_mut().set_attr(control, "checked", "");
                } else {
                    engine.document_mut().remove_attr(control, "checked");
                }
                engine.on_form_event(control, clock);
            }
            Step::SetValue { id, value } => {
                let control = element(&engine, id)?;
                engine.document_mut().set_attr(control, "value", value);
                engine.on_form_event(control, clock);
            }
            Step::Chip(id) => {
                let link = element(&engine, id)?;
                engine.on_active_filter_click(link, clock)?;
            }
            Step::ColorGroup(family) => {
                let selector = format!(".color-group__btn[data-color-group=\"{family}\"]");
                let root = engine.document().root();
                let button = engine.document().select_first(root, &selector)?.ok_or_else(|| {
                    SyncError::new("replay.target_missing", format!("no color group button for `{family}`"))
                })?;
                engine.on_color_group_click(button, clock)?;
            }
            Step::Wait(ms) => {
                clock = clock.saturating_add(Duration::from_millis(*ms));
                for outcome in engine.tick(clock)? {
                    renders.push(RenderReport::new(step.to_string(), outcome));
                }
            }
            Step::Back | Step::Forward => {
                let moved = if matches!(step, Step::Back) {
                    engine.host_mut().back()
                } else {
                    engine.host_mut().forward()
                };
                let Some(state) = moved else {
                    tracing::warn!(step = %step, "no history entry to move to");
                    continue;
                };
                if let Some(outcome) = engine.on_popstate(state.as_ref())? {
                    renders.push(RenderReport::new(step.to_string(), outcome));
                }
            }
        }
    }

    while let Some(deadline) = engine.next_deadline() {
        clock = clock.max(deadline);
        for outcome in engine.tick(clock)? {
            renders.push(RenderReport::new("flush".to_owned(), outcome));
        }
    }

    Ok(report(&engine, renders))
}

fn config_from_env() -> SyncResult<EngineConfig> {
    let mut config = EngineConfig::default();
    if let Some(wait) = duration_from_env(SUBMIT_DEBOUNCE_ENV)? {
        config.submit_debounce = wait;
    }
    if let Some(wait) = duration_from_env(CHIP_DEBOUNCE_ENV)? {
        config.active_filter_debounce = wait;
    }
    Ok(config)
}

fn duration_from_env(name: &str) -> SyncResult<Option<Duration>> {
    let Ok(raw) = std::env::var(name) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<u64>()
        .map(|ms| Some(Duration::from_millis(ms)))
        .map_err(|_| SyncError::new("config.env_invalid", format!("{name}=`{raw}` is not a millisecond count")))
}

fn build_transport(script: &ReplayScript) -> SyncResult<ScriptedTransport> {
    let mut transport = ScriptedTransport::new();
    for (url, route) in &script.routes {
        let response = match route {
            Route::File(path) => FragmentResponse::html(&read_file(path)?),
            Route::Status(code) => FragmentResponse::with_status(*code, "")?,
        };
        transport.respond(url, response);
    }
    if let Some(path) = &script.default_fragment {
        transport.respond_to_any(FragmentResponse::html(&read_file(path)?));
    }
    Ok(transport)
}

fn element(engine: &ReplayEngine, id: &str) -> SyncResult<NodeId> {
    engine
        .document()
        .get_element_by_id(id)
        .ok_or_else(|| SyncError::new("replay.target_missing", format!("no element with id `{id}`")))
}

fn read_file(path: &Path) -> SyncResult<String> {
    std::fs::read_to_string(path).map_err(|error| {
        SyncError::new(
            "replay.io",
            format!("failed to read {}: {error}", path.display()),
        )
    })
}

fn report(engine: &ReplayEngine, renders: Vec<RenderReport>) -> ReplayReport {
    let document = engine.document();
    ReplayReport {
        page: engine.page().href().to_owned(),
        renders,
        history: engine.host().entries().to_vec(),
        navigations: engine.host().navigations().to_vec(),
        cached_fragments: engine.cache().len(),
        product_count: document
            .get_element_by_id("ProductCount")
            .map(|count| document.text_content(count).trim().to_owned()),
    }
}
