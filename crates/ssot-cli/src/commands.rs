//! Subcommand handlers
//!
//! Each handler returns the process exit code. Violations (diagnostics) go
//! to stdout; operational failures bubble up as errors.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::ArgMatches;
use serde_json::Value;
use ssot_core::{
    ArtifactDrafts, CoreError, ImpactReport, IngestPipeline, ReplayDecomposer, SsotConfig,
    TaskGenPipeline, Workspace,
};
use ssot_model::DeltaStatus;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Exit code for invariant violations and gate failures
const EXIT_VIOLATIONS: i32 = 1;

pub(crate) fn run(matches: &ArgMatches) -> Result<i32> {
    let root = matches
        .get_one::<PathBuf>("root")
        .cloned()
        .unwrap_or_else(|| PathBuf::from("."));
    let config = match matches.get_one::<PathBuf>("config") {
        Some(path) => SsotConfig::load(path)?,
        None => SsotConfig::discover(&root)?,
    };
    debug!(root = %root.display(), "loaded configuration");

    match matches.subcommand() {
        Some(("validate", sub)) => validate(open(&root, config, sub)?, sub),
        Some(("impact", sub)) => impact(&open(&root, config, sub)?, sub),
        Some(("taskgen", sub)) => taskgen(&open(&root, config, sub)?, sub),
        Some(("ingest", sub)) => ingest(&open(&root, config, sub)?, sub),
        Some(("delta", sub)) => match sub.subcommand() {
            Some(("advance", advance)) => delta_advance(&Workspace::open(&root, config)?, advance),
            _ => bail!("unknown delta subcommand"),
        },
        _ => bail!("unknown subcommand"),
    }
}

fn open(root: &Path, config: SsotConfig, sub: &ArgMatches) -> Result<Workspace> {
    let workspace = Workspace::open(root, config)?;
    let baseline = sub
        .try_get_one::<PathBuf>("baseline")
        .ok()
        .flatten();
    match baseline {
        Some(dir) => Ok(workspace
            .with_baseline(dir)
            .with_context(|| format!("loading baseline {}", dir.display()))?),
        None => Ok(workspace),
    }
}

/// Print a violation error's diagnostics, or hand operational errors back
fn violations(err: CoreError) -> Result<i32> {
    if !err.is_violation() {
        return Err(err.into());
    }
    eprintln!("error: {err}");
    for diagnostic in err.diagnostics() {
        println!("{diagnostic}");
    }
    Ok(EXIT_VIOLATIONS)
}

fn date(sub: &ArgMatches) -> Result<Option<NaiveDate>> {
    sub.get_one::<String>("date")
        .map(|text| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .with_context(|| format!("invalid --date {text:?}, expected YYYY-MM-DD"))
        })
        .transpose()
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn validate(workspace: Workspace, sub: &ArgMatches) -> Result<i32> {
    let report = workspace.validate().report;
    if sub.get_flag("json") {
        println!("{}", report.render_json()?);
    } else {
        print!("{}", report.render_text());
    }
    Ok(report.exit_code())
}

fn impact(workspace: &Workspace, sub: &ArgMatches) -> Result<i32> {
    let delta = sub.get_one::<String>("delta").context("--delta is required")?;
    let report = match workspace.impact(delta) {
        Ok(report) => report,
        Err(e) => return violations(e),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(0)
}

/// A recording's final document: the last of `attempts`, or the whole file
fn last_attempt(text: &str) -> Result<Value> {
    let mut document: Value = serde_yaml::from_str(text)?;
    if let Some(Value::Array(attempts)) = document.get_mut("attempts") {
        return attempts.pop().context("recording has no attempts");
    }
    Ok(document)
}

fn taskgen(workspace: &Workspace, sub: &ArgMatches) -> Result<i32> {
    let delta = sub.get_one::<String>("delta").context("--delta is required")?;
    let mut pipeline = TaskGenPipeline::new(workspace);
    if let Some(date) = date(sub)? {
        pipeline = pipeline.with_date(date);
    }
    let drafts = sub.get_one::<PathBuf>("drafts");

    if sub.get_flag("plan") {
        let document = drafts.map(|path| last_attempt(&read(path)?)).transpose()?;
        let preview = match pipeline.preview(delta, document.as_ref()) {
            Ok(preview) => preview,
            Err(e) => return violations(e),
        };
        println!("{}", serde_json::to_string_pretty(&preview)?);
        return Ok(if preview.diagnostics.is_empty() { 0 } else { EXIT_VIOLATIONS });
    }

    let path = drafts.context("--drafts is required without --plan")?;
    let mut collaborator = ReplayDecomposer::<ImpactReport, Value>::from_yaml_str(&read(path)?)
        .with_context(|| format!("parsing recording {}", path.display()))?;
    let outcome = match pipeline.run(delta, &mut collaborator) {
        Ok(outcome) => outcome,
        Err(e) => return violations(e),
    };
    let out = sub.get_one::<PathBuf>("out").map(PathBuf::as_path);
    let written = pipeline.write(&outcome.plan, out)?;
    info!(attempts = outcome.attempts, "task generation finished");
    println!(
        "wrote {} task(s) to {}",
        outcome.plan.tasks.len(),
        written.display()
    );
    Ok(0)
}

fn ingest(workspace: &Workspace, sub: &ArgMatches) -> Result<i32> {
    let path = sub.get_one::<PathBuf>("drafts").context("--drafts is required")?;
    let mut collaborator = ReplayDecomposer::<String, ArtifactDrafts>::from_yaml_str(&read(path)?)
        .with_context(|| format!("parsing recording {}", path.display()))?;
    let mut pipeline = IngestPipeline::new(workspace);
    if let Some(date) = date(sub)? {
        pipeline = pipeline.with_date(date);
    }

    let input = path.display().to_string();
    let outcome = match pipeline.run(&mut collaborator, &input) {
        Ok(outcome) => outcome,
        Err(e) => return violations(e),
    };
    if sub.get_flag("dry-run") {
        println!("{} would write:", outcome.delta.id);
        for file in outcome.writes.paths() {
            println!("  {file}");
        }
        return Ok(0);
    }
    let written = pipeline.commit(&outcome)?;
    println!("{} ({}): wrote {} file(s)", outcome.delta.id, outcome.delta.status, written.len());
    for file in &written {
        println!("  {}", file.display());
    }
    Ok(0)
}

fn delta_advance(workspace: &Workspace, sub: &ArgMatches) -> Result<i32> {
    let id = sub.get_one::<String>("id").context("delta id is required")?;
    let to = match sub.get_one::<String>("to").map(String::as_str) {
        Some("draft") => DeltaStatus::Draft,
        Some("proposed") => DeltaStatus::Proposed,
        Some("applied") => DeltaStatus::Applied,
        other => bail!("invalid --to {other:?}"),
    };
    let (delta, path) = match workspace.advance_delta(id, to) {
        Ok(advanced) => advanced,
        Err(e) => return violations(e),
    };
    println!("{} is now {} ({})", delta.id, delta.status, path.display());
    Ok(0)
}
