//! Headless runner for flowjv form schemas.
//!
//! `flowjv check` loads and compiles a schema; `flowjv run` builds a live
//! form, replays writes and touches in order, and prints the settled state.

pub mod logging;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use flowjv_core::{FlowError, Form, FormConfig, Operators, Path, Schema};
use serde_json::{Map, Value, json};
use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, Parser)]
#[command(name = "flowjv")]
#[command(about = "Validate form data against a flowjv schema", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Load and compile a schema, reporting its size.
    Check {
        schema: PathBuf,
    },
    /// Build a form, apply writes, print `{data, errors, touched, valid}`.
    Run {
        schema: PathBuf,

        /// Initial data: inline JSON or a path to a JSON file.
        #[arg(long)]
        data: Option<String>,

        /// Write `PATH=JSON`, e.g. `personalDetails.name='"Kishore"'`. Repeatable.
        #[arg(long = "set", value_name = "PATH=JSON")]
        sets: Vec<String>,

        /// Mark a dotted path as touched. Repeatable.
        #[arg(long = "touch", value_name = "PATH")]
        touches: Vec<String>,

        /// Mark every field touched after the writes, like a submit.
        #[arg(long)]
        touch_all: bool,

        /// Engine defaults as JSON (`requiredMessage`, `validateOnLoad`, ...).
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

pub fn run_from_env() -> Result<()> {
    let output = execute(Cli::parse())?;
    println!("{output}");
    Ok(())
}

/// Parse `args` (program name first) and run the command, returning what
/// would be printed.
pub fn run_from_args<I, T>(args: I) -> Result<String>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::try_parse_from(args)?;
    execute(cli)
}

pub fn execute(cli: Cli) -> Result<String> {
    match cli.cmd {
        Commands::Check { schema } => check(&schema),
        Commands::Run {
            schema,
            data,
            sets,
            touches,
            touch_all,
            config,
        } => {
            let writes = sets.iter().map(|raw| parse_assignment(raw)).collect::<Result<Vec<_>>>()?;
            let config = load_config(config)?;
            let initial = load_data_payload(data)?;
            let schema = read_json(&schema)?;

            let mut form = Form::new(&schema, initial, config).map_err(coded)?;
            // paths are read against the schema so digit-only object keys stay keys
            let writes = writes
                .into_iter()
                .map(|(raw, value)| Ok((parse_path(form.schema(), raw)?, value)))
                .collect::<Result<Vec<_>>>()?;
            let touches = touches
                .iter()
                .map(|raw| parse_path(form.schema(), raw))
                .collect::<Result<Vec<_>>>()?;
            for (path, value) in writes {
                debug!(path = %path, "applying write");
                form.set(&path, value).map_err(coded)?;
            }
            for path in &touches {
                form.mark_touched(path, true).map_err(coded)?;
            }
            if touch_all {
                form.touch_all();
            }
            render_report(&form)
        }
    }
}

fn check(schema: &std::path::Path) -> Result<String> {
    let doc = read_json(schema)?;
    let loaded = Schema::from_json(&doc, &Operators::new()).map_err(|err| coded(err.into()))?;
    let refs: usize = loaded.nodes().flat_map(|(_, n)| &n.rules).map(|r| r.refs.len()).sum();
    Ok(format!(
        "ok: {} nodes, {} validations, {} cross-field references",
        loaded.len(),
        loaded.rule_count(),
        refs
    ))
}

fn coded(err: FlowError) -> anyhow::Error {
    anyhow!("[{}] {err}", err.code())
}

fn read_json(file: &std::path::Path) -> Result<Value> {
    let source = fs::read_to_string(file).with_context(|| format!("failed to read {}", file.display()))?;
    serde_json::from_str(&source).with_context(|| format!("failed to parse {}", file.display()))
}

fn load_config(file: Option<PathBuf>) -> Result<FormConfig> {
    let Some(file) = file else {
        return Ok(FormConfig::default());
    };
    let raw = read_json(&file)?;
    serde_json::from_value(raw).with_context(|| format!("invalid config in {}", file.display()))
}

fn load_data_payload(data: Option<String>) -> Result<Option<Value>> {
    let Some(input) = data else {
        return Ok(None);
    };
    let as_path = PathBuf::from(&input);
    if as_path.exists() {
        return read_json(&as_path).map(Some);
    }
    let parsed = serde_json::from_str(&input).context("invalid --data JSON")?;
    Ok(Some(parsed))
}

fn parse_path(schema: &Schema, raw: &str) -> Result<Path> {
    schema.parse_path(raw).map_err(|reason| {
        coded(FlowError::PathShapeMismatch {
            path: Path::parse_dotted(raw),
            reason,
        })
    })
}

fn parse_assignment(raw: &str) -> Result<(&str, Value)> {
    let Some((path, value)) = raw.split_once('=') else {
        bail!("--set expects PATH=JSON, got '{raw}'");
    };
    let value = serde_json::from_str(value)
        .with_context(|| format!("--set {path}: value is not JSON (quote strings: '\"text\"')"))?;
    Ok((path, value))
}

fn render_report(form: &Form) -> Result<String> {
    let mut errors = Map::new();
    for (path, msgs) in form.store().error_entries() {
        errors.insert(path.to_string(), json!(msgs));
    }
    let touched: Vec<String> = form.store().touched_paths().map(ToString::to_string).collect();
    let report = json!({
        "data": form.data(),
        "errors": errors,
        "touched": touched,
        "valid": form.is_valid(),
    });
    serde_json::to_string_pretty(&report).context("failed to render report")
}
