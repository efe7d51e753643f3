use anyhow::{bail, Context as _, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::config::{Config, LoggingConfig};
use crate::interpreter::context::Context;
use crate::interpreter::expression::{evaluate, find_spans, Resolver};
use crate::interpreter::validator::check_plan;
use crate::interpreter::{Interpreter, Plan};
use crate::registry::StepRegistry;

#[derive(Parser)]
#[command(name = "stepwise")]
#[command(about = "Run declarative step plans against a capability registry", long_about = None)]
pub struct Cli {
    /// Path to config file (overrides ./stepwise.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Application id selecting the domain module (overrides config and env vars)
    #[arg(long, global = true)]
    pub app: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Execute a plan and print the resulting context
    Run {
        /// Plan YAML file
        plan: PathBuf,

        /// Seed a context variable (value parsed as JSON, plain text otherwise)
        #[arg(long = "set", value_name = "NAME=VALUE")]
        set: Vec<String>,

        #[arg(long, value_enum, default_value_t = Format::Json)]
        format: Format,
    },

    /// Check a plan without executing it
    Check {
        /// Plan YAML file
        plan: PathBuf,
    },

    /// Print the capability manifest of the session
    Capabilities {
        #[arg(long, value_enum, default_value_t = Format::Json)]
        format: Format,
    },

    /// Evaluate an expression or placeholder template
    Eval {
        expression: String,

        #[arg(long = "set", value_name = "NAME=VALUE")]
        set: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Json,
    Yaml,
}

/// Exit status when the plan document cannot be loaded
pub const EXIT_BAD_PLAN: i32 = 2;
/// Exit status when `check` reports errors
pub const EXIT_CHECK_FAILED: i32 = 1;

/// Parse process arguments, load configuration, install logging, and run.
/// Returns the process exit status.
pub fn run_cli() -> Result<i32> {
    let cli = Cli::parse();

    dotenvy::dotenv().ok();
    let config = Config::load(cli.config.as_deref())?;
    init_logging(&config.logging);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    execute(cli, &config, &mut out)
}

/// Log to stderr so stdout stays machine-readable
pub fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.with_target)
        .with_writer(std::io::stderr)
        .init();
}

/// Run one command, writing results to `out`
pub fn execute(cli: Cli, config: &Config, out: &mut dyn Write) -> Result<i32> {
    let app_id = cli.app.as_deref().unwrap_or(&config.app_id);

    match cli.command {
        Commands::Run { plan, set, format } => {
            let plan = match Plan::from_file(&plan) {
                Ok(plan) => plan,
                Err(err) => {
                    eprintln!("Error: {}", err);
                    return Ok(EXIT_BAD_PLAN);
                }
            };

            let mut interpreter = Interpreter::for_app(app_id)
                .with_limits(config.limits)
                .with_context(parse_bindings(&set)?);
            let report = interpreter.execute_plan(&plan);

            for event in report.failures() {
                eprintln!("Step {} ({}): {:?}", event.path, event.name, event.outcome);
            }
            write_formatted(out, &interpreter.context().to_json(), format)?;
            writeln!(out, "{}", report.summary())?;
            Ok(0)
        }

        Commands::Check { plan } => {
            let plan = match Plan::from_file(&plan) {
                Ok(plan) => plan,
                Err(err) => {
                    eprintln!("Error: {}", err);
                    return Ok(EXIT_BAD_PLAN);
                }
            };

            let registry = StepRegistry::build_session(app_id);
            let diagnostics = check_plan(&plan, &registry);
            for diagnostic in &diagnostics {
                writeln!(out, "{}", diagnostic)?;
            }

            if diagnostics.iter().any(|d| d.is_error()) {
                Ok(EXIT_CHECK_FAILED)
            } else {
                writeln!(out, "Plan OK ({} steps)", plan.step_count())?;
                Ok(0)
            }
        }

        Commands::Capabilities { format } => {
            let manifest = StepRegistry::build_session(app_id).manifest(app_id);
            write_formatted(out, &manifest, format)?;
            Ok(0)
        }

        Commands::Eval { expression, set } => {
            let context = parse_bindings(&set)?;
            let value = eval_input(&expression, &context, config)?;
            writeln!(out, "{}", serde_json::to_string(&value)?)?;
            Ok(0)
        }
    }
}

/// `NAME=VALUE` pairs; values that are not valid JSON bind as strings
fn parse_bindings(pairs: &[String]) -> Result<Context> {
    let mut context = Context::new();
    for pair in pairs {
        let Some((name, raw)) = pair.split_once('=') else {
            bail!("invalid binding '{}': expected NAME=VALUE", pair);
        };
        let name = name.trim();
        if name.is_empty() {
            bail!("invalid binding '{}': empty name", pair);
        }
        let value = serde_json::from_str(raw).unwrap_or_else(|_| JsonValue::String(raw.to_string()));
        context.set(name, value);
    }
    Ok(context)
}

/// Bare expressions and single placeholders are evaluated strictly; text
/// with embedded placeholders is interpolated like a step argument
fn eval_input(input: &str, context: &Context, config: &Config) -> Result<JsonValue> {
    let trimmed = input.trim();
    let scan = find_spans(trimmed);
    let whole_span = matches!(scan.spans.as_slice(), [only] if only.start == 0 && only.end == trimmed.len());

    if scan.spans.is_empty() || whole_span {
        let value = evaluate(trimmed, context.view(), &config.limits)
            .with_context(|| format!("Failed to evaluate '{}'", trimmed))?;
        return Ok(value.into_json());
    }

    let mut resolver = Resolver::new(context.view(), &config.limits);
    let text = resolver.interpolate(input);
    for issue in resolver.issues() {
        eprintln!("Warning: {{{}}}: {}", issue.expression, issue.error);
    }
    Ok(JsonValue::String(text))
}

fn write_formatted<T: Serialize>(out: &mut dyn Write, value: &T, format: Format) -> Result<()> {
    match format {
        Format::Json => writeln!(out, "{}", serde_json::to_string_pretty(value)?)?,
        Format::Yaml => write!(out, "{}", serde_yaml::to_string(value)?)?,
    }
    Ok(())
}
