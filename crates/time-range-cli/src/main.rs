use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use time_range_engine::{
    format_time_range, list_defaults, parse_time_range_with_options, ControllerConfig,
    FallbackConfig, FormatOptions, ParseOutcome, Phase, RangeController, RangeError, TimeRange,
    TokioScheduler, WeekStartDay,
};

const ENV_LOG: &str = "TRANGE_LOG";

#[derive(Parser)]
#[command(name = "trange")]
#[command(version, about = "Interpret human-typed time ranges", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse an expression with the deterministic grammar
    Parse {
        /// Expression such as "15m", "yesterday" or "last week"
        expr: String,

        /// Reference instant (RFC 3339), defaults to the system clock
        #[arg(long)]
        now: Option<DateTime<Utc>>,

        /// IANA zone or UTC offset for day boundaries and display
        #[arg(long, short = 'z', env = "TRANGE_TIMEZONE")]
        timezone: Option<String>,

        /// First day of the week for "this week" / "last week"
        #[arg(long, value_enum, default_value_t = WeekStart::Monday)]
        week_start: WeekStart,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },
    /// Render a range in canonical form
    Format {
        #[arg(long)]
        start: DateTime<Utc>,

        #[arg(long)]
        end: DateTime<Utc>,

        #[arg(long, short = 'z', env = "TRANGE_TIMEZONE")]
        timezone: Option<String>,
    },
    /// List the default presets
    Presets {
        #[arg(long)]
        json: bool,
    },
    /// Run an expression through a range controller (debounce, fallback, live mode)
    Resolve {
        expr: String,

        /// Controller config file (JSON)
        #[arg(long, short = 'c', env = "TRANGE_CONFIG")]
        config: Option<PathBuf>,

        /// Enable the natural-language fallback at this URL
        #[arg(long, env = "TRANGE_FALLBACK_URL")]
        fallback_url: Option<String>,

        #[arg(long, short = 'z', env = "TRANGE_TIMEZONE")]
        timezone: Option<String>,

        /// Override the input debounce
        #[arg(long)]
        debounce_ms: Option<u64>,

        /// Keep the window live and print this many ticks
        #[arg(long)]
        live: bool,

        #[arg(long, default_value_t = 3)]
        ticks: usize,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum WeekStart {
    Monday,
    Sunday,
}

impl From<WeekStart> for WeekStartDay {
    fn from(value: WeekStart) -> Self {
        match value {
            WeekStart::Monday => WeekStartDay::Monday,
            WeekStart::Sunday => WeekStartDay::Sunday,
        }
    }
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Parse {
            expr,
            now,
            timezone,
            week_start,
            json,
        } => {
            let config = ControllerConfig {
                timezone,
                week_start: week_start.into(),
                ..ControllerConfig::default()
            };
            config.validate()?;
            let now = now.unwrap_or_else(Utc::now);
            let outcome = parse_time_range_with_options(&expr, now, &config.parse_options());
            print_outcome(&expr, &outcome, &config.format_options(), json)
        }
        Commands::Format {
            start,
            end,
            timezone,
        } => {
            if let Some(tz) = &timezone {
                time_range_engine::format::parse_display_zone(tz)?;
            }
            let options = FormatOptions { timezone };
            println!("{}", format_time_range(&TimeRange::new(start, end), &options));
            Ok(())
        }
        Commands::Presets { json } => {
            let presets = list_defaults();
            if json {
                println!("{}", serde_json::to_string_pretty(&presets)?);
            } else {
                for preset in &presets {
                    println!(
                        "{:<6} {:<18} {}ms",
                        preset.value(),
                        preset.label(),
                        preset.duration_ms()
                    );
                }
            }
            Ok(())
        }
        Commands::Resolve {
            expr,
            config,
            fallback_url,
            timezone,
            debounce_ms,
            live,
            ticks,
        } => {
            let mut config = load_config(config.as_ref())?;
            if let Some(url) = fallback_url {
                let headers = config
                    .fallback
                    .take()
                    .map(|f| f.auth_headers)
                    .unwrap_or_default();
                let mut fallback = FallbackConfig::new(url);
                fallback.auth_headers = headers;
                config.fallback = Some(fallback);
                config.enable_fallback = true;
            }
            if timezone.is_some() {
                config.timezone = timezone;
            }
            if let Some(ms) = debounce_ms {
                config.debounce_ms = ms;
            }

            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .context("Failed to start tokio runtime")?;
            runtime.block_on(resolve(expr, config, live.then_some(ticks)))
        }
    }
}

fn init_logging() {
    let filter = std::env::var(ENV_LOG)
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "warn".to_string());

    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .with_env_filter(filter)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<ControllerConfig> {
    let Some(path) = path else {
        return Ok(ControllerConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config = ControllerConfig::from_json_str(&text)
        .with_context(|| format!("Invalid config file: {}", path.display()))?;
    tracing::debug!(path = %path.display(), "Loaded controller config");
    Ok(config)
}

fn print_outcome(
    expr: &str,
    outcome: &ParseOutcome,
    options: &FormatOptions,
    json: bool,
) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
    }
    match outcome {
        ParseOutcome::Resolved {
            range,
            interpretation,
            source,
        } => {
            if !json {
                let mut out = std::io::stdout().lock();
                writeln!(out, "interpretation: {interpretation}")?;
                writeln!(out, "range:          {}", format_time_range(range, options))?;
                writeln!(out, "start:          {}", range.start().to_rfc3339())?;
                writeln!(out, "end:            {}", range.end().to_rfc3339())?;
                writeln!(out, "source:         {source}")?;
            }
            Ok(())
        }
        ParseOutcome::Failed { reason } => {
            bail!(RangeError::UnparseableInput(format!("'{expr}' ({reason})")))
        }
        ParseOutcome::Ambiguous { candidates } => {
            bail!("'{expr}' is ambiguous ({} candidates)", candidates.len())
        }
    }
}

async fn resolve(expr: String, config: ControllerConfig, live_ticks: Option<usize>) -> Result<()> {
    if expr.trim().is_empty() {
        bail!(RangeError::UnparseableInput("empty expression".to_string()));
    }
    let format_options = config.format_options();
    let controller = RangeController::builder()
        .config(config)
        .scheduler(Arc::new(TokioScheduler::system()))
        .build()?;
    let mut states = controller.watch();
    let mut changes = controller.subscribe();

    controller.set_input_value(&expr);
    let state = states
        .wait_for(|s| matches!(s.phase, Phase::Resolved | Phase::Errored))
        .await
        .context("Controller stopped before resolving")?
        .clone();

    let outcome = state
        .outcome
        .clone()
        .context("Controller finished without an outcome")?;
    print_outcome(&expr, &outcome, &format_options, false)?;

    if let Some(ticks) = live_ticks {
        // Skip the change for the resolution itself.
        let _ = changes.try_recv();
        if !controller.set_live(true) {
            bail!("Nothing to keep live");
        }
        for _ in 0..ticks {
            let change = changes.recv().await.context("Live updates stopped")?;
            println!("live: {}", format_time_range(&change.range, &format_options));
        }
    }
    controller.close();
    Ok(())
}
