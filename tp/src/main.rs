//! TripPlanner - CLI entry point

use std::fs;
use std::path::Path;

use clap::Parser;
use eyre::{Context, Result, eyre};
use tracing::{debug, info};

use tripplanner::capabilities::{PricedItem, validate_budget};
use tripplanner::cli::{Cli, Command, OutputFormat, TripArgs, get_log_path, recommendation_request};
use tripplanner::config::Config;
use tripplanner::planner::TripPlanner;
use tripplanner::report::{render_agent_run, render_plan, render_recommendations, render_validation};
use tripplanner::state::{PlanState, TripRequest};
use tripplanner::validation::PlanValidator;

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_path = get_log_path();
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    // Priority: CLI --log-level > config file > INFO
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!("TripPlanner loaded config: model={}", config.llm.model);

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Plan { trip, format } => {
            debug!("main: matched Plan command");
            cmd_plan(&config, trip, format).await
        }
        Command::Chat {
            session,
            trip,
            message,
            format,
        } => {
            debug!(%session, "main: matched Chat command");
            cmd_chat(&config, &session, trip, &message.join(" "), format).await
        }
        Command::Recommend {
            preference,
            interests,
            mood,
            budget_level,
            days,
            exclude,
            format,
        } => {
            debug!(?preference, "main: matched Recommend command");
            let request = recommendation_request(preference, interests, mood, budget_level, days, exclude);
            let planner = planner(&config)?;
            let state = planner.recommend(request).await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&state)?),
                OutputFormat::Text => print!("{}", render_recommendations(&state)),
            }
            Ok(())
        }
        Command::Validate { file, format } => {
            debug!(?file, "main: matched Validate command");
            cmd_validate(&file, format)
        }
    }
}

fn planner(config: &Config) -> Result<TripPlanner> {
    config.validate()?;
    TripPlanner::from_config(config).context("Failed to build planner")
}

/// Run the planning pipeline
async fn cmd_plan(config: &Config, trip: TripArgs, format: OutputFormat) -> Result<()> {
    debug!(destination = %trip.destination, "cmd_plan: called");
    let planner = planner(config)?;
    let state = planner.plan(TripRequest::from(trip)).await?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&state)?),
        OutputFormat::Text => print!("{}", render_plan(&state)),
    }
    Ok(())
}

/// One conversational turn
async fn cmd_chat(config: &Config, session: &str, trip: TripArgs, message: &str, format: OutputFormat) -> Result<()> {
    debug!(%session, "cmd_chat: called");
    let planner = planner(config)?;
    let run = planner.converse(session, message, TripRequest::from(trip)).await?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&run.state)?),
        OutputFormat::Text => print!("{}", render_agent_run(&run)),
    }
    Ok(())
}

/// Run the deterministic checkers over a saved plan
///
/// Fails when the plan is rejected so scripts can gate on the exit code.
fn cmd_validate(path: &Path, format: OutputFormat) -> Result<()> {
    debug!(?path, "cmd_validate: called");
    let content = fs::read_to_string(path).context(format!("Failed to read {}", path.display()))?;
    let mut state: PlanState =
        serde_json::from_str(&content).context(format!("Failed to parse plan {}", path.display()))?;

    if state.budget_check.is_none() && state.budget > 0.0 {
        debug!("cmd_validate: computing budget check branch");
        let items = PricedItem::from_itinerary(&state.itinerary);
        state.budget_check = Some(validate_budget(&items, state.budget));
    }

    let result = PlanValidator::check(&state);
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Text => print!("{}", render_validation(&result)),
    }

    if result.approved {
        Ok(())
    } else {
        Err(eyre!("Plan rejected with {} critical issues", result.critical_count))
    }
}
