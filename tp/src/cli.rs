//! CLI command definitions and subcommands

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use tracing::debug;

use crate::state::{RecommendationRequest, TripRequest};

/// TripPlanner - LLM-driven travel itinerary planner
#[derive(Parser)]
#[command(
    name = "tp",
    about = "Plan trips with bounded reasoning loops and validated itineraries",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the planning pipeline for a trip
    Plan {
        #[command(flatten)]
        trip: TripArgs,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Plan conversationally with the reasoning loop
    Chat {
        /// Session identifier; turns of one session share memory
        #[arg(short, long, default_value = "default")]
        session: String,

        #[command(flatten)]
        trip: TripArgs,

        /// Message to the planner
        #[arg(required = true, num_args = 1..)]
        message: Vec<String>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Recommend destinations
    Recommend {
        /// Destination preference (city, country, region or vague wish)
        #[arg(short, long)]
        preference: Option<String>,

        /// Interest, repeatable
        #[arg(short, long = "interest")]
        interests: Vec<String>,

        /// Travel mood
        #[arg(short, long)]
        mood: Option<String>,

        /// 1 = budget, 2 = moderate, 3 = luxury
        #[arg(short, long, default_value = "2")]
        budget_level: u8,

        /// Trip length in days
        #[arg(short, long, default_value = "5")]
        days: u32,

        /// Destination to leave out, repeatable
        #[arg(short, long)]
        exclude: Vec<String>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Validate a saved plan offline
    Validate {
        /// Plan JSON file
        file: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
}

/// Trip parameters shared by `plan` and `chat`
#[derive(Debug, Clone, Args)]
pub struct TripArgs {
    /// Destination city or area
    #[arg(long)]
    pub destination: String,

    /// Trip length in days
    #[arg(long)]
    pub days: u32,

    /// Total budget
    #[arg(long)]
    pub budget: f64,

    /// Destination country
    #[arg(long)]
    pub country: Option<String>,

    /// Number of travellers
    #[arg(long, default_value = "1")]
    pub party_size: u32,

    /// First day of the trip (YYYY-MM-DD)
    #[arg(long)]
    pub start_date: Option<NaiveDate>,

    /// Free-text preferences
    #[arg(long)]
    pub preferences: Option<String>,
}

impl From<TripArgs> for TripRequest {
    fn from(args: TripArgs) -> Self {
        debug!(destination = %args.destination, "TripRequest::from(TripArgs): called");
        Self {
            destination: args.destination,
            country: args.country,
            days: args.days,
            budget: args.budget,
            party_size: args.party_size,
            start_date: args.start_date,
            preferences: args.preferences,
        }
    }
}

/// Recommendation request from `recommend` arguments
pub fn recommendation_request(
    preference: Option<String>,
    interests: Vec<String>,
    mood: Option<String>,
    budget_level: u8,
    days: u32,
    exclude: Vec<String>,
) -> RecommendationRequest {
    RecommendationRequest {
        destination_preference: preference,
        interests,
        mood,
        budget_level,
        days,
        exclude_names: exclude,
    }
}

/// Output format for command results
#[derive(Clone, Debug, Default, PartialEq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "OutputFormat::from_str: called");
        match s.to_lowercase().as_str() {
            "text" | "plain" => {
                debug!("OutputFormat::from_str: matched Text");
                Ok(Self::Text)
            }
            "json" => {
                debug!("OutputFormat::from_str: matched Json");
                Ok(Self::Json)
            }
            _ => {
                debug!(%s, "OutputFormat::from_str: unknown format");
                Err(format!("Unknown format: {}. Use text or json", s))
            }
        }
    }
}

/// Where the log file is written
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tripplanner")
        .join("logs")
        .join("tripplanner.log")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert_eq!("plain".parse::<OutputFormat>(), Ok(OutputFormat::Text));
        assert!("table".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_plan_arguments() {
        let cli = Cli::try_parse_from([
            "tp",
            "plan",
            "--destination",
            "Porto",
            "--days",
            "3",
            "--budget",
            "750",
            "--start-date",
            "2026-06-01",
            "--format",
            "json",
        ])
        .unwrap();
        let Command::Plan { trip, format } = cli.command else {
            panic!("expected plan command");
        };
        assert_eq!(format, OutputFormat::Json);
        let request = TripRequest::from(trip);
        assert_eq!(request.destination, "Porto");
        assert_eq!(request.party_size, 1);
        assert_eq!(request.start_date, NaiveDate::from_ymd_opt(2026, 6, 1));
    }

    #[test]
    fn test_chat_collects_message_words() {
        let cli = Cli::try_parse_from([
            "tp", "chat", "--session", "s1", "--destination", "Rome", "--days", "2", "--budget", "400", "more", "food",
            "please",
        ])
        .unwrap();
        let Command::Chat { session, message, .. } = cli.command else {
            panic!("expected chat command");
        };
        assert_eq!(session, "s1");
        assert_eq!(message.join(" "), "more food please");
    }

    #[test]
    fn test_recommend_repeatable_flags() {
        let cli = Cli::try_parse_from([
            "tp",
            "recommend",
            "--interest",
            "food",
            "--interest",
            "hiking",
            "--exclude",
            "Paris",
        ])
        .unwrap();
        let Command::Recommend {
            interests,
            exclude,
            budget_level,
            days,
            ..
        } = cli.command
        else {
            panic!("expected recommend command");
        };
        assert_eq!(interests, vec!["food", "hiking"]);
        assert_eq!(exclude, vec!["Paris"]);
        assert_eq!((budget_level, days), (2, 5));
    }
}
