use crate::commands::{
    run_bulk_score, run_rules_init, run_rules_list, run_rules_set, run_score_applicant,
    ApplicantArgs, BulkArgs, RulesInitArgs, RulesSetArgs,
};
use crate::server;
use clap::{Args, Parser, Subcommand};
use govguard::config::AppConfig;
use govguard::error::AppError;
use govguard::rules::JsonFileRuleStore;
use govguard::telemetry;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "GovGuard",
    about = "Score benefit program applicants against editable fraud rules",
    version
)]
struct Cli {
    /// Rule definitions file (overrides GOVGUARD_RULES_PATH)
    #[arg(long, global = true)]
    rules: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Inspect or edit the stored rule set
    Rules {
        #[command(subcommand)]
        command: RulesCommand,
    },
    /// Score a single applicant or a CSV upload
    Score {
        #[command(subcommand)]
        command: ScoreCommand,
    },
}

#[derive(Subcommand, Debug)]
enum RulesCommand {
    /// Print the rule set in stored order
    List,
    /// Write the default rule set
    Init(RulesInitArgs),
    /// Enable, disable or reweight one rule
    Set(RulesSetArgs),
}

#[derive(Subcommand, Debug)]
enum ScoreCommand {
    /// Score one applicant from a JSON file (defaults to the simulated applicant)
    Applicant(ApplicantArgs),
    /// Score every row of a CSV upload
    Bulk(BulkArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let mut config = AppConfig::load()?;
    if let Some(path) = cli.rules {
        config.rules.path = path;
    }

    telemetry::init(&config.telemetry)?;

    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));
    let store = JsonFileRuleStore::new(config.rules.path.clone());

    match command {
        Command::Serve(args) => server::run(args, config).await,
        Command::Rules { command } => match command {
            RulesCommand::List => run_rules_list(&store),
            RulesCommand::Init(args) => run_rules_init(&store, args),
            RulesCommand::Set(args) => run_rules_set(&store, args),
        },
        Command::Score { command } => match command {
            ScoreCommand::Applicant(args) => run_score_applicant(&store, args),
            ScoreCommand::Bulk(args) => run_bulk_score(&store, args),
        },
    }
}
