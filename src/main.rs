use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};

use icct_registry::{Config, NewTeam, RegistrationStatus, TEAM_SERIES, TeamModel, TeamRegistry};

#[derive(Parser)]
#[command(name = "icct-registry", version, about = "ICCT team registry admin CLI")]
struct Cli {
    #[command(flatten)]
    source: ConfigSource,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Args)]
struct ConfigSource {
    /// YAML config file. Defaults to icct.yml / config.yml / /etc/icct/config.yml.
    #[arg(long, value_name = "PATH", global = true, conflicts_with = "db_url")]
    config: Option<PathBuf>,

    /// Database URL (e.g. sqlite:///tmp/icct.db?mode=rwc or postgres://...).
    #[arg(long, value_name = "URL", global = true)]
    db_url: Option<String>,
}

#[derive(Args)]
struct SeriesArg {
    /// Counter series to operate on.
    #[arg(long, default_value = TEAM_SERIES)]
    series: String,
}

#[derive(Subcommand)]
enum Command {
    /// Create tables and counters, then resynchronize.
    Init,
    /// Allocate the next value of a series.
    Allocate(SeriesArg),
    /// Print the last issued value of a series.
    Current(SeriesArg),
    /// Overwrite the counter of a series.
    Reset {
        value: i64,
        #[command(flatten)]
        series: SeriesArg,
    },
    /// Raise a counter to the largest identifier already persisted.
    Resync(SeriesArg),
    /// Register a team under the next identifier.
    Register(TeamArgs),
    /// Insert a team under an explicit identifier, bypassing the counter.
    Import {
        code: String,
        #[command(flatten)]
        team: TeamArgs,
    },
    /// List registered teams ordered by identifier.
    List {
        /// Only show teams in this state (pending, approved, rejected).
        #[arg(long)]
        status: Option<RegistrationStatus>,
    },
    /// Approve or reject a registration.
    Review {
        code: String,
        decision: RegistrationStatus,
    },
}

#[derive(Args)]
struct TeamArgs {
    #[arg(long)]
    name: String,

    #[arg(long)]
    email: String,
}

impl From<TeamArgs> for NewTeam {
    fn from(args: TeamArgs) -> Self {
        NewTeam::new(args.name, args.email)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "icct_registry=info".to_string()),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.source)?;
    let registry = TeamRegistry::open(&config)
        .await
        .context("failed to open registry")?;
    let allocator = registry.allocator();

    match cli.cmd {
        Command::Init => {
            for series in &config.series {
                let value = allocator.current_value(&series.id).await?;
                println!("{}\t{}", series.id, value);
            }
        }
        Command::Allocate(args) => {
            let value = allocator.allocate_next(&args.series).await?;
            match config.series(&args.series) {
                Some(series) => println!("{}", series.format().format(value)),
                None => println!("{value}"),
            }
        }
        Command::Current(args) => {
            println!("{}", allocator.current_value(&args.series).await?);
        }
        Command::Reset { value, series } => {
            allocator.reset(&series.series, value).await?;
            println!("{}\t{}", series.series, value);
        }
        Command::Resync(args) => {
            println!("{}", allocator.resynchronize(&args.series).await?);
        }
        Command::Register(team) => {
            let model = registry.register(team.into()).await?;
            print_team(&model);
        }
        Command::Import { code, team } => {
            let model = registry.import(&code, team.into()).await?;
            print_team(&model);
        }
        Command::List { status } => {
            for model in registry.list(status).await? {
                print_team(&model);
            }
        }
        Command::Review { code, decision } => {
            let model = registry.review(&code, decision).await?;
            print_team(&model);
        }
    }

    Ok(())
}

fn load_config(source: &ConfigSource) -> anyhow::Result<Config> {
    if let Some(url) = &source.db_url {
        return Ok(Config::from_url(url)?);
    }
    if let Some(path) = &source.config {
        return Config::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()));
    }
    Ok(Config::from_default_path()?)
}

fn print_team(team: &TeamModel) {
    println!(
        "{}\t{}\t{}\t{}",
        team.team_code, team.name, team.captain_email, team.status
    );
}
