use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use uuid::Uuid;

mod config;
mod coverage;
mod dashboard;
mod db;
mod error;
mod insights;
mod models;
mod risk;
mod scope;
mod score;
mod seed;
mod store;
mod trend;

use config::Config;
use dashboard::Dashboard;
use db::PgStore;
use models::{Caller, Filters};
use scope::UserPredicate;
use store::Store;

#[derive(Parser)]
#[command(name = "outcome-dashboard")]
#[command(
    about = "Learning outcome attainment dashboards for programs, lecturers and students",
    long_about = None
)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true, env = "OUTCOMES_CONFIG")]
    config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load a small demo institution
    Seed,
    /// Headline statistics, charts, alerts and insights
    Stats(ScopeArgs),
    /// Teaching load and grading progress per lecturer
    Lecturers(ScopeArgs),
    /// Students whose average outcome score is in the danger band
    AtRisk(ScopeArgs),
}

#[derive(Args)]
struct ScopeArgs {
    /// Id of the user the dashboard is built for
    #[arg(long = "as", value_name = "USER_ID")]
    caller: Uuid,
    #[arg(long)]
    semester: Option<i32>,
    #[arg(long)]
    cohort_year: Option<i32>,
    #[arg(long = "class")]
    class_id: Option<Uuid>,
    #[arg(long = "course")]
    course_id: Option<Uuid>,
    #[arg(long = "program")]
    program_id: Option<Uuid>,
    #[arg(long = "faculty")]
    faculty_id: Option<Uuid>,
    /// Write the JSON response here instead of stdout
    #[arg(long)]
    out: Option<PathBuf>,
}

impl ScopeArgs {
    fn filters(&self) -> Filters {
        Filters {
            semester: self.semester,
            cohort_year: self.cohort_year,
            class_id: self.class_id,
            course_id: self.course_id,
            program_id: self.program_id,
            faculty_id: self.faculty_id,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    let config = Config::load(cli.config.as_deref())?;
    let database_url = config.database_url()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;
    let store = PgStore::new(pool);
    let dashboard = Dashboard::new(&store, &config.analytics);

    match cli.command {
        Commands::InitDb => {
            store.init_db().await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            store.seed().await?;
            println!("Seed data inserted.");
        }
        Commands::Stats(args) => {
            let caller = load_caller(&store, args.caller).await?;
            let stats = dashboard.stats(&caller, &args.filters()).await?;
            emit(&stats, args.out.as_ref())?;
        }
        Commands::Lecturers(args) => {
            let caller = load_caller(&store, args.caller).await?;
            let rows = dashboard.lecturer_analysis(&caller, &args.filters()).await?;
            emit(&rows, args.out.as_ref())?;
        }
        Commands::AtRisk(args) => {
            let caller = load_caller(&store, args.caller).await?;
            let students = dashboard.at_risk_students(&caller, &args.filters()).await?;
            emit(&students, args.out.as_ref())?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) -> anyhow::Result<()> {
    let default_level = if verbose { Level::DEBUG } else { Level::WARN };
    let filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")
}

async fn load_caller(store: &PgStore, id: Uuid) -> anyhow::Result<Caller> {
    let users = store
        .find_users(&UserPredicate::by_ids(&[id]))
        .await
        .context("failed to look up the requesting user")?;
    match users.first() {
        Some(user) => Ok(Caller::from_user(user)),
        None => bail!("no user with id {id}"),
    }
}

fn emit<T: Serialize>(value: &T, out: Option<&PathBuf>) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match out {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Dashboard written to {}.", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}
