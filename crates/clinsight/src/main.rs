use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use clinsight_sessions::{
    clinic_bounds, parse_day, HttpSessionSource, SessionStore, DEFAULT_SESSIONS_URL,
};

mod config;

use config::ProjectConfig;

#[derive(Parser, Debug)]
#[command(
    name = "clinsight",
    about = "Analytics over clinic health sessions",
    version,
    author
)]
struct Cli {
    /// Dataset URL (overrides clinsight.toml and the built-in default)
    #[arg(long)]
    url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Session count and averages for a single day
    Overview {
        /// Day to summarize, as YYYY-MM-DD or YYYY/MM/DD
        #[arg(short, long)]
        date: String,
    },
    /// Start-hour, stop-hour, and duration distributions
    Timing,
    /// Unique clinics and their bounding box
    Clinics,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();

    let working_dir = std::env::current_dir().context("Failed to determine working directory")?;
    let config = ProjectConfig::load(&working_dir)?;

    let url = cli
        .url
        .or(config.and_then(|c| c.data_url))
        .unwrap_or_else(|| DEFAULT_SESSIONS_URL.to_string());

    tracing::debug!(%url, "resolved dataset url");
    let store = SessionStore::new(Arc::new(HttpSessionSource::new(url)));

    match cli.command {
        Command::Overview { date } => overview(&store, &date).await,
        Command::Timing => timing(&store).await,
        Command::Clinics => clinics(&store).await,
    }
}

async fn overview(store: &SessionStore, date: &str) -> Result<()> {
    let day = parse_day(date)?;

    println!("Sessions on {day}: {}", store.num_sessions_on(day).await?);
    print_average("Average duration", store.average_duration_on(day).await?, "min");
    print_average("Average distance", store.average_distance_on(day).await?, "m");
    print_average("Average age", store.average_age_on(day).await?, "years");

    Ok(())
}

fn print_average(label: &str, value: Option<i64>, unit: &str) {
    match value {
        Some(v) => println!("{label}: {v} {unit}"),
        None => println!("{label}: n/a"),
    }
}

async fn timing(store: &SessionStore) -> Result<()> {
    let starts = store.start_hour_counts().await?;
    let stops = store.stop_hour_counts().await?;

    println!("hour  started  stopped");
    for hour in 0..24 {
        println!("{hour:>4}  {:>7}  {:>7}", starts[hour], stops[hour]);
    }

    let durations = store.duration_counts().await?;
    println!();
    println!("duration (min)  sessions");
    for (minutes, count) in durations.iter().enumerate().filter(|(_, c)| **c > 0) {
        println!("{minutes:>14}  {count:>8}");
    }

    Ok(())
}

async fn clinics(store: &SessionStore) -> Result<()> {
    let clinics = store.clinics().await?;
    if clinics.is_empty() {
        println!("No clinics in dataset");
        return Ok(());
    }

    for clinic in clinics.iter() {
        println!(
            "{} ({}, {})",
            clinic.name, clinic.position.lat, clinic.position.lng
        );
    }

    let bounds = clinic_bounds(&clinics)?;
    println!(
        "bounds: ({}, {}) to ({}, {})",
        bounds.south_west.lat, bounds.south_west.lng, bounds.north_east.lat, bounds.north_east.lng
    );

    Ok(())
}
