use anyhow::Result;
use clap::Parser;
use malsim_lib::model::reporter::{ConsoleReporter, MonthlyTsvReporter};
use malsim_lib::{Config, Simulation};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Custom config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Directory for flat-file reports
    #[arg(short, long, default_value = "output")]
    output: String,

    /// Override the configured random seed
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut config = Config::load(&args.config)?;
    if let Some(seed) = args.seed {
        config.seed = seed;
    }

    let mut simulation = Simulation::new(config)?;
    simulation.add_reporter(Box::new(ConsoleReporter));
    simulation.add_reporter(Box::new(MonthlyTsvReporter::new(&args.output)));
    simulation.run()?;

    Ok(())
}
