mod aggregator;
mod cli;
mod config;
mod error;
mod export;
mod graph;
mod orchestrator;
mod poller;
mod policy;
mod report;
mod session;
mod state_machine;
mod submitter;
mod ui;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use cli::{Cli, Command};
use config::HarvestConfig;
use export::OutputFormat;
use orchestrator::Orchestrator;
use ui::HarvestProgress;

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = HarvestConfig::load_from(&cli.config)?;
    if cli.max_rounds.is_some() {
        config.polling.max_rounds = cli.max_rounds;
    }
    if cli.timeout_secs.is_some() {
        config.polling.timeout_secs = cli.timeout_secs;
    }

    match cli.command {
        Command::Extract { output, format } => {
            config.validate()?;
            let output = output.unwrap_or_else(|| config.output.clone());
            let format = format.unwrap_or_else(|| OutputFormat::from_path(&output));
            let session = config.session()?;
            let orchestrator = Orchestrator::new(session, config.report.clone(), config.polling.clone());

            let progress = HarvestProgress::start(config.accounts.len());
            let observe = poller::observer(|event| progress.observe(event));
            let report = orchestrator
                .extract(&config.accounts, Some(&observe))
                .await;
            progress.complete(&report);
            if cli.verbose {
                progress.print_audits(&report);
            }

            if export::write(report.outcome, &output, format)? {
                println!("Report saved to {}", output.display());
            }
            info!("pipeline finished");
        }
        Command::Accounts => {
            if config.accounts.is_empty() {
                println!("No accounts configured in {}", cli.config.display());
            }
            for (name, account_ref) in &config.accounts {
                println!("{name}\t{account_ref}");
            }
        }
        Command::Fields => {
            let params = &config.report.params;
            println!("fields:          {}", config.report.fields.join(", "));
            println!("level:           {}", params.level);
            println!("date range:      {:?}", params.date_range);
            println!("time increment:  {}", params.time_increment);
            println!("limit:           {}", params.limit);
        }
    }

    Ok(())
}
