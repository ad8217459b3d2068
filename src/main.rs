mod cli;
mod logging;

use anyhow::Context;
use background_service::{
    collect_and_enrich, collect_once, enrich_once, BackgroundService, SharedClassifier,
};
use clap::Parser;
use cli::{Cli, Command};
use sentiment_engine::FinBert;
use std::process::ExitCode;
use std::sync::Arc;
use stocksent_core::{AppConfig, CoreError, ErrorReporter};
use tracing::info;

#[tokio::main]
async fn main() -> ExitCode {
    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("stocksent error: {error:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    logging::init(&config.paths.log_file)?;

    if let Err(error) = dispatch(cli.command, &config).await {
        ErrorReporter::new().report(&error);
        return Err(error.into());
    }
    Ok(())
}

async fn dispatch(command: Command, config: &AppConfig) -> Result<(), CoreError> {
    match command {
        Command::Enrich => {
            let summary = enrich_once(load_classifier(config)?, config.paths.clone()).await?;
            println!("{}", summary);
        }
        Command::Collect => {
            for collected in collect_once(config).await? {
                println!(
                    "{}: {} fetched, {} new, {} total -> {}",
                    collected.company,
                    collected.fetched,
                    collected.new_posts,
                    collected.total_posts,
                    collected.raw_path.display()
                );
            }
        }
        Command::Run => {
            let report = collect_and_enrich(config, load_classifier(config)?).await?;
            println!("{}", report);
        }
        Command::Schedule => {
            // Missing credentials must fail before the model loads.
            config.reddit.credentials()?;
            let classifier = load_classifier(config)?;
            let service = BackgroundService::new(config.reddit.interval_minutes);
            let completed = service
                .start(|| collect_and_enrich(config, classifier.clone()))
                .await?;
            println!("{} cycles completed", completed);
        }
        Command::Analyze {
            entity,
            prices,
            out,
        } => {
            let report = analysis::analyze_entity(
                &entity,
                &config.paths.results_dir,
                &prices,
                &config.analysis,
            )?;
            match report.correlation {
                Some(c) => println!(
                    "{}: {} days, correlation between lagged sentiment and return {:.4}",
                    entity,
                    report.rows.len(),
                    c
                ),
                None => println!(
                    "{}: {} days, not enough paired observations for a correlation",
                    entity,
                    report.rows.len()
                ),
            }
            if let Some(out) = out {
                report.write_csv(&out)?;
                println!("Wrote {}", out.display());
            }
        }
    }
    Ok(())
}

fn load_classifier(config: &AppConfig) -> Result<SharedClassifier, CoreError> {
    let model = &config.model;
    info!("Loading FinBERT from {}", model.model_dir.display());
    let finbert = FinBert::load(&model.model_dir, model.batch_size, model.max_tokens)?;
    Ok(Arc::new(finbert))
}
