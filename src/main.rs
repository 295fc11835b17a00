use clap::Parser;
use data_seeder::utils::error::{ErrorPayload, ErrorSeverity, Result, SeederError};
use data_seeder::utils::logger;
use data_seeder::{CliConfig, Command, LocalStorage};
use serde_json::{json, Value};

#[tokio::main]
async fn main() {
    let cli = CliConfig::parse();

    if cli.json_logs {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting data-seeder");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    match run(&cli).await {
        Ok(payload) => {
            println!("{}", render(&payload));
        }
        Err(e) => {
            tracing::error!(
                "Operation failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("Recovery suggestion: {}", e.recovery_suggestion());

            println!("{}", render(&json!(ErrorPayload::from(&e))));

            // Exit code follows the severity of the failure
            let exit_code = match e.severity() {
                ErrorSeverity::Low => 0,
                ErrorSeverity::Medium => 2,
                ErrorSeverity::High => 1,
                ErrorSeverity::Critical => 3,
            };

            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }
}

async fn run(cli: &CliConfig) -> Result<Value> {
    let settings = cli.load_settings()?;
    let orchestrator = settings.orchestrator()?.with_monitoring(cli.monitor);
    if cli.monitor {
        tracing::info!("System monitoring enabled");
    }

    let cancel = orchestrator.cancellation_token();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight requests");
            interrupt.cancel();
        }
    });

    let mut payload = match &cli.command {
        Command::Customers { count } => {
            let run = orchestrator.generate_customers(*count).await?;
            json!({ "summary": run.summary, "failures": run.failures })
        }
        Command::Accounts { min, max } => {
            let run = orchestrator
                .generate_accounts_for_existing_customers(*min, *max)
                .await?;
            json!({ "summary": run.summary, "failures": run.failures })
        }
        Command::FullDataset {
            customers,
            min,
            max,
        } => {
            let run = orchestrator
                .generate_full_dataset(*customers, *min, *max)
                .await?;
            json!({ "summary": run.summary, "failures": run.failures })
        }
        Command::Export { .. } => {
            let exporter = orchestrator.exporter();
            let bundle = exporter.export_all().await?;
            let storage = LocalStorage::new(&settings.export.output_path);
            let files = exporter
                .write_bundle(&storage, &bundle, settings.export.zip)
                .await?;
            tracing::info!("Output saved to: {}", settings.export.output_path);
            json!({ "outputPath": settings.export.output_path, "files": files })
        }
        Command::Stats => serde_json::to_value(orchestrator.exporter().statistics().await?)?,
        Command::Cleanup => serde_json::to_value(orchestrator.clear_all_data().await?)?,
    };

    if cancel.is_cancelled() {
        tracing::warn!("{}", SeederError::Cancelled);
        payload["cancelled"] = Value::Bool(true);
    }
    Ok(payload)
}

fn render(payload: &Value) -> String {
    serde_json::to_string_pretty(payload).unwrap_or_else(|_| payload.to_string())
}
