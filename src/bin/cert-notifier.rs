use std::process::ExitCode;

use tracing::error;

use cert_notifier::{app, telemetry};
use certnotify_domain::NotifierConfig;

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();

    let loaded = NotifierConfig::from_env();
    let (level, format) = telemetry::settings_for(&loaded);
    if let Err(err) = telemetry::init(level, format) {
        eprintln!("failed to initialise logging: {err:#}");
        return ExitCode::FAILURE;
    }

    let config = match loaded {
        Ok(config) => config,
        Err(err) => {
            error!("failed to load configuration: {err}");
            return ExitCode::FAILURE;
        }
    };

    match app::run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
