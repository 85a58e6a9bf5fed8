use clap::Parser;
use eshop_api::cli::Cli;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let cfg = match cli.load_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("eshop-api: {e}");
            return ExitCode::from(1);
        }
    };
    if let Err(e) = eshop_api::logger::configure_logging(
        cfg.log.dir.as_deref(),
        cfg.log.level.as_deref(),
        cfg.log.retention,
    ) {
        eprintln!("eshop-api: logging disabled: {e}");
    }

    match eshop_api::run(cfg).await {
        Ok(reason) => ExitCode::from(reason.exit_code()),
        Err(e) => {
            log::error!("Error starting server: {e}");
            ExitCode::from(1)
        }
    }
}
