//! Transport Compatibility Tester - Main CLI Application
//!
//! Probes a test server over WebSocket and SSE under each network
//! environment, prints a recommendation and writes the results as JSON.

use clap::Parser;
use std::process;
use transport_compat_tester::{
    cli::Cli,
    config::{display_config_summary, load_config, EnvManager},
    error::{AppError, ErrorReporter, Result, FAILURE_EXIT_CODE},
    executor::{NetworkProbeRunner, TestRunner},
    logging::LoggerFactory,
    output::{OutputCoordinator, OutputFormatterFactory, ResultExporter},
    stats::RecommendationEngine,
    BUILD_TIME, GIT_COMMIT, PKG_NAME, VERSION,
};

#[tokio::main]
async fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panic: {}", panic_info);
        process::exit(FAILURE_EXIT_CODE);
    }));

    let cli = Cli::parse();
    let reporter = ErrorReporter::new(cli.use_colors(), cli.verbose || cli.debug);

    if let Err(e) = run_application(cli).await {
        reporter.report_error(&e);
        print_error_suggestions(&e);
        process::exit(FAILURE_EXIT_CODE);
    }
}

/// Main application logic
async fn run_application(cli: Cli) -> Result<()> {
    cli.validate().map_err(AppError::config)?;

    let config = load_config(cli)?;

    if config.debug {
        println!("{} v{} (built {}, commit {})", PKG_NAME, VERSION, BUILD_TIME, GIT_COMMIT);
        println!("{}", display_config_summary(&config));
        if let Some(warnings) = EnvManager::check_env_file()? {
            for warning in warnings {
                eprintln!("Warning: {}", warning);
            }
        }
        println!();
    }

    let matrix = config.environment_matrix()?;
    let loggers = LoggerFactory::new(config.clone());
    let logger = loggers.create_logger("RUNNER").await;
    let probe_logger = loggers.create_probe_logger().await;

    let coordinator = OutputCoordinator::new(OutputFormatterFactory::create_formatter(config.enable_color, config.verbose));
    println!(
        "{}\n",
        coordinator
            .formatter()
            .format_header(&format!("WebSocket / SSE compatibility test - {}", config.base_url()))?
    );

    let runner = TestRunner::new(NetworkProbeRunner::new(probe_logger), matrix, logger)
        .with_formatter(OutputFormatterFactory::create_formatter(config.enable_color, config.verbose));
    let results = runner.run_all(config.base_url()).await?;

    let report = RecommendationEngine::new().report(&results)?;
    println!("{}\n", coordinator.display_report(&report)?);

    let exporter = ResultExporter::new(config.output_path());
    exporter.write(&results, &config.server_url).await?;
    println!(
        "{}",
        coordinator
            .formatter()
            .format_success(&format!("Results saved to {}", exporter.path().display()))?
    );

    Ok(())
}

/// Print helpful suggestions for common errors
fn print_error_suggestions(error: &AppError) {
    match error {
        AppError::Config(_) => {
            eprintln!();
            eprintln!("Configuration help:");
            eprintln!("  - The server URL must start with http:// or https://");
            eprintln!("  - Proxy addresses take the form host:port");
            eprintln!("  - Known environments: direct, http-proxy, https-proxy, slow-network");
        }
        AppError::Io(_) => {
            eprintln!();
            eprintln!("Output help:");
            eprintln!("  - Check that the directory of --output exists and is writable");
        }
        _ => {}
    }
}
