#[macro_use]
extern crate log;

use flagpole::configuration::command_line::{LogLevel, Opt};
use flagpole::configuration::manifest::Manifest;
use flagpole::error::ReportError;
use flagpole::{App, Format, SuiteReport};
use log::LevelFilter;
use signal_hook::{consts::SIGINT, iterator::Signals};
use std::fs::File;
use std::path::PathBuf;
use std::{process::exit, thread};
use structopt::StructOpt;

const EXIT_FAILURE: i32 = 1;
const EXIT_CONFIGURATION: i32 = 2;

fn main() {
    let options = Opt::from_args();

    init_logging(
        options.logging.unwrap_or(LogLevel::Info).into(),
        &options.log_output_file,
    );

    match Signals::new(&[SIGINT]) {
        Ok(mut signals) => {
            thread::spawn(move || {
                for sig in signals.forever() {
                    info!("Received signal {:?}, stopping", sig);
                    exit(EXIT_FAILURE);
                }
            });
        }
        Err(e) => warn!("Cannot listen for signals: {}", e),
    }

    let mut manifest = match Manifest::from(options.file.clone()) {
        Ok(manifest) => manifest,
        Err(e) => {
            error!("Failed to load manifest file configuration {}", e);
            exit(EXIT_CONFIGURATION);
        }
    };
    manifest.retain_only(&options.only);
    if let Some(limit) = options.concurrency {
        manifest.settings = manifest.settings.with_concurrency_limit(limit);
    }
    debug!("Initiated configuration {:#?}", manifest);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Cannot start runtime: {}", e);
            exit(EXIT_CONFIGURATION);
        }
    };
    let report = runtime.block_on(async {
        match App::new(manifest) {
            Ok(app) => Ok(app.run().await),
            Err(e) => Err(e),
        }
    });
    let report = match report {
        Ok(report) => report,
        Err(e) => {
            error!("Invalid manifest: {}", e);
            exit(EXIT_CONFIGURATION);
        }
    };

    if let Err(e) = write_report(&report, options.format.into(), &options.report) {
        error!("{}", e);
    }
    if !report.passed {
        exit(EXIT_FAILURE);
    }
}

fn write_report(
    report: &SuiteReport,
    format: Format,
    output: &Option<PathBuf>,
) -> Result<(), ReportError> {
    match output {
        Some(path) => {
            let mut file = File::create(path)?;
            format.render(report, &mut file)?;
            info!("Report written to {}", path.display());
        }
        None => format.render(report, &mut std::io::stdout())?,
    }
    Ok(())
}

fn init_logging(level: LevelFilter, output: &Option<PathBuf>) {
    let mut dispatcher = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}[{}:{}][{}] {}",
                chrono::Local::now().format("[%Y-%m-%d][%H:%M:%S]"),
                record.target(),
                record
                    .line()
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "".to_owned()),
                record.level(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stdout());

    if let Some(log_file) = output {
        match fern::log_file(log_file) {
            Ok(file) => dispatcher = dispatcher.chain(file),
            Err(e) => eprintln!("Cannot open log file {}: {}", log_file.display(), e),
        }
    }
    if let Err(e) = dispatcher.apply() {
        eprintln!("Logger already initialised: {}", e);
    }
    info!("Logging level {} enabled", level);
}
