use crate::configuration::constants::cargo_env::CARGO_PKG_NAME;
use crate::reporter::Format;
use clap::arg_enum;
use log::LevelFilter;
use std::path::PathBuf;
use structopt::StructOpt;

arg_enum! {
    #[derive(Debug)]
    pub enum LogLevel {
        Off, Error, Warn, Info, Debug, Trace,
    }
}

arg_enum! {
    #[derive(Debug, Clone, Copy)]
    pub enum ReportFormat {
        Console, Json, Csv,
    }
}

#[derive(StructOpt, Debug)]
#[structopt(name = CARGO_PKG_NAME)]
pub struct Opt {
    /// Suite manifest file. Supported: YAML, JSON, TOML, JSON5, RON, INI
    #[structopt(parse(from_os_str))]
    pub file: PathBuf,

    /// Sets a logging level
    #[structopt(case_insensitive = true, long, short = "L", possible_values = &LogLevel::variants(), env = "LOG_LEVEL")]
    pub logging: Option<LogLevel>,

    /// File to which application will write logs
    #[structopt(long, short = "O", env = "LOG_OUTPUT_FILE")]
    pub log_output_file: Option<PathBuf>,

    /// Maximum amount of scenarios executing at the same time
    #[structopt(long, short = "c")]
    pub concurrency: Option<usize>,

    /// Run only scenarios with these titles, any other will be ignored
    #[structopt(long, short = "o")]
    pub only: Vec<String>,

    /// Report format
    #[structopt(case_insensitive = true, long, short = "f", possible_values = &ReportFormat::variants(), default_value = "console")]
    pub format: ReportFormat,

    /// Write the report to this file instead of stdout
    #[structopt(long, short = "r", parse(from_os_str))]
    pub report: Option<PathBuf>,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

impl From<ReportFormat> for Format {
    fn from(format: ReportFormat) -> Self {
        match format {
            ReportFormat::Console => Format::Console,
            ReportFormat::Json => Format::Json,
            ReportFormat::Csv => Format::Csv,
        }
    }
}
