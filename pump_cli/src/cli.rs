//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

pub fn json_mode() -> bool {
    JSON_MODE.get().copied().unwrap_or(false)
}

#[derive(Parser, Debug)]
#[command(name = "insulin-pump", version, about = "Insulin pump control core CLI")]
pub struct Cli {
    /// Path to config TOML (typed); factory defaults when omitted
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Extra profile seeds from a CSV (strict header)
    #[arg(long, value_name = "FILE")]
    pub profiles: Option<PathBuf>,

    /// Output JSON lines instead of text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "warn")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Calculate a bolus against a profile without delivering it
    Calc {
        /// Current glucose in mg/dL
        #[arg(long)]
        glucose: f32,
        /// Carbohydrate intake in grams
        #[arg(long, default_value_t = 0.0)]
        carbs: f32,
        /// Insulin on board in units
        #[arg(long, default_value_t = 0.0)]
        iob: f32,
        /// Correction factor override (ignored unless > 0)
        #[arg(long, value_name = "CF")]
        cf: Option<f32>,
        /// Profile to use instead of the active one
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
        /// Duration used for the extended split
        #[arg(long, value_name = "MIN", default_value_t = 60)]
        duration_minutes: i32,
    },
    /// Startup integrity check: config thresholds and every profile seed
    SelfCheck,
    /// Drive the pump with a line-oriented command script
    #[command(
        long_about = "Drive the pump with a line-oriented command script read from --script or stdin.\n\nCommands: profile create NAME BASAL CF ICR TARGET | profile switch NAME | profile delete NAME | start | stop | resume | glucose LEVEL | iob UNITS | bolus GLUCOSE CARBS | quick GLUCOSE MINUTES | extended GLUCOSE MINUTES | pause-bolus | resume-bolus | cancel-bolus | occlusion | tick [N] | shutdown | power-on | status | poll | sim battery LEVEL [charging] | sim glucose LEVEL | sim iob UNITS | sim reservoir UNITS | sim occlusion on|off\n\nBlank lines and lines starting with '#' are ignored. Ctrl-C triggers an emergency shutdown."
    )]
    Run {
        /// Script file; stdin when omitted
        #[arg(long, value_name = "FILE")]
        script: Option<PathBuf>,
        /// Stop at the first refused command and exit with its code
        #[arg(long, action = ArgAction::SetTrue)]
        strict: bool,
        /// Print the pump's timestamped event log at the end
        #[arg(long, action = ArgAction::SetTrue)]
        print_log: bool,
        /// Save the pump's event log to this file at the end
        #[arg(long, value_name = "FILE")]
        save_log: Option<PathBuf>,
    },
}
