mod cli;
mod dose;
mod error_fmt;
mod script;

use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use eyre::WrapErr;
use pump_core::MemoryLog;
use pump_core::mocks::SimTelemetry;

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE, json_mode};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    let _ = color_eyre::install();

    if let Err(e) = real_main(cli) {
        tracing::debug!(error = %e, "command failed");
        if json_mode() {
            eprintln!("{}", format_error_json(&e));
        } else {
            eprintln!("{}", humanize(&e));
        }
        std::process::exit(exit_code_for_error(&e));
    }
}

fn real_main(cli: Cli) -> eyre::Result<()> {
    let cfg = dose::load_config(cli.config.as_deref())?;
    init_tracing(&cli.log_level, cli.json, &cfg.logging)?;
    let seeds = dose::collect_seeds(&cfg, cli.profiles.as_deref())?;
    tracing::debug!(seeds = seeds.len(), "configuration loaded");

    match cli.cmd {
        Commands::Calc {
            glucose,
            carbs,
            iob,
            cf,
            profile,
            duration_minutes,
        } => dose::run_calc(
            &seeds,
            &dose::CalcArgs {
                glucose,
                carbs,
                iob,
                cf,
                profile,
                duration_minutes,
            },
            cli.json,
        ),
        Commands::SelfCheck => dose::run_self_check(&cfg, &seeds, cli.json),
        Commands::Run {
            script,
            strict,
            print_log,
            save_log,
        } => {
            let cmds = match &script {
                Some(path) => {
                    let f = std::fs::File::open(path)
                        .wrap_err_with(|| format!("open script {}", path.display()))?;
                    script::parse_script(BufReader::new(f))?
                }
                None => script::parse_script(std::io::stdin().lock())?,
            };

            let log = Arc::new(MemoryLog::new());
            let sim = Arc::new(SimTelemetry::default());
            let pump = Arc::new(dose::build_controller(
                &cfg,
                &seeds,
                log.clone(),
                sim.clone(),
            )?);
            let events = pump.subscribe();

            let interrupted = Arc::new(AtomicBool::new(false));
            {
                let pump = pump.clone();
                let interrupted = interrupted.clone();
                ctrlc::set_handler(move || {
                    interrupted.store(true, Ordering::SeqCst);
                    pump.emergency_shutdown();
                })
                .wrap_err("install Ctrl-C handler")?;
            }

            let refused = script::run_script(
                &pump,
                &sim,
                &events,
                &cmds,
                &interrupted,
                &script::RunOptions {
                    strict,
                    json: cli.json,
                },
            );

            if print_log && !cli.json {
                print!("{}", log.full_log());
            }
            if let Some(path) = &save_log {
                log.save_to_file(path)
                    .wrap_err_with(|| format!("save pump log {}", path.display()))?;
            }
            let refused = refused?;
            if !cli.json {
                println!(
                    "{} command(s) run, {refused} refused; final state: {}",
                    cmds.len(),
                    pump.delivery_state()
                );
            }
            Ok(())
        }
    }
}

fn init_tracing(level: &str, json: bool, logging: &pump_config::Logging) -> eyre::Result<()> {
    use tracing_appender::rolling::{RollingFileAppender, Rotation};
    use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, prelude::*};

    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let console: Box<dyn Layer<Registry> + Send + Sync> = if json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(console_filter)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(console_filter)
            .boxed()
    };

    let file_layer: Option<Box<dyn Layer<Registry> + Send + Sync>> = match &logging.file {
        Some(file) => {
            let path = Path::new(file);
            let dir = path
                .parent()
                .filter(|d| !d.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| eyre::eyre!("logging.file must name a file, got {file:?}"))?;
            let rotation = match logging.rotation.as_deref() {
                Some("daily") => Rotation::DAILY,
                Some("hourly") => Rotation::HOURLY,
                _ => Rotation::NEVER,
            };
            let (writer, guard) =
                tracing_appender::non_blocking(RollingFileAppender::new(rotation, dir, name));
            let _ = FILE_GUARD.set(guard);
            let file_filter = EnvFilter::new(logging.level.as_deref().unwrap_or("info"));
            Some(
                fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(writer)
                    .with_filter(file_filter)
                    .boxed(),
            )
        }
        None => None,
    };

    let layers = match file_layer {
        Some(f) => vec![console, f],
        None => vec![console],
    };
    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .map_err(|e| eyre::eyre!("init tracing: {e}"))
}
