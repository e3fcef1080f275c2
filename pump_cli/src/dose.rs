//! Config mapping, controller assembly, and the one-shot `calc` and `self-check` commands.

use std::path::Path;
use std::sync::Arc;

use eyre::WrapErr;
use pump_config::{Config, ProfileSeed};
use pump_core::{
    DeliveryController, DoseBreakdown, DoseInputs, ExtendedSplit, ProfileStore, calculate_dose,
};
use pump_traits::{LogSink, TelemetrySource};

/// Read and validate the TOML config; factory defaults when no path is given.
pub fn load_config(path: Option<&Path>) -> eyre::Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("read config {}", path.display()))?;
    let cfg = pump_config::load_toml(&text)
        .wrap_err_with(|| format!("parse config {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// `[[profiles]]` from the config followed by rows of the optional CSV.
pub fn collect_seeds(cfg: &Config, csv: Option<&Path>) -> eyre::Result<Vec<ProfileSeed>> {
    let mut seeds = cfg.profiles.clone();
    if let Some(path) = csv {
        seeds.extend(pump_config::load_profiles_csv(path)?);
    }
    Ok(seeds)
}

pub fn build_controller(
    cfg: &Config,
    seeds: &[ProfileSeed],
    log: Arc<dyn LogSink + Send + Sync>,
    telemetry: Arc<dyn TelemetrySource + Send + Sync>,
) -> eyre::Result<DeliveryController> {
    let mut store = ProfileStore::new();
    store.load_seeds(seeds)?;
    let pump = DeliveryController::builder()
        .with_safety((&cfg.safety).into())
        .with_alerts((&cfg.alerts).into())
        .with_iob((&cfg.iob).into())
        .with_store(store)
        .with_log_sink(log)
        .with_telemetry(telemetry)
        .build()?;
    tracing::info!(
        profiles = seeds.len(),
        active = ?pump.active_profile().map(|p| p.name().to_string()),
        "pump ready"
    );
    Ok(pump)
}

pub struct CalcArgs {
    pub glucose: f32,
    pub carbs: f32,
    pub iob: f32,
    pub cf: Option<f32>,
    pub profile: Option<String>,
    pub duration_minutes: i32,
}

pub fn run_calc(seeds: &[ProfileSeed], args: &CalcArgs, json: bool) -> eyre::Result<()> {
    let mut store = ProfileStore::new();
    store.load_seeds(seeds)?;
    if let Some(name) = &args.profile {
        store.activate(name)?;
    }
    let inputs = DoseInputs {
        glucose_level: args.glucose,
        carb_intake: args.carbs,
        insulin_on_board: args.iob,
        correction_factor_override: args.cf,
    };
    let profile = store.active();
    let breakdown = calculate_dose(&inputs, profile)?;
    let name = profile.map(|p| p.name().to_string()).unwrap_or_default();
    let extended = breakdown.extended_split(args.duration_minutes / 60);

    if json {
        println!("{}", calc_json(&name, &breakdown, &extended));
    } else {
        print_calc(&name, &breakdown, &extended);
    }
    Ok(())
}

fn calc_json(profile: &str, b: &DoseBreakdown, x: &ExtendedSplit) -> serde_json::Value {
    serde_json::json!({
        "profile": profile,
        "food_bolus": b.food_bolus,
        "correction_bolus": b.correction_bolus,
        "total_bolus": b.total_bolus,
        "insulin_on_board": b.insulin_on_board,
        "final_dose": b.final_dose,
        "effective_cf": b.effective_cf,
        "quick_units": b.quick_split(),
        "extended": {
            "dose": x.dose,
            "duration_hours": x.duration_hours,
            "hourly_rate": x.hourly_rate,
            "defaulted_duration": x.defaulted_duration,
        },
    })
}

fn print_calc(profile: &str, b: &DoseBreakdown, x: &ExtendedSplit) {
    println!("profile: {profile}");
    println!("food bolus: {:.2} U", b.food_bolus);
    println!(
        "correction bolus: {:.2} U (CF {})",
        b.correction_bolus, b.effective_cf
    );
    println!("total bolus: {:.2} U", b.total_bolus);
    println!("insulin on board: {:.2} U", b.insulin_on_board);
    println!("final dose: {:.2} U", b.final_dose);
    println!("quick split: {:.2} U now", b.quick_split());
    if x.defaulted_duration {
        println!("warning: extended duration under one hour; using 1 hour");
    }
    println!(
        "extended split: {:.2} U over {} h ({:.2} U/h)",
        x.dose, x.duration_hours, x.hourly_rate
    );
}

/// Load every seed independently, then re-validate the store; report all problems at once.
pub fn run_self_check(cfg: &Config, seeds: &[ProfileSeed], json: bool) -> eyre::Result<()> {
    let mut store = ProfileStore::new();
    let mut problems: Vec<String> = seeds
        .iter()
        .filter_map(|s| {
            store
                .create(&s.name, s.into())
                .err()
                .map(|e| format!("Profile '{}': {e}", s.name))
        })
        .collect();
    let (_, invalid) = store.validate_all();
    problems.extend(invalid);

    DeliveryController::builder()
        .with_safety((&cfg.safety).into())
        .with_alerts((&cfg.alerts).into())
        .with_iob((&cfg.iob).into())
        .build()?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "ok": problems.is_empty(),
                "profiles": store.names(),
                "active": store.active_name(),
                "problems": problems,
            })
        );
    } else {
        println!("profiles loaded: {}", store.len());
        if let Some(active) = store.active_name() {
            println!("active profile: {active}");
        }
        for p in &problems {
            println!("problem: {p}");
        }
    }

    if !problems.is_empty() {
        eyre::bail!("self-check found {} profile problem(s)", problems.len());
    }
    if !json {
        println!("self-check ok");
    }
    Ok(())
}
