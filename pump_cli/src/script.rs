//! Line-oriented command scripts for the `run` subcommand.

use std::io::BufRead;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::Receiver;
use pump_core::mocks::SimTelemetry;
use pump_core::{
    Alert, BolusOutcome, BolusRequest, DeliveryController, ProfileParams, PumpError, PumpEvent,
};

#[derive(Debug, Clone, PartialEq)]
pub enum ScriptCmd {
    CreateProfile {
        name: String,
        params: ProfileParams,
    },
    SwitchProfile(String),
    DeleteProfile(String),
    Start,
    Stop,
    Resume,
    Glucose(f32),
    Iob(f32),
    Bolus {
        glucose: f32,
        carbs: f32,
    },
    Quick {
        glucose: f32,
        minutes: i32,
    },
    Extended {
        glucose: f32,
        minutes: i32,
    },
    PauseBolus,
    ResumeBolus,
    CancelBolus,
    Occlusion,
    Tick(u32),
    Shutdown,
    PowerOn,
    Status,
    Poll,
    SimBattery {
        level: f32,
        charging: bool,
    },
    SimGlucose(f32),
    SimIob(f32),
    SimReservoir(u32),
    SimOcclusion(bool),
}

fn arg<T: FromStr>(words: &[&str], idx: usize, what: &str) -> Result<T, String> {
    let raw = words
        .get(idx)
        .ok_or_else(|| format!("missing {what}"))?;
    raw.parse::<T>()
        .map_err(|_| format!("{what} must be a number, got '{raw}'"))
}

fn exact(words: &[&str], n: usize) -> Result<(), String> {
    if words.len() > n {
        return Err(format!("unexpected argument '{}'", words[n]));
    }
    Ok(())
}

/// Parse one non-empty, non-comment script line.
pub fn parse_line(line: &str) -> Result<ScriptCmd, String> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let Some(&head) = words.first() else {
        return Err("empty command".into());
    };
    let cmd = match head {
        "profile" => match words.get(1).copied() {
            Some("create") => {
                exact(&words, 7)?;
                ScriptCmd::CreateProfile {
                    name: words
                        .get(2)
                        .ok_or_else(|| "missing profile name".to_string())?
                        .to_string(),
                    params: ProfileParams::new(
                        arg(&words, 3, "basal rate")?,
                        arg(&words, 4, "correction factor")?,
                        arg(&words, 5, "carb ratio")?,
                        arg(&words, 6, "target glucose")?,
                    ),
                }
            }
            Some(sub @ ("switch" | "delete")) => {
                exact(&words, 3)?;
                let name = words
                    .get(2)
                    .ok_or_else(|| "missing profile name".to_string())?
                    .to_string();
                if sub == "switch" {
                    ScriptCmd::SwitchProfile(name)
                } else {
                    ScriptCmd::DeleteProfile(name)
                }
            }
            other => {
                return Err(format!(
                    "unknown profile command '{}'",
                    other.unwrap_or_default()
                ));
            }
        },
        "start" => ScriptCmd::Start,
        "stop" => ScriptCmd::Stop,
        "resume" => ScriptCmd::Resume,
        "glucose" => ScriptCmd::Glucose(arg(&words, 1, "glucose")?),
        "iob" => ScriptCmd::Iob(arg(&words, 1, "insulin on board")?),
        "bolus" => ScriptCmd::Bolus {
            glucose: arg(&words, 1, "glucose")?,
            carbs: arg(&words, 2, "carbs")?,
        },
        "quick" => ScriptCmd::Quick {
            glucose: arg(&words, 1, "glucose")?,
            minutes: arg(&words, 2, "minutes")?,
        },
        "extended" => ScriptCmd::Extended {
            glucose: arg(&words, 1, "glucose")?,
            minutes: arg(&words, 2, "minutes")?,
        },
        "pause-bolus" => ScriptCmd::PauseBolus,
        "resume-bolus" => ScriptCmd::ResumeBolus,
        "cancel-bolus" => ScriptCmd::CancelBolus,
        "occlusion" => ScriptCmd::Occlusion,
        "tick" => ScriptCmd::Tick(if words.len() > 1 {
            arg(&words, 1, "tick count")?
        } else {
            1
        }),
        "shutdown" => ScriptCmd::Shutdown,
        "power-on" => ScriptCmd::PowerOn,
        "status" => ScriptCmd::Status,
        "poll" => ScriptCmd::Poll,
        "sim" => match words.get(1).copied() {
            Some("battery") => ScriptCmd::SimBattery {
                level: arg(&words, 2, "battery level")?,
                charging: match words.get(3).copied() {
                    None => false,
                    Some("charging") => true,
                    Some(other) => return Err(format!("unexpected argument '{other}'")),
                },
            },
            Some("glucose") => ScriptCmd::SimGlucose(arg(&words, 2, "glucose")?),
            Some("iob") => ScriptCmd::SimIob(arg(&words, 2, "insulin on board")?),
            Some("reservoir") => ScriptCmd::SimReservoir(arg(&words, 2, "reservoir units")?),
            Some("occlusion") => match words.get(2).copied() {
                Some("on") => ScriptCmd::SimOcclusion(true),
                Some("off") => ScriptCmd::SimOcclusion(false),
                _ => return Err("sim occlusion takes 'on' or 'off'".into()),
            },
            other => {
                return Err(format!(
                    "unknown sim command '{}'",
                    other.unwrap_or_default()
                ));
            }
        },
        other => return Err(format!("unknown command '{other}'")),
    };
    Ok(cmd)
}

/// Parse a whole script up front so a typo never leaves the pump half-driven.
pub fn parse_script(reader: impl BufRead) -> eyre::Result<Vec<(usize, String, ScriptCmd)>> {
    let mut cmds = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let text = line.trim();
        if text.is_empty() || text.starts_with('#') {
            continue;
        }
        let cmd = parse_line(text)
            .map_err(|e| eyre::eyre!("script line {}: {e}: '{text}'", idx + 1))?;
        cmds.push((idx + 1, text.to_string(), cmd));
    }
    Ok(cmds)
}

/// Outcome text of one executed command.
fn execute(
    pump: &DeliveryController,
    sim: &SimTelemetry,
    cmd: &ScriptCmd,
) -> Result<String, PumpError> {
    let state = |p: &DeliveryController| format!("state: {}", p.delivery_state());
    Ok(match cmd {
        ScriptCmd::CreateProfile { name, params } => {
            pump.create_profile(
                name,
                params.basal_rate,
                params.correction_factor,
                params.carb_ratio,
                params.target_glucose,
            )?;
            format!("profile created: {name}")
        }
        ScriptCmd::SwitchProfile(name) => {
            pump.switch_profile(name)?;
            format!("active profile: {name}")
        }
        ScriptCmd::DeleteProfile(name) => {
            pump.delete_profile(name)?;
            format!("profile deleted: {name}")
        }
        ScriptCmd::Start => {
            pump.start_insulin_delivery()?;
            state(pump)
        }
        ScriptCmd::Stop => {
            pump.stop_insulin_delivery()?;
            state(pump)
        }
        ScriptCmd::Resume => {
            pump.resume_insulin_delivery()?;
            state(pump)
        }
        ScriptCmd::Glucose(level) => {
            pump.set_current_glucose_level(*level);
            format!(
                "glucose: {} mg/dL, {}",
                pump.current_glucose_level(),
                state(pump)
            )
        }
        ScriptCmd::Iob(units) => {
            pump.set_insulin_on_board(*units);
            format!("insulin on board: {:.2} U", pump.insulin_on_board())
        }
        ScriptCmd::Bolus { glucose, carbs } => {
            let r = pump.deliver(BolusRequest::standard(*glucose, *carbs))?;
            format!(
                "bolus {}: {:.2} units (food {:.2}, correction {:.2}, iob {:.2})",
                r.id,
                r.units,
                r.breakdown.food_bolus,
                r.breakdown.correction_bolus,
                r.breakdown.insulin_on_board
            )
        }
        ScriptCmd::Quick { glucose, minutes } => {
            let r = pump.deliver_quick_bolus(*glucose, *minutes)?;
            format!("quick bolus {}: {:.2} units now", r.id, r.units)
        }
        ScriptCmd::Extended { glucose, minutes } => {
            let r = pump.deliver_extended_bolus(*glucose, *minutes)?;
            match r.extended {
                Some(x) => format!(
                    "extended bolus {}: {:.2} units over {} h ({:.2} U/h)",
                    r.id, x.dose, x.duration_hours, x.hourly_rate
                ),
                None => format!("extended bolus {}: {:.2} units", r.id, r.units),
            }
        }
        ScriptCmd::PauseBolus => outcome_text(pump.pause_bolus()),
        ScriptCmd::ResumeBolus => outcome_text(pump.resume_bolus()),
        ScriptCmd::CancelBolus => outcome_text(pump.cancel_bolus()),
        ScriptCmd::Occlusion => {
            pump.occlusion_alert();
            state(pump)
        }
        ScriptCmd::Tick(n) => {
            for _ in 0..*n {
                pump.on_tick();
            }
            format!("insulin on board: {:.2} U", pump.insulin_on_board())
        }
        ScriptCmd::Shutdown => {
            pump.emergency_shutdown();
            format!("powered: {}, {}", pump.is_powered(), state(pump))
        }
        ScriptCmd::PowerOn => {
            pump.power_on();
            format!("powered: {}, {}", pump.is_powered(), state(pump))
        }
        ScriptCmd::Status => status_line(pump),
        ScriptCmd::Poll => {
            pump.poll_telemetry();
            status_line(pump)
        }
        ScriptCmd::SimBattery { level, charging } => {
            sim.set_battery(*level, *charging);
            format!("sim battery: {level}% charging={charging}")
        }
        ScriptCmd::SimGlucose(level) => {
            sim.set_glucose(*level);
            format!("sim glucose: {level} mg/dL")
        }
        ScriptCmd::SimIob(units) => {
            sim.set_insulin_on_board(*units);
            format!("sim insulin on board: {units} U")
        }
        ScriptCmd::SimReservoir(units) => {
            sim.set_insulin_remaining(*units);
            format!("sim reservoir: {units} U")
        }
        ScriptCmd::SimOcclusion(on) => {
            sim.set_occlusion(*on);
            format!("sim occlusion: {on}")
        }
    })
}

fn outcome_text(outcome: BolusOutcome) -> String {
    match outcome {
        BolusOutcome::Changed { from, to } => format!("bolus: {from} -> {to}"),
        BolusOutcome::Unchanged(notice) => format!("bolus: no change ({notice})"),
    }
}

fn status_line(pump: &DeliveryController) -> String {
    let profile = pump
        .active_profile()
        .map(|p| p.name().to_string())
        .unwrap_or_else(|| "-".into());
    let bolus = pump
        .current_bolus()
        .map(|b| format!("{} ({})", b.id(), b.state()))
        .unwrap_or_else(|| "-".into());
    format!(
        "state: {} glucose: {} iob: {:.2} profile: {profile} bolus: {bolus} powered: {} battery: {}% reservoir: {} U",
        pump.delivery_state(),
        pump.current_glucose_level(),
        pump.insulin_on_board(),
        pump.is_powered(),
        pump.battery_level(),
        pump.insulin_dose_remaining(),
    )
}

pub fn describe_event(ev: &PumpEvent) -> String {
    match ev {
        PumpEvent::StateChanged { from, to } => format!("state changed: {from} -> {to}"),
        PumpEvent::Alert(a) => match a {
            Alert::Cgm => "alert: CGM".to_string(),
            Alert::Occlusion => "alert: occlusion".to_string(),
            Alert::LowBattery(l) => format!("alert: low battery ({l}%)"),
            Alert::CriticalBattery(l) => format!("alert: critical battery ({l}%)"),
            Alert::LowInsulin(u) => format!("alert: low insulin ({u} U)"),
            Alert::EmergencyShutdown => "alert: emergency shutdown".to_string(),
        },
        PumpEvent::BolusDelivered { id, units, .. } => {
            format!("bolus delivered: {id} ({units:.2} U)")
        }
        PumpEvent::BolusDeliveryFailed { reason } => format!("bolus failed: {reason}"),
        PumpEvent::BolusStateChanged { id, from, to } => {
            format!("bolus {id}: {from} -> {to}")
        }
        PumpEvent::PowerChanged(on) => format!("power: {}", if *on { "on" } else { "off" }),
    }
}

pub struct RunOptions {
    pub strict: bool,
    pub json: bool,
}

/// Execute parsed commands in order. Refused commands are reported and, unless
/// `strict`, the script carries on. `stop` is raised by the Ctrl-C handler.
pub fn run_script(
    pump: &DeliveryController,
    sim: &SimTelemetry,
    events: &Receiver<PumpEvent>,
    cmds: &[(usize, String, ScriptCmd)],
    stop: &Arc<AtomicBool>,
    opts: &RunOptions,
) -> eyre::Result<usize> {
    let mut refused = 0;
    for (line, text, cmd) in cmds {
        if stop.load(Ordering::SeqCst) {
            tracing::warn!(line, "script interrupted");
            break;
        }
        let result = execute(pump, sim, cmd);
        let evs: Vec<String> = events.try_iter().map(|e| describe_event(&e)).collect();

        if opts.json {
            let obj = match &result {
                Ok(out) => serde_json::json!({
                    "line": line, "command": text, "ok": true, "output": out, "events": evs,
                }),
                Err(e) => serde_json::json!({
                    "line": line, "command": text, "ok": false,
                    "reason": crate::error_fmt::reason_name(e), "error": e.to_string(), "events": evs,
                }),
            };
            println!("{obj}");
        } else {
            match &result {
                Ok(out) => println!("[{line}] {text}: {out}"),
                Err(e) => println!("[{line}] {text}: refused: {e}"),
            }
            for ev in &evs {
                println!("    event: {ev}");
            }
        }

        if let Err(e) = result {
            refused += 1;
            if opts.strict {
                return Err(eyre::Report::new(e));
            }
        }
    }
    Ok(refused)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("start", ScriptCmd::Start)]
    #[case("glucose 65.5", ScriptCmd::Glucose(65.5))]
    #[case("bolus 180 50", ScriptCmd::Bolus { glucose: 180.0, carbs: 50.0 })]
    #[case("extended 200 90", ScriptCmd::Extended { glucose: 200.0, minutes: 90 })]
    #[case("tick", ScriptCmd::Tick(1))]
    #[case("tick 5", ScriptCmd::Tick(5))]
    #[case("sim battery 4 charging", ScriptCmd::SimBattery { level: 4.0, charging: true })]
    #[case("sim occlusion on", ScriptCmd::SimOcclusion(true))]
    #[case("profile switch Night", ScriptCmd::SwitchProfile("Night".into()))]
    fn parses(#[case] line: &str, #[case] expected: ScriptCmd) {
        assert_eq!(parse_line(line), Ok(expected));
    }

    #[rstest]
    #[case("launch", "unknown command")]
    #[case("glucose", "missing glucose")]
    #[case("glucose high", "must be a number")]
    #[case("profile create Day 1 50 10", "missing target glucose")]
    #[case("profile create Day 1 50 10 100 extra", "unexpected argument")]
    #[case("sim occlusion maybe", "'on' or 'off'")]
    fn rejects(#[case] line: &str, #[case] needle: &str) {
        let err = parse_line(line).unwrap_err();
        assert!(err.contains(needle), "{err}");
    }

    #[test]
    fn script_skips_comments_and_reports_line_numbers() {
        let text = "# setup\n\nstart\nwarp 9\n";
        let err = parse_script(text.as_bytes()).unwrap_err();
        assert!(err.to_string().starts_with("script line 4: unknown command"));
    }

    #[test]
    fn runs_against_controller() {
        let pump = DeliveryController::builder().build().unwrap();
        let sim = SimTelemetry::default();
        let rx = pump.subscribe();
        let cmds = parse_script("profile create Day 1 50 10 100\nstart\nbolus 180 50\n".as_bytes())
            .unwrap();
        let stop = Arc::new(AtomicBool::new(false));
        let refused = run_script(
            &pump,
            &sim,
            &rx,
            &cmds,
            &stop,
            &RunOptions {
                strict: true,
                json: false,
            },
        )
        .unwrap();
        assert_eq!(refused, 0);
        assert!(pump.current_bolus().is_some());
    }
}
