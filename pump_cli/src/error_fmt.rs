//! Human-readable error descriptions and structured JSON error formatting.

use pump_core::error::{BuildError, PumpError};

/// Stable name for the JSON `reason` field.
pub fn reason_name(e: &PumpError) -> &'static str {
    match e {
        PumpError::InvalidParameter(_) => "InvalidParameter",
        PumpError::EmptyName => "EmptyName",
        PumpError::DuplicateName(_) => "DuplicateName",
        PumpError::NotFound(_) => "NotFound",
        PumpError::CannotDeleteActive(_) => "CannotDeleteActive",
        PumpError::NoProfile => "NoProfile",
        PumpError::GlucoseTooLow(_) => "GlucoseTooLow",
        PumpError::GlucoseStillLow(_) => "GlucoseStillLow",
        PumpError::NotPausedOrSuspended => "NotPausedOrSuspended",
        PumpError::DeliveryNotActive => "DeliveryNotActive",
        PumpError::AlreadyCanceled(_) => "AlreadyCanceled",
        PumpError::CorruptProfile(_) => "CorruptProfile",
        PumpError::PoweredOff => "PoweredOff",
    }
}

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(pe) = err.downcast_ref::<PumpError>() {
        return humanize_pump(pe);
    }

    if let Some(BuildError::InvalidConfig(msg)) = err.downcast_ref::<BuildError>() {
        return format!(
            "What happened: Invalid pump configuration ({msg}).\nLikely causes: Inconsistent thresholds in the [safety] or [alerts] tables.\nHow to fix: Edit the config file, then rerun `insulin-pump self-check`."
        );
    }

    if let Some(te) = err.downcast_ref::<toml::de::Error>() {
        return format!(
            "What happened: The config file is not valid TOML for this pump.\nLikely causes: A typo, a wrong value type, or a misplaced table.\nHow to fix: Correct the file. Parser said: {}",
            te.message()
        );
    }

    // String-based heuristics for errors coming from config and script loading
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("profiles csv must have headers") {
        return "Invalid headers in profiles CSV. Expected 'name,basal_rate,correction_factor,carb_ratio,target_glucose'.".to_string();
    }

    if lower.starts_with("safety.")
        || lower.starts_with("alerts.")
        || lower.starts_with("iob.")
        || lower.starts_with("logging.")
    {
        return format!(
            "What happened: Configuration is invalid ({msg}).\nLikely causes: An out-of-range or inconsistent threshold.\nHow to fix: Edit the TOML config and try again."
        );
    }

    if lower.starts_with("script line") {
        return format!(
            "What happened: {msg}.\nLikely causes: A misspelled command or a missing/non-numeric argument.\nHow to fix: See `insulin-pump run --help` for the command list."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

fn humanize_pump(e: &PumpError) -> String {
    match e {
        PumpError::InvalidParameter(v) => format!(
            "What happened: Profile rejected: {v}.\nLikely causes: A typo or a value in the wrong unit.\nHow to fix: Basal 0-30 U/h, CF 1-400 mg/dL/U, ICR 1-150 g/U, target 70-180 mg/dL."
        ),
        PumpError::EmptyName | PumpError::DuplicateName(_) => format!(
            "What happened: Profile rejected: {e}.\nLikely causes: Profile names must be unique and non-empty (case-sensitive).\nHow to fix: Pick another name or update the existing profile."
        ),
        PumpError::NotFound(_) | PumpError::CannotDeleteActive(_) => format!(
            "What happened: {e}.\nLikely causes: A misspelled name, or the profile is currently active.\nHow to fix: Check the name; switch to another profile before deleting this one."
        ),
        PumpError::NoProfile => "What happened: No active profile is available.\nLikely causes: No [[profiles]] in the config and no --profiles CSV.\nHow to fix: Create a profile first.".to_string(),
        PumpError::GlucoseTooLow(_) | PumpError::GlucoseStillLow(_) => format!(
            "What happened: Delivery refused for safety: {e}.\nLikely causes: Glucose is below the suspend threshold or under the resume threshold.\nHow to fix: Wait for glucose to recover, then resume."
        ),
        PumpError::NotPausedOrSuspended | PumpError::DeliveryNotActive | PumpError::PoweredOff => {
            format!(
                "What happened: {e}.\nLikely causes: The command does not apply in the pump's current state.\nHow to fix: Check `status`; start or resume delivery (or power on) first."
            )
        }
        PumpError::AlreadyCanceled(_) => format!(
            "What happened: {e}.\nLikely causes: Canceled boluses are terminal.\nHow to fix: Deliver a new bolus."
        ),
        PumpError::CorruptProfile(_) => format!(
            "What happened: {e}.\nLikely causes: Internal invariant violation; stored profiles are always range-checked.\nHow to fix: Run `insulin-pump self-check` and report the issue."
        ),
    }
}

/// Stable exit codes; errors that are not pump errors return 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    let Some(e) = err.downcast_ref::<PumpError>() else {
        return 1;
    };
    match e {
        PumpError::InvalidParameter(_)
        | PumpError::EmptyName
        | PumpError::DuplicateName(_)
        | PumpError::NotFound(_)
        | PumpError::CannotDeleteActive(_) => 3,
        PumpError::NoProfile => 4,
        PumpError::GlucoseTooLow(_) | PumpError::GlucoseStillLow(_) => 5,
        PumpError::NotPausedOrSuspended
        | PumpError::DeliveryNotActive
        | PumpError::AlreadyCanceled(_)
        | PumpError::PoweredOff => 6,
        PumpError::CorruptProfile(_) => 7,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    if let Some(pe) = err.downcast_ref::<PumpError>() {
        let msg = humanize(err);
        let obj = match pe {
            PumpError::InvalidParameter(v) => json!({
                "reason": reason_name(pe),
                "details": { "field": v.field, "min": v.min, "max": v.max, "value": v.value },
                "message": msg,
            }),
            PumpError::GlucoseTooLow(g) | PumpError::GlucoseStillLow(g) => json!({
                "reason": reason_name(pe),
                "details": { "glucose_mg_dl": g },
                "message": msg,
            }),
            _ => json!({ "reason": reason_name(pe), "message": msg }),
        };
        return obj.to_string();
    }

    // Generic error JSON
    json!({ "reason": "Error", "message": humanize(err) }).to_string()
}
