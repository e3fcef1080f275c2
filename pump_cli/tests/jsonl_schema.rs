use rstest::rstest;
use assert_cmd::Command;

fn run_json(script: &str) -> Vec<serde_json::Value> {
    let out = Command::cargo_bin("insulin-pump")
        .unwrap()
        .args(["--json", "--log-level", "error", "run"])
        .write_stdin(script)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    String::from_utf8_lossy(&out)
        .lines()
        .map(|l| serde_json::from_str(l).expect("valid JSON line"))
        .collect()
}

/// Every executed command yields exactly one JSON line with the common fields.
#[rstest]
fn jsonl_success_schema() {
    let lines = run_json("profile create Day 1 50 10 100\nstart\nbolus 180 50\n");
    assert_eq!(lines.len(), 3);

    for (i, v) in lines.iter().enumerate() {
        assert!(v.get("line").and_then(|x| x.as_u64()).is_some());
        assert!(v.get("command").and_then(|x| x.as_str()).is_some());
        assert_eq!(v["ok"], true, "line {i}: {v}");
        assert!(v.get("output").and_then(|x| x.as_str()).is_some());
        assert!(v.get("events").and_then(|x| x.as_array()).is_some());
        assert!(v.get("reason").is_none());
    }

    let start_events = lines[1]["events"].as_array().unwrap();
    assert_eq!(start_events[0], "state changed: INACTIVE -> ACTIVE");
    assert!(
        lines[2]["output"].as_str().unwrap().contains("6.60 units"),
        "{}",
        lines[2]
    );
}

/// Refused commands carry a stable reason and the error text instead of output.
#[rstest]
fn jsonl_refusal_schema() {
    let lines = run_json("bolus 150 20\nprofile create Day 1 50 10 100\nstart\nglucose 60\nresume\n");
    assert_eq!(lines.len(), 5);

    let failed_bolus = &lines[0];
    assert_eq!(failed_bolus["ok"], false);
    assert_eq!(failed_bolus["reason"], "DeliveryNotActive");
    assert_eq!(failed_bolus["error"], "insulin delivery not active");
    assert!(failed_bolus.get("output").is_none());
    let evs = failed_bolus["events"].as_array().unwrap();
    assert!(evs[0].as_str().unwrap().starts_with("bolus failed"));

    let resume = &lines[4];
    assert_eq!(resume["ok"], false);
    assert_eq!(resume["reason"], "GlucoseStillLow");
}
