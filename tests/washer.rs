use std::collections::BTreeMap;
use std::path::Path;

use homewhiz_tools::config::ApplianceConfiguration;
use homewhiz_tools::controls::{Control, Value, compile, find};
use homewhiz_tools::telegram::{Reassembler, Telegram};
use homewhiz_tools::wire::Command;
use jiff::Timestamp;

const ON: &str = "\
    002f4a45a10100000000000000000000000000000000000000000200000000000000000a011e0c00\
    00000080021102110000000000000000000000000000000100000000000001070000000000";
const RUNNING: &str = "\
    002f4a45a10100000000000000000000000000000000000000000200000000000000001e819e0c00\
    80000080021100398080010000000000000000000080808100800000008001078000808000";
const SPINNING: &str = "\
    002f4a45a10100000000000000000000000000000000000000000200000000000000001e819e8c00\
    808080800211000a8080020000000000000000008080808180800000008081078000808000";
const DELAY_DEFINED: &str = "\
    003853e0ab0100000000000000000000000000000000000000000300000000000000000a01280e00\
    0000008002100210012c000000000000000000010000000100000000000001078000000000";
const DELAY_STARTED: &str = "\
    003853e0ab0100000000000000000000000000000000000000000300000000000000003c01280e00\
    000000800210021081ac080000000000000000010000000100000000000001078000808000";

fn controls() -> Vec<Control> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/washer.json");
    let config = ApplianceConfiguration::from_path(&path).unwrap();
    compile(&config).unwrap()
}

fn values(telegram: &str) -> BTreeMap<String, Value> {
    let telegram = Telegram::from_hex(telegram).unwrap();
    controls()
        .iter()
        .filter(|c| !matches!(c, Control::CalculatedTimestamp(_)))
        .map(|c| (c.key().to_string(), c.read(&telegram).unwrap()))
        .collect()
}

fn option(name: &str) -> Value {
    Value::Option(Some(name.to_string()))
}

fn program_end(telegram: &str, now: Timestamp) -> Option<Timestamp> {
    let controls = controls();
    let Some(Control::CalculatedTimestamp(delay)) = find(&controls, "washer_delay") else {
        panic!("washer_delay is not a calculated timestamp");
    };
    delay.get_at(&Telegram::from_hex(telegram).unwrap(), now).unwrap()
}

#[test]
fn compiled_keys() {
    let controls = controls();
    let keys = controls.iter().map(Control::key).collect::<Vec<_>>();
    assert_eq!(
        keys,
        [
            "state",
            "washer_program",
            "sub_state",
            "washer_temperature",
            "washer_spin",
            "washer_prewash",
            "washer_extrarinse",
            "washer_fast_plus",
            "washer_steam",
            "washer_hidden_anti_crease",
            "temperature",
            "spin",
            "washer_delay",
            "washer_duration",
            "washer_remaining",
            "remote_control",
            "washer_warning_door_is_open",
            "washer_warning_no_water",
            "washer_warning_security",
            "settings_volume",
        ]
    );
}

#[test]
fn on() {
    let values = values(ON);
    let expected = BTreeMap::from([
        ("state".to_string(), option("device_state_on")),
        ("washer_program".to_string(), option("program_cottons")),
        ("sub_state".to_string(), Value::Option(None)),
        ("washer_temperature".to_string(), option("temperature_30")),
        ("washer_spin".to_string(), option("1200rpm")),
        ("washer_prewash".to_string(), Value::Bool(false)),
        ("washer_extrarinse".to_string(), Value::Bool(false)),
        ("washer_fast_plus".to_string(), option("fast_plus_off")),
        ("washer_steam".to_string(), Value::Bool(false)),
        ("washer_hidden_anti_crease".to_string(), Value::Bool(false)),
        ("temperature".to_string(), Value::Number(30.0)),
        ("spin".to_string(), Value::Number(1200.0)),
        ("washer_duration".to_string(), Value::Minutes(137)),
        ("washer_remaining".to_string(), Value::Minutes(137)),
        ("remote_control".to_string(), Value::Bool(false)),
        ("washer_warning_door_is_open".to_string(), Value::Bool(false)),
        ("washer_warning_no_water".to_string(), Value::Bool(false)),
        ("washer_warning_security".to_string(), Value::Bool(false)),
        ("settings_volume".to_string(), option("volume_low")),
    ]);
    assert_eq!(values, expected);

    let now: Timestamp = "2024-06-01T12:00:30Z".parse().unwrap();
    assert_eq!(program_end(ON, now), Some("2024-06-01T14:17:00Z".parse().unwrap()));
}

#[test]
fn running() {
    let values = values(RUNNING);
    assert_eq!(values["state"], option("device_state_running"));
    assert_eq!(values["sub_state"], option("washer_substate_washing"));
    assert_eq!(values["washer_temperature"], option("temperature_30"));
    assert_eq!(values["washer_extrarinse"], Value::Bool(false));
    assert_eq!(values["washer_duration"], Value::Minutes(137));
    assert_eq!(values["washer_remaining"], Value::Minutes(57));
    assert_eq!(values["settings_volume"], option("volume_low"));

    let now: Timestamp = "2024-06-01T12:00:00Z".parse().unwrap();
    assert_eq!(program_end(RUNNING, now), Some("2024-06-01T12:57:00Z".parse().unwrap()));
}

#[test]
fn spinning() {
    let values = values(SPINNING);
    assert_eq!(values["state"], option("device_state_running"));
    assert_eq!(values["sub_state"], option("washer_substate_spin"));
    assert_eq!(values["washer_spin"], option("1200rpm"));
    assert_eq!(values["washer_fast_plus"], option("fast_plus_off"));
    assert_eq!(values["washer_steam"], Value::Bool(false));
    assert_eq!(values["washer_remaining"], Value::Minutes(10));
}

#[test]
fn delay_defined() {
    let values = values(DELAY_DEFINED);
    assert_eq!(values["state"], option("device_state_on"));
    assert_eq!(values["washer_spin"], option("1400rpm"));
    assert_eq!(values["washer_temperature"], option("temperature_40"));
    assert_eq!(values["washer_duration"], Value::Minutes(136));
    assert_eq!(values["washer_remaining"], Value::Minutes(136));
    assert_eq!(values["washer_warning_door_is_open"], Value::Bool(true));
    assert_eq!(values["washer_warning_no_water"], Value::Bool(false));

    let now: Timestamp = "2024-06-01T20:00:59Z".parse().unwrap();
    assert_eq!(program_end(DELAY_DEFINED, now), Some("2024-06-02T00:00:00Z".parse().unwrap()));
}

#[test]
fn delay_started() {
    let values = values(DELAY_STARTED);
    assert_eq!(values["state"], option("device_state_time_delay_active"));
    assert_eq!(values["sub_state"], option("washer_substate_time_delay_enabled"));

    let now: Timestamp = "2024-06-01T20:00:00Z".parse().unwrap();
    assert_eq!(program_end(DELAY_STARTED, now), Some("2024-06-02T00:00:00Z".parse().unwrap()));
}

#[test]
fn delay_follows_the_remaining_time() {
    let controls = controls();
    let Some(Control::CalculatedTimestamp(delay)) = find(&controls, "washer_delay") else {
        panic!("washer_delay is not a calculated timestamp");
    };
    assert_eq!(delay.subscribers, ["washer_remaining"]);
    assert!(!controls[12].is_writable());
    assert_eq!(controls[12].read_offsets(), [46, 47, 48, 49]);
}

#[test]
fn options() {
    let controls = controls();
    let options = |key: &str| find(&controls, key).unwrap().options();
    assert_eq!(
        options("washer_temperature"),
        [
            "temperature_cold_wash",
            "temperature_20",
            "temperature_30",
            "temperature_40",
            "50c",
            "60c",
            "70c",
            "80c",
            "90c",
        ]
    );
    assert_eq!(
        options("washer_spin"),
        ["spin_no_spin", "400rpm", "600rpm", "800rpm", "1000rpm", "1200rpm", "1400rpm"]
    );
    assert_eq!(
        options("washer_program"),
        ["program_cottons", "program_synthetics", "program_wool", "program_mix", "program_quick_14"]
    );
    assert_eq!(options("washer_steam"), ["off", "on"]);
    assert!(options("washer_remaining").is_empty());
}

#[test]
fn writes() {
    let controls = controls();
    let write = |key: &str, value: &str| find(&controls, key).unwrap().write(value, None);
    assert_eq!(write("washer_spin", "1000rpm").unwrap(), [Command::new(38, 10)]);
    assert_eq!(write("washer_temperature", "60c").unwrap(), [Command::new(37, 60)]);
    assert_eq!(write("state", "device_state_running").unwrap(), [Command::new(35, 30)]);
    assert_eq!(write("washer_steam", "on").unwrap(), [Command::new(42, 1)]);
    assert_eq!(write("settings_volume", "volume_high").unwrap(), [Command::new(63, 2)]);
    assert!(write("washer_spin", "1300rpm").is_err());
    assert!(write("washer_remaining", "10").is_err());
    assert!(write("temperature", "40").is_err());
}

#[test]
fn fragments_reassemble_into_the_telegram() {
    let telegram = Telegram::from_hex(ON).unwrap();
    let header = |marker: u8| vec![0x00, 0x01, 0x02, 0x03, marker, 0x05, 0x06];
    let mut first = header(0);
    first.extend_from_slice(&telegram.as_bytes()[..40]);
    let mut second = header(1);
    second.extend_from_slice(&telegram.as_bytes()[40..]);

    let mut reassembler = Reassembler::new();
    assert_eq!(reassembler.push_notification(&second), None);
    assert_eq!(reassembler.push_notification(&first), None);
    assert_eq!(reassembler.push_notification(&[0, 1, 2]), None);
    assert_eq!(reassembler.push_notification(&second), Some(telegram));
}

#[test]
fn short_telegrams_are_rejected() {
    let controls = controls();
    let telegram = Telegram::from_hex(&ON[..60]).unwrap();
    assert!(controls.iter().any(|c| c.read(&telegram).is_err()));
}
