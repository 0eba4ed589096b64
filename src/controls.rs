//! Typed accessors over the bytes of a [`Telegram`].
//!
//! A [`Control`] is compiled once per appliance configuration (see [`compile()`]) and then
//! applied to every telegram the appliance reports. Reads never fail on values the
//! configuration does not know about; they only fail when the telegram is shorter than the
//! configuration expects.

use std::fmt;

use crate::telegram::{ReadError, Telegram};
use crate::wire::Command;

pub mod climate;
pub mod compile;
pub mod options;
pub mod primitive;
pub mod timestamp;

pub use climate::{
    ClimateControl, ClimateState, HvacControl, HvacMode, SwingAxisControl, SwingControl, SwingMode,
};
pub use compile::{CompileError, compile, compile_debug};
pub use options::OptionTable;
pub use primitive::{
    BitmaskControl, CompareControl, DebugControl, EnumControl, NumericControl, TimeControl,
    WriteBooleanControl, WriteEnumControl, WriteNumericControl,
};
pub use timestamp::CalculatedTimestampControl;

#[derive(thiserror::Error, Debug)]
pub enum SetError {
    #[error("{option:?} is not an option of {key}")]
    UnknownOption { key: String, option: String },
    #[error("{value:?} is not a valid value for {key}")]
    InvalidValue { key: String, value: String },
    #[error("{key} has no option ending in {suffix:?}")]
    MissingSwingOption { key: String, suffix: &'static str },
    #[error("{key} does not support the {mode} mode")]
    UnsupportedMode { key: String, mode: String },
    #[error("{key} is read-only")]
    ReadOnly { key: String },
    #[error("{key} combines several values which must be written individually")]
    Composite { key: String },
    #[error("{key} needs the current telegram to compute its commands")]
    TelegramRequired { key: String },
    #[error("could not read the current appliance state")]
    Read(#[from] ReadError),
}

#[derive(Debug, Clone, PartialEq, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Control {
    Enum(EnumControl),
    WriteEnum(WriteEnumControl),
    Numeric(NumericControl),
    WriteNumeric(WriteNumericControl),
    Time(TimeControl),
    BooleanCompare(CompareControl),
    BooleanBitmask(BitmaskControl),
    WriteBoolean(WriteBooleanControl),
    SwingAxis(SwingAxisControl),
    Swing(SwingControl),
    Hvac(HvacControl),
    Climate(ClimateControl),
    CalculatedTimestamp(CalculatedTimestampControl),
    Debug(DebugControl),
}

/// A decoded control value.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum Value {
    /// `None` for codes the configuration does not define.
    Option(Option<String>),
    Number(f64),
    Minutes(u32),
    Bool(bool),
    Hvac(Option<HvacMode>),
    Swing(SwingMode),
    Climate(ClimateState),
    Timestamp(Option<jiff::Timestamp>),
    Raw(u8),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Option(Some(name)) => f.write_str(name),
            Value::Option(None) | Value::Hvac(None) => f.write_str("unknown"),
            Value::Number(n) => f.write_str(&options::format_number(*n)),
            Value::Minutes(m) => write!(f, "{m} min"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Hvac(Some(mode)) => write!(f, "{mode}"),
            Value::Swing(mode) => write!(f, "{mode}"),
            Value::Climate(state) => {
                match state.hvac {
                    Some(mode) => write!(f, "{mode}")?,
                    None => f.write_str("unknown")?,
                }
                write!(
                    f,
                    ", target {}, current {}, fan {}, swing {}",
                    options::format_number(state.target_temperature),
                    options::format_number(state.current_temperature),
                    state.fan_mode.as_deref().unwrap_or("unknown"),
                    state.swing,
                )
            }
            Value::Timestamp(Some(at)) => write!(f, "{at}"),
            Value::Timestamp(None) => f.write_str("none"),
            Value::Raw(byte) => write!(f, "{byte:#04x}"),
        }
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, SetError> {
    match value {
        "true" | "on" | "1" => Ok(true),
        "false" | "off" | "0" => Ok(false),
        _ => Err(SetError::InvalidValue { key: key.to_string(), value: value.to_string() }),
    }
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, SetError> {
    value
        .parse()
        .map_err(|_| SetError::InvalidValue { key: key.to_string(), value: value.to_string() })
}

impl Control {
    pub fn key(&self) -> &str {
        match self {
            Control::Enum(c) => &c.key,
            Control::WriteEnum(c) => &c.key,
            Control::Numeric(c) => &c.key,
            Control::WriteNumeric(c) => &c.key,
            Control::Time(c) => &c.key,
            Control::BooleanCompare(c) => &c.key,
            Control::BooleanBitmask(c) => &c.key,
            Control::WriteBoolean(c) => &c.key,
            Control::SwingAxis(c) => c.key(),
            Control::Swing(c) => &c.key,
            Control::Hvac(c) => &c.key,
            Control::Climate(c) => &c.key,
            Control::CalculatedTimestamp(c) => &c.key,
            Control::Debug(c) => &c.key,
        }
    }

    pub(crate) fn key_mut(&mut self) -> &mut String {
        match self {
            Control::Enum(c) => &mut c.key,
            Control::WriteEnum(c) => &mut c.key,
            Control::Numeric(c) => &mut c.key,
            Control::WriteNumeric(c) => &mut c.key,
            Control::Time(c) => &mut c.key,
            Control::BooleanCompare(c) => &mut c.key,
            Control::BooleanBitmask(c) => &mut c.key,
            Control::WriteBoolean(c) => &mut c.key,
            Control::SwingAxis(SwingAxisControl::Boolean(c)) => &mut c.key,
            Control::SwingAxis(SwingAxisControl::Enum(c)) => &mut c.key,
            Control::Swing(c) => &mut c.key,
            Control::Hvac(c) => &mut c.key,
            Control::Climate(c) => &mut c.key,
            Control::CalculatedTimestamp(c) => &mut c.key,
            Control::Debug(c) => &mut c.key,
        }
    }

    pub fn kind(&self) -> &'static str {
        self.into()
    }

    pub fn read(&self, telegram: &Telegram) -> Result<Value, ReadError> {
        Ok(match self {
            Control::Enum(c) => Value::Option(c.get(telegram)?.map(str::to_string)),
            Control::WriteEnum(c) => Value::Option(c.get(telegram)?.map(str::to_string)),
            Control::Numeric(c) => Value::Number(c.get(telegram)?),
            Control::WriteNumeric(c) => Value::Number(c.get(telegram)?),
            Control::Time(c) => Value::Minutes(c.get(telegram)?),
            Control::BooleanCompare(c) => Value::Bool(c.get(telegram)?),
            Control::BooleanBitmask(c) => Value::Bool(c.get(telegram)?),
            Control::WriteBoolean(c) => Value::Bool(c.get(telegram)?),
            Control::SwingAxis(c) => Value::Bool(c.get(telegram)?),
            Control::Swing(c) => Value::Swing(c.get(telegram)?),
            Control::Hvac(c) => Value::Hvac(c.get(telegram)?),
            Control::Climate(c) => Value::Climate(c.get(telegram)?),
            Control::CalculatedTimestamp(c) => Value::Timestamp(c.get(telegram)?),
            Control::Debug(c) => Value::Raw(c.get(telegram)?),
        })
    }

    /// Commands that change this control to the textual `value`.
    ///
    /// Composites that only emit commands for what actually changes need the `current`
    /// telegram.
    pub fn write(&self, value: &str, current: Option<&Telegram>) -> Result<Vec<Command>, SetError> {
        let key = self.key();
        let telegram =
            || current.ok_or_else(|| SetError::TelegramRequired { key: key.to_string() });
        match self {
            Control::WriteEnum(c) => Ok(vec![c.set(value)?]),
            Control::WriteNumeric(c) => Ok(vec![c.set(parse(key, value)?)?]),
            Control::WriteBoolean(c) => Ok(vec![c.set(parse_bool(key, value)?)]),
            Control::SwingAxis(c) => c.set(parse_bool(key, value)?, telegram()?),
            Control::Swing(c) => c.set(parse(key, value)?, telegram()?),
            Control::Hvac(c) => c.set(parse(key, value)?, telegram()?),
            Control::Climate(_) => Err(SetError::Composite { key: key.to_string() }),
            Control::Enum(_)
            | Control::Numeric(_)
            | Control::Time(_)
            | Control::BooleanCompare(_)
            | Control::BooleanBitmask(_)
            | Control::CalculatedTimestamp(_)
            | Control::Debug(_) => Err(SetError::ReadOnly { key: key.to_string() }),
        }
    }

    /// The values [`Control::write`] accepts, for controls with a closed set of them.
    pub fn options(&self) -> Vec<String> {
        match self {
            Control::Enum(c) => c.options.names().map(str::to_string).collect(),
            Control::WriteEnum(c) => c.options.names().map(str::to_string).collect(),
            Control::WriteBoolean(_) | Control::SwingAxis(_) => {
                vec!["off".to_string(), "on".to_string()]
            }
            Control::Swing(c) => c.options().iter().map(ToString::to_string).collect(),
            Control::Hvac(c) => c.options().iter().map(ToString::to_string).collect(),
            _ => Vec::new(),
        }
    }

    pub fn is_writable(&self) -> bool {
        matches!(
            self,
            Control::WriteEnum(_)
                | Control::WriteNumeric(_)
                | Control::WriteBoolean(_)
                | Control::SwingAxis(_)
                | Control::Swing(_)
                | Control::Hvac(_)
        )
    }

    /// Every telegram offset a read of this control looks at.
    pub fn read_offsets(&self) -> Vec<usize> {
        let mut offsets = Vec::new();
        self.collect_offsets(&mut offsets, &mut Vec::new());
        offsets.sort_unstable();
        offsets.dedup();
        offsets
    }

    /// Every telegram offset a write of this control may emit commands for.
    pub fn write_offsets(&self) -> Vec<u8> {
        let mut offsets = Vec::new();
        self.collect_offsets(&mut Vec::new(), &mut offsets);
        offsets.sort_unstable();
        offsets.dedup();
        offsets
    }

    fn collect_offsets(&self, read: &mut Vec<usize>, write: &mut Vec<u8>) {
        match self {
            Control::Enum(c) => read.push(c.read_offset),
            Control::WriteEnum(c) => {
                read.push(c.read_offset);
                write.push(c.write_offset);
            }
            Control::Numeric(c) => read.push(c.read_offset),
            Control::WriteNumeric(c) => {
                read.push(c.read_offset);
                write.push(c.write_offset);
            }
            Control::Time(c) => {
                read.extend([Some(c.hour_offset), c.minute_offset].into_iter().flatten())
            }
            Control::BooleanCompare(c) => read.push(c.read_offset),
            Control::BooleanBitmask(c) => read.push(c.read_offset),
            Control::WriteBoolean(c) => {
                read.push(c.read_offset);
                write.push(c.write_offset);
            }
            Control::SwingAxis(SwingAxisControl::Boolean(c)) => {
                Control::WriteBoolean(c.clone()).collect_offsets(read, write)
            }
            Control::SwingAxis(SwingAxisControl::Enum(c)) => {
                Control::WriteEnum(c.clone()).collect_offsets(read, write)
            }
            Control::Swing(c) => {
                for axis in [&c.horizontal, &c.vertical].into_iter().flatten() {
                    Control::SwingAxis(axis.clone()).collect_offsets(read, write);
                }
            }
            Control::Hvac(c) => {
                Control::WriteBoolean(c.power.clone()).collect_offsets(read, write);
                Control::WriteEnum(c.program.clone()).collect_offsets(read, write);
            }
            Control::Climate(c) => {
                for aspect in ClimateControl::ASPECTS {
                    if let Some(control) = c.aspect(aspect) {
                        control.collect_offsets(read, write);
                    }
                }
            }
            Control::CalculatedTimestamp(c) => {
                for source in &c.sources {
                    Control::Time(source.clone()).collect_offsets(read, write);
                }
            }
            Control::Debug(c) => read.push(c.read_offset),
        }
    }
}

/// Find a control by key, descending into climate aspects for `ac.<aspect>` paths.
pub fn find(controls: &[Control], path: &str) -> Option<Control> {
    if let Some(control) = controls.iter().find(|c| c.key() == path) {
        return Some(control.clone());
    }
    let (key, aspect) = path.split_once('.')?;
    match controls.iter().find(|c| c.key() == key)? {
        Control::Climate(climate) => climate.aspect(aspect),
        _ => None,
    }
}

impl ClimateControl {
    pub const ASPECTS: [&'static str; 5] =
        ["hvac", "target_temperature", "current_temperature", "fan_mode", "swing"];

    /// One part of the climate control as a standalone control, for writing it.
    pub fn aspect(&self, name: &str) -> Option<Control> {
        Some(match name {
            "hvac" => Control::Hvac(self.hvac.clone()),
            "target_temperature" => Control::WriteNumeric(self.target_temperature.clone()),
            "current_temperature" => Control::Numeric(self.current_temperature.clone()),
            "fan_mode" => Control::WriteEnum(self.fan_mode.clone()),
            "swing" => Control::Swing(self.swing.clone()),
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn switch() -> Control {
        Control::WriteBoolean(WriteBooleanControl {
            key: "washer_steam".to_string(),
            read_offset: 2,
            write_offset: 3,
            on: 1,
            off: 0,
        })
    }

    #[test]
    fn generic_writes_parse_their_values() {
        let control = switch();
        assert_eq!(control.kind(), "write_boolean");
        assert_eq!(control.write("on", None).unwrap(), [Command::new(3, 1)]);
        assert_eq!(control.write("false", None).unwrap(), [Command::new(3, 0)]);
        assert!(matches!(control.write("maybe", None), Err(SetError::InvalidValue { .. })));
        assert_eq!(control.read_offsets(), [2]);
        assert_eq!(control.write_offsets(), [3]);
    }

    #[test]
    fn read_only_controls_refuse_writes() {
        let control = Control::Time(TimeControl {
            key: "remaining".to_string(),
            hour_offset: 4,
            minute_offset: Some(5),
        });
        assert!(!control.is_writable());
        assert!(matches!(
            control.write("10", None),
            Err(SetError::ReadOnly { key }) if key == "remaining"
        ));
        assert_eq!(control.read_offsets(), [4, 5]);
    }

    #[test]
    fn composites_need_the_current_telegram() {
        let swing = Control::Swing(SwingControl {
            key: "swing".to_string(),
            horizontal: Some(SwingAxisControl::Boolean(WriteBooleanControl {
                key: "vane".to_string(),
                read_offset: 1,
                write_offset: 1,
                on: 1,
                off: 0,
            })),
            vertical: None,
        });
        assert!(matches!(swing.write("off", None), Err(SetError::TelegramRequired { .. })));
        assert!(matches!(
            swing.write("sideways", Some(&Telegram::new(vec![0, 0]))),
            Err(SetError::InvalidValue { .. })
        ));
        assert_eq!(
            swing.write("horizontal", Some(&Telegram::new(vec![0, 0]))).unwrap(),
            [Command::new(1, 1)]
        );
        assert_eq!(swing.options(), ["off", "horizontal"]);
    }

    #[test]
    fn values_serialize_plainly() {
        assert_eq!(serde_json::to_string(&Value::Option(None)).unwrap(), "null");
        assert_eq!(serde_json::to_string(&Value::Number(30.0)).unwrap(), "30.0");
        assert_eq!(
            serde_json::to_string(&Value::Hvac(Some(HvacMode::FanOnly))).unwrap(),
            "\"fan_only\""
        );
        assert_eq!(Value::Number(1200.0).to_string(), "1200");
        assert_eq!(Value::Minutes(137).to_string(), "137 min");
        assert_eq!(Value::Raw(0x8c).to_string(), "0x8c");
    }
}
