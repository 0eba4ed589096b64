//! Controls synthesized from the primitive controls of an air conditioner.

use crate::controls::SetError;
use crate::controls::primitive::{
    NumericControl, WriteBooleanControl, WriteEnumControl, WriteNumericControl,
};
use crate::telegram::{ReadError, Telegram};
use crate::wire::Command;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    serde::Serialize,
    strum::Display,
    strum::EnumString,
    strum::VariantArray,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum HvacMode {
    Cool,
    Auto,
    Dry,
    Heat,
    FanOnly,
    Off,
}

/// Program option suffixes and the mode each one selects.
const MODE_TAGS: [(&str, HvacMode); 6] = [
    ("_cooling", HvacMode::Cool),
    ("_auto", HvacMode::Auto),
    ("_dry", HvacMode::Dry),
    ("_dehumidification", HvacMode::Dry),
    ("_heating", HvacMode::Heat),
    ("_fan", HvacMode::FanOnly),
];

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    serde::Serialize,
    strum::Display,
    strum::EnumString,
    strum::VariantArray,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SwingMode {
    Off,
    Both,
    Horizontal,
    Vertical,
}

/// One physical vane axis, either a plain switch or a multi-position selection.
#[derive(Debug, Clone, PartialEq)]
pub enum SwingAxisControl {
    Boolean(WriteBooleanControl),
    Enum(WriteEnumControl),
}

impl SwingAxisControl {
    pub fn key(&self) -> &str {
        match self {
            Self::Boolean(c) => &c.key,
            Self::Enum(c) => &c.key,
        }
    }

    /// Whether the axis swings. A multi-position axis counts as on unless its current option
    /// is an `…_off` one.
    pub fn get(&self, telegram: &Telegram) -> Result<bool, ReadError> {
        match self {
            Self::Boolean(c) => c.get(telegram),
            Self::Enum(c) => Ok(!c.get(telegram)?.is_some_and(|name| name.ends_with("_off"))),
        }
    }

    pub fn set(&self, on: bool, telegram: &Telegram) -> Result<Vec<Command>, SetError> {
        if self.get(telegram)? == on {
            return Ok(Vec::new());
        }
        match self {
            Self::Boolean(c) => Ok(vec![c.set(on)]),
            Self::Enum(c) => {
                let suffix = if on { "_auto" } else { "_off" };
                let option = c.options.names().find(|name| name.ends_with(suffix)).ok_or_else(
                    || SetError::MissingSwingOption { key: c.key.clone(), suffix },
                )?;
                Ok(vec![c.set(option)?])
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwingControl {
    pub key: String,
    pub horizontal: Option<SwingAxisControl>,
    pub vertical: Option<SwingAxisControl>,
}

impl SwingControl {
    pub fn get(&self, telegram: &Telegram) -> Result<SwingMode, ReadError> {
        let horizontal = axis_state(self.horizontal.as_ref(), telegram)?;
        let vertical = axis_state(self.vertical.as_ref(), telegram)?;
        Ok(match (horizontal, vertical) {
            (true, true) => SwingMode::Both,
            (true, false) => SwingMode::Horizontal,
            (false, true) => SwingMode::Vertical,
            (false, false) => SwingMode::Off,
        })
    }

    /// Modes reachable with the axes this appliance has.
    pub fn options(&self) -> Vec<SwingMode> {
        match (&self.horizontal, &self.vertical) {
            (Some(_), Some(_)) => {
                vec![SwingMode::Off, SwingMode::Both, SwingMode::Horizontal, SwingMode::Vertical]
            }
            (Some(_), None) => vec![SwingMode::Off, SwingMode::Horizontal],
            (None, Some(_)) => vec![SwingMode::Off, SwingMode::Vertical],
            (None, None) => Vec::new(),
        }
    }

    /// Commands for the horizontal axis come before the vertical ones. Setting the mode already
    /// in effect emits nothing, even without any axes.
    pub fn set(&self, mode: SwingMode, telegram: &Telegram) -> Result<Vec<Command>, SetError> {
        if self.get(telegram)? == mode {
            return Ok(Vec::new());
        }
        if !self.options().contains(&mode) {
            return Err(SetError::UnsupportedMode { key: self.key.clone(), mode: mode.to_string() });
        }
        let (horizontal, vertical) = match mode {
            SwingMode::Off => (false, false),
            SwingMode::Both => (true, true),
            SwingMode::Horizontal => (true, false),
            SwingMode::Vertical => (false, true),
        };
        let mut commands = Vec::new();
        if let Some(axis) = &self.horizontal {
            commands.extend(axis.set(horizontal, telegram)?);
        }
        if let Some(axis) = &self.vertical {
            commands.extend(axis.set(vertical, telegram)?);
        }
        Ok(commands)
    }
}

fn axis_state(axis: Option<&SwingAxisControl>, telegram: &Telegram) -> Result<bool, ReadError> {
    match axis {
        Some(axis) => axis.get(telegram),
        None => Ok(false),
    }
}

/// Power switch and program selection presented as one operating mode.
#[derive(Debug, Clone, PartialEq)]
pub struct HvacControl {
    pub key: String,
    pub power: WriteBooleanControl,
    pub program: WriteEnumControl,
    modes: Vec<(HvacMode, String)>,
}

impl HvacControl {
    pub fn new(key: String, power: WriteBooleanControl, program: WriteEnumControl) -> Self {
        let mut modes: Vec<(HvacMode, String)> = Vec::new();
        for name in program.options.names() {
            let Some(&(_, mode)) = MODE_TAGS.iter().find(|(tag, _)| name.ends_with(tag)) else {
                continue;
            };
            if modes.iter().all(|(m, _)| *m != mode) {
                modes.push((mode, name.to_string()));
            }
        }
        Self { key, power, program, modes }
    }

    fn program_mode(&self, telegram: &Telegram) -> Result<Option<HvacMode>, ReadError> {
        let Some(option) = self.program.get(telegram)? else {
            return Ok(None);
        };
        Ok(self.modes.iter().find(|(_, name)| name == option).map(|(mode, _)| *mode))
    }

    /// `None` when the appliance is on but runs a program that maps to no mode.
    pub fn get(&self, telegram: &Telegram) -> Result<Option<HvacMode>, ReadError> {
        if !self.power.get(telegram)? {
            return Ok(Some(HvacMode::Off));
        }
        self.program_mode(telegram)
    }

    pub fn options(&self) -> Vec<HvacMode> {
        self.modes.iter().map(|(mode, _)| *mode).chain([HvacMode::Off]).collect()
    }

    /// Power has to be asserted before the program is selected, otherwise the appliance ignores
    /// the selection. An appliance that is off is always sent the program too.
    pub fn set(&self, mode: HvacMode, telegram: &Telegram) -> Result<Vec<Command>, SetError> {
        if mode == HvacMode::Off {
            return Ok(vec![self.power.set(false)]);
        }
        let Some((_, option)) = self.modes.iter().find(|(m, _)| *m == mode) else {
            return Err(SetError::UnsupportedMode { key: self.key.clone(), mode: mode.to_string() });
        };
        let mut commands = Vec::with_capacity(2);
        if !self.power.get(telegram)? {
            commands.push(self.power.set(true));
        }
        if self.get(telegram)? != Some(mode) {
            commands.push(self.program.set(option)?);
        }
        Ok(commands)
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ClimateState {
    pub hvac: Option<HvacMode>,
    pub target_temperature: f64,
    pub current_temperature: f64,
    pub fan_mode: Option<String>,
    pub swing: SwingMode,
}

/// Everything an air conditioner reports, read at once.
///
/// There is no single write; each aspect is written through its own accessor.
#[derive(Debug, Clone, PartialEq)]
pub struct ClimateControl {
    pub key: String,
    pub hvac: HvacControl,
    pub target_temperature: WriteNumericControl,
    pub current_temperature: NumericControl,
    pub fan_mode: WriteEnumControl,
    pub swing: SwingControl,
}

impl ClimateControl {
    pub fn get(&self, telegram: &Telegram) -> Result<ClimateState, ReadError> {
        Ok(ClimateState {
            hvac: self.hvac.get(telegram)?,
            target_temperature: self.target_temperature.get(telegram)?,
            current_temperature: self.current_temperature.get(telegram)?,
            fan_mode: self.fan_mode.get(telegram)?.map(str::to_string),
            swing: self.swing.get(telegram)?,
        })
    }
}
