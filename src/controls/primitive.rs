use crate::config::BoundedOption;
use crate::controls::SetError;
use crate::controls::options::OptionTable;
use crate::telegram::{ReadError, Telegram};
use crate::wire::Command;

/// A read-only enumerated value.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumControl {
    pub key: String,
    pub read_offset: usize,
    pub options: OptionTable,
}

impl EnumControl {
    /// The name of the current option, or `None` when the appliance reports a code the
    /// configuration does not define. That happens routinely during state transitions.
    pub fn get<'a>(&'a self, telegram: &Telegram) -> Result<Option<&'a str>, ReadError> {
        Ok(self.options.name_of(telegram.clamped(self.read_offset)?))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WriteEnumControl {
    pub key: String,
    pub read_offset: usize,
    pub write_offset: u8,
    pub options: OptionTable,
}

impl WriteEnumControl {
    pub fn get<'a>(&'a self, telegram: &Telegram) -> Result<Option<&'a str>, ReadError> {
        Ok(self.options.name_of(telegram.clamped(self.read_offset)?))
    }

    pub fn set(&self, option: &str) -> Result<Command, SetError> {
        let value = self.options.value_of(option).ok_or_else(|| SetError::UnknownOption {
            key: self.key.clone(),
            option: option.to_string(),
        })?;
        Ok(Command::new(self.write_offset, value))
    }

    /// The boolean this control really is, if it has exactly two options named `…_on` and
    /// `…_off`.
    ///
    /// This is a naming heuristic: a genuine two-valued enum following the same convention will
    /// be treated as a switch too.
    pub fn as_boolean(&self) -> Option<WriteBooleanControl> {
        if self.options.len() != 2 {
            return None;
        }
        let on = self.options.iter().find(|(_, name)| name.ends_with("_on"))?.0;
        let off = self.options.iter().find(|(_, name)| name.ends_with("_off"))?.0;
        Some(WriteBooleanControl {
            key: self.key.clone(),
            read_offset: self.read_offset,
            write_offset: self.write_offset,
            on,
            off,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NumericControl {
    pub key: String,
    pub read_offset: usize,
    pub bounds: BoundedOption,
}

impl NumericControl {
    pub fn get(&self, telegram: &Telegram) -> Result<f64, ReadError> {
        Ok(f64::from(telegram.clamped(self.read_offset)?) * self.bounds.factor)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WriteNumericControl {
    pub key: String,
    pub read_offset: usize,
    pub write_offset: u8,
    pub bounds: BoundedOption,
}

impl WriteNumericControl {
    pub fn get(&self, telegram: &Telegram) -> Result<f64, ReadError> {
        Ok(f64::from(telegram.clamped(self.read_offset)?) * self.bounds.factor)
    }

    pub fn set(&self, value: f64) -> Result<Command, SetError> {
        let wire = (value / self.bounds.factor).round();
        if !(0.0..=255.0).contains(&wire) {
            return Err(SetError::InvalidValue { key: self.key.clone(), value: value.to_string() });
        }
        Ok(Command::new(self.write_offset, wire as u8))
    }

    pub fn as_read_only(&self) -> NumericControl {
        NumericControl {
            key: self.key.clone(),
            read_offset: self.read_offset,
            bounds: self.bounds.clone(),
        }
    }
}

/// A duration split over an hour byte and an optional minute byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeControl {
    pub key: String,
    pub hour_offset: usize,
    pub minute_offset: Option<usize>,
}

impl TimeControl {
    /// The duration in minutes.
    pub fn get(&self, telegram: &Telegram) -> Result<u32, ReadError> {
        let hours = u32::from(telegram.clamped(self.hour_offset)?);
        let minutes = match self.minute_offset {
            Some(offset) => u32::from(telegram.clamped(offset)?),
            None => 0,
        };
        Ok(hours * 60 + minutes)
    }
}

/// A flag that is set when a byte holds one specific raw value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompareControl {
    pub key: String,
    pub read_offset: usize,
    pub expected: u8,
}

impl CompareControl {
    pub fn get(&self, telegram: &Telegram) -> Result<bool, ReadError> {
        Ok(telegram.byte(self.read_offset)? == self.expected)
    }
}

/// One bit of a bitmask byte. Bits past the first byte are never set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitmaskControl {
    pub key: String,
    pub read_offset: usize,
    pub bit_index: u8,
}

impl BitmaskControl {
    pub fn get(&self, telegram: &Telegram) -> Result<bool, ReadError> {
        let byte = telegram.byte(self.read_offset)?;
        Ok(1u8.checked_shl(u32::from(self.bit_index)).is_some_and(|mask| byte & mask != 0))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteBooleanControl {
    pub key: String,
    pub read_offset: usize,
    pub write_offset: u8,
    pub on: u8,
    pub off: u8,
}

impl WriteBooleanControl {
    pub fn get(&self, telegram: &Telegram) -> Result<bool, ReadError> {
        Ok(telegram.clamped(self.read_offset)? == self.on)
    }

    pub fn set(&self, value: bool) -> Command {
        Command::new(self.write_offset, if value { self.on } else { self.off })
    }
}

/// The raw, unclamped byte at an offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugControl {
    pub key: String,
    pub read_offset: usize,
}

impl DebugControl {
    pub fn get(&self, telegram: &Telegram) -> Result<u8, ReadError> {
        telegram.byte(self.read_offset)
    }
}
