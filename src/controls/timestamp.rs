use jiff::Timestamp;

use crate::controls::primitive::TimeControl;
use crate::telegram::{ReadError, Telegram};

/// The wall-clock instant a countdown reaches zero.
///
/// Appliances only report minutes left, so the instant is recomputed on every read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalculatedTimestampControl {
    pub key: String,
    pub sources: Vec<TimeControl>,
    /// Keys of the controls whose updates change this timestamp.
    pub subscribers: Vec<String>,
}

impl CalculatedTimestampControl {
    pub fn new(key: String, sources: Vec<TimeControl>, subscribers: Vec<String>) -> Self {
        Self { key, sources, subscribers }
    }

    pub fn get(&self, telegram: &Telegram) -> Result<Option<Timestamp>, ReadError> {
        self.get_at(telegram, Timestamp::now())
    }

    /// `None` when no countdown is running.
    pub fn get_at(
        &self,
        telegram: &Telegram,
        now: Timestamp,
    ) -> Result<Option<Timestamp>, ReadError> {
        let mut minutes = 0i64;
        for source in &self.sources {
            minutes += i64::from(source.get(telegram)?);
        }
        if minutes < 1 {
            return Ok(None);
        }
        let now = now.as_second();
        let start_of_minute = now - now.rem_euclid(60);
        Timestamp::from_second(start_of_minute + minutes * 60)
            .map(Some)
            .map_err(ReadError::Timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn control() -> CalculatedTimestampControl {
        CalculatedTimestampControl::new(
            "delay".to_string(),
            vec![
                TimeControl { key: "delay".to_string(), hour_offset: 1, minute_offset: Some(2) },
                TimeControl {
                    key: "remaining".to_string(),
                    hour_offset: 3,
                    minute_offset: Some(4),
                },
            ],
            vec!["remaining".to_string()],
        )
    }

    #[test]
    fn sums_sources_from_the_start_of_the_minute() {
        let now: Timestamp = "2024-03-01T10:15:42Z".parse().unwrap();
        let telegram = Telegram::new(vec![0, 0x81, 0x0a, 2, 0x05]);
        let at = control().get_at(&telegram, now).unwrap().unwrap();
        assert_eq!(at, "2024-03-01T13:30:00Z".parse::<Timestamp>().unwrap());
    }

    #[test]
    fn no_countdown_is_none() {
        let now: Timestamp = "2024-03-01T10:15:42Z".parse().unwrap();
        let telegram = Telegram::new(vec![0, 0x80, 0, 0, 0]);
        assert_eq!(control().get_at(&telegram, now).unwrap(), None);
    }

    #[test]
    fn short_telegrams_fail() {
        let telegram = Telegram::new(vec![0, 0, 0]);
        assert!(matches!(control().get(&telegram), Err(ReadError::OutOfBounds { offset: 3, .. })));
    }
}
