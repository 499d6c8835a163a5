use serde::{Deserialize, Serialize};

use super::snapshot::TimerMode;
use crate::error::ValidationError;

/// Durations and cadence the engine reads at every mode transition.
///
/// All durations are whole minutes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSettings {
    /// Focus lengths the user may pick from.
    pub focus_options: Vec<u32>,
    /// Short-break lengths the user may pick from.
    pub short_break_options: Vec<u32>,
    /// Focus length loaded after every break.
    pub focus_minutes: u32,
    /// Short-break length loaded after a focus interval that is not a milestone.
    pub short_break_minutes: u32,
    pub long_break_minutes: u32,
    /// Completed focus intervals that trigger a long break.
    pub cycles_before_long_break: u32,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            focus_options: vec![15, 25, 30, 45, 50, 60],
            short_break_options: vec![5, 10, 15],
            focus_minutes: 25,
            short_break_minutes: 5,
            long_break_minutes: 15,
            cycles_before_long_break: 4,
        }
    }
}

impl TimerSettings {
    /// Configured duration in seconds for `mode`.
    pub fn duration_secs(&self, mode: TimerMode) -> u32 {
        let minutes = match mode {
            TimerMode::Focus => self.focus_minutes,
            TimerMode::ShortBreak => self.short_break_minutes,
            TimerMode::LongBreak => self.long_break_minutes,
        };
        minutes.saturating_mul(60).max(1)
    }

    pub fn allows_focus(&self, minutes: u32) -> bool {
        self.focus_options.contains(&minutes)
    }

    pub fn allows_short_break(&self, minutes: u32) -> bool {
        self.short_break_options.contains(&minutes)
    }

    /// Check internal consistency.
    ///
    /// # Errors
    /// Returns a [`ValidationError`] for empty option lists, zero durations,
    /// defaults missing from their option list, or a zero cycle count.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.focus_options.is_empty() {
            return Err(ValidationError::EmptyCollection("focus_options".into()));
        }
        if self.short_break_options.is_empty() {
            return Err(ValidationError::EmptyCollection(
                "short_break_options".into(),
            ));
        }
        let all_positive = self
            .focus_options
            .iter()
            .chain(self.short_break_options.iter())
            .chain([self.long_break_minutes].iter())
            .all(|&m| m > 0);
        if !all_positive {
            return Err(invalid("durations", "every duration must be at least one minute"));
        }
        if !self.allows_focus(self.focus_minutes) {
            return Err(invalid(
                "focus_minutes",
                &format!("{} is not one of {:?}", self.focus_minutes, self.focus_options),
            ));
        }
        if !self.allows_short_break(self.short_break_minutes) {
            return Err(invalid(
                "short_break_minutes",
                &format!(
                    "{} is not one of {:?}",
                    self.short_break_minutes, self.short_break_options
                ),
            ));
        }
        if self.cycles_before_long_break == 0 {
            return Err(invalid("cycles_before_long_break", "must be at least 1"));
        }
        Ok(())
    }
}

fn invalid(field: &str, message: &str) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.into(),
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let s = TimerSettings::default();
        assert!(s.validate().is_ok());
        assert_eq!(s.duration_secs(TimerMode::Focus), 25 * 60);
        assert_eq!(s.duration_secs(TimerMode::ShortBreak), 5 * 60);
        assert_eq!(s.duration_secs(TimerMode::LongBreak), 15 * 60);
    }

    #[test]
    fn default_outside_options_is_rejected() {
        let s = TimerSettings {
            focus_minutes: 26,
            ..TimerSettings::default()
        };
        assert!(matches!(
            s.validate(),
            Err(ValidationError::InvalidValue { ref field, .. }) if field == "focus_minutes"
        ));
    }

    #[test]
    fn empty_options_are_rejected() {
        let s = TimerSettings {
            short_break_options: vec![],
            ..TimerSettings::default()
        };
        assert!(matches!(s.validate(), Err(ValidationError::EmptyCollection(_))));
    }

    #[test]
    fn zero_cycles_is_rejected() {
        let s = TimerSettings {
            cycles_before_long_break: 0,
            ..TimerSettings::default()
        };
        assert!(s.validate().is_err());
    }
}
