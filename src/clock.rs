use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SimError;

/// How much game time one tick represents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TickRate {
    Day,
    Week,
    #[default]
    Month,
    Year,
}

impl TickRate {
    /// Days represented by one tick.
    pub fn multiplier(self) -> f64 {
        match self {
            TickRate::Day => 1.0,
            TickRate::Week => 7.0,
            TickRate::Month => 30.0,
            TickRate::Year => 365.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TickRate::Day => "day",
            TickRate::Week => "week",
            TickRate::Month => "month",
            TickRate::Year => "year",
        }
    }
}

impl fmt::Display for TickRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TickRate {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "day" => Ok(TickRate::Day),
            "week" => Ok(TickRate::Week),
            "month" => Ok(TickRate::Month),
            "year" => Ok(TickRate::Year),
            _ => Err(SimError::UnknownTickRate {
                value: s.to_string(),
            }),
        }
    }
}

/// Named real-time speeds for the automatic ticker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedLevel {
    Slowest,
    Slow,
    Normal,
    Fast,
    Fastest,
}

impl SpeedLevel {
    pub fn interval(self) -> Duration {
        let millis = match self {
            SpeedLevel::Slowest => 1000,
            SpeedLevel::Slow => 750,
            SpeedLevel::Normal => 500,
            SpeedLevel::Fast => 250,
            SpeedLevel::Fastest => 100,
        };
        Duration::from_millis(millis)
    }
}

/// Game calendar: seven days a week, four weeks a month, twelve months a year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameTime {
    pub day: u32,
    pub week: u32,
    pub month: u32,
    pub year: u32,
}

impl Default for GameTime {
    fn default() -> Self {
        Self {
            day: 1,
            week: 1,
            month: 1,
            year: 0,
        }
    }
}

impl GameTime {
    pub fn advance(&mut self, rate: TickRate) {
        match rate {
            TickRate::Day => self.advance_day(),
            TickRate::Week => self.advance_week(),
            TickRate::Month => self.advance_month(),
            TickRate::Year => self.year += 1,
        }
    }

    fn advance_day(&mut self) {
        self.day += 1;
        if self.day > 7 {
            self.day = 1;
            self.advance_week();
        }
    }

    fn advance_week(&mut self) {
        self.week += 1;
        if self.week > 4 {
            self.week = 1;
            self.advance_month();
        }
    }

    fn advance_month(&mut self) {
        self.month += 1;
        if self.month > 12 {
            self.month = 1;
            self.year += 1;
        }
    }
}

impl fmt::Display for GameTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "year {} month {} week {} day {}",
            self.year, self.month, self.week, self.day
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn days_roll_over_into_weeks_and_months() {
        let mut time = GameTime::default();
        for _ in 0..7 {
            time.advance(TickRate::Day);
        }
        assert_eq!((time.day, time.week), (1, 2));
        for _ in 0..3 {
            time.advance(TickRate::Week);
        }
        assert_eq!((time.week, time.month), (1, 2));
    }

    #[test]
    fn twelve_months_make_a_year() {
        let mut time = GameTime::default();
        for _ in 0..12 {
            time.advance(TickRate::Month);
        }
        assert_eq!(time, GameTime { day: 1, week: 1, month: 1, year: 1 });
    }

    #[test]
    fn tick_rates_parse_and_scale() {
        assert_eq!("Week".parse::<TickRate>().unwrap().multiplier(), 7.0);
        assert_eq!(TickRate::default(), TickRate::Month);
        assert!(matches!(
            "fortnight".parse::<TickRate>(),
            Err(SimError::UnknownTickRate { .. })
        ));
    }
}
