use crate::time::error::Error;
use core::str::FromStr;
use lazy_static::*;
use regex::Regex;
use std::time::Duration;

lazy_static! {
    static ref DURATION_REGEX: Regex =
        Regex::new(r"^(?:\d+(?:ns|us|ms|s|m|h|d))+$").expect("Regex compilation error");
    static ref COMPONENT_REGEX: Regex =
        Regex::new(r"(?P<value>\d+)(?P<unit>ns|us|ms|s|m|h|d)").expect("Regex compilation error");
}

/// A human written duration such as `200ms`, `5s` or `1h30m`.
#[derive(Debug, PartialEq)]
pub struct DurationUnit {
    components: Vec<(u64, TimeUnit)>,
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum TimeUnit {
    Nanosecond,
    Microsecond,
    Millisecond,
    Second,
    Minute,
    Hour,
    Day,
}

impl TimeUnit {
    fn duration(self, value: u64) -> Option<Duration> {
        let duration = match self {
            TimeUnit::Nanosecond => Duration::from_nanos(value),
            TimeUnit::Microsecond => Duration::from_micros(value),
            TimeUnit::Millisecond => Duration::from_millis(value),
            TimeUnit::Second => Duration::from_secs(value),
            TimeUnit::Minute => Duration::from_secs(value.checked_mul(60)?),
            TimeUnit::Hour => Duration::from_secs(value.checked_mul(60 * 60)?),
            TimeUnit::Day => Duration::from_secs(value.checked_mul(60 * 60 * 24)?),
        };
        Some(duration)
    }
}

impl DurationUnit {
    pub fn to_duration(&self) -> Option<Duration> {
        self.components
            .iter()
            .try_fold(Duration::default(), |total, (value, unit)| {
                total.checked_add(unit.duration(*value)?)
            })
    }
}

impl FromStr for DurationUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let compact: String = s.split_whitespace().collect();
        if !DURATION_REGEX.is_match(&compact) {
            return Err(Error::Syntax(s.to_owned()));
        }
        let mut components = vec![];
        for caps in COMPONENT_REGEX.captures_iter(&compact) {
            let value = caps["value"]
                .parse::<u64>()
                .map_err(|_| Error::Overflow(s.to_owned()))?;
            let unit = caps["unit"].parse::<TimeUnit>()?;
            components.push((value, unit));
        }
        Ok(Self { components })
    }
}

impl FromStr for TimeUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ns" | "nanosecond" | "nanos" | "nanoseconds" => Ok(TimeUnit::Nanosecond),
            "us" | "microsecond" | "micros" | "microseconds" => Ok(TimeUnit::Microsecond),
            "ms" | "millisecond" | "millis" | "milliseconds" => Ok(TimeUnit::Millisecond),
            "s" | "second" | "secs" | "seconds" => Ok(TimeUnit::Second),
            "m" | "minute" | "mins" | "minutes" => Ok(TimeUnit::Minute),
            "h" | "hour" | "hours" => Ok(TimeUnit::Hour),
            "d" | "day" | "days" => Ok(TimeUnit::Day),
            _ => Err(Error::UnitNotSupported(s.to_owned())),
        }
    }
}

/// Parses a duration string straight into [`Duration`].
pub fn parse_duration(s: &str) -> Result<Duration, Error> {
    s.parse::<DurationUnit>()?
        .to_duration()
        .ok_or_else(|| Error::Overflow(s.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::{parse_duration, DurationUnit, TimeUnit};
    use crate::time::error::Error;
    use std::time::Duration;

    #[test]
    fn test_building_time_unit_from_string() {
        let cases = [
            ("ns", TimeUnit::Nanosecond),
            ("micros", TimeUnit::Microsecond),
            ("ms", TimeUnit::Millisecond),
            ("seconds", TimeUnit::Second),
            ("m", TimeUnit::Minute),
            ("hour", TimeUnit::Hour),
            ("d", TimeUnit::Day),
        ];
        for (value, expected) in cases {
            assert_eq!(value.parse::<TimeUnit>(), Ok(expected));
        }
        assert_eq!(
            "fortnight".parse::<TimeUnit>(),
            Err(Error::UnitNotSupported("fortnight".to_owned()))
        );
    }

    #[test]
    fn test_conversion_duration_unit_to_duration() {
        assert_eq!(parse_duration("200ms"), Ok(Duration::from_millis(200)));
        assert_eq!(parse_duration("1m30s"), Ok(Duration::from_secs(90)));
        assert_eq!(parse_duration("1h 5m"), Ok(Duration::from_secs(3900)));
    }

    #[test]
    fn test_rejects_malformed_durations() {
        assert!("".parse::<DurationUnit>().is_err());
        assert!("ms".parse::<DurationUnit>().is_err());
        assert!("10 parsecs".parse::<DurationUnit>().is_err());
        assert!("5s and more".parse::<DurationUnit>().is_err());
    }
}
