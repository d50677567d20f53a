//! 5-field cron expressions, evaluated at minute granularity.
//!
//! Fields: minute, hour, day-of-month, month, day-of-week. Each field
//! accepts `*`, lists (`a,b,c`), ranges (`a-b`), and steps (`*/n`,
//! `a-b/n`). Day-of-week takes 0–7 where both 0 and 7 mean Sunday.
//! Like classic cron, when day-of-month and day-of-week are both
//! restricted a time matches if either does.

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike};
use thiserror::Error;

/// Cron parse errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CronError {
    #[error("expected 5 fields, got {0}")]
    FieldCount(usize),
    #[error("invalid field {field:?}: {reason}")]
    InvalidField { field: String, reason: String },
}

/// Bitmask of allowed values for one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FieldMask {
    bits: u64,
    /// Whether the field was written as `*` (no step). Matters for the
    /// day-of-month / day-of-week interaction.
    any: bool,
}

impl FieldMask {
    fn contains(&self, value: u32) -> bool {
        value < 64 && self.bits & (1 << value) != 0
    }
}

fn parse_field(spec: &str, min: u32, max: u32) -> Result<FieldMask, CronError> {
    let invalid = |reason: &str| CronError::InvalidField {
        field: spec.to_string(),
        reason: reason.to_string(),
    };

    if spec.is_empty() {
        return Err(invalid("empty"));
    }

    let mut bits = 0u64;
    let mut any = false;
    for part in spec.split(',') {
        let (range, step) = match part.split_once('/') {
            Some((range, step)) => {
                let step: u32 = step.parse().map_err(|_| invalid("bad step"))?;
                if step == 0 {
                    return Err(invalid("step must be positive"));
                }
                (range, step)
            }
            None => (part, 1),
        };

        let (lo, hi) = if range == "*" {
            if step == 1 && spec == "*" {
                any = true;
            }
            (min, max)
        } else if let Some((lo, hi)) = range.split_once('-') {
            let lo: u32 = lo.parse().map_err(|_| invalid("bad range start"))?;
            let hi: u32 = hi.parse().map_err(|_| invalid("bad range end"))?;
            (lo, hi)
        } else {
            let v: u32 = range.parse().map_err(|_| invalid("bad value"))?;
            (v, v)
        };

        if lo > hi {
            return Err(invalid("range start after end"));
        }
        if lo < min || hi > max {
            return Err(invalid("value out of range"));
        }
        let mut v = lo;
        while v <= hi {
            bits |= 1 << v;
            v += step;
        }
    }

    Ok(FieldMask { bits, any })
}

/// A parsed 5-field cron expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpr {
    minute: FieldMask,
    hour: FieldMask,
    day_of_month: FieldMask,
    month: FieldMask,
    day_of_week: FieldMask,
    source: String,
}

impl CronExpr {
    pub fn parse(expr: &str) -> Result<Self, CronError> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(CronError::FieldCount(fields.len()));
        }

        let mut day_of_week = parse_field(fields[4], 0, 7)?;
        // 7 is an alias for Sunday.
        if day_of_week.contains(7) {
            day_of_week.bits |= 1;
        }

        Ok(Self {
            minute: parse_field(fields[0], 0, 59)?,
            hour: parse_field(fields[1], 0, 23)?,
            day_of_month: parse_field(fields[2], 1, 31)?,
            month: parse_field(fields[3], 1, 12)?,
            day_of_week,
            source: expr.to_string(),
        })
    }

    /// The expression as written.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether the given wall-clock minute matches.
    pub fn matches<Tz: TimeZone>(&self, t: &DateTime<Tz>) -> bool {
        if !self.minute.contains(t.minute())
            || !self.hour.contains(t.hour())
            || !self.month.contains(t.month())
        {
            return false;
        }

        let dom_ok = self.day_of_month.contains(t.day());
        let dow_ok = self.day_of_week.contains(t.weekday().num_days_from_sunday());

        // Classic cron: both restricted → OR; otherwise both must hold
        // (an unrestricted field always holds).
        if !self.day_of_month.any && !self.day_of_week.any {
            dom_ok || dow_ok
        } else {
            dom_ok && dow_ok
        }
    }

    /// First matching minute strictly after `after`, scanning
    /// minute-by-minute with a one-year horizon.
    pub fn next_after<Tz: TimeZone>(&self, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        let mut t = truncate_to_minute(after) + Duration::minutes(1);
        // 366 days of minutes covers every yearly pattern.
        for _ in 0..(366 * 24 * 60) {
            if self.matches(&t) {
                return Some(t);
            }
            t += Duration::minutes(1);
        }
        None
    }
}

fn truncate_to_minute<Tz: TimeZone>(t: &DateTime<Tz>) -> DateTime<Tz> {
    t.clone() - Duration::seconds(t.second() as i64)
        - Duration::nanoseconds(t.nanosecond() as i64)
}

#[cfg(test)]
#[path = "cron_tests.rs"]
mod tests;
