//! Ceiling dispatch — `spec.md` §4.E step 5.

use crate::proof::CeilingCheck;
use chrono::{DateTime, Utc};
use intersect_core::Action;
use intersect_core::Ceiling;

/// A genuinely-exceeded ceiling denies the whole authorization. A
/// malformed configured value only fails its own check entry and is
/// recorded, not propagated to the overall decision — per `spec.md`
/// §4.E: "Malformed value ⇒ fail this check (not the whole
/// authorization)".
pub enum CeilingOutcome {
    Pass,
    Malformed,
    Exceeded,
}

pub fn evaluate_ceiling(
    ceiling: &Ceiling,
    action: &Action,
    now: DateTime<Utc>,
) -> (CeilingCheck, CeilingOutcome) {
    match ceiling {
        Ceiling::TimeWindow { value } => evaluate_time_window(value, action, now),
        Ceiling::Duration { value, unit } => evaluate_duration(*value, unit, action),
        Ceiling::MaxEvents { value, unit } => evaluate_max_events(*value, unit, action),
        Ceiling::Unknown => (
            CeilingCheck {
                ceiling_description: "unknown".to_string(),
                passed: true,
                reason: Some("unknown ceiling type — passed by default".to_string()),
            },
            CeilingOutcome::Pass,
        ),
    }
}

fn evaluate_time_window(value: &str, action: &Action, now: DateTime<Utc>) -> (CeilingCheck, CeilingOutcome) {
    let description = format!("time_window {value}");
    let parsed = parse_window(value);
    let (start, end) = match parsed {
        Some(bounds) => bounds,
        None => {
            return (
                CeilingCheck {
                    ceiling_description: description,
                    passed: false,
                    reason: Some(format!("malformed time_window ceiling value: {value}")),
                },
                CeilingOutcome::Malformed,
            )
        }
    };

    let requested_hour = action
        .parameters
        .get("time_window")
        .and_then(|v| v.as_str())
        .and_then(|s| s.split(':').next())
        .and_then(|h| h.parse::<u32>().ok())
        .unwrap_or_else(|| now.format("%H").to_string().parse().unwrap_or(0));

    let in_window = if start <= end {
        requested_hour >= start && requested_hour < end
    } else {
        // Window wraps past midnight.
        requested_hour >= start || requested_hour < end
    };

    if in_window {
        (
            CeilingCheck {
                ceiling_description: description,
                passed: true,
                reason: None,
            },
            CeilingOutcome::Pass,
        )
    } else {
        (
            CeilingCheck {
                ceiling_description: description,
                passed: false,
                reason: Some(format!("hour {requested_hour} outside allowed window {value}")),
            },
            CeilingOutcome::Exceeded,
        )
    }
}

fn parse_window(value: &str) -> Option<(u32, u32)> {
    let (start, end) = value.split_once('-')?;
    let parse_hour = |s: &str| -> Option<u32> { s.split(':').next()?.parse::<u32>().ok() };
    Some((parse_hour(start)?, parse_hour(end)?))
}

fn evaluate_duration(limit: i64, unit: &str, action: &Action) -> (CeilingCheck, CeilingOutcome) {
    let description = format!("duration <= {limit} {unit}");
    let requested = action
        .parameters
        .get("duration")
        .and_then(|v| v.as_i64())
        .unwrap_or(1);
    if requested <= limit {
        (
            CeilingCheck {
                ceiling_description: description,
                passed: true,
                reason: None,
            },
            CeilingOutcome::Pass,
        )
    } else {
        (
            CeilingCheck {
                ceiling_description: description,
                passed: false,
                reason: Some(format!("requested duration {requested} exceeds ceiling {limit} {unit}")),
            },
            CeilingOutcome::Exceeded,
        )
    }
}

fn evaluate_max_events(limit: i64, unit: &str, action: &Action) -> (CeilingCheck, CeilingOutcome) {
    let description = format!("max_events <= {limit} {unit}");
    let requested = action
        .parameters
        .get("event_count")
        .and_then(|v| v.as_i64())
        .unwrap_or(1);
    if requested <= limit {
        (
            CeilingCheck {
                ceiling_description: description,
                passed: true,
                reason: None,
            },
            CeilingOutcome::Pass,
        )
    } else {
        (
            CeilingCheck {
                ceiling_description: description,
                passed: false,
                reason: Some(format!("requested event count {requested} exceeds ceiling {limit} {unit}")),
            },
            CeilingOutcome::Exceeded,
        )
    }
}
