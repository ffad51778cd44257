//! Configuration validation

use crate::schema::{RawAmount, RawConfig, RawDays, RawInstructor, RawSlotGroup};
use chrono::{NaiveDate, Weekday};
use mentora_api::parse_session_count;
use mentora_util::{parse_weekday, Money, WallClock};
use std::collections::HashSet;
use thiserror::Error;

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Duplicate {kind} ID: {id}")]
    DuplicateId { kind: &'static str, id: String },

    #[error("Package '{package_id}': {message}")]
    PackageError { package_id: String, message: String },

    #[error("Service '{service_id}': {message}")]
    ServiceError { service_id: String, message: String },

    #[error("Instructor '{instructor_id}': {message}")]
    InstructorError {
        instructor_id: String,
        message: String,
    },

    #[error("Invalid time format '{value}': {message}")]
    InvalidTimeFormat { value: String, message: String },

    #[error("Global config error: {0}")]
    GlobalError(String),
}

/// Validate a raw configuration
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    errors.extend(duplicate_ids("package", config.packages.iter().map(|p| &p.id)));
    errors.extend(duplicate_ids("service", config.services.iter().map(|s| &s.id)));
    errors.extend(duplicate_ids("instructor", config.instructors.iter().map(|i| &i.id)));

    if config.service.sweep_interval_seconds == Some(0) {
        errors.push(ValidationError::GlobalError(
            "sweep_interval_seconds must be greater than 0".into(),
        ));
    }
    if config.service.scheduling_horizon_days == Some(0) {
        errors.push(ValidationError::GlobalError(
            "scheduling_horizon_days must be greater than 0".into(),
        ));
    }
    if config.live.permission_timeout_seconds == Some(0) {
        errors.push(ValidationError::GlobalError(
            "permission_timeout_seconds must be greater than 0".into(),
        ));
    }

    for package in &config.packages {
        if parse_session_count(&package.sessions).is_none() {
            errors.push(ValidationError::PackageError {
                package_id: package.id.clone(),
                message: format!("cannot read a session count from '{}'", package.sessions),
            });
        }
        if let Err(message) = parse_price(&package.price) {
            errors.push(ValidationError::PackageError {
                package_id: package.id.clone(),
                message,
            });
        }
    }

    for service in &config.services {
        if let Err(message) = parse_price(&service.price) {
            errors.push(ValidationError::ServiceError {
                service_id: service.id.clone(),
                message,
            });
        }
    }

    for instructor in &config.instructors {
        errors.extend(validate_instructor(instructor, config));
    }

    errors
}

fn duplicate_ids<'a>(
    kind: &'static str,
    ids: impl Iterator<Item = &'a String>,
) -> Vec<ValidationError> {
    let mut seen = HashSet::new();
    ids.filter(|id| !seen.insert(*id))
        .map(|id| ValidationError::DuplicateId {
            kind,
            id: id.clone(),
        })
        .collect()
}

fn validate_instructor(instructor: &RawInstructor, config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let error = |message: String| ValidationError::InstructorError {
        instructor_id: instructor.id.clone(),
        message,
    };

    for (package_id, rate) in &instructor.package_rates {
        if !config.packages.iter().any(|p| &p.id == package_id) {
            errors.push(error(format!("rate for unknown package '{}'", package_id)));
        }
        if let Err(e) = parse_price(rate) {
            errors.push(error(format!("package rate '{}': {}", package_id, e)));
        }
    }

    for (service_id, rate) in &instructor.service_rates {
        if !config.services.iter().any(|s| &s.id == service_id) {
            errors.push(error(format!("rate for unknown service '{}'", service_id)));
        }
        if let Err(e) = parse_price(rate) {
            errors.push(error(format!("service rate '{}': {}", service_id, e)));
        }
    }

    for group in &instructor.availability {
        errors.extend(validate_slot_group(group, &instructor.id));
    }

    errors
}

fn validate_slot_group(group: &RawSlotGroup, instructor_id: &str) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let error = |message: String| ValidationError::InstructorError {
        instructor_id: instructor_id.to_string(),
        message,
    };

    match (&group.days, &group.date) {
        (Some(days), None) => {
            if let Err(e) = parse_days(days) {
                errors.push(error(e));
            }
        }
        (None, Some(date)) => {
            if let Err(e) = parse_date(date) {
                errors.push(error(e));
            }
        }
        (Some(_), Some(_)) => errors.push(error(
            "availability group must set either 'days' or 'date', not both".into(),
        )),
        (None, None) => errors.push(error(
            "availability group must set 'days' or 'date'".into(),
        )),
    }

    if group.times.is_empty() {
        errors.push(error("availability group has no times".into()));
    }

    for time in &group.times {
        if let Err(message) = WallClock::parse(time) {
            errors.push(ValidationError::InvalidTimeFormat {
                value: time.clone(),
                message,
            });
        }
    }

    errors
}

/// Parse a weekday selector
pub fn parse_days(days: &RawDays) -> Result<Vec<Weekday>, String> {
    match days {
        RawDays::Preset(preset) => match preset.to_lowercase().as_str() {
            "all" | "every" | "daily" => Ok(vec![
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
                Weekday::Sat,
                Weekday::Sun,
            ]),
            single => parse_weekday(single)
                .map(|d| vec![d])
                .ok_or_else(|| format!("Unknown day preset: {}", preset)),
        },
        RawDays::List(list) => list
            .iter()
            .map(|day| parse_weekday(day).ok_or_else(|| format!("Unknown day: {}", day)))
            .collect(),
    }
}

/// Parse a YYYY-MM-DD date
pub fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| format!("Invalid date '{}', expected YYYY-MM-DD", s))
}

/// Parse an amount written in TOML
pub fn parse_amount(raw: &RawAmount) -> Result<Money, String> {
    match raw {
        RawAmount::Integer(n) => n
            .checked_mul(100)
            .map(Money::from_minor)
            .ok_or_else(|| format!("amount {} is out of range", n)),
        RawAmount::Float(f) if f.is_finite() => Money::parse(&f.to_string()).map_err(|e| e.to_string()),
        RawAmount::Float(f) => Err(format!("amount {} is not a number", f)),
        RawAmount::Text(s) => Money::parse(s).map_err(|e| e.to_string()),
    }
}

/// Parse a non-negative price or rate
pub fn parse_price(raw: &RawAmount) -> Result<Money, String> {
    let amount = parse_amount(raw)?;
    if amount.is_negative() {
        return Err(format!("amount {} must not be negative", amount));
    }
    Ok(amount)
}
