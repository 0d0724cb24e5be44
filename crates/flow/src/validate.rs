//! Declarative field rules evaluated by the step controller.

use chrono::{Datelike, Local, NaiveDate};
use serde::Serialize;

use crate::store::FlowState;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Values the rules need from outside the draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationContext {
    pub today: NaiveDate,
}

impl ValidationContext {
    pub fn today() -> Self {
        Self {
            today: Local::now().date_naive(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// One static option list, plus the copy shown above it.
#[derive(Debug, PartialEq, Eq)]
pub struct OptionSet {
    pub key: &'static str,
    pub copy: &'static str,
    pub options: &'static [&'static str],
}

/// Option lists selected by the value of an earlier field.
#[derive(Debug, PartialEq, Eq)]
pub struct OptionTable {
    pub driver: &'static str,
    pub sets: &'static [OptionSet],
}

impl OptionTable {
    pub fn select(&self, state: &FlowState) -> Option<&'static OptionSet> {
        let driver = state.get(self.driver)?.trim();
        self.sets
            .iter()
            .find(|set| set.key.eq_ignore_ascii_case(driver))
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Rule {
    OneOf(&'static [&'static str]),
    /// Numeric bounds, inclusive. Commas and a leading peso sign are ignored.
    Range {
        min: f64,
        max: f64,
        message: &'static str,
    },
    Integer,
    PersonName,
    Digits {
        min: usize,
        max: usize,
    },
    Email,
    MobileNumber,
    Length {
        min: usize,
        max: usize,
    },
    Date,
    NotInPast,
    MinimumAge(u32),
    /// Checkbox-style consent; accepts "true" or "yes".
    Accepted,
    /// Value must name one of the table's option sets.
    OptionKey(&'static OptionTable),
    /// Value must belong to the option list the driver field selects.
    FromOptions(&'static OptionTable),
}

impl Rule {
    fn check(
        &self,
        field: &str,
        label: &str,
        value: &str,
        state: &FlowState,
        ctx: &ValidationContext,
    ) -> Result<(), FieldError> {
        match *self {
            Rule::OneOf(allowed) => {
                if allowed.iter().any(|a| a.eq_ignore_ascii_case(value)) {
                    Ok(())
                } else {
                    Err(FieldError::new(
                        field,
                        format!("{label} must be one of: {}", allowed.join(", ")),
                    ))
                }
            }
            Rule::Range { min, max, message } => match parse_amount(value) {
                Some(n) if n >= min && n <= max => Ok(()),
                Some(_) => Err(FieldError::new(field, message)),
                None => Err(FieldError::new(field, format!("{label} must be a number"))),
            },
            Rule::Integer => value
                .replace(',', "")
                .parse::<i64>()
                .map(|_| ())
                .map_err(|_| FieldError::new(field, format!("{label} must be a whole number"))),
            Rule::PersonName => {
                if value
                    .chars()
                    .all(|c| c.is_alphabetic() || matches!(c, ' ' | '-' | '\'' | '.'))
                {
                    Ok(())
                } else {
                    Err(FieldError::new(
                        field,
                        format!("{label} may only contain letters and name punctuation"),
                    ))
                }
            }
            Rule::Digits { min, max } => {
                let len = value.chars().count();
                if value.chars().all(|c| c.is_ascii_digit()) && len >= min && len <= max {
                    Ok(())
                } else if min == max {
                    Err(FieldError::new(field, format!("{label} must be {min} digits")))
                } else {
                    Err(FieldError::new(
                        field,
                        format!("{label} must be {min} to {max} digits"),
                    ))
                }
            }
            Rule::Email => {
                if is_email(value) {
                    Ok(())
                } else {
                    Err(FieldError::new(field, "Enter a valid email address"))
                }
            }
            Rule::MobileNumber => {
                if is_mobile_number(value) {
                    Ok(())
                } else {
                    Err(FieldError::new(
                        field,
                        "Enter a mobile number like 09171234567",
                    ))
                }
            }
            Rule::Length { min, max } => {
                let len = value.chars().count();
                if len < min {
                    Err(FieldError::new(
                        field,
                        format!("{label} must be at least {min} characters"),
                    ))
                } else if len > max {
                    Err(FieldError::new(
                        field,
                        format!("{label} must be at most {max} characters"),
                    ))
                } else {
                    Ok(())
                }
            }
            Rule::Date => parse_date(value)
                .map(|_| ())
                .ok_or_else(|| FieldError::new(field, format!("{label} must be a date (YYYY-MM-DD)"))),
            Rule::NotInPast => match parse_date(value) {
                Some(date) if date >= ctx.today => Ok(()),
                Some(_) => Err(FieldError::new(field, format!("{label} cannot be in the past"))),
                None => Err(FieldError::new(field, format!("{label} must be a date (YYYY-MM-DD)"))),
            },
            Rule::MinimumAge(years) => match parse_date(value) {
                Some(birthdate) if age_on(birthdate, ctx.today) >= years as i32 => Ok(()),
                Some(_) => Err(FieldError::new(
                    field,
                    format!("You must be at least {years} years old"),
                )),
                None => Err(FieldError::new(field, format!("{label} must be a date (YYYY-MM-DD)"))),
            },
            Rule::Accepted => {
                if matches!(value.to_ascii_lowercase().as_str(), "true" | "yes") {
                    Ok(())
                } else {
                    Err(FieldError::new(field, format!("{label} must be accepted")))
                }
            }
            Rule::OptionKey(table) => {
                if table.sets.iter().any(|set| set.key.eq_ignore_ascii_case(value)) {
                    Ok(())
                } else {
                    let keys: Vec<&str> = table.sets.iter().map(|set| set.key).collect();
                    Err(FieldError::new(
                        field,
                        format!("{label} must be one of: {}", keys.join(", ")),
                    ))
                }
            }
            Rule::FromOptions(table) => match table.select(state) {
                Some(set) if set.options.iter().any(|o| o.eq_ignore_ascii_case(value)) => Ok(()),
                Some(_) => Err(FieldError::new(field, format!("Choose a {label} from the list"))),
                None => Err(FieldError::new(
                    field,
                    format!("Choose a {} first", table.driver.replace('_', " ")),
                )),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub required: bool,
    pub rules: Vec<Rule>,
}

impl FieldSpec {
    pub fn required(name: &'static str, label: &'static str) -> Self {
        Self {
            name,
            label,
            required: true,
            rules: Vec::new(),
        }
    }

    pub fn optional(name: &'static str, label: &'static str) -> Self {
        Self {
            required: false,
            ..Self::required(name, label)
        }
    }

    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Checks presence, then every rule in order; stops at the first failure
    /// so each field reports one message.
    pub fn check(&self, state: &FlowState, ctx: &ValidationContext) -> Result<(), FieldError> {
        let value = state.get(self.name).map(str::trim).unwrap_or_default();
        if value.is_empty() {
            return if self.required {
                Err(FieldError::new(self.name, format!("{} is required", self.label)))
            } else {
                Ok(())
            };
        }
        for rule in &self.rules {
            rule.check(self.name, self.label, value, state, ctx)?;
        }
        Ok(())
    }
}

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).ok()
}

/// Completed years between `birthdate` and `today`.
pub fn age_on(birthdate: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - birthdate.year();
    if (today.month(), today.day()) < (birthdate.month(), birthdate.day()) {
        age -= 1;
    }
    age
}

fn parse_amount(value: &str) -> Option<f64> {
    let cleaned: String = value
        .trim()
        .trim_start_matches('₱')
        .chars()
        .filter(|c| *c != ',')
        .collect();
    cleaned.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

fn is_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !value.contains(char::is_whitespace)
        && !domain.contains('@')
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
        && !domain.ends_with('.')
}

fn is_mobile_number(value: &str) -> bool {
    let compact: String = value
        .chars()
        .filter(|c| !matches!(c, ' ' | '-'))
        .collect();
    let rest = if let Some(rest) = compact.strip_prefix("+639") {
        rest
    } else if let Some(rest) = compact.strip_prefix("09") {
        rest
    } else {
        return false;
    };
    rest.len() == 9 && rest.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
#[path = "tests/validate_tests.rs"]
mod tests;
