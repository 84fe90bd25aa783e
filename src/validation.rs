//! Declarative form validation.
//!
//! A [`FormSchema`] maps field names to rule sets. Validation is a pure
//! function of the schema, the current [`FormValues`] and today's date, so
//! screens re-run it on every tracked change without any shared state.

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

static PHONE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\+84|84|0)[35789][0-9]{8}$").expect("phone pattern is a valid regex")
});

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is a valid regex")
});

/// Selection reported by a menu picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickerSelection {
    pub value: String,
    pub index: usize,
}

impl PickerSelection {
    pub fn new(value: impl Into<String>, index: usize) -> Self {
        Self {
            value: value.into(),
            index,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldValue {
    Text(String),
    Choice(PickerSelection),
    Date(NaiveDate),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::Text(value.into())
    }

    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Text(s) => s.trim().is_empty(),
            FieldValue::Choice(c) => c.value.trim().is_empty(),
            FieldValue::Date(_) => false,
        }
    }

    /// Wire form of the value: trimmed text, the picker's value, or an
    /// ISO `YYYY-MM-DD` date.
    pub fn to_payload_text(&self) -> String {
        match self {
            FieldValue::Text(s) => s.trim().to_string(),
            FieldValue::Choice(c) => c.value.trim().to_string(),
            FieldValue::Date(d) => d.format(DATE_FORMAT).to_string(),
        }
    }

    fn year(&self) -> Option<i32> {
        match self {
            FieldValue::Date(d) => Some(d.year()),
            FieldValue::Text(s) => s.trim().split('-').next()?.parse().ok(),
            FieldValue::Choice(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormValues(BTreeMap<String, FieldValue>);

impl FormValues {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.set(name, value);
        self
    }

    #[must_use]
    pub fn with_text(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.with(name, FieldValue::Text(value.into()))
    }

    pub fn set(&mut self, name: impl Into<String>, value: FieldValue) {
        self.0.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.0.get(name)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.0.get(name) {
            Some(FieldValue::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<FieldValue> {
        self.0.remove(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rule {
    Required,
    Phone,
    Email,
    StrongPassword,
    MinAge(u32),
    AgeBetween { min: u32, max: u32 },
    PublishedWithin { years: u32 },
}

impl Rule {
    fn message(&self, field: &str) -> String {
        match self {
            Rule::Required => format!("{field} is a required field"),
            Rule::Phone => "Invalid phone number".to_string(),
            Rule::Email => "Enter a valid email address".to_string(),
            Rule::StrongPassword => "Password should contains atleast 8 charaters and containing \
                                     uppercase,lowercase and numbers"
                .to_string(),
            Rule::MinAge(min) => format!("Age must be equal or greater than {min}"),
            Rule::AgeBetween { min, max } => format!("Age must be from {min} to {max}"),
            Rule::PublishedWithin { years } => {
                format!("Only accept books published within {years} years")
            }
        }
    }

    /// Format check for a present, non-blank value.
    fn accepts(&self, value: &FieldValue, text: &str, today: NaiveDate) -> bool {
        match self {
            Rule::Required => true,
            Rule::Phone => is_valid_phone(text),
            Rule::Email => is_valid_email(text),
            Rule::StrongPassword => is_strong_password(text),
            Rule::MinAge(min) => value
                .year()
                .is_some_and(|y| is_age_in_range(y, today.year(), *min, None)),
            Rule::AgeBetween { min, max } => value
                .year()
                .is_some_and(|y| is_age_in_range(y, today.year(), *min, Some(*max))),
            Rule::PublishedWithin { years } => value.year().is_some_and(|y| {
                i64::from(today.year()) - i64::from(y) <= i64::from(*years)
            }),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub trim: bool,
    pub rules: Vec<Rule>,
}

impl FieldSchema {
    /// Trimmed string field.
    pub fn text() -> Self {
        Self {
            trim: true,
            rules: Vec::new(),
        }
    }

    /// Value checked verbatim (dates, pickers).
    pub fn raw() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    #[must_use]
    pub fn required(self) -> Self {
        self.rule(Rule::Required)
    }

    pub fn is_required(&self) -> bool {
        self.rules.contains(&Rule::Required)
    }

    /// First failing rule's message, if any.
    pub fn check(&self, field: &str, value: Option<&FieldValue>, today: NaiveDate) -> Option<String> {
        let Some(value) = value.filter(|v| !v.is_blank()) else {
            return self.is_required().then(|| Rule::Required.message(field));
        };

        let text = match value {
            FieldValue::Text(s) if self.trim => s.trim().to_string(),
            FieldValue::Text(s) => s.clone(),
            other => other.to_payload_text(),
        };

        self.rules
            .iter()
            .find(|rule| !rule.accepts(value, &text, today))
            .map(|rule| rule.message(field))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors(BTreeMap<String, String>);

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormSchema {
    fields: Vec<(String, FieldSchema)>,
}

impl FormSchema {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn field(mut self, name: impl Into<String>, schema: FieldSchema) -> Self {
        self.fields.push((name.into(), schema));
        self
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldSchema)> {
        self.fields.iter().map(|(n, s)| (n.as_str(), s))
    }

    pub fn get(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, s)| s)
    }

    /// Errors for every failing field. Fields without a schema entry are
    /// always valid.
    pub fn validate(&self, values: &FormValues, today: NaiveDate) -> ValidationErrors {
        ValidationErrors(
            self.fields
                .iter()
                .filter_map(|(name, schema)| {
                    schema
                        .check(name, values.get(name), today)
                        .map(|msg| (name.clone(), msg))
                })
                .collect(),
        )
    }

    pub fn validate_field(
        &self,
        name: &str,
        values: &FormValues,
        today: NaiveDate,
    ) -> Option<String> {
        self.get(name)?.check(name, values.get(name), today)
    }
}

// ============================================================================
// Rule primitives
// ============================================================================

/// Whole years between `birth_year` and `current_year`; month and day are
/// ignored.
pub fn age_in_years(birth_year: i32, current_year: i32) -> i64 {
    i64::from(current_year) - i64::from(birth_year)
}

pub fn is_age_in_range(birth_year: i32, current_year: i32, min: u32, max: Option<u32>) -> bool {
    let age = age_in_years(birth_year, current_year);
    age >= i64::from(min) && max.map_or(true, |max| age <= i64::from(max))
}

pub fn is_age_valid(birth_date: NaiveDate, today: NaiveDate, min: u32, max: Option<u32>) -> bool {
    is_age_in_range(birth_date.year(), today.year(), min, max)
}

pub fn is_valid_phone(value: &str) -> bool {
    PHONE_PATTERN.is_match(value)
}

pub fn is_valid_email(value: &str) -> bool {
    EMAIL_PATTERN.is_match(value)
}

pub fn is_strong_password(value: &str) -> bool {
    value.chars().count() >= 8
        && value.chars().any(|c| c.is_ascii_uppercase())
        && value.chars().any(|c| c.is_ascii_lowercase())
        && value.chars().any(|c| c.is_ascii_digit())
}
