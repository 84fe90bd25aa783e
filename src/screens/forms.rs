use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::NavigationRequest;
use crate::capabilities::HttpMethod;
use crate::resources::{record_id, PickerSource, Resource};
use crate::submission::{AssetPart, SubmissionTarget};
use crate::validation::{FieldSchema, FieldValue, FormSchema, FormValues, PickerSelection, Rule};

const EMPLOYEE_FIELDS: &[&str] = &[
    "user_name",
    "password",
    "phone_num",
    "birth_date",
    "address",
    "gender",
    "first_name",
    "last_name",
];

const READER_FIELDS: &[&str] = &[
    "phone_num",
    "birth_date",
    "email_address",
    "address",
    "gender",
    "first_name",
    "last_name",
];

const BOOK_GROUP_FIELDS: &[&str] = &[
    "book_name",
    "price",
    "published_date",
    "description",
    "publish_com",
    "author_id",
    "category_id",
];

/// Gender picker entries, in display order.
const GENDER_VALUES: [&str; 2] = ["1", "0"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormKind {
    AddEmployee,
    AddReader,
    EditReader,
    AddBookGroup,
}

impl FormKind {
    pub fn screen_name(self) -> &'static str {
        match self {
            FormKind::AddEmployee => "Add Employee",
            FormKind::AddReader => "Add Reader",
            FormKind::EditReader => "Edit Reader",
            FormKind::AddBookGroup => "Add Book Group",
        }
    }

    /// Route param holding the record an edit form starts from.
    pub fn route_record_key(self) -> Option<&'static str> {
        match self {
            FormKind::EditReader => Some("reader_info"),
            _ => None,
        }
    }

    pub fn schema(self) -> FormSchema {
        match self {
            FormKind::AddEmployee => FormSchema::new()
                .field("user_name", FieldSchema::text().required())
                .field(
                    "password",
                    FieldSchema::text().required().rule(Rule::StrongPassword),
                )
                .field(
                    "birth_date",
                    FieldSchema::raw().required().rule(Rule::MinAge(18)),
                )
                .field("first_name", FieldSchema::text().required())
                .field("last_name", FieldSchema::text().required())
                .field("phone_num", FieldSchema::text().rule(Rule::Phone)),
            FormKind::AddReader | FormKind::EditReader => FormSchema::new()
                .field(
                    "birth_date",
                    FieldSchema::raw()
                        .required()
                        .rule(Rule::AgeBetween { min: 18, max: 55 }),
                )
                .field("first_name", FieldSchema::text().required())
                .field("last_name", FieldSchema::text().required())
                .field("email_address", FieldSchema::text().rule(Rule::Email))
                .field("phone_num", FieldSchema::text().rule(Rule::Phone)),
            FormKind::AddBookGroup => FormSchema::new()
                .field("book_name", FieldSchema::text().required())
                .field("price", FieldSchema::text().required())
                .field(
                    "published_date",
                    FieldSchema::raw()
                        .required()
                        .rule(Rule::PublishedWithin { years: 8 }),
                ),
        }
    }

    pub fn payload_fields(self) -> &'static [&'static str] {
        match self {
            FormKind::AddEmployee => EMPLOYEE_FIELDS,
            FormKind::AddReader | FormKind::EditReader => READER_FIELDS,
            FormKind::AddBookGroup => BOOK_GROUP_FIELDS,
        }
    }

    /// Fields copied from the route record rather than entered by the user.
    pub fn extra_fields(self) -> &'static [&'static str] {
        match self {
            FormKind::EditReader => &["user_id"],
            _ => &[],
        }
    }

    pub fn picker_sources(self) -> &'static [PickerSource] {
        match self {
            FormKind::AddBookGroup => &[PickerSource::Categories, PickerSource::Authors],
            _ => &[],
        }
    }

    pub fn resource(self) -> Resource {
        match self {
            FormKind::AddEmployee => Resource::Employees,
            FormKind::AddReader | FormKind::EditReader => Resource::Readers,
            FormKind::AddBookGroup => Resource::BookGroups,
        }
    }

    pub fn method(self) -> HttpMethod {
        match self {
            FormKind::EditReader => HttpMethod::Put,
            _ => HttpMethod::Post,
        }
    }

    pub fn asset_part(self) -> AssetPart {
        match self {
            FormKind::AddEmployee => AssetPart::new("avatar", "emp-avatar"),
            FormKind::AddReader | FormKind::EditReader => AssetPart::new("avatar", "reader-avatar"),
            FormKind::AddBookGroup => AssetPart::new("cover-photo", "cover-photo"),
        }
    }

    pub fn duplicate_message(self) -> &'static str {
        match self {
            FormKind::AddEmployee => "Duplicate user name",
            FormKind::AddReader | FormKind::EditReader => "This reader already exists",
            FormKind::AddBookGroup => "This book group already exists",
        }
    }

    pub fn submission_target(self) -> SubmissionTarget {
        SubmissionTarget::new(self.method(), self.resource().path())
            .with_asset_part(self.asset_part())
            .with_duplicate_message(self.duplicate_message())
    }

    pub fn on_success(self) -> Option<NavigationRequest> {
        match self {
            FormKind::AddEmployee => Some(NavigationRequest::tab("Dashboard", "Employees")),
            FormKind::AddReader => Some(NavigationRequest::tab("Dashboard", "Readers")),
            FormKind::EditReader | FormKind::AddBookGroup => None,
        }
    }

    pub fn resets_on_submit(self) -> bool {
        matches!(self, FormKind::EditReader | FormKind::AddBookGroup)
    }

    /// Values a freshly mounted form starts with. Edit forms read them
    /// from `record`.
    pub fn initial_values(self, today: NaiveDate, record: Option<&Value>) -> FormValues {
        match self {
            FormKind::AddEmployee => blank_values(&[
                "user_name",
                "password",
                "phone_num",
                "first_name",
                "last_name",
                "address",
            ])
            .with("birth_date", FieldValue::Date(today))
            .with("gender", gender_selection(GENDER_VALUES[0])),
            FormKind::AddReader => blank_values(&[
                "phone_num",
                "email_address",
                "address",
                "first_name",
                "last_name",
            ])
            .with("birth_date", FieldValue::Date(today))
            .with("gender", gender_selection(GENDER_VALUES[0])),
            FormKind::EditReader => {
                let null = Value::Null;
                let record = record.unwrap_or(&null);
                let text = |key: &str| {
                    record
                        .get(key)
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string()
                };
                let birth_date = record
                    .get("birth_date")
                    .and_then(Value::as_str)
                    .and_then(parse_record_date)
                    .unwrap_or(today);
                let gender = record_id(record, "gender").unwrap_or_else(|| GENDER_VALUES[0].into());

                FormValues::new()
                    .with_text("phone_num", text("phone_num"))
                    .with("birth_date", FieldValue::Date(birth_date))
                    .with_text("email_address", text("email_address"))
                    .with_text("address", text("address"))
                    .with("gender", gender_selection(&gender))
                    .with_text("first_name", text("first_name"))
                    .with_text("last_name", text("last_name"))
            }
            FormKind::AddBookGroup => {
                blank_values(&["book_name", "price", "description", "publish_com"])
                    .with("published_date", FieldValue::Date(today))
            }
        }
    }

    /// Extra field values taken from the route record. `None` when a
    /// required extra field is missing.
    pub fn extra_values(self, record: Option<&Value>) -> Option<FormValues> {
        self.extra_fields()
            .iter()
            .try_fold(FormValues::new(), |values, name| {
                let value = record.and_then(|r| record_id(r, name))?;
                Some(values.with_text(*name, value))
            })
    }

    /// The subset of `values` this form sends, plus its extra fields.
    pub fn payload_values(self, values: &FormValues, extra: &FormValues) -> FormValues {
        let mut payload = FormValues::new();
        for name in self.payload_fields() {
            if let Some(value) = values.get(name) {
                payload.set(*name, value.clone());
            }
        }
        for (name, value) in extra.iter() {
            payload.set(name, value.clone());
        }
        payload
    }
}

fn blank_values(names: &[&str]) -> FormValues {
    names
        .iter()
        .fold(FormValues::new(), |values, name| values.with_text(*name, ""))
}

pub fn gender_selection(value: &str) -> FieldValue {
    let index = GENDER_VALUES.iter().position(|v| *v == value).unwrap_or(0);
    FieldValue::Choice(PickerSelection::new(value, index))
}

/// Accepts `YYYY-MM-DD` with an optional time suffix (`2001-02-03T00:00:00Z`).
fn parse_record_date(raw: &str) -> Option<NaiveDate> {
    let date = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(date, crate::validation::DATE_FORMAT).ok()
}
