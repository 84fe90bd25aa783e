//! Backend resources and the records the core reads from them.

use serde::{Deserialize, Serialize};

use crate::validation::PickerSelection;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Resource {
    Employees,
    Readers,
    BookGroups,
    /// Copies belonging to one book group.
    BookCopies { book_detail_id: String },
    Categories,
    Authors,
    BorrowingReaders,
}

impl Resource {
    pub fn path(&self) -> String {
        match self {
            Resource::Employees => "/users/employee".into(),
            Resource::Readers => "/users/reader".into(),
            Resource::BookGroups => "/books/book-groups".into(),
            Resource::BookCopies { book_detail_id } => format!("/books/{book_detail_id}"),
            Resource::Categories => "/books/categories".into(),
            Resource::Authors => "/books/authors".into(),
            Resource::BorrowingReaders => "/borrowed-books/borrowing-readers".into(),
        }
    }

    pub fn query(&self) -> Vec<(String, String)> {
        match self {
            Resource::BookCopies { book_detail_id } => {
                vec![("book_detail_id".into(), book_detail_id.clone())]
            }
            _ => Vec::new(),
        }
    }
}

/// Reads an id-like field (number or string) from a JSON record.
pub fn record_id(record: &serde_json::Value, key: &str) -> Option<String> {
    match record.get(key)? {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub category_id: i64,
    #[serde(default, alias = "category_name")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub author_id: i64,
    #[serde(default, alias = "author_name")]
    pub name: Option<String>,
}

/// Option shown by a menu picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickerOption {
    pub value: String,
    pub label: String,
}

impl PickerOption {
    pub fn selection(&self, index: usize) -> PickerSelection {
        PickerSelection::new(self.value.clone(), index)
    }
}

impl From<&Category> for PickerOption {
    fn from(c: &Category) -> Self {
        Self {
            value: c.category_id.to_string(),
            label: c.name.clone().unwrap_or_else(|| c.category_id.to_string()),
        }
    }
}

impl From<&Author> for PickerOption {
    fn from(a: &Author) -> Self {
        Self {
            value: a.author_id.to_string(),
            label: a.name.clone().unwrap_or_else(|| a.author_id.to_string()),
        }
    }
}

/// Picker-backed collections and how to read them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PickerSource {
    Categories,
    Authors,
}

impl PickerSource {
    pub fn resource(self) -> Resource {
        match self {
            PickerSource::Categories => Resource::Categories,
            PickerSource::Authors => Resource::Authors,
        }
    }

    /// Form field that receives the selected value.
    pub fn field(self) -> &'static str {
        match self {
            PickerSource::Categories => "category_id",
            PickerSource::Authors => "author_id",
        }
    }

    pub fn parse_options(self, body: &serde_json::Value) -> Result<Vec<PickerOption>, serde_json::Error> {
        Ok(match self {
            PickerSource::Categories => Vec::<Category>::deserialize(body)?
                .iter()
                .map(PickerOption::from)
                .collect(),
            PickerSource::Authors => Vec::<Author>::deserialize(body)?
                .iter()
                .map(PickerOption::from)
                .collect(),
        })
    }
}
