//! Screen definitions: which forms and lists exist, what they send and
//! fetch, and where they navigate.

pub mod forms;
pub mod lists;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

pub use self::forms::FormKind;
pub use self::lists::ListKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RouteParams {
    None,
    /// Switch a tab navigator to one of its screens.
    Tab { screen: String },
    Search {
        search_value: String,
        placeholder: String,
        book_detail_id: Option<String>,
    },
    /// Hand a record to the next screen under `key`.
    Record { key: String, record: Value },
}

impl RouteParams {
    /// Params object as handed to the shell's navigator.
    pub fn to_json(&self) -> Value {
        match self {
            RouteParams::None => Value::Null,
            RouteParams::Tab { screen } => json!({ "screen": screen }),
            RouteParams::Search {
                search_value,
                placeholder,
                book_detail_id,
            } => {
                let mut params = Map::new();
                params.insert("search_value".into(), json!(search_value));
                params.insert("placeholder".into(), json!(placeholder));
                if let Some(id) = book_detail_id {
                    params.insert("book_detail_id".into(), json!(id));
                }
                Value::Object(params)
            }
            RouteParams::Record { key, record } => {
                let mut params = Map::new();
                params.insert(key.clone(), record.clone());
                Value::Object(params)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationRequest {
    pub screen: String,
    pub params: RouteParams,
}

impl NavigationRequest {
    pub fn new(screen: impl Into<String>, params: RouteParams) -> Self {
        Self {
            screen: screen.into(),
            params,
        }
    }

    pub fn tab(screen: impl Into<String>, tab: impl Into<String>) -> Self {
        Self::new(screen, RouteParams::Tab { screen: tab.into() })
    }
}
