use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use crate::capabilities::AssetReference;
use crate::resources::PickerOption;
use crate::screens::{FormKind, ListKind};
use crate::validation::{FieldValue, FormValues, ValidationErrors};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FormState {
    pub kind: FormKind,
    pub values: FormValues,
    /// Values restored by a reset.
    pub initial: FormValues,
    /// Route-provided fields; `None` when the route lacked one the form needs.
    pub extra: Option<FormValues>,
    pub touched: BTreeSet<String>,
    pub errors: ValidationErrors,
    pub asset: Option<AssetReference>,
    pub pickers: BTreeMap<String, Vec<PickerOption>>,
}

impl FormState {
    pub fn new(kind: FormKind, initial: FormValues, extra: Option<FormValues>) -> Self {
        Self {
            kind,
            values: initial.clone(),
            initial,
            extra,
            touched: BTreeSet::new(),
            errors: ValidationErrors::default(),
            asset: None,
            pickers: BTreeMap::new(),
        }
    }

    pub fn reset(&mut self) {
        self.values = self.initial.clone();
        self.touched.clear();
        self.errors = ValidationErrors::default();
        self.apply_picker_defaults();
    }

    /// Selects the first option of every loaded picker that has no value yet.
    pub fn apply_picker_defaults(&mut self) {
        for (field, options) in &self.pickers {
            if self.values.get(field).is_none() {
                if let Some(first) = options.first() {
                    self.values
                        .set(field.clone(), FieldValue::Choice(first.selection(0)));
                }
            }
        }
    }

    /// Error for `field`, only once the user has touched it.
    pub fn visible_error(&self, field: &str) -> Option<&str> {
        self.touched
            .contains(field)
            .then(|| self.errors.get(field))
            .flatten()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ListState {
    pub kind: ListKind,
    pub items: Vec<Value>,
    pub search_text: String,
    pub error: Option<String>,
}

impl ListState {
    pub fn new(kind: ListKind) -> Self {
        Self {
            kind,
            items: Vec::new(),
            search_text: String::new(),
            error: None,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ResultModal {
    pub is_success: bool,
    pub message: Option<String>,
}

impl ResultModal {
    pub fn success() -> Self {
        Self {
            is_success: true,
            message: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            is_success: false,
            message: Some(message.into()),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Model {
    pub form: Option<FormState>,
    pub list: Option<ListState>,
    pub modal: Option<ResultModal>,
}

// --- View ---

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FieldView {
    pub name: String,
    pub value: FieldValue,
    pub error: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FormView {
    pub screen: String,
    pub fields: Vec<FieldView>,
    pub asset: Option<AssetReference>,
    pub pickers: BTreeMap<String, Vec<PickerOption>>,
    pub can_submit: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ListView {
    pub placeholder: String,
    pub search_text: String,
    pub items: Vec<Value>,
    pub error: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ViewModel {
    pub form: Option<FormView>,
    pub list: Option<ListView>,
    pub modal: Option<ResultModal>,
    pub loading: bool,
}
