use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::capabilities::AssetReference;
use crate::screens::{FormKind, ListKind};
use crate::validation::PickerSelection;

/// Everything the shell can tell the core. Picker and date results arrive
/// as plain values; the core never holds shell callbacks.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum Event {
    // Forms
    /// Mount a form. `params` are the route params the screen was opened
    /// with (edit forms read their record from them).
    OpenForm {
        kind: FormKind,
        params: Option<Value>,
    },
    FormFocused,
    FieldChanged {
        field: String,
        value: String,
    },
    FieldBlurred {
        field: String,
    },
    PickerSelected {
        field: String,
        selection: PickerSelection,
    },
    DateSelected {
        field: String,
        date: NaiveDate,
    },
    AssetPicked(AssetReference),
    AssetPickCancelled,
    SubmitPressed,
    ModalDismissed,

    // Lists
    ListFocused {
        kind: ListKind,
    },
    SearchChanged {
        text: String,
    },
    SearchSubmitted,
    ItemSelected {
        index: usize,
    },
}

impl Event {
    pub fn field_changed(field: impl Into<String>, value: impl Into<String>) -> Self {
        Event::FieldChanged {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Event::OpenForm { .. } => "open_form",
            Event::FormFocused => "form_focused",
            Event::FieldChanged { .. } => "field_changed",
            Event::FieldBlurred { .. } => "field_blurred",
            Event::PickerSelected { .. } => "picker_selected",
            Event::DateSelected { .. } => "date_selected",
            Event::AssetPicked(_) => "asset_picked",
            Event::AssetPickCancelled => "asset_pick_cancelled",
            Event::SubmitPressed => "submit_pressed",
            Event::ModalDismissed => "modal_dismissed",
            Event::ListFocused { .. } => "list_focused",
            Event::SearchChanged { .. } => "search_changed",
            Event::SearchSubmitted => "search_submitted",
            Event::ItemSelected { .. } => "item_selected",
        }
    }
}
