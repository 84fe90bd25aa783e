use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{NavigationRequest, RouteParams};
use crate::resources::{record_id, Resource};

/// Collection screens that load on focus and delegate search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListKind {
    Borrowers,
    /// Copies of one book group, scoped by its `book_detail_id`.
    BookCopies { book_detail_id: String },
    Readers,
    Employees,
    BookGroups,
}

impl ListKind {
    /// Copies screen for a book group record (`{"book_detail_id": ..}`).
    pub fn book_copies_for(book_info: &Value) -> Option<Self> {
        record_id(book_info, "book_detail_id").map(|book_detail_id| ListKind::BookCopies { book_detail_id })
    }

    pub fn resource(&self) -> Resource {
        match self {
            ListKind::Borrowers => Resource::BorrowingReaders,
            ListKind::BookCopies { book_detail_id } => Resource::BookCopies {
                book_detail_id: book_detail_id.clone(),
            },
            ListKind::Readers => Resource::Readers,
            ListKind::Employees => Resource::Employees,
            ListKind::BookGroups => Resource::BookGroups,
        }
    }

    pub fn placeholder(&self) -> &'static str {
        match self {
            ListKind::Borrowers => "search borrowers...",
            ListKind::BookCopies { .. } => "search books by position...",
            ListKind::Readers => "search readers...",
            ListKind::Employees => "search employees...",
            ListKind::BookGroups => "search book groups...",
        }
    }

    pub fn search_screen(&self) -> &'static str {
        match self {
            ListKind::Borrowers => "Borrowers Search Result",
            ListKind::BookCopies { .. } => "Book Search Result",
            ListKind::Readers => "Readers Search Result",
            ListKind::Employees => "Employees Search Result",
            ListKind::BookGroups => "Book Groups Search Result",
        }
    }

    pub fn item_screen(&self) -> &'static str {
        match self {
            ListKind::Borrowers => "Borrowing Books",
            ListKind::BookCopies { .. } => "Edit Book",
            ListKind::Readers => "Edit Reader",
            ListKind::Employees => "Employee Detail",
            ListKind::BookGroups => "Book List",
        }
    }

    pub fn item_param_key(&self) -> &'static str {
        match self {
            ListKind::Borrowers => "borrower_info",
            ListKind::BookCopies { .. } | ListKind::BookGroups => "book_info",
            ListKind::Readers => "reader_info",
            ListKind::Employees => "employee_info",
        }
    }

    /// Hands the raw search text to the results screen; no filtering here.
    pub fn search_request(&self, search_value: &str) -> NavigationRequest {
        let book_detail_id = match self {
            ListKind::BookCopies { book_detail_id } => Some(book_detail_id.clone()),
            _ => None,
        };
        NavigationRequest::new(
            self.search_screen(),
            RouteParams::Search {
                search_value: search_value.to_string(),
                placeholder: self.placeholder().to_string(),
                book_detail_id,
            },
        )
    }

    pub fn item_request(&self, record: Value) -> NavigationRequest {
        NavigationRequest::new(
            self.item_screen(),
            RouteParams::Record {
                key: self.item_param_key().to_string(),
                record,
            },
        )
    }
}
