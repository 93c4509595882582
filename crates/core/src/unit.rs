use crate::document::Document;

/// One document-level action executed under the active transaction.
///
/// Operations name the record they touch by its application-level key; how
/// that key maps onto stored fields is the driver's concern.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Store a fresh document under `key`; an already-visible key is a
    /// driver error.
    Insert { key: String, document: Document },
    /// Store `document` under `key`, replacing any visible document.
    Upsert { key: String, document: Document },
    /// Overlay `update` onto the document under `key` and report the result.
    FindAndUpdate { key: String, update: Document },
}

impl Operation {
    pub fn insert(key: impl Into<String>, document: Document) -> Self {
        Self::Insert {
            key: key.into(),
            document,
        }
    }

    pub fn upsert(key: impl Into<String>, document: Document) -> Self {
        Self::Upsert {
            key: key.into(),
            document,
        }
    }

    pub fn find_and_update(key: impl Into<String>, update: Document) -> Self {
        Self::FindAndUpdate {
            key: key.into(),
            update,
        }
    }

    /// The application-level key this operation targets.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Insert { key, .. } | Self::Upsert { key, .. } | Self::FindAndUpdate { key, .. } => {
                key
            }
        }
    }
}

/// What one [`Operation`] reported back.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutput {
    Inserted {
        key: String,
    },
    Upserted {
        key: String,
        /// False when an existing document was replaced.
        created: bool,
    },
    Updated {
        key: String,
        /// The post-update document, or `None` when no document matched.
        document: Option<Document>,
    },
}

/// The ordered operations one run executes inside a single transaction.
///
/// The operation list is fixed for the whole run; results come back in the
/// same order on a committed outcome.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitOfWork {
    pub collection: String,
    pub operations: Vec<Operation>,
}

impl UnitOfWork {
    #[must_use]
    pub fn new(collection: impl Into<String>, operations: Vec<Operation>) -> Self {
        Self {
            collection: collection.into(),
            operations,
        }
    }
}
