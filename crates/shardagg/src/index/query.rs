use crate::index::{Document, FieldValue};
use serde::{Deserialize, Serialize};

///
/// Query
///
/// Boolean match language understood by the reference searcher.
/// `MatchAll` also matches hidden nested documents; callers that must see only
/// root documents combine it with [`Query::non_nested_docs`].
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Query {
    MatchAll,
    MatchNone,
    Term {
        field: String,
        value: FieldValue,
    },
    Range {
        field: String,
        #[serde(default)]
        gte: Option<f64>,
        #[serde(default)]
        lt: Option<f64>,
    },
    Exists {
        field: String,
    },
    NestedDocs,
    Bool {
        #[serde(default)]
        must: Vec<Self>,
        #[serde(default)]
        must_not: Vec<Self>,
    },
}

impl Query {
    #[must_use]
    pub fn term(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::Term {
            field: field.into(),
            value: value.into(),
        }
    }

    #[must_use]
    pub fn range(field: impl Into<String>, gte: Option<f64>, lt: Option<f64>) -> Self {
        Self::Range {
            field: field.into(),
            gte,
            lt,
        }
    }

    #[must_use]
    pub fn exists(field: impl Into<String>) -> Self {
        Self::Exists {
            field: field.into(),
        }
    }

    /// Root documents only.
    #[must_use]
    pub fn non_nested_docs() -> Self {
        Self::Bool {
            must: vec![Self::MatchAll],
            must_not: vec![Self::NestedDocs],
        }
    }

    /// Conjoin this query with mandatory filters. No filters returns `self`.
    #[must_use]
    pub fn filtered(self, filters: Vec<Self>) -> Self {
        if filters.is_empty() {
            return self;
        }

        let mut must = Vec::with_capacity(filters.len() + 1);
        must.push(self);
        must.extend(filters);

        Self::Bool {
            must,
            must_not: Vec::new(),
        }
    }

    #[must_use]
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Self::MatchAll => true,
            Self::MatchNone => false,
            Self::Term { field, value } => doc.field(field) == Some(value),
            Self::Range { field, gte, lt } => {
                let Some(value) = doc.field(field).and_then(FieldValue::as_f64) else {
                    return false;
                };
                gte.is_none_or(|bound| value >= bound) && lt.is_none_or(|bound| value < bound)
            }
            Self::Exists { field } => doc.field(field).is_some(),
            Self::NestedDocs => doc.is_nested(),
            Self::Bool { must, must_not } => {
                must.iter().all(|query| query.matches(doc))
                    && !must_not.iter().any(|query| query.matches(doc))
            }
        }
    }
}
