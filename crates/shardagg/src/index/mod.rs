//! Module: index
//! Responsibility: in-memory segmented shard partition used by the reference searcher.
//! Does not own: postings layout, scoring, or persistence.
//! Boundary: read-only document access by segment-local doc id.

mod query;

pub use query::Query;

use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, sync::Arc};

/// Segment-local document identifier.
pub type DocId = u32;

///
/// FieldValue
///

#[derive(Clone, Debug, Deserialize, Display, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Long(i64),
    Double(f64),
    Keyword(String),
}

impl FieldValue {
    /// Numeric view of this value; keywords have none.
    #[must_use]
    #[expect(clippy::cast_precision_loss)]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Long(value) => Some(*value as f64),
            Self::Double(value) => Some(*value),
            Self::Keyword(_) => None,
        }
    }

    #[must_use]
    pub fn as_keyword(&self) -> Option<&str> {
        match self {
            Self::Keyword(value) => Some(value),
            Self::Long(_) | Self::Double(_) => None,
        }
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Long(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Keyword(value.to_string())
    }
}

///
/// Document
///
/// One stored document. `nested_path` marks hidden child documents produced by
/// nested mappings; they live in the same segment as their parent.
///

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Document {
    fields: BTreeMap<String, FieldValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    nested_path: Option<String>,
}

impl Document {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a hidden nested child document under `path`.
    #[must_use]
    pub fn nested(path: impl Into<String>) -> Self {
        Self {
            fields: BTreeMap::new(),
            nested_path: Some(path.into()),
        }
    }

    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    #[must_use]
    pub fn nested_path(&self) -> Option<&str> {
        self.nested_path.as_deref()
    }

    #[must_use]
    pub const fn is_nested(&self) -> bool {
        self.nested_path.is_some()
    }
}

///
/// Segment
///
/// Immutable sub-partition of a shard. Doc ids are dense and segment-local.
///

#[derive(Debug)]
pub struct Segment {
    ord: u32,
    docs: Vec<Document>,
}

impl Segment {
    #[must_use]
    pub const fn ord(&self) -> u32 {
        self.ord
    }

    /// Number of doc ids in this segment, nested documents included.
    #[must_use]
    pub fn max_doc(&self) -> DocId {
        DocId::try_from(self.docs.len()).unwrap_or(DocId::MAX)
    }

    #[must_use]
    pub fn doc(&self, doc: DocId) -> Option<&Document> {
        self.docs.get(doc as usize)
    }

    /// Field lookup by doc id; `None` when the doc or the field is missing.
    #[must_use]
    pub fn field(&self, doc: DocId, name: &str) -> Option<&FieldValue> {
        self.doc(doc).and_then(|document| document.field(name))
    }

    pub fn docs(&self) -> impl Iterator<Item = (DocId, &Document)> {
        (0..).zip(self.docs.iter())
    }
}

///
/// ShardIndex
///

#[derive(Debug, Default)]
pub struct ShardIndex {
    segments: Vec<Arc<Segment>>,
}

impl ShardIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one segment built from `docs`.
    #[must_use]
    pub fn with_segment(mut self, docs: Vec<Document>) -> Self {
        let ord = u32::try_from(self.segments.len()).unwrap_or(u32::MAX);
        self.segments.push(Arc::new(Segment { ord, docs }));
        self
    }

    #[must_use]
    pub fn segments(&self) -> &[Arc<Segment>] {
        &self.segments
    }

    #[must_use]
    pub fn has_nested_docs(&self) -> bool {
        self.segments
            .iter()
            .any(|segment| segment.docs.iter().any(Document::is_nested))
    }

    /// Total doc ids across all segments.
    #[must_use]
    pub fn max_doc(&self) -> u64 {
        self.segments
            .iter()
            .map(|segment| u64::from(segment.max_doc()))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segments_are_numbered_in_insertion_order() {
        let index = ShardIndex::new()
            .with_segment(vec![Document::new(), Document::new()])
            .with_segment(vec![Document::new()]);

        let ords: Vec<_> = index.segments().iter().map(|s| s.ord()).collect();
        assert_eq!(ords, vec![0, 1]);
        assert_eq!(index.max_doc(), 3);
    }

    #[test]
    fn nested_documents_are_detected() {
        let flat = ShardIndex::new().with_segment(vec![Document::new().with("a", 1_i64)]);
        let nested = ShardIndex::new()
            .with_segment(vec![Document::nested("comments"), Document::new()]);

        assert!(!flat.has_nested_docs());
        assert!(nested.has_nested_docs());
    }

    #[test]
    fn numeric_views_cover_longs_and_doubles() {
        assert_eq!(FieldValue::from(3_i64).as_f64(), Some(3.0));
        assert_eq!(FieldValue::from(2.5_f64).as_f64(), Some(2.5));
        assert_eq!(FieldValue::from("x").as_f64(), None);
        assert_eq!(FieldValue::from("x").as_keyword(), Some("x"));
    }
}
