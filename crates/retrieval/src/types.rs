use binfp::BinaryFingerprint;
use serde::{Deserialize, Serialize};

/// Document key shared by the search service and the metadata store (a PubMed id in practice).
pub type DocumentId = i64;

pub const TITLE_NOT_FOUND: &str = "Title not found";
pub const AUTHORS_NOT_FOUND: &str = "Authors not found";
pub const ABSTRACT_NOT_FOUND: &str = "Abstract not found";

/// What the caller wants to search for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetrievalQuery {
    /// Raw text, embedded (or forwarded) by the retriever.
    Text(String),
    /// A fingerprint the caller already computed.
    Fingerprint(BinaryFingerprint),
}

impl From<&str> for RetrievalQuery {
    fn from(text: &str) -> Self {
        RetrievalQuery::Text(text.to_string())
    }
}

impl From<String> for RetrievalQuery {
    fn from(text: String) -> Self {
        RetrievalQuery::Text(text)
    }
}

impl From<BinaryFingerprint> for RetrievalQuery {
    fn from(fp: BinaryFingerprint) -> Self {
        RetrievalQuery::Fingerprint(fp)
    }
}

/// One hit from the search service. Results arrive ordered by ascending distance.
///
/// A text-mode search service may return metadata columns next to the id; those are
/// kept in `inline` and used where the metadata store has nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    #[serde(alias = "pmid")]
    pub id: DocumentId,
    pub distance: f64,
    #[serde(flatten)]
    pub inline: DocumentMetadata,
}

impl MatchResult {
    /// A bare hit with no inline metadata.
    pub fn new(id: DocumentId, distance: f64) -> Self {
        Self {
            id,
            distance,
            inline: DocumentMetadata::default(),
        }
    }
}

/// Metadata row for one document. Individual columns may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authors: Option<String>,
    #[serde(rename = "abstract", default, skip_serializing_if = "Option::is_none")]
    pub abstract_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication_year: Option<i32>,
}

impl DocumentMetadata {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.authors.is_none()
            && self.abstract_text.is_none()
            && self.publication_year.is_none()
    }

    /// Column-wise `self`, falling back to `other` where `self` has nothing.
    fn or(self, other: &DocumentMetadata) -> DocumentMetadata {
        DocumentMetadata {
            title: self.title.or_else(|| other.title.clone()),
            authors: self.authors.or_else(|| other.authors.clone()),
            abstract_text: self.abstract_text.or_else(|| other.abstract_text.clone()),
            publication_year: self.publication_year.or(other.publication_year),
        }
    }
}

/// A search hit merged with its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HydratedRecord {
    #[serde(rename = "pmid", alias = "id")]
    pub id: DocumentId,
    pub distance: f64,
    pub title: String,
    pub authors: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub publication_year: Option<i32>,
    /// `false` when neither the store nor the hit carried any metadata for `id`.
    pub found: bool,
}

impl HydratedRecord {
    /// Merges a hit with its metadata.
    ///
    /// Each column comes from the store row first, then from the hit's inline fields,
    /// then falls back to the placeholder.
    pub fn merge(hit: &MatchResult, metadata: Option<&DocumentMetadata>) -> Self {
        let meta = metadata.cloned().unwrap_or_default().or(&hit.inline);
        let found = metadata.is_some() || !hit.inline.is_empty();
        Self {
            id: hit.id,
            distance: hit.distance,
            title: meta.title.unwrap_or_else(|| TITLE_NOT_FOUND.to_string()),
            authors: meta.authors.unwrap_or_else(|| AUTHORS_NOT_FOUND.to_string()),
            abstract_text: meta
                .abstract_text
                .unwrap_or_else(|| ABSTRACT_NOT_FOUND.to_string()),
            publication_year: meta.publication_year,
            found,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_result_accepts_pmid_alias() {
        let hit: MatchResult = serde_json::from_str(r#"{"pmid": 42, "distance": 7}"#).unwrap();
        assert_eq!(hit.id, 42);
        assert_eq!(hit.distance, 7.0);

        let hit: MatchResult = serde_json::from_str(r#"{"id": 1, "distance": 0.5}"#).unwrap();
        assert_eq!(hit.id, 1);
    }

    #[test]
    fn merge_uses_placeholders_for_missing_record() {
        let hit = MatchResult::new(456, 0.3);
        let rec = HydratedRecord::merge(&hit, None);
        assert!(!rec.found);
        assert_eq!(rec.title, TITLE_NOT_FOUND);
        assert_eq!(rec.authors, AUTHORS_NOT_FOUND);
        assert_eq!(rec.abstract_text, ABSTRACT_NOT_FOUND);
        assert_eq!(rec.publication_year, None);
    }

    #[test]
    fn merge_fills_only_missing_columns() {
        let hit = MatchResult::new(1, 0.1);
        let meta = DocumentMetadata {
            title: Some("TEAD biology".into()),
            authors: None,
            abstract_text: Some("Abstract text".into()),
            publication_year: Some(2021),
        };
        let rec = HydratedRecord::merge(&hit, Some(&meta));
        assert!(rec.found);
        assert_eq!(rec.title, "TEAD biology");
        assert_eq!(rec.authors, AUTHORS_NOT_FOUND);
        assert_eq!(rec.publication_year, Some(2021));
    }

    #[test]
    fn hydrated_record_wire_names() {
        let rec = HydratedRecord::merge(&MatchResult::new(9, 1.0), None);
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["pmid"], 9);
        assert_eq!(json["abstract"], ABSTRACT_NOT_FOUND);
        assert!(json["publication_year"].is_null());
    }

    #[test]
    fn inline_fields_fill_gaps_the_store_leaves() {
        let hit: MatchResult = serde_json::from_str(
            r#"{"pmid": 1, "distance": 0.1, "title": "From search", "authors": "Roe R",
                "abstract": "Inline abstract", "publication_year": 2019}"#,
        )
        .unwrap();
        assert_eq!(hit.inline.title.as_deref(), Some("From search"));

        let rec = HydratedRecord::merge(&hit, None);
        assert!(rec.found);
        assert_eq!(rec.title, "From search");
        assert_eq!(rec.authors, "Roe R");
        assert_eq!(rec.abstract_text, "Inline abstract");
        assert_eq!(rec.publication_year, Some(2019));

        let stored = DocumentMetadata {
            title: Some("From store".into()),
            ..Default::default()
        };
        let rec = HydratedRecord::merge(&hit, Some(&stored));
        assert_eq!(rec.title, "From store");
        assert_eq!(rec.authors, "Roe R");
        assert_eq!(rec.publication_year, Some(2019));
    }

    #[test]
    fn bare_hit_has_no_inline_metadata() {
        let hit: MatchResult = serde_json::from_str(r#"{"id": 5, "distance": 2}"#).unwrap();
        assert_eq!(hit, MatchResult::new(5, 2.0));
        assert_eq!(
            serde_json::to_value(&hit).unwrap(),
            serde_json::json!({"id": 5, "distance": 2.0})
        );
    }
}
