//! Search request and record filter types.

use super::{ClassCodes, TrademarkId, parse_class_filter};
use std::collections::BTreeSet;

/// A combined search query. Every criterion is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchRequest {
    /// Free-text words matched against description and applicant name.
    pub words: Option<String>,
    /// Class filter as entered by the user.
    pub class_filter: Option<String>,
    /// Raw bytes of an uploaded logo image.
    pub image: Option<Vec<u8>>,
}

impl SearchRequest {
    /// Creates an empty request, which lists every record.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            words: None,
            class_filter: None,
            image: None,
        }
    }

    /// Sets the free-text words.
    #[must_use]
    pub fn with_words(mut self, words: impl Into<String>) -> Self {
        self.words = Some(words.into());
        self
    }

    /// Sets the class filter.
    #[must_use]
    pub fn with_class_filter(mut self, class_filter: impl Into<String>) -> Self {
        self.class_filter = Some(class_filter.into());
        self
    }

    /// Sets the query image.
    #[must_use]
    pub fn with_image(mut self, image: Vec<u8>) -> Self {
        self.image = Some(image);
        self
    }

    /// Returns the record filter implied by the text and class criteria.
    ///
    /// The image criterion is resolved separately into an allowlist.
    #[must_use]
    pub fn to_filter(&self) -> RecordFilter {
        RecordFilter::new()
            .with_text(self.words.as_deref())
            .with_class_code(parse_class_filter(self.class_filter.as_deref()))
    }
}

/// Relational filter applied by the record store.
///
/// All present predicates must hold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    /// Lowercased needle matched as a substring of description or applicant.
    pub text: Option<String>,
    /// Class code that must appear among the record's tokens.
    pub class_code: Option<u32>,
    /// Ids the result is restricted to. An empty set matches nothing.
    pub allowlist: Option<BTreeSet<TrademarkId>>,
}

impl RecordFilter {
    /// Creates a filter that matches every record.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            text: None,
            class_code: None,
            allowlist: None,
        }
    }

    /// Sets the text predicate. Blank input clears it.
    ///
    /// Surrounding whitespace is part of the needle, so `" boots"` does not
    /// match `"Snowboots"`.
    #[must_use]
    pub fn with_text(mut self, text: Option<&str>) -> Self {
        self.text = text
            .filter(|t| !t.trim().is_empty())
            .map(str::to_lowercase);
        self
    }

    /// Sets the class predicate.
    #[must_use]
    pub const fn with_class_code(mut self, code: Option<u32>) -> Self {
        self.class_code = code;
        self
    }

    /// Restricts results to the given ids.
    #[must_use]
    pub fn with_allowlist(mut self, ids: impl IntoIterator<Item = TrademarkId>) -> Self {
        self.allowlist = Some(ids.into_iter().collect());
        self
    }

    /// Returns true if the allowlist is present and empty.
    #[must_use]
    pub fn excludes_everything(&self) -> bool {
        self.allowlist.as_ref().is_some_and(BTreeSet::is_empty)
    }

    /// Returns true if `id` passes the allowlist.
    #[must_use]
    pub fn admits(&self, id: TrademarkId) -> bool {
        self.allowlist.as_ref().is_none_or(|ids| ids.contains(&id))
    }

    /// Returns true if the text predicate holds.
    ///
    /// Comparison is a case-insensitive substring match over either field.
    #[must_use]
    pub fn matches_text(&self, description: &str, applicant_name: &str) -> bool {
        self.text.as_deref().is_none_or(|needle| {
            description.to_lowercase().contains(needle)
                || applicant_name.to_lowercase().contains(needle)
        })
    }

    /// Returns true if the class predicate holds.
    #[must_use]
    pub fn matches_classes(&self, classes: &ClassCodes) -> bool {
        self.class_code.is_none_or(|code| classes.contains(code))
    }

    /// Returns true if a record with these fields passes every predicate.
    #[must_use]
    pub fn matches(
        &self,
        id: TrademarkId,
        classes: &ClassCodes,
        description: &str,
        applicant_name: &str,
    ) -> bool {
        self.admits(id)
            && self.matches_classes(classes)
            && self.matches_text(description, applicant_name)
    }
}
