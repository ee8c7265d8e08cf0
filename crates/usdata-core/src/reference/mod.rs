//! Static code-to-label tables used to annotate provider rows.
//!
//! Tables are process-wide constants: never written, safe to read from any
//! task without locking. Lookups never fail; unknown codes degrade to a
//! caller-chosen fallback label.

pub mod air_quality;
pub mod census;
pub mod drugs;
pub mod filings;
pub mod labor;

/// Read-only `code -> label` table preserving declaration order.
#[derive(Debug, Clone, Copy)]
pub struct ReferenceTable {
    entries: &'static [(&'static str, &'static str)],
}

impl ReferenceTable {
    pub const fn new(entries: &'static [(&'static str, &'static str)]) -> Self {
        Self { entries }
    }

    pub fn get(&self, code: &str) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|(candidate, _)| *candidate == code)
            .map(|(_, label)| *label)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.get(code).is_some()
    }

    /// Label for `code`, or `fallback(code)` when the code is not in the table.
    pub fn label_or_else<F>(&self, code: &str, fallback: F) -> String
    where
        F: FnOnce(&str) -> String,
    {
        self.get(code)
            .map(str::to_owned)
            .unwrap_or_else(|| fallback(code))
    }

    pub fn entries(&self) -> &'static [(&'static str, &'static str)] {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
