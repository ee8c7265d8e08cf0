use super::ReferenceTable;

/// FDA recall severity classes keyed by roman numeral.
pub static RECALL_CLASSIFICATIONS: ReferenceTable = ReferenceTable::new(&[
    (
        "I",
        "Class I - Dangerous or defective products that predictably could cause serious health problems or death",
    ),
    (
        "II",
        "Class II - Products that might cause a temporary health problem, or pose a slight threat of a serious nature",
    ),
    (
        "III",
        "Class III - Products unlikely to cause any adverse health reaction, but violate FDA labeling or manufacturing regulations",
    ),
]);

pub const COMMON_ADVERSE_REACTIONS: &[&str] = &[
    "nausea",
    "headache",
    "dizziness",
    "fatigue",
    "diarrhea",
    "vomiting",
    "rash",
    "pruritus",
    "insomnia",
    "anxiety",
    "depression",
    "pain",
    "fever",
    "cough",
    "dyspnea",
];

/// Severity text for a provider classification label such as `"Class II"`.
///
/// The class token must match exactly; `"Class II"` never resolves to Class I.
pub fn classification_description(label: &str) -> Option<&'static str> {
    let token = label.trim();
    let token = token
        .strip_prefix("Class")
        .map(str::trim_start)
        .unwrap_or(token);
    RECALL_CLASSIFICATIONS.get(token)
}

/// The provider's own encoding of a classification filter value.
pub fn classification_query_value(class: &str) -> String {
    format!("Class+{class}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_exact_class_token() {
        assert!(classification_description("Class II")
            .is_some_and(|text| text.starts_with("Class II -")));
        assert!(classification_description("Class III")
            .is_some_and(|text| text.starts_with("Class III -")));
        assert!(classification_description("Class I")
            .is_some_and(|text| text.starts_with("Class I -")));
        assert_eq!(classification_description("Not Yet Classified"), None);
    }

    #[test]
    fn rewrites_filter_value() {
        assert_eq!(classification_query_value("I"), "Class+I");
    }
}
