use super::ReferenceTable;

pub static COMMON_FORM_TYPES: ReferenceTable = ReferenceTable::new(&[
    ("10-K", "Annual Report"),
    ("10-Q", "Quarterly Report"),
    ("8-K", "Current Report (major events)"),
    ("10-K/A", "Annual Report Amendment"),
    ("10-Q/A", "Quarterly Report Amendment"),
    ("S-1", "Registration Statement"),
    ("S-3", "Registration Statement (simplified)"),
    ("S-4", "Registration Statement (business combinations)"),
    ("S-8", "Registration Statement (employee benefit plans)"),
    ("424B", "Prospectus"),
    ("DEF 14A", "Definitive Proxy Statement"),
    ("PRE 14A", "Preliminary Proxy Statement"),
    ("DEFA14A", "Additional Proxy Soliciting Materials"),
    ("3", "Initial Statement of Beneficial Ownership"),
    ("4", "Statement of Changes in Beneficial Ownership"),
    ("5", "Annual Statement of Changes in Beneficial Ownership"),
    ("13F-HR", "Institutional Investment Manager Holdings Report"),
    ("13D", "Schedule 13D - Beneficial Ownership Report"),
    ("13G", "Schedule 13G - Beneficial Ownership Report (passive)"),
    ("SC 13D", "Tender Offer Statement"),
    ("SC 13G", "Tender Offer Statement (passive)"),
    ("SC TO", "Tender Offer Statement"),
    ("20-F", "Annual Report (foreign private issuers)"),
    ("6-K", "Current Report (foreign private issuers)"),
    ("N-CSR", "Certified Shareholder Report (investment companies)"),
    ("N-Q", "Quarterly Schedule of Investments"),
    ("485BPOS", "Post-Effective Amendment (investment companies)"),
]);

/// Browsing groups for the form catalogue. Forms outside every group are still listed.
pub const FORM_GROUPS: &[(&str, &[&str])] = &[
    (
        "Annual & Quarterly Reports",
        &["10-K", "10-Q", "8-K", "10-K/A", "10-Q/A"],
    ),
    (
        "Registration & Offerings",
        &["S-1", "S-3", "S-4", "S-8", "424B"],
    ),
    ("Proxy Materials", &["DEF 14A", "PRE 14A", "DEFA14A"]),
    (
        "Ownership Reports",
        &["3", "4", "5", "13F-HR", "13D", "13G"],
    ),
    ("Foreign Companies", &["20-F", "6-K"]),
];

/// Form type carrying insider transaction reports.
pub const INSIDER_FORM: &str = "4";

pub fn form_description(form: &str) -> &'static str {
    COMMON_FORM_TYPES.get(form).unwrap_or("Unknown form type")
}

pub fn form_group(form: &str) -> Option<&'static str> {
    FORM_GROUPS
        .iter()
        .find(|(_, forms)| forms.contains(&form))
        .map(|(group, _)| *group)
}
