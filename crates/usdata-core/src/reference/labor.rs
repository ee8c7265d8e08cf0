use super::ReferenceTable;

/// Well-known BLS series.
pub static COMMON_SERIES: ReferenceTable = ReferenceTable::new(&[
    (
        "LNS14000000",
        "Unemployment Rate (Seasonally Adjusted) - National",
    ),
    ("LNS14000001", "Unemployment Rate - Men"),
    ("LNS14000002", "Unemployment Rate - Women"),
    (
        "CUUR0000SA0",
        "CPI for All Urban Consumers (All Items) - U.S. City Average",
    ),
    ("CUUR0000SAF1", "CPI - Food"),
    ("CUUR0000SA0E", "CPI - Energy"),
    (
        "CES0000000001",
        "Total Nonfarm Employment (Seasonally Adjusted)",
    ),
    (
        "CES0500000003",
        "Average Hourly Earnings of All Private Employees",
    ),
    ("PRU8010663", "Labor Productivity - Nonfarm Business"),
]);

pub fn series_description(series_id: &str) -> Option<&'static str> {
    COMMON_SERIES.get(series_id)
}
