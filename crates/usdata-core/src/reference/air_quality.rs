use super::ReferenceTable;

/// Common AQS pollutant parameter codes.
pub static COMMON_PARAMS: ReferenceTable = ReferenceTable::new(&[
    ("44201", "Ozone"),
    ("42401", "Sulfur dioxide"),
    ("42101", "Carbon monoxide"),
    ("42602", "Nitrogen dioxide (NO2)"),
    ("81102", "PM10 Total 0-10um"),
    ("88101", "PM2.5 - Local Conditions"),
    ("88502", "Acceptable PM2.5 AQI Specs"),
    ("14129", "Lead (TSP) LC"),
]);

pub fn param_description(code: &str) -> &'static str {
    COMMON_PARAMS.get(code).unwrap_or("Unknown")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_param_is_labelled_unknown() {
        assert_eq!(param_description("88101"), "PM2.5 - Local Conditions");
        assert_eq!(param_description("00000"), "Unknown");
    }
}
