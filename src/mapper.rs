use crate::category::Category;
use crate::record::{DataType, PartialRecord};

/// Currency symbols stripped before deciding whether a cell is numeric.
const CURRENCY_CHARS: [char; 6] = ['€', '$', '£', '¥', '₹', '₽'];

/// Map one raw table row onto the standardized partial record for its
/// category. Rows whose item cell is empty are dropped (None) - this is the
/// deliberate empty-row filter, not an error. Missing expected cells become
/// empty fields rather than failures.
pub fn map_row(cells: &[String], category: Category) -> Option<PartialRecord> {
    let mapping = category.column_mapping();

    let item = cells.get(mapping.item)?.trim();
    if item.is_empty() {
        return None;
    }

    let cell = |idx: Option<usize>| {
        idx.and_then(|i| cells.get(i))
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
    };

    let value_raw = cell(mapping.value);
    let (value, value_is_numeric) = match value_raw {
        Some(raw) => {
            let (normalized, numeric) = normalize_value(raw);
            (Some(normalized), numeric)
        }
        None => (None, false),
    };

    Some(PartialRecord {
        item: item.to_string(),
        value,
        value2: cell(mapping.value2).map(|c| normalize_value(c).0),
        value3: cell(mapping.value3).map(|c| normalize_value(c).0),
        note: cell(mapping.note).map(str::to_string),
        data_type: if value_is_numeric { DataType::Numeric } else { DataType::Text },
    })
}

/// Normalize a value cell: strip currency symbols, thousands separators and
/// stray whitespace, and report whether the result is a number. Cells that
/// do not normalize to a number are kept verbatim (trimmed).
pub fn normalize_value(raw: &str) -> (String, bool) {
    let stripped: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && !CURRENCY_CHARS.contains(c))
        .filter(|c| *c != ',')
        .collect();

    if !stripped.is_empty() && stripped.parse::<f64>().is_ok() {
        (stripped, true)
    } else {
        (raw.trim().to_string(), false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_map_row_cost_of_living() {
        let cells = row(&["Meal, Inexpensive Restaurant", "15.00 €", "12.00", "20.00"]);
        let record = map_row(&cells, Category::CostOfLiving).unwrap();

        assert_eq!(record.item, "Meal, Inexpensive Restaurant");
        assert_eq!(record.value.as_deref(), Some("15.00"));
        assert_eq!(record.value2.as_deref(), Some("12.00"));
        assert_eq!(record.value3.as_deref(), Some("20.00"));
        assert_eq!(record.data_type, DataType::Numeric);
    }

    #[test]
    fn test_map_row_crime_with_note() {
        let cells = row(&["Level of crime", "32.10", "Low"]);
        let record = map_row(&cells, Category::Crime).unwrap();

        assert_eq!(record.value.as_deref(), Some("32.10"));
        assert_eq!(record.note.as_deref(), Some("Low"));
        assert!(record.value2.is_none());
        assert_eq!(record.data_type, DataType::Numeric);
    }

    #[test]
    fn test_map_row_drops_empty_item() {
        assert!(map_row(&row(&["", "1.00"]), Category::Crime).is_none());
        assert!(map_row(&row(&["   ", "1.00"]), Category::Crime).is_none());
        assert!(map_row(&[], Category::Crime).is_none());
    }

    #[test]
    fn test_map_row_short_row_keeps_missing_fields_empty() {
        let record = map_row(&row(&["Cost of Living Index"]), Category::CostOfLiving).unwrap();
        assert!(record.value.is_none());
        assert!(record.value2.is_none());
        assert_eq!(record.data_type, DataType::Text);
    }

    #[test]
    fn test_normalize_value_strips_currency_and_separators() {
        assert_eq!(normalize_value("15.00 €"), ("15.00".to_string(), true));
        assert_eq!(normalize_value("$1,234.56"), ("1234.56".to_string(), true));
        assert_eq!(normalize_value("-3.5"), ("-3.5".to_string(), true));
    }

    #[test]
    fn test_normalize_value_keeps_text_verbatim() {
        assert_eq!(normalize_value("12.00-20.00"), ("12.00-20.00".to_string(), false));
        assert_eq!(normalize_value("Moderate"), ("Moderate".to_string(), false));
        assert_eq!(normalize_value("  High  "), ("High".to_string(), false));
    }
}
