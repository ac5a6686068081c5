use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// The closed set of scrapeable categories. Each variant corresponds to one
/// section of the source site and carries a static descriptor: the URL path
/// segment, the CSS classes of its data tables, and the positional mapping
/// of table cells onto the standardized record fields.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    QualityOfLife,
    Crime,
    CostOfLiving,
    HealthCare,
    Climate,
    PropertyInvestment,
    Traffic,
    Pollution,
}

/// Positional mapping from raw table cells to standardized record fields.
/// Indices past the end of a short row resolve to empty fields.
#[derive(Debug, Clone, Copy)]
pub struct ColumnMapping {
    pub item: usize,
    pub value: Option<usize>,
    pub value2: Option<usize>,
    pub value3: Option<usize>,
    pub note: Option<usize>,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::QualityOfLife,
        Category::Crime,
        Category::CostOfLiving,
        Category::HealthCare,
        Category::Climate,
        Category::PropertyInvestment,
        Category::Traffic,
        Category::Pollution,
    ];

    /// Canonical name used in the `category` column, file names and reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::QualityOfLife => "quality_of_life",
            Category::Crime => "crime",
            Category::CostOfLiving => "cost_of_living",
            Category::HealthCare => "health_care",
            Category::Climate => "climate",
            Category::PropertyInvestment => "property_investment",
            Category::Traffic => "traffic",
            Category::Pollution => "pollution",
        }
    }

    /// Path segment of the category page, e.g. `cost-of-living` in
    /// `https://host/cost-of-living/in/Paris`.
    pub fn path_segment(&self) -> &'static str {
        match self {
            Category::QualityOfLife => "quality-of-life",
            Category::Crime => "crime",
            Category::CostOfLiving => "cost-of-living",
            Category::HealthCare => "health-care",
            Category::Climate => "climate",
            Category::PropertyInvestment => "property-investment",
            Category::Traffic => "traffic",
            Category::Pollution => "pollution",
        }
    }

    /// CSS classes of the data tables on this category's page. An empty
    /// slice means every `<table>` on the page is a data table (the climate
    /// page has no distinguishing classes).
    pub fn table_classes(&self) -> &'static [&'static str] {
        match self {
            Category::CostOfLiving => &["data_wide_table"],
            Category::PropertyInvestment => &["table_indices", "data_wide_table"],
            Category::Traffic => &["table_builder_with_value_explanation", "data_wide_table"],
            Category::Climate => &[],
            _ => &["table_builder_with_value_explanation"],
        }
    }

    /// How raw cells map onto (item, value, value2, value3, note).
    pub fn column_mapping(&self) -> ColumnMapping {
        match self {
            // item, price, low-high range split across two cells
            Category::CostOfLiving | Category::Climate => ColumnMapping {
                item: 0,
                value: Some(1),
                value2: Some(2),
                value3: Some(3),
                note: None,
            },
            Category::PropertyInvestment => ColumnMapping {
                item: 0,
                value: Some(1),
                value2: Some(2),
                value3: None,
                note: None,
            },
            // label, index value, qualitative level ("Low", "Moderate", ...)
            _ => ColumnMapping {
                item: 0,
                value: Some(1),
                value2: None,
                value3: None,
                note: Some(2),
            },
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown category '{0}' (expected one of: quality-of-life, crime, cost-of-living, health-care, climate, property-investment, traffic, pollution)")]
pub struct InvalidCategory(pub String);

impl FromStr for Category {
    type Err = InvalidCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Accept both the canonical snake_case name and the URL spelling.
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "quality_of_life" => Ok(Category::QualityOfLife),
            "crime" => Ok(Category::Crime),
            "cost_of_living" => Ok(Category::CostOfLiving),
            "health_care" => Ok(Category::HealthCare),
            "climate" => Ok(Category::Climate),
            "property_investment" => Ok(Category::PropertyInvestment),
            "traffic" => Ok(Category::Traffic),
            "pollution" => Ok(Category::Pollution),
            _ => Err(InvalidCategory(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_segments() {
        assert_eq!(Category::CostOfLiving.path_segment(), "cost-of-living");
        assert_eq!(Category::QualityOfLife.path_segment(), "quality-of-life");
        assert_eq!(Category::Crime.path_segment(), "crime");
    }

    #[test]
    fn test_from_str_accepts_both_spellings() {
        assert_eq!("cost-of-living".parse::<Category>().unwrap(), Category::CostOfLiving);
        assert_eq!("cost_of_living".parse::<Category>().unwrap(), Category::CostOfLiving);
        assert_eq!("Climate".parse::<Category>().unwrap(), Category::Climate);
        assert!("weather".parse::<Category>().is_err());
    }

    #[test]
    fn test_climate_matches_all_tables() {
        assert!(Category::Climate.table_classes().is_empty());
        assert_eq!(Category::CostOfLiving.table_classes(), &["data_wide_table"]);
    }

    #[test]
    fn test_display_round_trips() {
        for cat in Category::ALL {
            assert_eq!(cat.as_str().parse::<Category>().unwrap(), cat);
        }
    }
}
