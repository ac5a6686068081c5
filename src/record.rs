use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::CityRecord;
use crate::category::Category;

/// Whether a record's value cell normalized to a number.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Numeric,
    Text,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Numeric => "numeric",
            DataType::Text => "text",
        }
    }
}

/// The fields produced by column mapping, before city/session metadata is
/// attached.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialRecord {
    pub item: String,
    pub value: Option<String>,
    pub value2: Option<String>,
    pub value3: Option<String>,
    pub note: Option<String>,
    pub data_type: DataType,
}

/// The canonical output unit. Every sink (CSV, JSONL, database) consumes a
/// sequence of these.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StandardRecord {
    pub city: String,
    pub country: String,
    pub region: String,
    pub category: Category,
    pub table_caption: String,
    pub imported_at: DateTime<Utc>,
    pub item: String,
    pub value: Option<String>,
    pub value2: Option<String>,
    pub value3: Option<String>,
    pub note: Option<String>,
    pub data_type: DataType,
}

impl StandardRecord {
    /// Column names in output order, shared by the CSV sink and the
    /// database schema.
    pub const COLUMNS: [&'static str; 12] = [
        "city",
        "country",
        "region",
        "category",
        "table_caption",
        "imported_at",
        "item",
        "value",
        "value2",
        "value3",
        "note",
        "data_type",
    ];
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("incomplete city record: city name is empty")]
pub struct IncompleteCityRecord;

/// Merge a mapped row with its city and session context. Pure; the only
/// failure is a city record with no city name.
pub fn assemble(
    partial: PartialRecord,
    city: &CityRecord,
    category: Category,
    table_caption: &str,
    imported_at: DateTime<Utc>,
) -> Result<StandardRecord, IncompleteCityRecord> {
    if city.city.trim().is_empty() {
        return Err(IncompleteCityRecord);
    }

    Ok(StandardRecord {
        city: city.city.clone(),
        country: city.country.clone(),
        region: city.region.clone(),
        category,
        table_caption: table_caption.to_string(),
        imported_at,
        item: partial.item,
        value: partial.value,
        value2: partial.value2,
        value3: partial.value3,
        note: partial.note,
        data_type: partial.data_type,
    })
}
