use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// One city to scrape. `slug_or_url` is either a bare site slug ("paris")
/// or a full city page URL; when the input file provides neither, a slug is
/// derived from the city name at load time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CityRecord {
    pub city: String,
    pub country: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub slug_or_url: String,
}

/// Loads the city list from a CSV file with columns
/// `city,country[,region][,slug_or_url]`. Rows missing a city or country
/// are skipped with a warning rather than failing the load.
pub fn load_cities(path: &Path) -> Result<Vec<CityRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open city list: {}", path.display()))?;

    let headers = reader.headers().context("Failed to read city list header")?.clone();
    let col = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));

    let city_col = col("city");
    let country_col = col("country");
    let region_col = col("region");
    let slug_col = col("slug_or_url").or_else(|| col("slug")).or_else(|| col("url"));

    let (city_col, country_col) = match (city_col, country_col) {
        (Some(ci), Some(co)) => (ci, co),
        _ => anyhow::bail!(
            "City list {} must have 'city' and 'country' columns",
            path.display()
        ),
    };

    let mut cities = Vec::new();
    for (line, result) in reader.records().enumerate() {
        let row = match result {
            Ok(row) => row,
            Err(e) => {
                warn!("Skipping malformed row {} in {}: {}", line + 2, path.display(), e);
                continue;
            }
        };

        let field = |idx: Option<usize>| {
            idx.and_then(|i| row.get(i)).unwrap_or_default().trim().to_string()
        };

        let city = field(Some(city_col));
        let country = field(Some(country_col));
        if city.is_empty() || country.is_empty() {
            warn!(
                "Skipping row {} in {}: missing city or country",
                line + 2,
                path.display()
            );
            continue;
        }

        let mut slug_or_url = field(slug_col);
        if slug_or_url.is_empty() {
            slug_or_url = crate::urls::slug_from_city_name(&city);
            debug!("Derived slug '{}' for {}", slug_or_url, city);
        }

        cities.push(CityRecord {
            city,
            country,
            region: field(region_col),
            slug_or_url,
        });
    }

    debug!("Loaded {} cities from {}", cities.len(), path.display());
    Ok(cities)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_cities_basic() {
        let file = write_csv("city,country,region,slug_or_url\nParis,France,,paris\nLyon,France,Auvergne-Rhone-Alpes,\n");
        let cities = load_cities(file.path()).unwrap();

        assert_eq!(cities.len(), 2);
        assert_eq!(cities[0].slug_or_url, "paris");
        // Missing slug falls back to a derived one
        assert_eq!(cities[1].slug_or_url, "Lyon");
        assert_eq!(cities[1].region, "Auvergne-Rhone-Alpes");
    }

    #[test]
    fn test_load_cities_skips_incomplete_rows() {
        let file = write_csv("city,country\nParis,France\n,France\nBerlin,\n");
        let cities = load_cities(file.path()).unwrap();
        assert_eq!(cities.len(), 1);
        assert_eq!(cities[0].city, "Paris");
    }

    #[test]
    fn test_load_cities_requires_header_columns() {
        let file = write_csv("name,nation\nParis,France\n");
        assert!(load_cities(file.path()).is_err());
    }
}
