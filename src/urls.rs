use url::Url;

use crate::category::Category;

#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("invalid city identifier '{0}': empty or malformed")]
    InvalidCityIdentifier(String),
}

/// Builds category page URLs. Pure: identical inputs always produce the
/// identical URL.
#[derive(Debug, Clone)]
pub struct UrlBuilder {
    base_url: String,
}

impl UrlBuilder {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Build the category page URL for a city. The identifier is either a
    /// bare slug ("Paris") or a full previously-validated city URL, from
    /// which the slug is the final path segment.
    pub fn build(&self, identifier: &str, category: Category) -> Result<String, UrlError> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(UrlError::InvalidCityIdentifier(identifier.to_string()));
        }

        let slug = if identifier.starts_with("http://") || identifier.starts_with("https://") {
            extract_city_slug(identifier)
                .ok_or_else(|| UrlError::InvalidCityIdentifier(identifier.to_string()))?
        } else {
            identifier.to_string()
        };

        if slug.is_empty() || slug.contains('/') || slug.contains(char::is_whitespace) {
            return Err(UrlError::InvalidCityIdentifier(slug));
        }

        Ok(format!("{}/{}/in/{}", self.base_url, category.path_segment(), slug))
    }

    /// URLs for every category of one city, in the fixed category order.
    pub fn all_category_urls(&self, identifier: &str) -> Result<Vec<(Category, String)>, UrlError> {
        Category::ALL
            .iter()
            .map(|&cat| self.build(identifier, cat).map(|url| (cat, url)))
            .collect()
    }
}

/// Extract the city slug from a full city page URL
/// (`https://host/quality-of-life/in/Paris` -> `Paris`).
pub fn extract_city_slug(city_url: &str) -> Option<String> {
    let parsed = Url::parse(city_url).ok()?;
    let last = parsed.path_segments()?.filter(|s| !s.is_empty()).last()?;
    if last.is_empty() {
        None
    } else {
        Some(last.to_string())
    }
}

/// Derive a URL slug from a city name: drop everything but letters, digits
/// and spaces, then hyphenate. The site capitalizes the first letter and
/// lowercases the rest ("New York" -> "New-york").
pub fn slug_from_city_name(name: &str) -> String {
    let mut chars = name.trim().chars();
    let cased: String = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
        None => return String::new(),
    };

    let cleaned: String = cased
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();

    cleaned
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}
