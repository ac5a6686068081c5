use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::category::Category;

// Compile CSS selectors once at startup. The .unwrap() calls are safe:
// the selector strings are compile-time constants with valid CSS syntax.
static HEADING_OR_TABLE_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("h2, h3, table").unwrap());

static CAPTION_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("caption").unwrap());

static TR_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").unwrap());

static CELL_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("td, th").unwrap());

static TH_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("th").unwrap());

/// Characters that would break file names or spreadsheet tab names when the
/// caption is reused downstream.
static CAPTION_STRIP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\\/*?:\[\]]").unwrap());

const CAPTION_MAX_CHARS: usize = 31;

/// One extracted table: its resolved caption and its rows as trimmed cell
/// text, in document order.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    pub caption: String,
    pub rows: Vec<Vec<String>>,
}

/// Extract the category's data tables from a page. Tables are matched by
/// the category's CSS classes (every table, for categories without
/// distinguishing classes) and returned in document order. No matching
/// table is an empty vec, not an error - some cities legitimately lack a
/// category's data.
pub fn extract(html: &str, category: Category) -> Vec<RawTable> {
    let document = Html::parse_document(html);
    let classes = category.table_classes();

    let mut tables = Vec::new();
    let mut last_heading: Option<String> = None;

    // One document-order pass over headings and tables, so each table can
    // fall back to the nearest preceding h2/h3 when it has no <caption>.
    for element in document.select(&HEADING_OR_TABLE_SELECTOR) {
        match element.value().name() {
            "h2" | "h3" => {
                let text = element_text(&element);
                if !text.is_empty() {
                    last_heading = Some(text);
                }
            }
            "table" => {
                if !matches_category(&element, classes) {
                    continue;
                }
                let rows = extract_rows(&element);
                if rows.is_empty() {
                    continue;
                }
                let caption = resolve_caption(&element, last_heading.as_deref(), tables.len() + 1);
                tables.push(RawTable { caption, rows });
            }
            _ => {}
        }
    }

    tables
}

fn matches_category(table: &ElementRef, classes: &[&str]) -> bool {
    if classes.is_empty() {
        return true;
    }
    classes
        .iter()
        .any(|class| table.value().classes().any(|c| c.eq_ignore_ascii_case(class)))
}

/// Caption resolution: <caption> text, else the nearest preceding heading,
/// else a positional fallback name.
fn resolve_caption(table: &ElementRef, last_heading: Option<&str>, index: usize) -> String {
    let caption = table
        .select(&CAPTION_SELECTOR)
        .next()
        .map(|c| element_text(&c))
        .filter(|text| !text.is_empty())
        .or_else(|| last_heading.map(str::to_string))
        .unwrap_or_else(|| format!("Table{}", index));

    sanitize_caption(&caption)
}

pub fn sanitize_caption(caption: &str) -> String {
    let cleaned = CAPTION_STRIP_RE.replace_all(caption, "");
    cleaned.trim().chars().take(CAPTION_MAX_CHARS).collect::<String>().trim_end().to_string()
}

fn extract_rows(table: &ElementRef) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    for (idx, tr) in table.select(&TR_SELECTOR).enumerate() {
        let cells: Vec<String> = tr.select(&CELL_SELECTOR).map(|cell| element_text(&cell)).collect();
        if cells.is_empty() {
            continue;
        }
        // A leading all-<th> row is a column header, not data.
        if idx == 0 {
            let th_count = tr.select(&TH_SELECTOR).count();
            if th_count == cells.len() {
                continue;
            }
        }
        rows.push(cells);
    }
    rows
}

/// Collect an element's descendant text with whitespace collapsed.
fn element_text(element: &ElementRef) -> String {
    element.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const COST_PAGE: &str = r#"
        <html><body>
        <h2>Restaurants</h2>
        <table class="data_wide_table">
            <tr><th>Item</th><th>Price</th><th>Range</th></tr>
            <tr><td>Meal, Inexpensive Restaurant</td><td>15.00 &euro;</td><td>12.00-20.00</td></tr>
            <tr><td>Cappuccino</td><td>3.20 &euro;</td><td>2.50-4.00</td></tr>
        </table>
        <h2>Markets</h2>
        <table class="data_wide_table">
            <tr><td>Milk (1 liter)</td><td>1.10 &euro;</td><td>0.90-1.40</td></tr>
        </table>
        <table class="table_indices">
            <tr><td>Cost of Living Index</td><td>74.5</td></tr>
        </table>
        </body></html>
    "#;

    #[test]
    fn test_extract_filters_by_class() {
        let tables = extract(COST_PAGE, Category::CostOfLiving);
        // table_indices is not a cost-of-living table
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].caption, "Restaurants");
        assert_eq!(tables[1].caption, "Markets");
    }

    #[test]
    fn test_extract_skips_header_row() {
        let tables = extract(COST_PAGE, Category::CostOfLiving);
        assert_eq!(tables[0].rows.len(), 2);
        assert_eq!(tables[0].rows[0][0], "Meal, Inexpensive Restaurant");
    }

    #[test]
    fn test_extract_preserves_document_order() {
        let tables = extract(COST_PAGE, Category::Climate);
        // Climate matches every table
        assert_eq!(tables.len(), 3);
        assert_eq!(tables[2].rows[0][0], "Cost of Living Index");
    }

    #[test]
    fn test_extract_no_matching_tables_is_empty() {
        let html = "<html><body><p>No data for this city.</p></body></html>";
        assert!(extract(html, Category::Crime).is_empty());
    }

    #[test]
    fn test_caption_prefers_caption_element() {
        let html = r#"
            <h2>Ignored Heading</h2>
            <table class="table_builder_with_value_explanation">
                <caption>Crime Index</caption>
                <tr><td>Level of crime</td><td>32.1</td><td>Low</td></tr>
            </table>
        "#;
        let tables = extract(html, Category::Crime);
        assert_eq!(tables[0].caption, "Crime Index");
    }

    #[test]
    fn test_caption_falls_back_to_positional_name() {
        let html = r#"
            <table class="table_builder_with_value_explanation">
                <tr><td>Safety walking alone</td><td>70.3</td><td>High</td></tr>
            </table>
        "#;
        let tables = extract(html, Category::Crime);
        assert_eq!(tables[0].caption, "Table1");
    }

    #[test]
    fn test_sanitize_caption_strips_and_truncates() {
        assert_eq!(sanitize_caption("Prices [2024/2025]*"), "Prices 20242025");
        let long = "A caption that is much longer than the thirty-one character limit";
        assert!(sanitize_caption(long).chars().count() <= 31);
    }
}
