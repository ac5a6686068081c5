use clap::{Parser, Subcommand};

use crate::category::Category;

#[derive(Parser, Debug)]
#[command(name = "cityscraper")]
#[command(about = "Scrapes city statistics tables into a normalized CSV/JSONL/SQLite dataset")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Create default configuration file at ./config/cityscraper.toml
    #[arg(long, global = true)]
    pub init: bool,

    /// CSV file with the cities to scrape (columns: city,country[,region][,slug_or_url])
    #[arg(short, long, value_name = "FILE")]
    pub input_file: Option<String>,

    /// Single city to scrape: a site slug ("Paris") or a full city page URL
    #[arg(short, long)]
    pub city: Option<String>,

    /// Country for --city (used in output metadata and file names)
    #[arg(long)]
    pub country: Option<String>,

    /// Region for --city
    #[arg(long)]
    pub region: Option<String>,

    /// Categories to scrape, comma separated (default: all)
    #[arg(long, value_delimiter = ',', value_name = "CATEGORY")]
    pub categories: Vec<Category>,

    /// Output format: 'csv', 'json' or 'both' (overrides config)
    #[arg(short = 'f', long)]
    pub output_format: Option<String>,

    /// Directory that session directories are created under (overrides config)
    #[arg(long)]
    pub output_dir: Option<String>,

    /// Politeness delay between requests in milliseconds (overrides config)
    #[arg(long, value_name = "MS")]
    pub request_delay_ms: Option<u64>,

    /// Maximum retry attempts for network failures (overrides config)
    #[arg(long, value_name = "COUNT")]
    pub max_retries: Option<u32>,

    /// Verbose logging (use -v for detail, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export execution logs to a file
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Concatenate all per-city CSVs in a session directory into one combined dataset
    Merge {
        /// Session directory to merge
        session_dir: String,
    },

    /// Bulk-import a merged dataset into the SQLite table
    Upload {
        /// Merged CSV file, or a session directory containing one
        dataset: String,

        /// Drop and recreate the destination table first (destructive)
        #[arg(long)]
        reset_table: bool,

        /// Skip the interactive confirmation for --reset-table
        #[arg(short = 'y', long)]
        yes: bool,

        /// SQLite database file (overrides config)
        #[arg(long, value_name = "FILE")]
        database: Option<String>,
    },
}

impl Cli {
    /// True when the invocation is a scrape run (no subcommand, not --init).
    pub fn is_scrape_mode(&self) -> bool {
        self.command.is_none() && !self.init
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.is_scrape_mode() {
            match (&self.input_file, &self.city) {
                (None, None) => {
                    return Err("Either --input-file or --city is required (or use --init / a subcommand)".to_string())
                }
                (Some(_), Some(_)) => {
                    return Err("--input-file and --city are mutually exclusive".to_string())
                }
                _ => {}
            }
        }

        if let Some(format) = &self.output_format {
            if !["csv", "json", "both"].contains(&format.as_str()) {
                return Err("Output format must be 'csv', 'json' or 'both'".to_string());
            }
        }

        if self.country.is_some() && self.city.is_none() {
            return Err("--country requires --city".to_string());
        }

        Ok(())
    }

    /// The categories for this run, defaulting to all of them.
    pub fn selected_categories(&self) -> Vec<Category> {
        if self.categories.is_empty() {
            Category::ALL.to_vec()
        } else {
            // Preserve CLI order but drop duplicates
            let mut seen = Vec::new();
            for &cat in &self.categories {
                if !seen.contains(&cat) {
                    seen.push(cat);
                }
            }
            seen
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scrape_requires_input() {
        let cli = Cli::parse_from(["cityscraper"]);
        assert!(cli.validate().is_err());

        let cli = Cli::parse_from(["cityscraper", "--city", "Paris"]);
        assert!(cli.validate().is_ok());

        let cli = Cli::parse_from(["cityscraper", "-i", "cities.csv"]);
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_input_file_and_city_are_exclusive() {
        let cli = Cli::parse_from(["cityscraper", "-i", "cities.csv", "--city", "Paris"]);
        assert!(cli.validate().is_err());
    }

    #[test]
    fn test_subcommand_does_not_require_city() {
        let cli = Cli::parse_from(["cityscraper", "merge", "output/20240101_000000"]);
        assert!(cli.validate().is_ok());
        assert!(!cli.is_scrape_mode());
    }

    #[test]
    fn test_categories_parse_and_dedupe() {
        let cli = Cli::parse_from([
            "cityscraper",
            "--city",
            "Paris",
            "--categories",
            "climate,crime,climate",
        ]);
        assert_eq!(cli.selected_categories(), vec![Category::Climate, Category::Crime]);
    }

    #[test]
    fn test_default_categories_is_full_set() {
        let cli = Cli::parse_from(["cityscraper", "--city", "Paris"]);
        assert_eq!(cli.selected_categories().len(), Category::ALL.len());
    }

    #[test]
    fn test_bad_category_rejected() {
        assert!(Cli::try_parse_from(["cityscraper", "--city", "P", "--categories", "weather"]).is_err());
    }

    #[test]
    fn test_bad_output_format_rejected() {
        let cli = Cli::parse_from(["cityscraper", "--city", "Paris", "-f", "xlsx"]);
        assert!(cli.validate().is_err());
    }
}
