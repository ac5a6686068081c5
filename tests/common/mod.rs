pub mod fixtures;
pub mod wiremock_helpers;

use cityscraper::catalog::CityRecord;
use cityscraper::config::{
    AppConfig, BackoffStrategy, DatabaseConfig, HttpConfig, OutputConfig, ScrapeConfig,
};

/// Test configuration pointed at a mock server, with politeness delays and
/// retries turned off so tests stay fast.
pub fn test_config(base_url: &str) -> AppConfig {
    AppConfig {
        http: HttpConfig {
            user_agent: "cityscraper-tests/1.0".to_string(),
            request_timeout_secs: 5,
        },
        scrape: ScrapeConfig {
            base_url: base_url.to_string(),
            request_delay_ms: 0,
            max_retries: 0,
            backoff_strategy: BackoffStrategy::Linear,
            backoff_base_delay_ms: 1,
            backoff_max_delay_ms: 10,
        },
        output: OutputConfig {
            output_dir: "output".to_string(),
            format: "csv".to_string(),
        },
        database: DatabaseConfig {
            path: "data/test.db".to_string(),
            table: "scraped_data".to_string(),
        },
    }
}

pub fn paris() -> CityRecord {
    CityRecord {
        city: "Paris".to_string(),
        country: "France".to_string(),
        region: String::new(),
        slug_or_url: "Paris".to_string(),
    }
}
