use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::catalog::CityRecord;
use crate::category::Category;
use crate::config::AppConfig;
use crate::extract;
use crate::fetch::{looks_blocked, FetchError, PageFetcher};
use crate::logger::SessionLogger;
use crate::mapper;
use crate::record;
use crate::stats::{Outcome, StatsTracker};
use crate::urls::UrlBuilder;
use crate::writer::SessionWriter;

/// The sequential scrape driver: one (city, category) unit is fetched,
/// parsed, mapped and written before the next begins. Failures are isolated
/// to the unit that caused them; the run always continues.
pub struct Pipeline {
    fetcher: PageFetcher,
    urls: UrlBuilder,
    writer: SessionWriter,
    logger: SessionLogger,
}

impl Pipeline {
    pub fn new(config: &AppConfig, writer: SessionWriter, logger: SessionLogger) -> Result<Self> {
        Ok(Self {
            fetcher: PageFetcher::new(&config.http, &config.scrape)?,
            urls: UrlBuilder::new(&config.scrape.base_url),
            writer,
            logger,
        })
    }

    /// Scrape every (city, category) pair, recording each outcome.
    pub async fn run(
        &self,
        cities: &[CityRecord],
        categories: &[Category],
        imported_at: DateTime<Utc>,
        stats: &mut StatsTracker,
    ) -> Result<()> {
        stats.set_total_cities(cities.len());
        let total_units = (cities.len() * categories.len()) as u64;
        self.logger.start_progress(total_units);

        for city in cities {
            self.logger.info(&format!("Processing {}, {}", city.city, city.country));

            for &category in categories {
                self.logger
                    .update_progress(&format!("{} / {}", city.city, category));

                let outcome = self.process_unit(city, category, imported_at).await;
                match &outcome {
                    Outcome::Success { tables, rows } => self.logger.debug(&format!(
                        "{} / {}: {} tables, {} rows",
                        city.city, category, tables, rows
                    )),
                    Outcome::Empty => self
                        .logger
                        .debug(&format!("{} / {}: no matching tables", city.city, category)),
                    other => self
                        .logger
                        .warn(&format!("{} / {}: {}", city.city, category, other.label())),
                }

                stats.record(&city.city, &city.country, category, outcome);
                self.logger.advance_progress();
            }
        }

        self.logger.finish_progress("Scraping completed");
        Ok(())
    }

    /// Process one (city, category) unit end to end, mapping every failure
    /// to its recorded outcome.
    pub async fn process_unit(
        &self,
        city: &CityRecord,
        category: Category,
        imported_at: DateTime<Utc>,
    ) -> Outcome {
        let url = match self.urls.build(&city.slug_or_url, category) {
            Ok(url) => url,
            Err(e) => {
                warn!("Skipping {} / {}: {}", city.city, category, e);
                return Outcome::InvalidInput { detail: e.to_string() };
            }
        };

        let html = match self.fetcher.fetch(&url).await {
            Ok(html) => html,
            Err(FetchError::Status { status, .. }) => {
                return Outcome::HttpStatus { code: status.as_u16() }
            }
            Err(e @ FetchError::Network { .. }) => {
                return Outcome::NetworkError { detail: e.to_string() }
            }
        };

        if looks_blocked(&html) {
            warn!("Page appears to be blocked: {}", url);
            return Outcome::Blocked;
        }

        let tables = extract::extract(&html, category);
        if tables.is_empty() {
            return Outcome::Empty;
        }

        let table_count = tables.len();
        let mut records = Vec::new();
        for table in &tables {
            for row in &table.rows {
                let Some(partial) = mapper::map_row(row, category) else {
                    continue;
                };
                match record::assemble(partial, city, category, &table.caption, imported_at) {
                    Ok(rec) => records.push(rec),
                    Err(e) => {
                        // City metadata is validated at catalog load; a miss
                        // here invalidates the whole unit.
                        return Outcome::InvalidInput { detail: e.to_string() };
                    }
                }
            }
        }

        if records.is_empty() {
            debug!("{} tables matched for {} / {} but no usable rows", table_count, city.city, category);
            return Outcome::ParseError {
                detail: format!("{} tables matched but no row mapped to a usable record", table_count),
            };
        }

        match self.writer.write(city, category, &records) {
            Ok(rows) => Outcome::Success {
                tables: table_count,
                rows,
            },
            Err(e) => Outcome::WriteError { detail: format!("{:#}", e) },
        }
    }

    pub fn session_dir(&self) -> &std::path::Path {
        self.writer.session_dir()
    }
}
