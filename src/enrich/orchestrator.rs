//! Concurrent enrichment orchestration.
//!
//! For each district's record set the orchestrator derives the distinct
//! enrichment keys, dispatches one bounded-concurrency batch per kind with
//! a join barrier between kinds, and hands the collected outcome maps to
//! the merge step. Exactly one external call is issued per distinct key per
//! kind; a failed key resolves to [`FetchOutcome::Unavailable`] and never
//! aborts the batch.

use crate::enrich::error::EnrichError;
use crate::enrich::key::EnrichmentKey;
use crate::enrich::outcome::FetchOutcome;
use crate::enrich::providers::{
    AmenityProvider, LandCoverProvider, WeatherMetrics, WeatherProvider,
};
use crate::records::Record;
use crate::spatial::index::HexIndexer;
use bon::bon;
use chrono::NaiveDate;
use futures_util::stream::{self, StreamExt};
use h3o::CellIndex;
use log::{info, warn};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

/// Collected outcomes for one district, keyed for equality-merge onto the
/// district's records.
pub struct DistrictEnrichment {
    pub weather: HashMap<(CellIndex, NaiveDate), FetchOutcome<WeatherMetrics>>,
    pub land_cover: HashMap<CellIndex, FetchOutcome<f64>>,
    pub amenity: HashMap<CellIndex, FetchOutcome<u64>>,
}

impl DistrictEnrichment {
    /// Every key whose fetch resolved to unavailable, for run diagnostics.
    pub fn failed_keys(&self) -> Vec<EnrichmentKey> {
        let mut failed = Vec::new();
        for (&(cell, date), outcome) in &self.weather {
            if outcome.is_unavailable() {
                failed.push(EnrichmentKey::CellDate(cell, date));
            }
        }
        for (&cell, outcome) in &self.land_cover {
            if outcome.is_unavailable() {
                failed.push(EnrichmentKey::Cell(cell));
            }
        }
        for (&cell, outcome) in &self.amenity {
            if outcome.is_unavailable() {
                failed.push(EnrichmentKey::Cell(cell));
            }
        }
        failed
    }
}

/// Dispatches enrichment fetches with bounded concurrency, per-call timeout
/// and a bounded retry for transient failures.
pub struct Orchestrator {
    weather: Arc<dyn WeatherProvider>,
    land_cover: Arc<dyn LandCoverProvider>,
    amenity: Arc<dyn AmenityProvider>,
    concurrency: usize,
    call_timeout: Duration,
    max_retries: u32,
    land_cover_class: u8,
    amenity_category: String,
}

#[bon]
impl Orchestrator {
    /// Builds an orchestrator around the three injected providers.
    ///
    /// * `.concurrency(..)`: in-flight request bound per kind, defaults to
    ///   32. The bound is also the backpressure mechanism towards the
    ///   rate-limited services.
    /// * `.call_timeout(..)`: per-call deadline, defaults to 30 s. A timed
    ///   out call resolves to unavailable like any other failure.
    /// * `.max_retries(..)`: additional attempts for transient failures
    ///   only, defaults to 1.
    /// * `.land_cover_class(..)`: categorical class for the land-cover
    ///   percentage numerator, defaults to 6.
    /// * `.amenity_category(..)`: amenity tag to count, defaults to
    ///   "restaurant".
    #[builder]
    pub fn new(
        weather: Arc<dyn WeatherProvider>,
        land_cover: Arc<dyn LandCoverProvider>,
        amenity: Arc<dyn AmenityProvider>,
        concurrency: Option<usize>,
        call_timeout: Option<Duration>,
        max_retries: Option<u32>,
        land_cover_class: Option<u8>,
        #[builder(into)] amenity_category: Option<String>,
    ) -> Self {
        Self {
            weather,
            land_cover,
            amenity,
            concurrency: concurrency.unwrap_or(32).max(1),
            call_timeout: call_timeout.unwrap_or(Duration::from_secs(30)),
            max_retries: max_retries.unwrap_or(1),
            land_cover_class: land_cover_class.unwrap_or(6),
            amenity_category: amenity_category.unwrap_or_else(|| "restaurant".to_string()),
        }
    }

    /// Runs all three enrichment kinds for one district's records.
    ///
    /// Kinds run as sequential batches with a join barrier between them;
    /// within a kind, requests run concurrently up to the configured bound
    /// with no completion-order guarantee. The land-cover window is the
    /// district's observed date range; with no parseable dates at all there
    /// is no window and the land-cover batch is skipped (merge then applies
    /// the 0.0 default).
    pub async fn enrich_district(&self, records: &[Record]) -> DistrictEnrichment {
        let weather_keys = weather_keys(records);
        let cell_keys = cell_keys(records);
        let window = observed_date_window(records);
        info!(
            "Enriching {} records: {} weather key(s), {} cell key(s)",
            records.len(),
            weather_keys.len(),
            cell_keys.len()
        );

        let weather = self
            .run_batch("weather", weather_keys, |(cell, date)| {
                let provider = Arc::clone(&self.weather);
                async move {
                    provider.daily(HexIndexer::centroid(cell), date).await
                }
            })
            .await;

        let land_cover = match window {
            Some(window) => {
                self.run_batch("land-cover", cell_keys.clone(), |cell| {
                    let provider = Arc::clone(&self.land_cover);
                    let class = self.land_cover_class;
                    async move {
                        let boundary = HexIndexer::boundary(cell);
                        let class_area = provider.class_area(&boundary, window, class).await?;
                        let total_area = provider.total_area(&boundary, window).await?;
                        // Denominator floored at 1 to guard an empty reduction.
                        Ok((class_area / total_area.max(1.0)) * 100.0)
                    }
                })
                .await
            }
            None => HashMap::new(),
        };

        let amenity = self
            .run_batch("amenity", cell_keys, |cell| {
                let provider = Arc::clone(&self.amenity);
                let category = self.amenity_category.clone();
                async move {
                    let ring = HexIndexer::boundary(cell);
                    provider.count_in_polygon(&ring, &category).await
                }
            })
            .await;

        DistrictEnrichment {
            weather,
            land_cover,
            amenity,
        }
    }

    /// Dispatches one batch: every key exactly once, at most `concurrency`
    /// in flight, draining completely before returning.
    async fn run_batch<K, T, F, Fut>(
        &self,
        kind: &'static str,
        keys: Vec<K>,
        fetch: F,
    ) -> HashMap<K, FetchOutcome<T>>
    where
        K: Eq + Hash + Clone + fmt::Debug,
        F: Fn(K) -> Fut,
        Fut: Future<Output = Result<T, EnrichError>>,
    {
        let total = keys.len();
        let fetch = &fetch;
        let mut results = HashMap::with_capacity(total);
        let mut in_flight = stream::iter(keys.into_iter().map(|key| async move {
            let outcome = self.fetch_with_policy(kind, &key, fetch).await;
            (key, outcome)
        }))
        .buffer_unordered(self.concurrency);
        while let Some((key, outcome)) = in_flight.next().await {
            results.insert(key, outcome);
        }
        let unavailable = results.values().filter(|o| o.is_unavailable()).count();
        if unavailable > 0 {
            warn!("{kind}: {unavailable} of {total} key(s) resolved unavailable");
        }
        results
    }

    async fn fetch_with_policy<K, T, F, Fut>(
        &self,
        kind: &'static str,
        key: &K,
        fetch: &F,
    ) -> FetchOutcome<T>
    where
        K: Clone + fmt::Debug,
        F: Fn(K) -> Fut,
        Fut: Future<Output = Result<T, EnrichError>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = match tokio::time::timeout(self.call_timeout, fetch(key.clone())).await {
                Ok(result) => result,
                Err(_) => Err(EnrichError::Timeout(kind.to_string(), self.call_timeout)),
            };
            match result {
                Ok(value) => return FetchOutcome::Fetched(value),
                Err(e) if e.is_transient() && attempt <= self.max_retries => {
                    warn!(
                        "Transient {kind} failure for key {key:?} (attempt {attempt}): {e}; retrying"
                    );
                }
                Err(e) => {
                    warn!("{kind} fetch failed for key {key:?}: {e}");
                    return FetchOutcome::Unavailable;
                }
            }
        }
    }
}

/// Distinct (cell, date) pairs observed in the record set. The observed
/// pairs are by construction bounded to the set's date range; records
/// without a cell or date contribute no key.
pub fn weather_keys(records: &[Record]) -> Vec<(CellIndex, NaiveDate)> {
    let distinct: BTreeSet<(CellIndex, NaiveDate)> = records
        .iter()
        .filter_map(|record| record.cell.zip(record.event_date))
        .collect();
    distinct.into_iter().collect()
}

/// Distinct cells observed in the record set.
pub fn cell_keys(records: &[Record]) -> Vec<CellIndex> {
    let distinct: BTreeSet<CellIndex> = records.iter().filter_map(|record| record.cell).collect();
    distinct.into_iter().collect()
}

/// Min/max event date across the record set, or `None` when no record has
/// a parseable date.
pub fn observed_date_window(records: &[Record]) -> Option<(NaiveDate, NaiveDate)> {
    let mut dates = records.iter().filter_map(|record| record.event_date);
    let first = dates.next()?;
    let (min, max) = dates.fold((first, first), |(min, max), date| {
        (min.min(date), max.max(date))
    });
    Some((min, max))
}
