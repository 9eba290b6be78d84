//! In-process [`PopulationStore`].
//!
//! Holds records and regions in memory and mirrors the `PostGIS` query
//! semantics: ordering by year then municipality identifier, regions left
//! joined against their per-year sums, and SQL `SUM` treating missing
//! values as absent rather than zero.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use population_map_database_models::{RecordQuery, RegionPopulationRow};
use population_map_population_models::{DemographicRecord, PopulationCounts, Region};

use crate::{DbError, PopulationStore};

/// A [`PopulationStore`] over records held in memory.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<Vec<DemographicRecord>>,
    regions: Vec<Region>,
    latency: Option<Duration>,
    record_queries: AtomicUsize,
}

impl MemoryStore {
    /// Creates a store over the given records and regions.
    #[must_use]
    pub fn new(records: Vec<DemographicRecord>, regions: Vec<Region>) -> Self {
        Self {
            records: RwLock::new(records),
            regions,
            latency: None,
            record_queries: AtomicUsize::new(0),
        }
    }

    /// Delays every record query by `latency`, to widen race windows.
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Replaces all stored records.
    pub fn replace_records(&self, records: Vec<DemographicRecord>) {
        *self.records.write().unwrap_or_else(PoisonError::into_inner) = records;
    }

    /// Number of [`PopulationStore::records`] calls served so far.
    #[must_use]
    pub fn record_queries(&self) -> usize {
        self.record_queries.load(Ordering::SeqCst)
    }

    fn snapshot(&self) -> Vec<DemographicRecord> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

fn sum_present(acc: Option<i64>, value: Option<i64>) -> Option<i64> {
    match (acc, value) {
        (Some(a), Some(v)) => Some(a + v),
        (None, v) => v,
        (a, None) => a,
    }
}

#[async_trait]
impl PopulationStore for MemoryStore {
    async fn records(&self, query: &RecordQuery) -> Result<Vec<DemographicRecord>, DbError> {
        self.record_queries.fetch_add(1, Ordering::SeqCst);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let mut records: Vec<DemographicRecord> = self
            .snapshot()
            .into_iter()
            .filter(|r| query.matches(r.year, r.municipality_id.as_deref()))
            .collect();

        records.sort_by(|a, b| {
            a.year
                .cmp(&b.year)
                .then_with(|| a.municipality_id.cmp(&b.municipality_id))
        });

        Ok(records)
    }

    async fn distinct_years(&self) -> Result<Vec<i32>, DbError> {
        let mut years: Vec<i32> = self.snapshot().iter().map(|r| r.year).collect();
        years.sort_unstable();
        years.dedup();
        Ok(years)
    }

    async fn region_populations(&self, year: i32) -> Result<Vec<RegionPopulationRow>, DbError> {
        let mut sums: BTreeMap<i32, PopulationCounts> = BTreeMap::new();

        for record in self.snapshot().iter().filter(|r| r.year == year) {
            let Some(region_id) = record.region_id else {
                continue;
            };
            let sum = sums.entry(region_id).or_default();
            sum.total = sum_present(sum.total, record.counts.total);
            sum.male = sum_present(sum.male, record.counts.male);
            sum.female = sum_present(sum.female, record.counts.female);
        }

        let mut rows: Vec<RegionPopulationRow> = self
            .regions
            .iter()
            .map(|region| RegionPopulationRow {
                region_id: region.id,
                name: region.name.clone(),
                center: region.center,
                counts: sums.get(&region.id).copied().unwrap_or_default(),
            })
            .collect();
        rows.sort_by_key(|row| row.region_id);

        Ok(rows)
    }

    async fn record_count(&self) -> Result<u64, DbError> {
        let len = self.snapshot().len();
        u64::try_from(len).map_err(|e| DbError::Conversion {
            message: format!("Record count {len} out of range: {e}"),
        })
    }
}
