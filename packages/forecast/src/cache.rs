//! Forecast model cache.
//!
//! Builds one [`ForecastEntry`] per municipality identifier from the stored
//! history and keeps the result for the lifetime of the [`ForecastCache`].
//! The build is single-flight: concurrent first callers share one build,
//! and a failed build leaves the cache empty so the next caller retries.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use futures::future::{self, BoxFuture, FutureExt as _, Shared};
use population_map_database::PopulationStore;
use population_map_database_models::RecordQuery;
use population_map_population_models::{Coordinates, DemographicRecord, PopulationField};
use tokio::sync::OnceCell;

use crate::ForecastError;
use crate::polynomial::FittedModel;

/// Fitted models for one municipality identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastEntry {
    /// First-seen location of the municipality. Stored coordinates drift
    /// slightly between census years, so one is picked as representative.
    pub coordinates: Coordinates,
    /// Model of the total population.
    pub total: FittedModel,
    /// Model of the male population.
    pub male: FittedModel,
    /// Model of the female population.
    pub female: FittedModel,
}

impl ForecastEntry {
    /// Returns the model for `field`.
    #[must_use]
    pub const fn model(&self, field: PopulationField) -> &FittedModel {
        match field {
            PopulationField::Total => &self.total,
            PopulationField::Male => &self.male,
            PopulationField::Female => &self.female,
        }
    }
}

/// Forecast entries keyed by municipality identifier.
pub type ForecastEntries = BTreeMap<String, ForecastEntry>;

/// Yearly sums for one identifier, before fitting.
struct History {
    coordinates: Coordinates,
    years: BTreeMap<i32, [i64; 3]>,
}

impl History {
    fn samples(&self, field: PopulationField) -> Vec<(i32, i64)> {
        let idx = field_index(field);
        self.years
            .iter()
            .map(|(year, sums)| (*year, sums[idx]))
            .collect()
    }
}

const fn field_index(field: PopulationField) -> usize {
    match field {
        PopulationField::Total => 0,
        PopulationField::Male => 1,
        PopulationField::Female => 2,
    }
}

/// Fits forecast entries over `records`.
///
/// Records sharing a municipality identifier are summed per year; several
/// municipalities can share one postal identifier and are forecast as one
/// locality at the first-seen coordinates.
///
/// # Errors
///
/// * [`ForecastError::MalformedRecord`] if any record lacks a non-empty
///   municipality identifier. Nothing is returned for the other records.
/// * Any error from [`FittedModel::fit`].
pub fn build_entries(records: &[DemographicRecord]) -> Result<ForecastEntries, ForecastError> {
    let mut histories: BTreeMap<String, History> = BTreeMap::new();

    for record in records {
        let key = record
            .municipality_key()
            .ok_or_else(|| ForecastError::MalformedRecord {
                year: record.year,
                message: "missing municipality identifier".to_string(),
            })?;

        let history = histories
            .entry(key.to_string())
            .or_insert_with(|| History {
                coordinates: record.coordinates,
                years: BTreeMap::new(),
            });

        let sums = history.years.entry(record.year).or_insert([0; 3]);
        for field in PopulationField::all() {
            sums[field_index(*field)] += record.counts.count(*field);
        }
    }

    histories
        .into_iter()
        .map(|(key, history)| {
            let entry = ForecastEntry {
                coordinates: history.coordinates,
                total: FittedModel::fit(&history.samples(PopulationField::Total))?,
                male: FittedModel::fit(&history.samples(PopulationField::Male))?,
                female: FittedModel::fit(&history.samples(PopulationField::Female))?,
            };
            Ok((key, entry))
        })
        .collect()
}

/// Reads the forecast history from `store` and fits every entry.
///
/// Only records from 1990 onward are used; earlier census data is
/// incomplete.
///
/// # Errors
///
/// Returns [`ForecastError`] if the history cannot be read or any record is
/// malformed.
pub async fn build(store: &dyn PopulationStore) -> Result<ForecastEntries, ForecastError> {
    let start = Instant::now();
    let records = store.records(&RecordQuery::forecast_history()).await?;
    let record_count = records.len();

    let entries = tokio::task::spawn_blocking(move || build_entries(&records)).await??;

    log::info!(
        "Built {} forecast entries from {record_count} records in {:.2?}",
        entries.len(),
        start.elapsed()
    );

    Ok(entries)
}

/// Outcome of one build, shared by every caller waiting on it.
type BuildOutcome = Result<Arc<ForecastEntries>, Arc<ForecastError>>;

/// Handle on a build running in its own task.
type InflightBuild = Shared<BoxFuture<'static, BuildOutcome>>;

struct CacheState {
    store: Arc<dyn PopulationStore>,
    entries: OnceCell<Arc<ForecastEntries>>,
    inflight: Mutex<Option<InflightBuild>>,
    builds: AtomicUsize,
}

impl CacheState {
    fn inflight(&self) -> MutexGuard<'_, Option<InflightBuild>> {
        self.inflight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs one build and publishes the result.
    ///
    /// The in-flight slot is cleared only after the entries are stored, so
    /// a caller always finds one or the other.
    async fn run_build(&self) -> BuildOutcome {
        let outcome = match build(self.store.as_ref()).await {
            Ok(entries) => {
                let entries = Arc::new(entries);
                // Only this task writes the cell, so it is still empty.
                let _ = self.entries.set(entries.clone());
                Ok(entries)
            }
            Err(e) => {
                log::error!("Forecast model build failed: {e}");
                Err(Arc::new(e))
            }
        };
        self.inflight().take();
        outcome
    }
}

/// Lazily built, process-lifetime forecast entries.
///
/// The build runs in a spawned task rather than in the caller's future.
/// Callers only wait for it, so a caller dropped mid-build (a client
/// disconnecting, say) neither cancels nor restarts the build.
pub struct ForecastCache {
    state: Arc<CacheState>,
}

impl ForecastCache {
    /// Creates an empty cache that builds from `store` on first use.
    #[must_use]
    pub fn new(store: Arc<dyn PopulationStore>) -> Self {
        Self {
            state: Arc::new(CacheState {
                store,
                entries: OnceCell::new(),
                inflight: Mutex::new(None),
                builds: AtomicUsize::new(0),
            }),
        }
    }

    /// Returns the cached entries, building them first if needed.
    ///
    /// Concurrent callers wait on a single build and all receive the same
    /// mapping. When the build fails every waiting caller gets an error and
    /// the cache stays unbuilt, so the next call starts a new build.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ForecastError::Build`] wrapping the cause if a build was
    /// needed and failed.
    pub async fn get_or_build(&self) -> Result<Arc<ForecastEntries>, ForecastError> {
        if let Some(entries) = self.get() {
            return Ok(entries);
        }
        self.join_or_start_build().await.map_err(ForecastError::Build)
    }

    fn join_or_start_build(&self) -> InflightBuild {
        let mut slot = self.state.inflight();

        if let Some(entries) = self.get() {
            return future::ready(Ok(entries)).boxed().shared();
        }
        if let Some(inflight) = slot.as_ref() {
            return inflight.clone();
        }

        self.state.builds.fetch_add(1, Ordering::SeqCst);
        log::info!("Building forecast models...");

        let state = self.state.clone();
        let task = tokio::spawn(async move { state.run_build().await });

        let state = self.state.clone();
        let inflight = async move {
            task.await.unwrap_or_else(|e| {
                // The task never reached its own cleanup.
                state.inflight().take();
                Err(Arc::new(ForecastError::Join(e)))
            })
        }
        .boxed()
        .shared();

        *slot = Some(inflight.clone());
        inflight
    }

    /// Returns the entries if they have already been built.
    #[must_use]
    pub fn get(&self) -> Option<Arc<ForecastEntries>> {
        self.state.entries.get().map(Arc::clone)
    }

    /// Number of builds started so far.
    #[must_use]
    pub fn build_count(&self) -> usize {
        self.state.builds.load(Ordering::SeqCst)
    }
}

/// Predicts the population of `municipality_id` in `year`, rounded to the
/// nearest integer.
///
/// # Errors
///
/// * [`ForecastError::UnknownMunicipality`] if there is no entry for the
///   identifier.
/// * [`ForecastError::NonFinitePrediction`] if the model overflows.
#[allow(clippy::cast_possible_truncation)]
pub fn predict(
    entries: &ForecastEntries,
    municipality_id: &str,
    field: PopulationField,
    year: i32,
) -> Result<i64, ForecastError> {
    let entry = entries
        .get(municipality_id)
        .ok_or_else(|| ForecastError::UnknownMunicipality {
            municipality_id: municipality_id.to_string(),
        })?;

    let value = entry.model(field).evaluate(year).round();
    if !value.is_finite() {
        return Err(ForecastError::NonFinitePrediction {
            municipality_id: municipality_id.to_string(),
            year,
        });
    }

    Ok(value as i64)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use population_map_database::memory::MemoryStore;
    use population_map_population_models::PopulationCounts;

    use super::*;

    fn record(id: Option<&str>, lng: f64, year: i32, total: i64, male: i64) -> DemographicRecord {
        DemographicRecord {
            municipality_id: id.map(ToString::to_string),
            name: None,
            region_id: Some(1),
            coordinates: Coordinates::new(lng, 50.0),
            year,
            counts: PopulationCounts::new(total, male, total - male),
        }
    }

    fn history() -> Vec<DemographicRecord> {
        vec![
            record(Some("10178"), 13.40, 1985, 900, 450),
            record(Some("10178"), 13.41, 1990, 100, 50),
            record(Some("10178"), 13.42, 1995, 120, 60),
            record(Some("10178"), 13.43, 2000, 150, 70),
            record(Some("80331"), 11.57, 1990, 40, 20),
            record(Some("80331"), 11.58, 1990, 60, 30),
            record(Some("80331"), 11.57, 2000, 110, 55),
        ]
    }

    #[test]
    fn build_entries_sums_shared_identifiers() {
        let entries = build_entries(&history()).unwrap();
        assert_eq!(entries.len(), 2);

        // Two records share 80331 in 1990: 40 + 60.
        assert_eq!(predict(&entries, "80331", PopulationField::Total, 1990).unwrap(), 100);
        assert_eq!(predict(&entries, "80331", PopulationField::Male, 1990).unwrap(), 50);
        assert_eq!(entries["80331"].coordinates, Coordinates::new(11.57, 50.0));
    }

    #[test]
    fn build_entries_uses_first_seen_coordinates() {
        let entries = build_entries(&history()[1..]).unwrap();
        assert_eq!(entries["10178"].coordinates, Coordinates::new(13.41, 50.0));
    }

    #[test]
    fn build_entries_rejects_missing_identifier() {
        let mut records = history();
        records.push(record(None, 9.0, 2000, 5, 2));
        assert!(matches!(
            build_entries(&records),
            Err(ForecastError::MalformedRecord { year: 2000, .. })
        ));

        records.pop();
        records.push(record(Some("  "), 9.0, 1995, 5, 2));
        assert!(matches!(
            build_entries(&records),
            Err(ForecastError::MalformedRecord { year: 1995, .. })
        ));
    }

    #[test]
    fn predict_reproduces_training_points() {
        let entries = build_entries(&history()[1..]).unwrap();
        assert_eq!(predict(&entries, "10178", PopulationField::Total, 1995).unwrap(), 120);
        assert_eq!(predict(&entries, "10178", PopulationField::Female, 2000).unwrap(), 80);
        assert_eq!(
            predict(&entries, "10178", PopulationField::Total, 2010).unwrap(),
            predict(&entries, "10178", PopulationField::Total, 2010).unwrap()
        );
    }

    #[test]
    fn predict_unknown_municipality() {
        let entries = build_entries(&history()).unwrap();
        assert!(matches!(
            predict(&entries, "99999", PopulationField::Total, 2020),
            Err(ForecastError::UnknownMunicipality { .. })
        ));
    }

    #[tokio::test]
    async fn build_skips_records_before_1990() {
        let store = MemoryStore::new(history(), Vec::new());
        let entries = build(&store).await.unwrap();
        // The 1985 record (900) would dominate the fit if it were included.
        assert_eq!(predict(&entries, "10178", PopulationField::Total, 1990).unwrap(), 100);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_share_one_build() {
        let store = Arc::new(MemoryStore::new(history(), Vec::new()).with_latency(Duration::from_millis(50)));
        let cache = Arc::new(ForecastCache::new(store.clone()));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.get_or_build().await })
            })
            .collect();

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap().unwrap());
        }

        assert_eq!(cache.build_count(), 1);
        assert_eq!(store.record_queries(), 1);
        for entries in &results {
            assert!(Arc::ptr_eq(entries, &results[0]));
        }
    }

    #[tokio::test]
    async fn dropped_caller_does_not_restart_build() {
        let store = Arc::new(MemoryStore::new(history(), Vec::new()).with_latency(Duration::from_millis(200)));
        let cache = Arc::new(ForecastCache::new(store.clone()));

        let first = tokio::spawn({
            let cache = cache.clone();
            async move { cache.get_or_build().await.map(|entries| entries.len()) }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        first.abort();
        assert!(first.await.unwrap_err().is_cancelled());

        let entries = cache.get_or_build().await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(cache.build_count(), 1);
        assert_eq!(store.record_queries(), 1);
    }

    #[tokio::test]
    async fn build_finishes_without_waiting_callers() {
        let store = Arc::new(MemoryStore::new(history(), Vec::new()).with_latency(Duration::from_millis(50)));
        let cache = ForecastCache::new(store.clone());

        let waiter = cache.get_or_build();
        tokio::select! {
            _ = waiter => panic!("build finished before the timeout"),
            () = tokio::time::sleep(Duration::from_millis(10)) => {}
        }

        for _ in 0..100 {
            if cache.get().is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(cache.get().is_some());
        assert_eq!(cache.build_count(), 1);
        assert_eq!(store.record_queries(), 1);
    }

    #[tokio::test]
    async fn failed_build_leaves_cache_retryable() {
        let mut records = history();
        records.push(record(None, 9.0, 2000, 5, 2));
        let store = Arc::new(MemoryStore::new(records, Vec::new()));
        let cache = ForecastCache::new(store.clone());

        let err = cache.get_or_build().await.unwrap_err();
        assert!(matches!(err.root(), ForecastError::MalformedRecord { .. }));
        assert!(cache.get().is_none());

        store.replace_records(history());
        let entries = cache.get_or_build().await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(cache.build_count(), 2);

        cache.get_or_build().await.unwrap();
        assert_eq!(cache.build_count(), 2);
    }
}
