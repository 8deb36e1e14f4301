//! Read-only analytics over the record store.
//!
//! Every operation reloads the store and returns `Err` only when the store
//! cannot be read. An empty result means there is no matching data.

use std::collections::{BTreeMap, HashMap};

use chrono::Duration;

use crate::{
    clock::Clock,
    error::StoreError,
    model::{Observation, location_key, round2},
    store::ObservationStore,
};

/// Hottest and coldest observation of a selection.
#[derive(Debug, Clone, PartialEq)]
pub struct Extremes {
    pub hottest: Observation,
    pub coldest: Observation,
}

pub struct QueryEngine<'a> {
    store: &'a dyn ObservationStore,
    clock: &'a dyn Clock,
}

impl<'a> QueryEngine<'a> {
    pub fn new(store: &'a dyn ObservationStore, clock: &'a dyn Clock) -> Self {
        Self { store, clock }
    }

    /// Full history, newest first. Equal timestamps keep insertion order.
    pub fn all_sorted_desc(&self) -> Result<Vec<Observation>, StoreError> {
        let mut observations = self.store.try_load()?;
        observations.sort_by(|a, b| b.observed_at_utc.cmp(&a.observed_at_utc));
        Ok(observations)
    }

    /// Mean temperature per location, rounded to two decimals.
    ///
    /// Locations are grouped case-insensitively; the map key is the spelling
    /// of the first stored observation of each group.
    pub fn average_by_location(&self) -> Result<BTreeMap<String, f64>, StoreError> {
        let observations = self.store.try_load()?;

        let mut groups: Vec<(String, f64, usize)> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for obs in &observations {
            let slot = *index.entry(obs.location_key()).or_insert_with(|| {
                groups.push((obs.location.clone(), 0.0, 0));
                groups.len() - 1
            });
            let (_, sum, count) = &mut groups[slot];
            *sum += obs.temperature_c;
            *count += 1;
        }

        Ok(groups
            .into_iter()
            .map(|(name, sum, count)| (name, round2(sum / count as f64)))
            .collect())
    }

    /// Hottest and coldest observation, optionally limited to the trailing
    /// `window` before now. `None` when nothing qualifies.
    ///
    /// Candidates are scanned newest first; ties go to the first one seen.
    pub fn extremes(&self, window: Option<Duration>) -> Result<Option<Extremes>, StoreError> {
        let mut observations = self.all_sorted_desc()?;

        if let Some(window) = window {
            let now = self.clock.now();
            // A window reaching past the representable range covers all history.
            match now.checked_sub_signed(window) {
                Some(since) => observations
                    .retain(|obs| obs.observed_at_utc > since && obs.observed_at_utc <= now),
                None => observations.retain(|obs| obs.observed_at_utc <= now),
            }
        }

        let mut iter = observations.into_iter();
        let Some(first) = iter.next() else {
            return Ok(None);
        };

        let mut hottest = first.clone();
        let mut coldest = first;
        for obs in iter {
            if obs.temperature_c > hottest.temperature_c {
                hottest = obs.clone();
            }
            if obs.temperature_c < coldest.temperature_c {
                coldest = obs;
            }
        }

        Ok(Some(Extremes { hottest, coldest }))
    }

    /// Observations for one location (case-insensitive), oldest first.
    pub fn series_for_location(&self, location: &str) -> Result<Vec<Observation>, StoreError> {
        let key = location_key(location);
        let mut series: Vec<Observation> = self
            .store
            .try_load()?
            .into_iter()
            .filter(|obs| obs.location_key() == key)
            .collect();
        series.sort_by(|a, b| a.observed_at_utc.cmp(&b.observed_at_utc));
        Ok(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{clock::FixedClock, store::MemoryStore};
    use chrono::{DateTime, TimeZone, Utc};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 11, 5, 18, 0, 0).unwrap()
    }

    fn obs(location: &str, temperature_c: f64, hours_ago: i64) -> Observation {
        let at = now() - Duration::hours(hours_ago);
        Observation {
            location: location.to_string(),
            temperature_c,
            description: format!("{location} {hours_ago}h"),
            humidity: 60,
            observed_at_utc: at,
            observed_at_local: at.naive_utc(),
        }
    }

    fn history() -> MemoryStore {
        MemoryStore::with_observations(vec![
            obs("Paris", 14.0, 30),
            obs("London", 9.5, 20),
            obs("paris", 17.0, 3),
            obs("Cairo", 31.25, 26),
            obs("London", 11.0, 1),
            obs("PARIS", 15.33, 2),
        ])
    }

    #[test]
    fn empty_store_yields_empty_results() {
        let store = MemoryStore::new();
        let clock = FixedClock(now());
        let engine = QueryEngine::new(&store, &clock);

        assert!(engine.all_sorted_desc().unwrap().is_empty());
        assert!(engine.average_by_location().unwrap().is_empty());
        assert_eq!(engine.extremes(None).unwrap(), None);
        assert_eq!(engine.extremes(Some(Duration::hours(24))).unwrap(), None);
        assert!(engine.series_for_location("Paris").unwrap().is_empty());
    }

    #[test]
    fn all_sorted_desc_orders_newest_first() {
        let store = history();
        let clock = FixedClock(now());
        let sorted = QueryEngine::new(&store, &clock).all_sorted_desc().unwrap();

        let times: Vec<_> = sorted.iter().map(|o| o.observed_at_utc).collect();
        let mut expected = times.clone();
        expected.sort_by(|a, b| b.cmp(a));
        assert_eq!(times, expected);
        assert_eq!(sorted[0].location, "London");
    }

    #[test]
    fn averages_group_case_insensitively() {
        let store = history();
        let clock = FixedClock(now());
        let averages = QueryEngine::new(&store, &clock).average_by_location().unwrap();

        assert_eq!(averages.len(), 3);
        assert_eq!(averages["Paris"], round2((14.0 + 17.0 + 15.33) / 3.0));
        assert_eq!(averages["Paris"], 15.44);
        assert_eq!(averages["London"], 10.25);
        assert_eq!(averages["Cairo"], 31.25);
    }

    #[test]
    fn extremes_over_whole_history() {
        let store = history();
        let clock = FixedClock(now());
        let engine = QueryEngine::new(&store, &clock);

        let extremes = engine.extremes(None).unwrap().expect("history is not empty");
        assert_eq!(extremes.hottest.location, "Cairo");
        assert_eq!(extremes.coldest.temperature_c, 9.5);

        assert_eq!(engine.extremes(None).unwrap(), Some(extremes));
    }

    #[test]
    fn extremes_within_window() {
        let store = history();
        let clock = FixedClock(now());
        let extremes = QueryEngine::new(&store, &clock)
            .extremes(Some(Duration::hours(24)))
            .unwrap()
            .expect("recent data exists");

        assert_eq!(extremes.hottest.temperature_c, 17.0);
        assert_eq!(extremes.coldest.temperature_c, 9.5);
    }

    #[test]
    fn extremes_window_with_no_recent_data() {
        let store = MemoryStore::with_observations(vec![obs("Paris", 14.0, 48)]);
        let clock = FixedClock(now());
        let engine = QueryEngine::new(&store, &clock);

        assert_eq!(engine.extremes(Some(Duration::hours(24))).unwrap(), None);
        assert!(engine.extremes(None).unwrap().is_some());
    }

    #[test]
    fn extremes_with_huge_window_is_unbounded() {
        let store = history();
        let clock = FixedClock(now());
        let engine = QueryEngine::new(&store, &clock);

        let window = Duration::hours(i64::from(u32::MAX));
        assert_eq!(engine.extremes(Some(window)).unwrap(), engine.extremes(None).unwrap());
    }

    #[test]
    fn extremes_ties_go_to_newest() {
        let store = MemoryStore::with_observations(vec![
            obs("Old", 20.0, 10),
            obs("New", 20.0, 1),
        ]);
        let clock = FixedClock(now());
        let extremes = QueryEngine::new(&store, &clock).extremes(None).unwrap().unwrap();

        assert_eq!(extremes.hottest.location, "New");
        assert_eq!(extremes.coldest.location, "New");
    }

    #[test]
    fn series_matches_case_insensitively_ascending() {
        let store = history();
        let clock = FixedClock(now());
        let series = QueryEngine::new(&store, &clock).series_for_location("paris").unwrap();

        let temps: Vec<f64> = series.iter().map(|o| o.temperature_c).collect();
        assert_eq!(temps, vec![14.0, 15.33, 17.0]);
    }
}
