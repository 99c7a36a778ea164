//! Module for the polling refresh of the views while the remote service is in use.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::sleep;
use std::time::{self, Instant};

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::query::FilterSpec;
use crate::store::RecordStore;
use crate::view::ViewSynchronizer;

#[derive(Serialize, Deserialize, Debug, Clone)]
/// Parameters of the polling refresh.
pub struct RefreshParameters {
    /// Seconds between two reloads of the record collection.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

fn default_interval_secs() -> u64 {
    30
}

impl Default for RefreshParameters {
    fn default() -> Self {
        RefreshParameters {
            interval_secs: default_interval_secs(),
        }
    }
}

/// Reloads the full collection and hands it to the view, which reapplies its own filter.
///
/// Only the cached collection and the derived table and charts change. Edit drafts are
/// owned outside the view and are never touched.
///
/// # Returns
///
/// * `Ok(generation)` - The view generation after the refresh.
///
/// * `Err(...)` - If the store failed beyond its local fallback.
pub fn refresh_once(store: &mut RecordStore, view: &Mutex<ViewSynchronizer>) -> Result<u64, StoreError> {
    let served = store.list(&FilterSpec::default())?;
    if let Some(diagnostic) = &served.diagnostic {
        log::warn!(target: "redlined::refresh", "{}", diagnostic);
    }
    let mut guard = match view.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log::warn!(target: "redlined::refresh", "View lock was poisoned, continuing with its last state");
            poisoned.into_inner()
        }
    };
    guard.refresh(served.value);
    Ok(guard.generation())
}

/// Thread function for the polling refresh.
///
/// Re-runs the load, filter, aggregate and render pipeline every `interval_secs` while the
/// store still talks to the remote service. `on_refresh` is called with the rebuilt view.
///
/// This function will run until the `thread_finish` parameter was set or the store fell back
/// to local storage, after which polling has nothing new to show.
pub fn refresh_thread<F>(
    mut store: RecordStore,
    view: Arc<Mutex<ViewSynchronizer>>,
    thread_finish: Arc<AtomicBool>,
    params: RefreshParameters,
    mut on_refresh: F,
) where
    F: FnMut(&ViewSynchronizer),
{
    let interval = time::Duration::from_secs(params.interval_secs.max(1));
    let timeout = time::Duration::from_millis(100);
    let mut last_refresh = Instant::now();

    log::info!(target: "redlined::refresh", "Polling every {} seconds", interval.as_secs());
    while !thread_finish.load(Ordering::SeqCst) {
        if !store.remote_active() {
            log::info!(target: "redlined::refresh", "Remote storage not in use, stopping the polling refresh");
            return;
        }
        if last_refresh.elapsed() < interval {
            sleep(timeout);
            continue;
        }
        last_refresh = Instant::now();

        match refresh_once(&mut store, &view) {
            Ok(generation) => {
                log::debug!(target: "redlined::refresh", "Views rebuilt, generation {}", generation);
                match view.lock() {
                    Ok(guard) => on_refresh(&guard),
                    Err(_) => {
                        log::error!(target: "redlined::refresh", "Could not lock the view after a refresh!");
                        thread_finish.store(true, Ordering::SeqCst);
                        return;
                    }
                }
            }
            Err(err) => {
                log::error!(target: "redlined::refresh", "Refresh failed: '{}'", err);
                continue;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Line, MeasurementType, Month, Record};
    use crate::store::tests::{local_backend, FailingRemote};
    use crate::store::RecordBackend;
    use std::thread;

    #[test]
    fn refresh_replaces_the_view_collection() {
        let dir = tempfile::tempdir().unwrap();
        let local = local_backend(&dir);
        let record = Record::new(2565, Month::August, Line::West, MeasurementType::Tsa, 5.0);
        local.create(&record).unwrap();
        let mut store = RecordStore::new(Box::new(local), None);

        let view = Mutex::new(ViewSynchronizer::new(Vec::new()));
        let before = view.lock().unwrap().generation();
        let generation = refresh_once(&mut store, &view).unwrap();

        assert_eq!(generation, before + 1);
        assert_eq!(view.lock().unwrap().rows(), &[record][..]);
    }

    #[test]
    fn refresh_keeps_the_view_filter() {
        let dir = tempfile::tempdir().unwrap();
        let local = local_backend(&dir);
        local
            .create(&Record::new(2565, Month::August, Line::West, MeasurementType::Tsa, 5.0))
            .unwrap();
        local
            .create(&Record::new(2565, Month::August, Line::Red, MeasurementType::Tsa, 5.0))
            .unwrap();
        let mut store = RecordStore::new(Box::new(local), None);

        let mut synchronizer = ViewSynchronizer::new(Vec::new());
        synchronizer.apply_filter(FilterSpec::default().with_line(Line::Red));
        let view = Mutex::new(synchronizer);
        refresh_once(&mut store, &view).unwrap();

        let guard = view.lock().unwrap();
        assert_eq!(guard.rows().len(), 1);
        assert_eq!(guard.rows()[0].line, Line::Red);
    }

    #[test]
    fn polling_stops_once_the_store_is_local() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(Box::new(local_backend(&dir)), None);
        let view = Arc::new(Mutex::new(ViewSynchronizer::new(Vec::new())));
        let finish = Arc::new(AtomicBool::new(false));

        let handle = thread::spawn({
            let view = Arc::clone(&view);
            let finish = Arc::clone(&finish);
            move || {
                refresh_thread(store, view, finish, RefreshParameters { interval_secs: 1 }, |_| {});
            }
        });
        handle.join().unwrap();
        assert!(!finish.load(Ordering::SeqCst));
    }

    #[test]
    fn failing_remote_degrades_and_ends_polling() {
        let dir = tempfile::tempdir().unwrap();
        let (remote, calls) = FailingRemote::unavailable();
        let store = RecordStore::new(Box::new(local_backend(&dir)), Some(Box::new(remote)));
        let view = Arc::new(Mutex::new(ViewSynchronizer::new(Vec::new())));
        let finish = Arc::new(AtomicBool::new(false));
        let refreshed = Arc::new(AtomicBool::new(false));

        let handle = thread::spawn({
            let view = Arc::clone(&view);
            let finish = Arc::clone(&finish);
            let refreshed = Arc::clone(&refreshed);
            move || {
                refresh_thread(store, view, finish, RefreshParameters { interval_secs: 1 }, move |_| {
                    refreshed.store(true, Ordering::SeqCst);
                });
            }
        });
        handle.join().unwrap();

        assert!(refreshed.load(Ordering::SeqCst));
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
