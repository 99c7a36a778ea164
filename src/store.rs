//! Record store selecting between the local file and the remote service.
//!
//! The remote service is preferred while it answers. The first network or HTTP failure
//! switches the session into degraded mode, after which every operation goes to the local
//! backend, so reads and writes of one session never split across both backends.
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::local::{LocalBackend, LocalParameters};
use crate::query::{self, FilterSpec};
use crate::record::{Line, MeasurementType, Month, Record, RecordId};
use crate::remote::{RemoteBackend, RemoteParameters};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Local,
    Remote,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
/// Struct modeling the storage section of the configuration.
pub struct StorageParameters {
    /// Backend to prefer at startup.
    pub backend: BackendKind,
    /// The local file, also the fallback of the remote backend.
    #[serde(default)]
    pub local: LocalParameters,
    /// Parameters of the remote service, required for the remote backend.
    #[serde(default)]
    pub remote: Option<RemoteParameters>,
}

#[derive(Debug, Clone, Default, PartialEq)]
/// Exact-match filter understood by every backend, each field optional.
pub struct ServerFilter {
    pub year: Option<i32>,
    pub month: Option<Month>,
    pub line: Option<Line>,
    pub measurement_type: Option<MeasurementType>,
}

impl ServerFilter {
    /// The exact-match part of a filter spec. Ranges are left to the client side.
    pub fn from_spec(spec: &FilterSpec) -> Self {
        ServerFilter {
            year: spec.exact_year(),
            month: spec.exact_month(),
            line: spec.line,
            measurement_type: spec.measurement_type,
        }
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.year.map_or(true, |y| record.year == y)
            && self.month.map_or(true, |m| record.month == m)
            && self.line.map_or(true, |l| record.line == l)
            && self.measurement_type.map_or(true, |t| record.measurement_type == t)
    }
}

/// Storage capability implemented by the local file and the remote service.
pub trait RecordBackend: Send {
    fn name(&self) -> &'static str;

    fn list(&self, filter: &ServerFilter) -> Result<Vec<Record>, StoreError>;

    /// Appends a record, which the caller has validated already.
    fn create(&self, record: &Record) -> Result<(), StoreError>;

    /// Replaces the record with `id`, failing with `NotFound` if it is gone.
    fn update(&self, id: RecordId, record: &Record) -> Result<(), StoreError>;

    fn delete(&self, id: RecordId) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, PartialEq)]
/// Result of a store operation together with the backend that served it.
pub struct Served<T> {
    pub value: T,
    pub backend: BackendKind,
    /// Set when the operation did not reach the preferred backend.
    pub diagnostic: Option<String>,
}

impl<T> Served<T> {
    /// True when the operation fell back or ran in degraded mode.
    pub fn degraded(&self) -> bool {
        self.diagnostic.is_some()
    }
}

pub struct RecordStore {
    local: Box<dyn RecordBackend>,
    remote: Option<Box<dyn RecordBackend>>,
    degraded: bool,
}

impl RecordStore {
    pub fn new(local: Box<dyn RecordBackend>, remote: Option<Box<dyn RecordBackend>>) -> Self {
        RecordStore {
            local,
            remote,
            degraded: false,
        }
    }

    /// Builds the store for the configured backend.
    pub fn from_parameters(params: &StorageParameters) -> Result<Self, StoreError> {
        let local: Box<dyn RecordBackend> = Box::new(LocalBackend::new(&params.local));
        let remote: Option<Box<dyn RecordBackend>> = match params.backend {
            BackendKind::Local => None,
            BackendKind::Remote => {
                let remote_params = params.remote.clone().ok_or_else(|| {
                    StoreError::RemoteUnavailable(String::from("remote backend selected but no remote parameters specified"))
                })?;
                Some(Box::new(RemoteBackend::new(remote_params)?))
            }
        };
        log::info!(target: "redlined::store", "Using {} storage", if remote.is_some() { "remote" } else { "local" });
        Ok(RecordStore::new(local, remote))
    }

    /// True while operations still go to the remote service.
    pub fn remote_active(&self) -> bool {
        self.remote.is_some() && !self.degraded
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Lists the records matching `spec`.
    ///
    /// The backend receives the exact-match part of the filter; the full spec is applied
    /// afterwards so range predicates hold whatever the backend supports.
    pub fn list(&mut self, spec: &FilterSpec) -> Result<Served<Vec<Record>>, StoreError> {
        let server_filter = ServerFilter::from_spec(spec);
        let served = self.dispatch("list", |backend| backend.list(&server_filter))?;
        Ok(Served {
            value: query::filter(&served.value, spec),
            ..served
        })
    }

    pub fn create(&mut self, record: &Record) -> Result<Served<()>, StoreError> {
        self.dispatch("create", |backend| backend.create(record))
    }

    pub fn update(&mut self, id: RecordId, record: &Record) -> Result<Served<()>, StoreError> {
        self.dispatch("update", |backend| backend.update(id, record))
    }

    pub fn delete(&mut self, id: RecordId) -> Result<Served<()>, StoreError> {
        self.dispatch("delete", |backend| backend.delete(id))
    }

    fn dispatch<T, F>(&mut self, operation: &str, op: F) -> Result<Served<T>, StoreError>
    where
        F: Fn(&dyn RecordBackend) -> Result<T, StoreError>,
    {
        if let Some(remote) = self.remote.as_ref() {
            if self.degraded {
                log::debug!(target: "redlined::store", "Degraded mode, {} goes to local storage", operation);
                let reason = "remote service unavailable earlier in this session";
                return Ok(Served {
                    value: op(self.local.as_ref()).map_err(|err| explain_fallback(err, reason))?,
                    backend: BackendKind::Local,
                    diagnostic: Some(format!("{}, using local storage", reason)),
                });
            }

            match op(remote.as_ref()) {
                Ok(value) => {
                    return Ok(Served {
                        value,
                        backend: BackendKind::Remote,
                        diagnostic: None,
                    })
                }
                Err(StoreError::RemoteUnavailable(reason)) => {
                    log::warn!(target: "redlined::store", "Remote {} failed, switching to local storage: '{}'", operation, reason);
                    self.degraded = true;
                    let reason = format!("remote service unavailable ({})", reason);
                    return Ok(Served {
                        value: op(self.local.as_ref()).map_err(|err| explain_fallback(err, &reason))?,
                        backend: BackendKind::Local,
                        diagnostic: Some(format!("{}, using local storage", reason)),
                    });
                }
                Err(err) => return Err(err),
            }
        }

        Ok(Served {
            value: op(self.local.as_ref())?,
            backend: BackendKind::Local,
            diagnostic: None,
        })
    }
}

/// A record missing from the local fallback may only exist remotely, so say why local was asked.
fn explain_fallback(err: StoreError, reason: &str) -> StoreError {
    match err {
        StoreError::NotFound(what) => StoreError::NotFound(format!("{} in local storage, {}", what, reason)),
        other => other,
    }
}
