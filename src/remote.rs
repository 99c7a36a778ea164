//! Module for reading and writing records through the remote spreadsheet service.
//!
//! The service addresses rows by a `_row` token. Records are addressed by their id here,
//! the token is looked up from a fresh listing right before every update or delete.
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StoreError;
use crate::record::{decode_records, Record, RecordId};
use crate::store::{RecordBackend, ServerFilter};

#[derive(Serialize, Deserialize, Debug, Clone)]
/// Struct modeling the parameters required to talk to the remote service.
pub struct RemoteParameters {
    /// Endpoint of the service.
    pub url: String,
    /// Credential sent with every call.
    pub api_key: String,
    /// Timeout for a single request in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    8000
}

#[derive(Deserialize)]
#[serde(untagged)]
/// The service answers a listing with a bare array or with `{ "data": [...] }`.
enum ListResponse {
    Rows(Vec<Value>),
    Wrapped { data: Vec<Value> },
}

impl ListResponse {
    fn into_rows(self) -> Vec<Value> {
        match self {
            ListResponse::Rows(rows) => rows,
            ListResponse::Wrapped { data } => data,
        }
    }
}

#[derive(Serialize)]
struct WritePayload<'a> {
    #[serde(flatten)]
    record: &'a Record,
    key: &'a str,
    #[serde(rename = "_method", skip_serializing_if = "Option::is_none")]
    method: Option<&'static str>,
}

pub struct RemoteBackend {
    client: Client,
    params: RemoteParameters,
}

impl RemoteBackend {
    pub fn new(params: RemoteParameters) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(params.timeout_ms))
            .build()
            .map_err(|err| StoreError::RemoteUnavailable(format!("cannot create http client: {}", err)))?;
        Ok(RemoteBackend { client, params })
    }

    fn send(&self, request: RequestBuilder, what: &str) -> Result<Response, StoreError> {
        match request.send() {
            Ok(response) => Ok(response),
            Err(err) => {
                let kind = if err.is_timeout() {
                    "timeout"
                } else if err.is_connect() {
                    "connection error"
                } else {
                    "request error"
                };
                log::warn!(target: "redlined::remote", "Remote {} failed with {}: '{}'", what, kind, err);
                Err(StoreError::RemoteUnavailable(format!("{}: {}", kind, err)))
            }
        }
    }

    fn fetch(&self, filter: &ServerFilter) -> Result<Vec<Record>, StoreError> {
        let response = self.send(
            self.client.get(&self.params.url).query(&list_query(filter, &self.params.api_key)),
            "list",
        )?;
        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::RemoteUnavailable(format!("HTTP {}", status)));
        }
        let listing = response
            .json::<ListResponse>()
            .map_err(|err| StoreError::RemoteUnavailable(format!("unexpected listing: {}", err)))?;
        let records = decode_records(listing.into_rows(), "remote");
        log::debug!(target: "redlined::remote", "Fetched {} records", records.len());
        Ok(records)
    }

    /// Current row token of the record with `id`.
    fn locate(&self, id: RecordId) -> Result<u64, StoreError> {
        self.fetch(&ServerFilter::default())?
            .into_iter()
            .find(|r| r.id == id)
            .and_then(|r| r.row)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// Sends `method`, retrying as a POST with a method override when the endpoint
    /// does not accept the verb.
    fn send_with_override<F>(&self, method: Method, what: &str, build: F) -> Result<(), StoreError>
    where
        F: Fn(RequestBuilder, Option<&'static str>) -> RequestBuilder,
    {
        let direct = build(self.client.request(method.clone(), &self.params.url), None);
        let mut response = self.send(direct, what)?;
        if needs_override(response.status()) {
            log::debug!(target: "redlined::remote", "Endpoint refused {}, retrying {} as POST with method override", method, what);
            let override_name = override_name(&method);
            let request = self
                .client
                .post(&self.params.url)
                .query(&[("_method", override_name)])
                .header("X-HTTP-Method-Override", override_name);
            response = self.send(build(request, Some(override_name)), what)?;
        }
        check_write(response.status(), what)
    }
}

fn list_query(filter: &ServerFilter, key: &str) -> Vec<(&'static str, String)> {
    let mut query = Vec::new();
    if let Some(year) = filter.year {
        query.push(("year", year.to_string()));
    }
    if let Some(month) = filter.month {
        query.push(("month", month.thai_name().to_string()));
    }
    if let Some(line) = filter.line {
        query.push(("line", line.as_str().to_string()));
    }
    if let Some(measurement_type) = filter.measurement_type {
        query.push(("type", measurement_type.as_str().to_string()));
    }
    query.push(("key", key.to_string()));
    query
}

fn needs_override(status: StatusCode) -> bool {
    status == StatusCode::METHOD_NOT_ALLOWED || status == StatusCode::NOT_IMPLEMENTED
}

fn override_name(method: &Method) -> &'static str {
    if *method == Method::DELETE {
        "DELETE"
    } else {
        "PUT"
    }
}

fn check_write(status: StatusCode, what: &str) -> Result<(), StoreError> {
    if status.is_success() {
        Ok(())
    } else if status == StatusCode::NOT_FOUND {
        Err(StoreError::NotFound(format!("remote {} answered {}", what, status)))
    } else {
        Err(StoreError::RemoteUnavailable(format!("HTTP {}", status)))
    }
}

impl RecordBackend for RemoteBackend {
    fn name(&self) -> &'static str {
        "remote"
    }

    fn list(&self, filter: &ServerFilter) -> Result<Vec<Record>, StoreError> {
        self.fetch(filter)
    }

    fn create(&self, record: &Record) -> Result<(), StoreError> {
        let mut outgoing = record.clone();
        outgoing.row = None;
        let payload = WritePayload {
            record: &outgoing,
            key: &self.params.api_key,
            method: None,
        };
        let response = self.send(self.client.post(&self.params.url).json(&payload), "create")?;
        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::RemoteUnavailable(format!("HTTP {}", status)));
        }
        log::info!(target: "redlined::remote", "Created record {}", record.id);
        Ok(())
    }

    fn update(&self, id: RecordId, record: &Record) -> Result<(), StoreError> {
        let row = self.locate(id)?;
        let outgoing = Record {
            id,
            row: Some(row),
            ..record.clone()
        };
        let key = self.params.api_key.as_str();
        self.send_with_override(Method::PUT, "update", |request, method| {
            request.json(&WritePayload {
                record: &outgoing,
                key,
                method,
            })
        })?;
        log::info!(target: "redlined::remote", "Updated record {} in row {}", id, row);
        Ok(())
    }

    fn delete(&self, id: RecordId) -> Result<(), StoreError> {
        let row = self.locate(id)?;
        let row_text = row.to_string();
        let key = self.params.api_key.as_str();
        self.send_with_override(Method::DELETE, "delete", |request, _| {
            request.query(&[("_row", row_text.as_str()), ("key", key)])
        })?;
        log::info!(target: "redlined::remote", "Deleted record {} in row {}", id, row);
        Ok(())
    }
}
