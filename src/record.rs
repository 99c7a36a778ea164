//! Module that contains the record type of this application and the categories it is tagged with.
use std::convert::TryFrom;
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use uuid::Uuid;

use crate::error::ValidationError;

/// Thai month names in calendar order. The index defines the chronological order.
pub const MONTH_NAMES: [&str; 12] = [
    "มกราคม",
    "กุมภาพันธ์",
    "มีนาคม",
    "เมษายน",
    "พฤษภาคม",
    "มิถุนายน",
    "กรกฎาคม",
    "สิงหาคม",
    "กันยายน",
    "ตุลาคม",
    "พฤศจิกายน",
    "ธันวาคม",
];

/// Buddhist-calendar years accepted at all.
pub const YEAR_LIMITS: RangeInclusive<i32> = 2400..=2700;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
/// Month of a measurement. Ordering follows the calendar, not the name.
pub enum Month {
    January,
    February,
    March,
    April,
    May,
    June,
    July,
    August,
    September,
    October,
    November,
    December,
}

impl Month {
    pub const ALL: [Month; 12] = [
        Month::January,
        Month::February,
        Month::March,
        Month::April,
        Month::May,
        Month::June,
        Month::July,
        Month::August,
        Month::September,
        Month::October,
        Month::November,
        Month::December,
    ];

    /// Zero based position in the fixed month list.
    pub fn ordinal(self) -> usize {
        self as usize
    }

    pub fn from_ordinal(ordinal: usize) -> Option<Month> {
        Month::ALL.get(ordinal).copied()
    }

    pub fn thai_name(self) -> &'static str {
        MONTH_NAMES[self.ordinal()]
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.thai_name())
    }
}

impl FromStr for Month {
    type Err = ValidationError;

    /// Accepts the Thai month name or the month number 1 to 12.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Some(position) = MONTH_NAMES.iter().position(|name| *name == trimmed) {
            return Ok(Month::ALL[position]);
        }
        match trimmed.parse::<usize>() {
            Ok(number) if (1..=12).contains(&number) => Ok(Month::ALL[number - 1]),
            _ => Err(ValidationError::Invalid {
                field: "month",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
/// A monitored line.
pub enum Line {
    North,
    West,
    Red,
}

impl Line {
    pub const ALL: [Line; 3] = [Line::North, Line::West, Line::Red];

    pub fn as_str(self) -> &'static str {
        match self {
            Line::North => "North",
            Line::West => "West",
            Line::Red => "Red",
        }
    }

    /// Name used on chart legends.
    pub fn label(self) -> &'static str {
        match self {
            Line::Red => "Red Line",
            other => other.as_str(),
        }
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Line {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "north" => Ok(Line::North),
            "west" => Ok(Line::West),
            "red" | "red line" => Ok(Line::Red),
            _ => Err(ValidationError::Invalid {
                field: "line",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
/// Measurement category.
pub enum MeasurementType {
    Tsp,
    Tsa,
    Ta,
}

impl MeasurementType {
    pub const ALL: [MeasurementType; 3] = [MeasurementType::Tsp, MeasurementType::Tsa, MeasurementType::Ta];

    pub fn as_str(self) -> &'static str {
        match self {
            MeasurementType::Tsp => "TSP",
            MeasurementType::Tsa => "TSA",
            MeasurementType::Ta => "TA",
        }
    }
}

impl fmt::Display for MeasurementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MeasurementType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TSP" => Ok(MeasurementType::Tsp),
            "TSA" => Ok(MeasurementType::Tsa),
            "TA" => Ok(MeasurementType::Ta),
            _ => Err(ValidationError::Invalid {
                field: "type",
                value: s.to_string(),
            }),
        }
    }
}

macro_rules! serde_as_str {
    ($($ty:ty),*) => {
        $(
            impl Serialize for $ty {
                fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                    serializer.collect_str(self)
                }
            }

            impl<'de> Deserialize<'de> for $ty {
                fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                    let text = String::deserialize(deserializer)?;
                    text.parse().map_err(de::Error::custom)
                }
            }
        )*
    };
}

serde_as_str!(Month, Line, MeasurementType);

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(transparent)]
/// Stable identifier of a record, assigned once and never derived from a position.
pub struct RecordId(Uuid);

impl RecordId {
    pub fn new() -> Self {
        RecordId(Uuid::new_v4())
    }

    /// Deterministic identifier for stored rows that predate identifiers.
    ///
    /// The same origin and position always produce the same id, so repeated reads of
    /// unchanged legacy data address the same records.
    pub fn legacy(origin: &str, position: u64) -> Self {
        RecordId(Uuid::new_v5(
            &Uuid::NAMESPACE_OID,
            format!("redlined:{}:{}", origin, position).as_bytes(),
        ))
    }
}

impl Default for RecordId {
    fn default() -> Self {
        RecordId::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for RecordId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(RecordId)
            .map_err(|_| ValidationError::Invalid {
                field: "id",
                value: s.to_string(),
            })
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(try_from = "RawRecord")]
/// One measurement of a line in a given month.
pub struct Record {
    pub id: RecordId,
    /// Buddhist-calendar year.
    pub year: i32,
    pub month: Month,
    pub line: Line,
    #[serde(rename = "type")]
    pub measurement_type: MeasurementType,
    pub value: f64,
    /// Free text remark, also the home of legacy non-numeric details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Row token of the remote service. Only used to address the row on the wire.
    #[serde(rename = "_row", skip_serializing_if = "Option::is_none")]
    pub row: Option<u64>,
}

impl Record {
    pub fn new(year: i32, month: Month, line: Line, measurement_type: MeasurementType, value: f64) -> Self {
        Record {
            id: RecordId::new(),
            year,
            month,
            line,
            measurement_type,
            value,
            note: None,
            row: None,
        }
    }

    /// The descriptive fields, ignoring identity and transport tokens.
    pub fn same_content(&self, other: &Record) -> bool {
        self.year == other.year
            && self.month == other.month
            && self.line == other.line
            && self.measurement_type == other.measurement_type
            && self.value == other.value
            && self.note == other.note
    }
}

#[derive(Deserialize, Debug)]
/// Stored or transmitted shape of a record, read as leniently as the data sources demand.
///
/// Spreadsheet backed services hand out numbers as strings, and old local data carries
/// `details` instead of `value` and no identifier.
pub struct RawRecord {
    #[serde(default)]
    id: Option<RecordId>,
    #[serde(default)]
    year: Value,
    #[serde(default)]
    month: Value,
    #[serde(default)]
    line: Value,
    #[serde(default, rename = "type")]
    measurement_type: Value,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    details: Value,
    #[serde(default)]
    note: Option<String>,
    #[serde(default, rename = "_row")]
    row: Value,
}

fn loose_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn loose_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

fn required(value: &Value, field: &'static str) -> Result<String, ValidationError> {
    loose_text(value).ok_or(ValidationError::Missing(field))
}

impl RawRecord {
    pub(crate) fn has_id(&self) -> bool {
        self.id.is_some()
    }

    /// Builds the record, inventing an identifier with `fallback_id` if none was stored.
    pub(crate) fn into_record<F>(self, fallback_id: F) -> Result<Record, ValidationError>
    where
        F: FnOnce(Option<u64>) -> RecordId,
    {
        let year_text = required(&self.year, "year")?;
        let year = loose_number(&self.year)
            .filter(|y| y.fract() == 0.0 && YEAR_LIMITS.contains(&(*y as i32)))
            .map(|y| y as i32)
            .ok_or(ValidationError::Invalid {
                field: "year",
                value: year_text,
            })?;
        let month = required(&self.month, "month")?.parse::<Month>()?;
        let line = required(&self.line, "line")?.parse::<Line>()?;
        let measurement_type = required(&self.measurement_type, "type")?.parse::<MeasurementType>()?;

        let mut note = self.note.filter(|n| !n.trim().is_empty());
        let value = if let Some(text) = loose_text(&self.value) {
            loose_number(&self.value).ok_or(ValidationError::Invalid { field: "value", value: text })?
        } else if let Some(text) = loose_text(&self.details) {
            match loose_number(&self.details) {
                Some(number) => number,
                None => {
                    note = Some(text);
                    0.0
                }
            }
        } else {
            return Err(ValidationError::Missing("value"));
        };

        let row = loose_number(&self.row).filter(|r| *r >= 0.0).map(|r| r as u64);
        let id = match self.id {
            Some(id) => id,
            None => fallback_id(row),
        };

        Ok(Record {
            id,
            year,
            month,
            line,
            measurement_type,
            value,
            note,
            row,
        })
    }
}

impl TryFrom<RawRecord> for Record {
    type Error = ValidationError;

    fn try_from(raw: RawRecord) -> Result<Self, Self::Error> {
        raw.into_record(|row| match row {
            Some(row) => RecordId::legacy("row", row),
            None => RecordId::new(),
        })
    }
}

/// Decodes the stored entry found at `position`.
///
/// An entry without an identifier gets a deterministic one derived from `origin` and its
/// row token (or position, when there is no row token).
pub(crate) fn decode_record(value: &Value, origin: &str, position: usize) -> Result<Record, String> {
    let raw = RawRecord::deserialize(value).map_err(|err| format!("unreadable: {}", err))?;
    if !raw.has_id() {
        log::debug!(target: "redlined::record", "Assigning legacy id to {} record #{}", origin, position);
    }
    raw.into_record(|row| match row {
        Some(row) => RecordId::legacy(&format!("{}-row", origin), row),
        None => RecordId::legacy(origin, position as u64),
    })
    .map_err(|err| format!("invalid: {}", err))
}

/// Decodes a stored list of records, skipping entries that cannot be understood.
pub(crate) fn decode_records(values: Vec<Value>, origin: &str) -> Vec<Record> {
    let mut records = Vec::with_capacity(values.len());
    for (position, value) in values.iter().enumerate() {
        match decode_record(value, origin, position) {
            Ok(record) => records.push(record),
            Err(reason) => {
                log::warn!(target: "redlined::record", "Skipping {} record #{}, {}", origin, position, reason);
            }
        }
    }
    records
}

#[derive(Debug, Clone, Default, PartialEq)]
/// Text fields of a record as entered by the user, before validation.
pub struct RecordForm {
    pub year: String,
    pub month: String,
    pub line: String,
    pub measurement_type: String,
    pub value: String,
    pub note: String,
}

impl RecordForm {
    pub fn from_record(record: &Record) -> Self {
        RecordForm {
            year: record.year.to_string(),
            month: record.month.thai_name().to_string(),
            line: record.line.as_str().to_string(),
            measurement_type: record.measurement_type.as_str().to_string(),
            value: record.value.to_string(),
            note: record.note.clone().unwrap_or_default(),
        }
    }

    /// Checks that every required field is filled in and parses them into a record with `id`.
    pub fn validate(&self, id: RecordId) -> Result<Record, ValidationError> {
        let fields: [(&'static str, &str); 5] = [
            ("year", &self.year),
            ("month", &self.month),
            ("line", &self.line),
            ("type", &self.measurement_type),
            ("value", &self.value),
        ];
        if let Some((name, _)) = fields.iter().find(|(_, text)| text.trim().is_empty()) {
            return Err(ValidationError::Missing(*name));
        }

        let year = self
            .year
            .trim()
            .parse::<i32>()
            .ok()
            .filter(|y| YEAR_LIMITS.contains(y))
            .ok_or_else(|| ValidationError::Invalid {
                field: "year",
                value: self.year.clone(),
            })?;
        let value = self
            .value
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| ValidationError::Invalid {
                field: "value",
                value: self.value.clone(),
            })?;
        let note = Some(self.note.trim().to_string()).filter(|n| !n.is_empty());

        Ok(Record {
            id,
            year,
            month: self.month.parse()?,
            line: self.line.parse()?,
            measurement_type: self.measurement_type.parse()?,
            value,
            note,
            row: None,
        })
    }
}
