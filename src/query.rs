use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Error, Result};
use crate::time::TimeBound;

/// Number of records requested per page unless the caller says otherwise.
pub const DEFAULT_PAGE_SIZE: u64 = 100;

/// Largest page size the catalogue can be asked for (its integers are signed 64-bit).
pub const MAX_PAGE_SIZE: u64 = i64::MAX as u64;

pub(crate) const DATASET_ID: &str = "datasetId";
pub(crate) const BBOX: &str = "bbox";
pub(crate) const START_TIME: &str = "startTime";
pub(crate) const END_TIME: &str = "endTime";
pub(crate) const COUNT: &str = "count";
pub(crate) const START_INDEX: &str = "startIndex";

/// Value type for a catalogue search parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Str(String),
    Int(i64),
    UInt(u64),
    Float(f64),
    StrList(Vec<String>),
    IntList(Vec<i64>),
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Str(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Str(value)
    }
}

impl From<&String> for ParamValue {
    fn from(value: &String) -> Self {
        ParamValue::Str(value.clone())
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        ParamValue::Int(value as i64)
    }
}

impl From<u32> for ParamValue {
    fn from(value: u32) -> Self {
        ParamValue::Int(value as i64)
    }
}

impl From<u64> for ParamValue {
    fn from(value: u64) -> Self {
        ParamValue::UInt(value)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Float(value)
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(value: Vec<String>) -> Self {
        ParamValue::StrList(value)
    }
}

impl From<Vec<&str>> for ParamValue {
    fn from(value: Vec<&str>) -> Self {
        ParamValue::StrList(value.into_iter().map(|s| s.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for ParamValue {
    fn from(value: [&str; N]) -> Self {
        ParamValue::StrList(value.into_iter().map(|s| s.to_string()).collect())
    }
}

impl From<Vec<i64>> for ParamValue {
    fn from(value: Vec<i64>) -> Self {
        ParamValue::IntList(value)
    }
}

impl<const N: usize> From<[i64; N]> for ParamValue {
    fn from(value: [i64; N]) -> Self {
        ParamValue::IntList(value.to_vec())
    }
}

impl ParamValue {
    /// Wire form: scalars as-is, lists comma-joined.
    pub fn to_param_string(&self) -> String {
        match self {
            ParamValue::Str(s) => s.clone(),
            ParamValue::Int(i) => i.to_string(),
            ParamValue::UInt(u) => u.to_string(),
            ParamValue::Float(x) => x.to_string(),
            ParamValue::StrList(xs) => xs.join(","),
            ParamValue::IntList(xs) => xs
                .iter()
                .map(|x| x.to_string())
                .collect::<Vec<_>>()
                .join(","),
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            ParamValue::Int(i) => u64::try_from(*i).ok(),
            ParamValue::UInt(u) => Some(*u),
            ParamValue::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_param_string())
    }
}

/// Flat parameter mapping sent to the CSW endpoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters {
    pub(crate) inner: BTreeMap<String, ParamValue>,
}

impl Parameters {
    pub fn new() -> Self {
        Self {
            inner: BTreeMap::new(),
        }
    }

    /// Construct parameters from an iterator of key/value pairs, unchecked.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<ParamValue>,
    {
        let mut p = Self::new();
        for (k, v) in pairs {
            p.set(k, v);
        }
        p
    }

    pub(crate) fn from_inner(inner: BTreeMap<String, ParamValue>) -> Self {
        Self { inner }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        self.inner.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.inner.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.inner.iter()
    }

    /// Page size carried in `count`, falling back to [`DEFAULT_PAGE_SIZE`].
    pub fn page_size(&self) -> u64 {
        self.get(COUNT)
            .and_then(ParamValue::as_u64)
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_PAGE_SIZE)
    }

    /// Copy of these parameters with `overrides` applied on top.
    pub fn merged<K, V>(&self, overrides: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<ParamValue>,
    {
        let mut out = self.clone();
        for (k, v) in overrides {
            out.set(k, v);
        }
        out
    }

    /// String pairs ready for a URL query string.
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        self.inner
            .iter()
            .map(|(k, v)| (k.clone(), v.to_param_string()))
            .collect()
    }

    /// Searching requires a dataset context.
    pub(crate) fn ensure_executable(&self) -> Result<()> {
        match self.get(DATASET_ID) {
            Some(v) if !v.to_param_string().trim().is_empty() => Ok(()),
            _ => Err(Error::InvalidQuery(
                "search requires at least one dataset id".into(),
            )),
        }
    }
}

/// Geographic bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl BoundingBox {
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Result<Self> {
        let bbox = Self {
            west,
            south,
            east,
            north,
        };
        bbox.validate()?;
        Ok(bbox)
    }

    fn validate(&self) -> Result<()> {
        let all = [self.west, self.south, self.east, self.north];
        if all.iter().any(|x| !x.is_finite()) {
            return Err(Error::InvalidQuery(format!(
                "bbox values must be finite, got {all:?}"
            )));
        }
        if self.west > self.east {
            return Err(Error::InvalidQuery(format!(
                "bbox west {} > east {}",
                self.west, self.east
            )));
        }
        if self.south > self.north {
            return Err(Error::InvalidQuery(format!(
                "bbox south {} > north {}",
                self.south, self.north
            )));
        }
        Ok(())
    }

    /// `west,south,east,north`.
    pub fn to_param_string(&self) -> String {
        format!("{},{},{},{}", self.west, self.south, self.east, self.north)
    }
}

impl TryFrom<&[f64]> for BoundingBox {
    type Error = Error;

    fn try_from(value: &[f64]) -> Result<Self> {
        match value {
            [w, s, e, n] => BoundingBox::new(*w, *s, *e, *n),
            _ => Err(Error::InvalidQuery(format!(
                "bbox must have exactly 4 values, got {}",
                value.len()
            ))),
        }
    }
}

/// Search criteria, assembled with builder methods and turned into
/// [`Parameters`] by [`SearchCriteria::build`].
///
/// ```
/// use gportal::SearchCriteria;
///
/// let params = SearchCriteria::new()
///     .dataset_ids(["10002000"])
///     .bbox([130.0, 30.0, 140.0, 40.0])
///     .start_time("2023-03-28T00:00:00")
///     .end_time("2023-03-28T23:59:59")
///     .build()?;
/// assert_eq!(params.get("bbox").unwrap().to_string(), "130,30,140,40");
/// # Ok::<(), gportal::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct SearchCriteria {
    dataset_ids: Vec<String>,
    bbox: Option<Vec<f64>>,
    start_time: Option<TimeInput>,
    end_time: Option<TimeInput>,
    count: Option<u64>,
    params: BTreeMap<String, ParamValue>,
}

/// Time as supplied by the caller; strings are parsed at build time.
#[derive(Debug, Clone)]
pub enum TimeInput {
    Bound(TimeBound),
    Text(String),
}

impl From<TimeBound> for TimeInput {
    fn from(value: TimeBound) -> Self {
        TimeInput::Bound(value)
    }
}

impl From<chrono::NaiveDateTime> for TimeInput {
    fn from(value: chrono::NaiveDateTime) -> Self {
        TimeInput::Bound(value.into())
    }
}

impl From<chrono::DateTime<chrono::Utc>> for TimeInput {
    fn from(value: chrono::DateTime<chrono::Utc>) -> Self {
        TimeInput::Bound(value.into())
    }
}

impl From<&str> for TimeInput {
    fn from(value: &str) -> Self {
        TimeInput::Text(value.to_string())
    }
}

impl From<String> for TimeInput {
    fn from(value: String) -> Self {
        TimeInput::Text(value)
    }
}

impl TimeInput {
    fn resolve(&self) -> Result<TimeBound> {
        match self {
            TimeInput::Bound(b) => Ok(*b),
            TimeInput::Text(s) => TimeBound::parse(s),
        }
    }
}

impl SearchCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dataset_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        self.dataset_ids = ids.into_iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn bbox(mut self, bbox: impl AsRef<[f64]>) -> Self {
        self.bbox = Some(bbox.as_ref().to_vec());
        self
    }

    pub fn start_time(mut self, t: impl Into<TimeInput>) -> Self {
        self.start_time = Some(t.into());
        self
    }

    pub fn end_time(mut self, t: impl Into<TimeInput>) -> Self {
        self.end_time = Some(t.into());
        self
    }

    /// Records per page.
    pub fn count(mut self, n: u64) -> Self {
        self.count = Some(n);
        self
    }

    /// Extra catalogue parameter, passed through untouched.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Validate and flatten into the parameter mapping the catalogue expects.
    pub fn build(&self) -> Result<Parameters> {
        let mut out = Parameters::from_inner(self.params.clone());

        if !self.dataset_ids.is_empty() {
            out.set(DATASET_ID, self.dataset_ids.join(","));
        }

        if let Some(values) = &self.bbox {
            let bbox = BoundingBox::try_from(values.as_slice())?;
            out.set(BBOX, bbox.to_param_string());
        }

        let start = self.start_time.as_ref().map(TimeInput::resolve).transpose()?;
        let end = self.end_time.as_ref().map(TimeInput::resolve).transpose()?;
        if let (Some(s), Some(e)) = (&start, &end) {
            if s.as_utc() > e.as_utc() {
                return Err(Error::InvalidQuery(format!(
                    "start time {s} is after end time {e}"
                )));
            }
        }
        if let Some(s) = start {
            out.set(START_TIME, s.to_param_string());
        }
        if let Some(e) = end {
            out.set(END_TIME, e.to_param_string());
        }

        let count = self.count.unwrap_or(DEFAULT_PAGE_SIZE);
        if count == 0 {
            return Err(Error::InvalidQuery("page size must be at least 1".into()));
        }
        if count > MAX_PAGE_SIZE {
            return Err(Error::InvalidQuery(format!(
                "page size must be at most {MAX_PAGE_SIZE}, got {count}"
            )));
        }
        out.set(COUNT, count);

        Ok(out)
    }
}
