use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::endpoints::DOWNLOAD_URL_PREFIX;
use crate::time::parse_record_time;

/// One record from a catalogue search: a GeoJSON feature describing a product.
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    geojson: Value,
}

impl Product {
    pub fn new(geojson: Value) -> Self {
        Self { geojson }
    }

    /// Like [`Product::new`], with property strings converted by [`convert_types`].
    pub fn with_converted_types(mut geojson: Value) -> Self {
        if let Some(props) = geojson.get_mut("properties") {
            convert_types(props);
        }
        Self { geojson }
    }

    pub fn geometry(&self) -> Option<&Value> {
        self.geojson.get("geometry").filter(|g| !g.is_null())
    }

    pub fn properties(&self) -> Option<&Map<String, Value>> {
        self.geojson.get("properties").and_then(Value::as_object)
    }

    /// Top-level property lookup.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties()?.get(key)
    }

    /// Lookup by flattened key, e.g. `datasetId` or `productFileName`.
    ///
    /// See [`Product::flatten_properties`].
    pub fn flat_property(&self, key: &str) -> Option<Value> {
        self.flatten_properties().remove(key)
    }

    /// A flattened property parsed as a timestamp.
    pub fn get_datetime(&self, key: &str) -> Option<DateTime<Utc>> {
        parse_record_time(self.flat_property(key)?.as_str()?)
    }

    fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key)?.as_str()
    }

    pub fn id(&self) -> Option<&str> {
        self.get_str("identifier")
    }

    /// `gpp.datasetId`; may be a string or, after type conversion, a number.
    pub fn dataset_id(&self) -> Option<String> {
        match self.get("gpp")?.get("datasetId")? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn start_time(&self) -> Option<&str> {
        self.get_str("beginPosition")
    }

    pub fn end_time(&self) -> Option<&str> {
        self.get_str("endPosition")
    }

    pub fn start_datetime(&self) -> Option<DateTime<Utc>> {
        self.start_time().and_then(parse_record_time)
    }

    pub fn end_datetime(&self) -> Option<DateTime<Utc>> {
        self.end_time().and_then(parse_record_time)
    }

    /// HTTPS URL of the product file.
    pub fn data_url(&self) -> Option<&str> {
        self.get("product")?.get("fileName")?.as_str()
    }

    /// Path of the product file on the SFTP server.
    pub fn data_path(&self) -> Option<&str> {
        let url = self.data_url()?;
        Some(url.strip_prefix(DOWNLOAD_URL_PREFIX).unwrap_or(url))
    }

    pub fn thumbnail_url(&self) -> Option<&str> {
        self.browse_url("THUMBNAIL")
    }

    pub fn quicklook_url(&self) -> Option<&str> {
        self.browse_url("QUICKLOOK")
    }

    fn browse_url(&self, kind: &str) -> Option<&str> {
        self.get("browse")?
            .as_array()?
            .iter()
            .find(|b| b.get("type").and_then(Value::as_str) == Some(kind))?
            .get("fileName")?
            .as_str()
    }

    /// Properties with the nested `product`, `browse` and `gpp` objects
    /// lifted to the top level.
    ///
    /// `product.fileName` becomes `productFileName`, each browse entry becomes
    /// `<type in lower case>: fileName`, and `gpp` keys are merged as-is.
    pub fn flatten_properties(&self) -> Map<String, Value> {
        let mut props = self.properties().cloned().unwrap_or_default();

        if let Some(Value::Object(product)) = props.get("product").cloned() {
            props.remove("product");
            for (key, value) in product {
                props.insert(format!("product{}", upper_first(&key)), value);
            }
        }

        if let Some(Value::Array(browse)) = props.get("browse").cloned() {
            props.remove("browse");
            for entry in browse {
                let kind = entry.get("type").and_then(Value::as_str);
                let file_name = entry.get("fileName");
                if let (Some(kind), Some(file_name)) = (kind, file_name) {
                    props.insert(kind.to_lowercase(), file_name.clone());
                }
            }
        }

        if let Some(Value::Object(gpp)) = props.get("gpp").cloned() {
            props.remove("gpp");
            props.extend(gpp);
        }

        props
    }

    pub fn as_value(&self) -> &Value {
        &self.geojson
    }

    pub fn into_value(self) -> Value {
        self.geojson
    }

    /// The feature with [`Product::flatten_properties`] in place of its properties.
    pub fn to_flat_properties_value(&self) -> Value {
        let mut out = match &self.geojson {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        out.insert(
            "properties".to_string(),
            Value::Object(self.flatten_properties()),
        );
        Value::Object(out)
    }
}

impl From<Value> for Product {
    fn from(value: Value) -> Self {
        Product::new(value)
    }
}

fn upper_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Recursively replace string values that the catalogue uses for other types:
/// integers and floats become numbers, `"true"`/`"false"` booleans, `""` null.
pub fn convert_types(value: &mut Value) {
    match value {
        Value::Object(map) => map.values_mut().for_each(convert_types),
        Value::Array(items) => items.iter_mut().for_each(convert_types),
        Value::String(s) => {
            if let Some(converted) = convert_str(s) {
                *value = converted;
            }
        }
        _ => {}
    }
}

fn convert_str(s: &str) -> Option<Value> {
    if s.is_empty() {
        return Some(Value::Null);
    }
    match s {
        "true" => return Some(Value::Bool(true)),
        "false" => return Some(Value::Bool(false)),
        _ => {}
    }
    // Leading zeros are identifiers, not numbers.
    if s.len() > 1 && s.starts_with('0') && !s.starts_with("0.") {
        return None;
    }
    if let Ok(i) = s.parse::<i64>() {
        return Some(Value::from(i));
    }
    if s.contains('.') {
        if let Ok(f) = s.parse::<f64>() {
            return serde_json::Number::from_f64(f).map(Value::Number);
        }
    }
    None
}
