use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::utils::constants::SENTINEL_VALUES;

/// Daily weather parameters, in the fixed order used for storage and features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WeatherField {
    Precipitation,
    Pressure,
    SpecificHumidity,
    RelativeHumidity,
    Temperature,
    WetBulbTemperature,
    MaxTemperature,
    MinTemperature,
    EarthSkinTemperature,
    WindSpeed10m,
    MaxWindSpeed10m,
    MinWindSpeed10m,
    WindSpeed50m,
    MaxWindSpeed50m,
    MinWindSpeed50m,
}

impl WeatherField {
    pub const COUNT: usize = 15;

    pub const ALL: [WeatherField; WeatherField::COUNT] = [
        WeatherField::Precipitation,
        WeatherField::Pressure,
        WeatherField::SpecificHumidity,
        WeatherField::RelativeHumidity,
        WeatherField::Temperature,
        WeatherField::WetBulbTemperature,
        WeatherField::MaxTemperature,
        WeatherField::MinTemperature,
        WeatherField::EarthSkinTemperature,
        WeatherField::WindSpeed10m,
        WeatherField::MaxWindSpeed10m,
        WeatherField::MinWindSpeed10m,
        WeatherField::WindSpeed50m,
        WeatherField::MaxWindSpeed50m,
        WeatherField::MinWindSpeed50m,
    ];

    /// Fields the validity gate looks at
    pub const KEY_FIELDS: [WeatherField; 3] = [
        WeatherField::Temperature,
        WeatherField::RelativeHumidity,
        WeatherField::Pressure,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Parameter code used by NASA POWER
    pub fn upstream_code(self) -> &'static str {
        match self {
            WeatherField::Precipitation => "PRECTOTCORR",
            WeatherField::Pressure => "PS",
            WeatherField::SpecificHumidity => "QV2M",
            WeatherField::RelativeHumidity => "RH2M",
            WeatherField::Temperature => "T2M",
            WeatherField::WetBulbTemperature => "T2MWET",
            WeatherField::MaxTemperature => "T2M_MAX",
            WeatherField::MinTemperature => "T2M_MIN",
            WeatherField::EarthSkinTemperature => "TS",
            WeatherField::WindSpeed10m => "WS10M",
            WeatherField::MaxWindSpeed10m => "WS10M_MAX",
            WeatherField::MinWindSpeed10m => "WS10M_MIN",
            WeatherField::WindSpeed50m => "WS50M",
            WeatherField::MaxWindSpeed50m => "WS50M_MAX",
            WeatherField::MinWindSpeed50m => "WS50M_MIN",
        }
    }

    pub fn from_upstream_code(code: &str) -> Option<Self> {
        // Older raw files carry the uncorrected precipitation code
        if code == "PRECTOT" {
            return Some(WeatherField::Precipitation);
        }
        WeatherField::ALL
            .into_iter()
            .find(|field| field.upstream_code() == code)
    }

    /// Canonical column name in processed tables
    pub fn column_name(self) -> &'static str {
        match self {
            WeatherField::Precipitation => "precip",
            WeatherField::Pressure => "pressure",
            WeatherField::SpecificHumidity => "specific_humidity",
            WeatherField::RelativeHumidity => "relative_humidity",
            WeatherField::Temperature => "temp",
            WeatherField::WetBulbTemperature => "wet_bulb_temp",
            WeatherField::MaxTemperature => "max_temp",
            WeatherField::MinTemperature => "min_temp",
            WeatherField::EarthSkinTemperature => "earth_skin_temp",
            WeatherField::WindSpeed10m => "wind_speed_10m",
            WeatherField::MaxWindSpeed10m => "max_wind_speed_10m",
            WeatherField::MinWindSpeed10m => "min_wind_speed_10m",
            WeatherField::WindSpeed50m => "wind_speed_50m",
            WeatherField::MaxWindSpeed50m => "max_wind_speed_50m",
            WeatherField::MinWindSpeed50m => "min_wind_speed_50m",
        }
    }

    /// Precipitation gaps mean "no rain", everything else is repaired over time
    pub fn is_interpolable(self) -> bool {
        self != WeatherField::Precipitation
    }
}

impl std::fmt::Display for WeatherField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.column_name())
    }
}

/// One value slot per [`WeatherField`], `None` meaning missing.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WeatherValues([Option<f64>; WeatherField::COUNT]);

impl WeatherValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: WeatherField) -> Option<f64> {
        self.0[field.index()]
    }

    pub fn set(&mut self, field: WeatherField, value: Option<f64>) {
        self.0[field.index()] = value;
    }

    pub fn with(mut self, field: WeatherField, value: f64) -> Self {
        self.set(field, Some(value));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (WeatherField, Option<f64>)> + '_ {
        WeatherField::ALL.into_iter().map(|field| (field, self.get(field)))
    }

    pub fn is_all_missing(&self) -> bool {
        self.0.iter().all(Option::is_none)
    }

    pub fn missing_count(&self) -> usize {
        self.0.iter().filter(|v| v.is_none()).count()
    }
}

/// True when a value is present, finite and not an upstream sentinel
pub fn is_usable_value(value: Option<f64>) -> bool {
    match value {
        Some(v) => v.is_finite() && !SENTINEL_VALUES.contains(&v),
        None => false,
    }
}

/// Coerce a text cell to a number; anything unparseable is missing
pub fn coerce_numeric(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok()
}

/// Coerce an upstream JSON value to a number
pub fn coerce_json_value(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => coerce_numeric(s),
        _ => None,
    }
}

/// A daily record as delivered by the upstream source, sentinels included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawObservation {
    pub region: String,
    pub date: NaiveDate,
    pub latitude: f64,
    pub longitude: f64,
    pub values: WeatherValues,
}

impl RawObservation {
    pub fn new(
        region: impl Into<String>,
        date: NaiveDate,
        latitude: f64,
        longitude: f64,
        values: WeatherValues,
    ) -> Self {
        Self {
            region: region.into(),
            date,
            latitude,
            longitude,
            values,
        }
    }

    /// Validity gate: at least two of temperature, relative humidity and
    /// pressure carry a real reading.
    pub fn is_valid(&self) -> bool {
        let usable = WeatherField::KEY_FIELDS
            .iter()
            .filter(|field| is_usable_value(self.values.get(**field)))
            .count();
        usable >= 2
    }
}

/// A canonical, cleaned daily record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub region: String,
    pub date: NaiveDate,
    pub latitude: f64,
    pub longitude: f64,
    pub values: WeatherValues,
}

impl Observation {
    pub fn get(&self, field: WeatherField) -> Option<f64> {
        self.values.get(field)
    }

    pub fn temperature(&self) -> Option<f64> {
        self.values.get(WeatherField::Temperature)
    }
}

impl From<&Observation> for RawObservation {
    fn from(observation: &Observation) -> Self {
        RawObservation::new(
            observation.region.clone(),
            observation.date,
            observation.latitude,
            observation.longitude,
            observation.values,
        )
    }
}
