pub mod geo;
pub mod labeled;
pub mod observation;
pub mod prediction;

pub use geo::{GeoIndex, RegionLocation, Resolution};
pub use labeled::{EncodedObservation, LabeledObservation};
pub use observation::{
    coerce_json_value, coerce_numeric, is_usable_value, Observation, RawObservation, WeatherField,
    WeatherValues,
};
pub use prediction::{PredictionRecord, RegionPrediction};
