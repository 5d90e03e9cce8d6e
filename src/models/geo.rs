use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use validator::Validate;

use crate::error::{PipelineError, Result};
use crate::utils::coordinates::degree_distance;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct RegionLocation {
    #[validate(length(min = 1))]
    pub region: String,

    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,

    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
}

impl RegionLocation {
    pub fn new(region: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            region: region.into(),
            latitude,
            longitude,
        }
    }
}

/// Nearest region to a query point
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution<'a> {
    pub location: &'a RegionLocation,
    pub distance: f64,
}

/// Static region -> representative coordinate table.
///
/// Entries are kept in lexicographic region order; nearest-region ties go to
/// the first region in that order.
#[derive(Debug, Clone, Default)]
pub struct GeoIndex {
    locations: BTreeMap<String, RegionLocation>,
}

impl GeoIndex {
    pub fn new(locations: Vec<RegionLocation>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for location in locations {
            location.validate()?;
            if map.contains_key(&location.region) {
                return Err(PipelineError::Config(format!(
                    "Duplicate region in geo index: {}",
                    location.region
                )));
            }
            map.insert(location.region.clone(), location);
        }
        Ok(Self { locations: map })
    }

    /// Load a JSON array of `{region, latitude, longitude}`
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let locations: Vec<RegionLocation> = serde_json::from_str(&content)?;
        Self::new(locations)
    }

    /// The 77 district centroids the upstream fetch is driven from
    pub fn nepal_districts() -> Self {
        let locations = NEPAL_DISTRICTS
            .iter()
            .map(|(name, lat, lon)| {
                (
                    name.to_string(),
                    RegionLocation::new(*name, *lat, *lon),
                )
            })
            .collect();
        Self { locations }
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    pub fn get(&self, region: &str) -> Option<&RegionLocation> {
        self.locations.get(region)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegionLocation> {
        self.locations.values()
    }

    pub fn regions(&self) -> impl Iterator<Item = &str> {
        self.locations.keys().map(String::as_str)
    }

    /// Argmin of flat degree distance; strict `<` keeps the first of equals
    pub fn nearest(&self, latitude: f64, longitude: f64) -> Option<Resolution<'_>> {
        let mut best: Option<Resolution<'_>> = None;
        for location in self.locations.values() {
            let distance = degree_distance(latitude, longitude, location.latitude, location.longitude);
            let closer = best
                .as_ref()
                .map_or(true, |current| distance < current.distance);
            if closer {
                best = Some(Resolution { location, distance });
            }
        }
        best
    }
}

const NEPAL_DISTRICTS: [(&str, f64, f64); 77] = [
    ("Achham", 29.12, 81.30),
    ("Arghakhanchi", 27.95, 83.22),
    ("Baglung", 28.27, 83.61),
    ("Baitadi", 29.53, 80.43),
    ("Bajhang", 29.72, 81.25),
    ("Bajura", 29.51, 81.50),
    ("Banke", 28.05, 81.62),
    ("Bara", 27.02, 85.05),
    ("Bardiya", 28.30, 81.50),
    ("Bhaktapur", 27.67, 85.43),
    ("Bhojpur", 27.17, 87.03),
    ("Chitwan", 27.53, 84.35),
    ("Dadeldhura", 29.30, 80.58),
    ("Dailekh", 28.85, 81.70),
    ("Dang", 28.00, 82.30),
    ("Darchula", 30.13, 80.58),
    ("Dhading", 27.85, 84.90),
    ("Dhankuta", 26.98, 87.35),
    ("Dhanusha", 26.83, 86.03),
    ("Dolakha", 27.66, 86.02),
    ("Dolpa", 29.08, 83.57),
    ("Doti", 29.27, 80.93),
    ("East Rukum", 28.63, 82.47),
    ("Gorkha", 28.00, 84.63),
    ("Gulmi", 28.08, 83.25),
    ("Humla", 29.96, 81.83),
    ("Ilam", 26.91, 87.92),
    ("Jajarkot", 28.70, 82.20),
    ("Jhapa", 26.63, 88.08),
    ("Jumla", 29.27, 82.18),
    ("Kailali", 28.70, 80.63),
    ("Kalikot", 29.13, 81.63),
    ("Kanchanpur", 28.83, 80.33),
    ("Kapilvastu", 27.55, 83.05),
    ("Kaski", 28.21, 83.99),
    ("Kathmandu", 27.71, 85.32),
    ("Kavrepalanchok", 27.63, 85.55),
    ("Khotang", 27.20, 86.80),
    ("Lalitpur", 27.67, 85.32),
    ("Lamjung", 28.10, 84.36),
    ("Mahottari", 26.65, 85.90),
    ("Makwanpur", 27.43, 85.03),
    ("Manang", 28.65, 84.02),
    ("Morang", 26.67, 87.45),
    ("Mugu", 29.52, 82.10),
    ("Mustang", 28.83, 83.83),
    ("Myagdi", 28.38, 83.57),
    ("Nawalpur", 27.70, 84.13),
    ("Nuwakot", 27.92, 85.15),
    ("Okhaldhunga", 27.33, 86.50),
    ("Palpa", 27.90, 83.55),
    ("Panchthar", 27.13, 87.80),
    ("Parasi", 27.55, 83.70),
    ("Parbat", 28.23, 83.67),
    ("Parsa", 27.00, 84.88),
    ("Pyuthan", 28.08, 82.87),
    ("Ramechhap", 27.33, 86.00),
    ("Rasuwa", 28.10, 85.27),
    ("Rautahat", 26.93, 85.30),
    ("Rolpa", 28.27, 82.83),
    ("Rupandehi", 27.52, 83.45),
    ("Salyan", 28.37, 82.18),
    ("Sankhuwasabha", 27.57, 87.28),
    ("Saptari", 26.60, 86.75),
    ("Sarlahi", 26.98, 85.55),
    ("Sindhuli", 27.25, 85.97),
    ("Sindhupalchok", 27.85, 85.83),
    ("Siraha", 26.65, 86.20),
    ("Solukhumbu", 27.67, 86.62),
    ("Sunsari", 26.62, 87.30),
    ("Surkhet", 28.60, 81.63),
    ("Syangja", 28.08, 83.87),
    ("Tanahun", 27.93, 84.25),
    ("Taplejung", 27.35, 87.67),
    ("Terhathum", 27.12, 87.58),
    ("Udayapur", 26.85, 86.67),
    ("West Rukum", 28.63, 82.45),
];
