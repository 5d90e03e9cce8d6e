use crate::error::{PipelineError, Result};

/// Validate that a coordinate lies on the globe
///
/// # Examples
/// ```
/// use weatherwave_pipeline::utils::validate_coordinates;
///
/// assert!(validate_coordinates(27.71, 85.32).is_ok());
/// assert!(validate_coordinates(91.0, 85.32).is_err());
/// ```
pub fn validate_coordinates(latitude: f64, longitude: f64) -> Result<()> {
    if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
        return Err(PipelineError::InputValidation(format!(
            "Latitude {} is outside [-90, 90]",
            latitude
        )));
    }

    if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
        return Err(PipelineError::InputValidation(format!(
            "Longitude {} is outside [-180, 180]",
            longitude
        )));
    }

    Ok(())
}

/// Flat Euclidean distance in degree space.
///
/// Ignores that a degree of longitude shrinks with latitude, so it is only a
/// usable ranking for nearby points at low latitudes (the district table spans
/// roughly 26-31N). It is not a geodesic distance.
pub fn degree_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlat = lat1 - lat2;
    let dlon = lon1 - lon2;
    (dlat * dlat + dlon * dlon).sqrt()
}
