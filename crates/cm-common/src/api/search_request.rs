use serde::Deserialize;

use super::ValidationError;
use super::find_request::clean;
use crate::Coordinates;
use crate::matching::request::{DEFAULT_GEO_MAX_DISTANCE_KM, GeoSearchRequest, ProfileOverride};

/// `coordinates` is `[lat, lon]`; anything else is ignored and the address is geocoded.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchLocationDto {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub coordinates: Option<Vec<f64>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideDto {
    pub health_conditions: Option<Vec<String>>,
    pub personality: Option<String>,
    pub special_needs: Option<String>,
}

/// POST caregivers/search body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaregiverSearchRequest {
    pub location: Option<SearchLocationDto>,
    pub elderly_id: Option<String>,
    pub package_id: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub required_certificates: Vec<String>,
    #[serde(default)]
    pub preferred_certificates: Vec<String>,
    pub preferred_gender: Option<String>,
    pub min_experience: Option<u32>,
    pub max_distance: Option<f64>,
    #[serde(default, rename = "override")]
    pub overrides: OverrideDto,
}

impl CaregiverSearchRequest {
    pub fn into_geo_request(self) -> Result<GeoSearchRequest, ValidationError> {
        let location = self.location.unwrap_or_default();
        let address = location.address.trim().to_string();
        if address.is_empty() {
            return Err(ValidationError::MissingAddress);
        }

        let coordinates = location
            .coordinates
            .and_then(|pair| match pair.as_slice() {
                [lat, lon] => Some(Coordinates::new(*lat, *lon)),
                _ => None,
            })
            .filter(Coordinates::is_valid);

        let max_distance_km = match self.max_distance {
            None => DEFAULT_GEO_MAX_DISTANCE_KM,
            Some(d) if d.is_finite() && d > 0.0 => d,
            Some(_) => return Err(ValidationError::InvalidMaxDistance),
        };

        let non_blank = |value: Option<String>| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Ok(GeoSearchRequest {
            address,
            coordinates,
            elderly_id: non_blank(self.elderly_id),
            package_id: non_blank(self.package_id),
            skills: clean(self.skills),
            required_certificates: clean(self.required_certificates),
            preferred_certificates: clean(self.preferred_certificates),
            preferred_gender: non_blank(self.preferred_gender),
            min_experience: self.min_experience.unwrap_or(0),
            max_distance_km,
            overrides: ProfileOverride {
                health_conditions: self.overrides.health_conditions.map(clean),
                personality: non_blank(self.overrides.personality),
                special_needs: non_blank(self.overrides.special_needs),
            },
        })
    }
}
