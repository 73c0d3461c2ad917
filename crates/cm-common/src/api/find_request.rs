use serde::Deserialize;

use super::ValidationError;
use crate::matching::request::{
    AgeRange, CareLevel, DEFAULT_MAX_DISTANCE_KM, DEFAULT_TOP_N, MAX_TOP_N, SearchRequest,
};
use crate::{Coordinates, Gender, TimeRange, TimeSlot, Weekday};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlotDto {
    #[serde(default)]
    pub day: String,
    #[serde(default)]
    pub start_time: String,
    #[serde(default)]
    pub end_time: String,
}

impl TimeSlotDto {
    fn parse(&self) -> Result<TimeSlot, ValidationError> {
        let day = Weekday::parse(&self.day).ok_or(ValidationError::InvalidTimeSlot)?;
        let range = TimeRange::parse(&self.start_time, &self.end_time)
            .filter(|r| r.start < r.end)
            .ok_or(ValidationError::InvalidTimeSlot)?;
        Ok(TimeSlot { day, range })
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct LocationDto {
    pub lat: f64,
    pub lon: f64,
}

/// `[min, max]` or `{min, max}`.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
pub enum AgeRangeDto {
    Pair([u32; 2]),
    Bounds { min: u32, max: u32 },
}

/// POST find-caregivers body. Every field is optional on the wire except `careLevel`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindCaregiversRequest {
    #[serde(default)]
    pub required_skills: Vec<String>,
    #[serde(default)]
    pub preferred_skills: Vec<String>,
    #[serde(default)]
    pub required_certificates: Vec<String>,
    pub care_level: Option<i64>,
    #[serde(default)]
    pub time_slots: Vec<TimeSlotDto>,
    pub max_distance: Option<f64>,
    pub budget_per_hour: Option<f64>,
    pub min_rating: Option<f64>,
    pub min_experience: Option<u32>,
    pub gender_preference: Option<String>,
    pub age_range: Option<AgeRangeDto>,
    #[serde(default)]
    pub health_conditions: Vec<String>,
    pub location: Option<LocationDto>,
    pub top_n: Option<i64>,
    pub use_learning: Option<bool>,
    pub use_reranking: Option<bool>,
}

impl FindCaregiversRequest {
    pub fn into_search_request(
        self,
        requester_id: Option<String>,
    ) -> Result<SearchRequest, ValidationError> {
        let care_level = match self.care_level {
            None => CareLevel::default(),
            Some(level) => u8::try_from(level)
                .ok()
                .and_then(CareLevel::new)
                .ok_or(ValidationError::CareLevelOutOfRange)?,
        };

        let time_slots = self
            .time_slots
            .iter()
            .map(TimeSlotDto::parse)
            .collect::<Result<Vec<_>, _>>()?;

        let top_n = match self.top_n {
            None => DEFAULT_TOP_N,
            Some(n) => usize::try_from(n)
                .ok()
                .filter(|n| (1..=MAX_TOP_N).contains(n))
                .ok_or(ValidationError::TopNOutOfRange { max: MAX_TOP_N })?,
        };

        let max_distance_km = match self.max_distance {
            None => DEFAULT_MAX_DISTANCE_KM,
            Some(d) if d.is_finite() && d > 0.0 => d,
            Some(_) => return Err(ValidationError::InvalidMaxDistance),
        };

        let min_rating = self.min_rating.unwrap_or(0.0);
        if !(0.0..=5.0).contains(&min_rating) {
            return Err(ValidationError::InvalidMinRating);
        }

        let budget_per_hour = match self.budget_per_hour {
            Some(b) if !(b.is_finite() && b > 0.0) => return Err(ValidationError::InvalidBudget),
            other => other,
        };

        let gender = match self.gender_preference.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(label) => Some(Gender::from_label(label).ok_or(ValidationError::InvalidGender)?),
        };

        let age_range = self
            .age_range
            .map(|range| {
                let (min, max) = match range {
                    AgeRangeDto::Pair([min, max]) => (min, max),
                    AgeRangeDto::Bounds { min, max } => (min, max),
                };
                AgeRange::new(min, max).ok_or(ValidationError::InvalidAgeRange)
            })
            .transpose()?;

        let location = self
            .location
            .map(|l| {
                let coordinates = Coordinates::new(l.lat, l.lon);
                if coordinates.is_valid() {
                    Ok(coordinates)
                } else {
                    Err(ValidationError::InvalidLocation)
                }
            })
            .transpose()?;

        Ok(SearchRequest {
            requester_id,
            required_skills: clean(self.required_skills),
            preferred_skills: clean(self.preferred_skills),
            required_certificates: clean(self.required_certificates),
            care_level,
            time_slots,
            max_distance_km,
            budget_per_hour,
            min_rating,
            min_experience: self.min_experience.unwrap_or(0),
            gender,
            age_range,
            health_conditions: clean(self.health_conditions),
            location,
            top_n,
            use_learning: self.use_learning.unwrap_or(true),
            use_reranking: self.use_reranking.unwrap_or(false),
        })
    }
}

/// Trim labels and drop blanks.
pub(crate) fn clean(labels: Vec<String>) -> Vec<String> {
    labels
        .into_iter()
        .map(|label| label.trim().to_string())
        .filter(|label| !label.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(body: serde_json::Value) -> Result<SearchRequest, ValidationError> {
        serde_json::from_value::<FindCaregiversRequest>(body)
            .unwrap()
            .into_search_request(Some("seeker-1".into()))
    }

    #[test]
    fn minimal_body_gets_defaults() {
        let request = parse(json!({ "careLevel": 1 })).unwrap();
        assert_eq!(request.care_level.get(), 1);
        assert_eq!(request.max_distance_km, 50.0);
        assert_eq!(request.top_n, 10);
        assert_eq!(request.min_rating, 0.0);
        assert!(request.use_learning);
        assert!(!request.use_reranking);
        assert_eq!(request.requester_id.as_deref(), Some("seeker-1"));
    }

    #[test]
    fn full_body_is_converted() {
        let request = parse(json!({
            "requiredSkills": ["tiêm insulin", "  "],
            "preferredSkills": ["cho ăn"],
            "careLevel": 2,
            "timeSlots": [{ "day": "Monday", "startTime": "08:00", "endTime": "12:00" }],
            "maxDistance": 10,
            "budgetPerHour": 150000,
            "minRating": 4,
            "minExperience": 2,
            "genderPreference": "female",
            "ageRange": [25, 45],
            "healthConditions": ["tiểu đường"],
            "location": { "lat": 10.77, "lon": 106.7 },
            "topN": 5,
            "useLearning": false,
            "useReranking": true
        }))
        .unwrap();

        assert_eq!(request.required_skills, vec!["tiêm insulin".to_string()]);
        assert_eq!(request.time_slots[0].day, Weekday::Monday);
        assert_eq!(request.time_slots[0].range.start, 480);
        assert_eq!(request.gender, Some(Gender::Female));
        assert_eq!(request.age_range, AgeRange::new(25, 45));
        assert_eq!(request.location, Some(Coordinates::new(10.77, 106.7)));
        assert_eq!(request.top_n, 5);
        assert!(!request.use_learning);
        assert!(request.use_reranking);
    }

    #[test]
    fn care_level_defaults_to_one_and_is_bounded() {
        assert_eq!(parse(json!({})).unwrap().care_level.get(), 1);
        assert_eq!(parse(json!({ "careLevel": 3 })).unwrap().care_level.get(), 3);
        assert_eq!(
            parse(json!({ "careLevel": 4 })),
            Err(ValidationError::CareLevelOutOfRange)
        );
        assert_eq!(
            parse(json!({ "careLevel": -1 })),
            Err(ValidationError::CareLevelOutOfRange)
        );
    }

    #[test]
    fn time_slots_are_validated() {
        for slot in [
            json!({ "day": "funday", "startTime": "08:00", "endTime": "12:00" }),
            json!({ "day": "monday", "startTime": "8:00", "endTime": "12:00" }),
            json!({ "day": "monday", "startTime": "12:00", "endTime": "08:00" }),
            json!({ "day": "monday", "startTime": "08:00" }),
        ] {
            assert_eq!(
                parse(json!({ "careLevel": 1, "timeSlots": [slot] })),
                Err(ValidationError::InvalidTimeSlot)
            );
        }
    }

    #[test]
    fn numeric_bounds_are_enforced() {
        assert_eq!(
            parse(json!({ "careLevel": 1, "topN": 0 })),
            Err(ValidationError::TopNOutOfRange { max: 50 })
        );
        assert_eq!(
            parse(json!({ "careLevel": 1, "topN": 51 })),
            Err(ValidationError::TopNOutOfRange { max: 50 })
        );
        assert_eq!(
            parse(json!({ "careLevel": 1, "maxDistance": 0 })),
            Err(ValidationError::InvalidMaxDistance)
        );
        assert_eq!(
            parse(json!({ "careLevel": 1, "minRating": 5.5 })),
            Err(ValidationError::InvalidMinRating)
        );
        assert_eq!(
            parse(json!({ "careLevel": 1, "ageRange": { "min": 50, "max": 30 } })),
            Err(ValidationError::InvalidAgeRange)
        );
        assert_eq!(
            parse(json!({ "careLevel": 1, "genderPreference": "other" })),
            Err(ValidationError::InvalidGender)
        );
    }
}
