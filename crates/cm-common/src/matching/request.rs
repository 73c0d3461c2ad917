use crate::{CarePackage, Coordinates, ElderlyProfile, Gender, TimeSlot};

pub const DEFAULT_MAX_DISTANCE_KM: f64 = 50.0;
pub const DEFAULT_TOP_N: usize = 10;
pub const MAX_TOP_N: usize = 50;
pub const DEFAULT_GEO_MAX_DISTANCE_KM: f64 = 7.0;

/// Minimum care level, 1 through 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CareLevel(u8);

impl CareLevel {
    pub fn new(level: u8) -> Option<Self> {
        (1..=3).contains(&level).then_some(Self(level))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Levels 2 and 3 require higher education.
    pub fn requires_higher_education(self) -> bool {
        self.0 >= 2
    }
}

impl Default for CareLevel {
    fn default() -> Self {
        Self(1)
    }
}

/// Inclusive age bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgeRange {
    pub min: u32,
    pub max: u32,
}

impl AgeRange {
    pub fn new(min: u32, max: u32) -> Option<Self> {
        (min <= max).then_some(Self { min, max })
    }

    pub fn contains(&self, age: u32) -> bool {
        (self.min..=self.max).contains(&age)
    }
}

/// Validated find-caregivers request.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub requester_id: Option<String>,
    pub required_skills: Vec<String>,
    pub preferred_skills: Vec<String>,
    pub required_certificates: Vec<String>,
    pub care_level: CareLevel,
    pub time_slots: Vec<TimeSlot>,
    pub max_distance_km: f64,
    pub budget_per_hour: Option<f64>,
    pub min_rating: f64,
    pub min_experience: u32,
    pub gender: Option<Gender>,
    pub age_range: Option<AgeRange>,
    pub health_conditions: Vec<String>,
    pub location: Option<Coordinates>,
    pub top_n: usize,
    pub use_learning: bool,
    pub use_reranking: bool,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            requester_id: None,
            required_skills: Vec::new(),
            preferred_skills: Vec::new(),
            required_certificates: Vec::new(),
            care_level: CareLevel::default(),
            time_slots: Vec::new(),
            max_distance_km: DEFAULT_MAX_DISTANCE_KM,
            budget_per_hour: None,
            min_rating: 0.0,
            min_experience: 0,
            gender: None,
            age_range: None,
            health_conditions: Vec::new(),
            location: None,
            top_n: DEFAULT_TOP_N,
            use_learning: true,
            use_reranking: false,
        }
    }
}

impl SearchRequest {
    /// Unfiltered request used by quick-match and recommendations.
    pub fn unfiltered(requester_id: Option<String>, top_n: usize) -> Self {
        Self {
            requester_id,
            top_n: top_n.clamp(1, MAX_TOP_N),
            ..Self::default()
        }
    }
}

/// Care-recipient fields that take precedence over the stored elderly profile.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProfileOverride {
    pub health_conditions: Option<Vec<String>>,
    pub personality: Option<String>,
    pub special_needs: Option<String>,
}

/// Validated geography-first search request.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoSearchRequest {
    pub address: String,
    pub coordinates: Option<Coordinates>,
    pub elderly_id: Option<String>,
    pub package_id: Option<String>,
    pub skills: Vec<String>,
    pub required_certificates: Vec<String>,
    pub preferred_certificates: Vec<String>,
    pub preferred_gender: Option<String>,
    pub min_experience: u32,
    pub max_distance_km: f64,
    pub overrides: ProfileOverride,
}

impl GeoSearchRequest {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            coordinates: None,
            elderly_id: None,
            package_id: None,
            skills: Vec::new(),
            required_certificates: Vec::new(),
            preferred_certificates: Vec::new(),
            preferred_gender: None,
            min_experience: 0,
            max_distance_km: DEFAULT_GEO_MAX_DISTANCE_KM,
            overrides: ProfileOverride::default(),
        }
    }

    /// Stored gender label: `female` selects `Nữ`, anything else `Nam`.
    pub fn gender_filter(&self) -> Option<Gender> {
        self.preferred_gender.as_deref().map(|g| {
            if g.trim().eq_ignore_ascii_case("female") {
                Gender::Female
            } else {
                Gender::Male
            }
        })
    }
}

/// Requirements after merging the request with its package and elderly profile.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoCriteria {
    pub location: Option<Coordinates>,
    pub address: String,
    pub required_skills: Vec<String>,
    pub required_certificates: Vec<String>,
    pub preferred_certificates: Vec<String>,
    pub health_conditions: Vec<String>,
    pub personality: Option<String>,
    pub special_needs: Option<String>,
    pub preferred_gender: Option<String>,
    pub min_experience: u32,
    pub max_distance_km: f64,
}

impl GeoCriteria {
    pub fn merge(
        request: &GeoSearchRequest,
        location: Option<Coordinates>,
        elderly: Option<&ElderlyProfile>,
        package: Option<&CarePackage>,
    ) -> Self {
        let package_skills = package.map(|p| p.required_skills.as_slice()).unwrap_or_default();
        let package_required = package
            .map(|p| p.required_certificates.as_slice())
            .unwrap_or_default();
        let package_optional = package
            .map(|p| p.optional_certificates.as_slice())
            .unwrap_or_default();

        let overrides = &request.overrides;
        Self {
            location,
            address: request.address.clone(),
            required_skills: merge_unique(&request.skills, package_skills),
            required_certificates: merge_unique(&request.required_certificates, package_required),
            preferred_certificates: merge_unique(&request.preferred_certificates, package_optional),
            health_conditions: overrides
                .health_conditions
                .clone()
                .or_else(|| elderly.map(|e| e.medical_conditions.clone()))
                .unwrap_or_default(),
            personality: overrides
                .personality
                .clone()
                .or_else(|| elderly.and_then(|e| e.personality_type.clone())),
            special_needs: overrides
                .special_needs
                .clone()
                .or_else(|| elderly.and_then(|e| e.special_needs.clone())),
            preferred_gender: request.preferred_gender.clone(),
            min_experience: request.min_experience,
            max_distance_km: request.max_distance_km,
        }
    }
}

/// Order-preserving union with exact-duplicate removal.
fn merge_unique(first: &[String], second: &[String]) -> Vec<String> {
    let mut merged: Vec<String> = Vec::with_capacity(first.len() + second.len());
    for item in first.iter().chain(second) {
        if !merged.contains(item) {
            merged.push(item.clone());
        }
    }
    merged
}
