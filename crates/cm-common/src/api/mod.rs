//! Wire DTOs for the matching endpoints and their validation into domain requests.

pub mod find_request;
pub mod package_ranking;
pub mod responses;
pub mod search_request;

pub use find_request::{FindCaregiversRequest, LocationDto, TimeSlotDto};
pub use package_ranking::{
    ComparisonResponse, OracleCheckResponse, PackageMatchRequest, PackageRankingResponse,
};
pub use responses::{
    FilterSummary, FindMeta, FindResponse, GeoSearchResponse, MatchListResponse, SimilarityReport,
    SimilarityRequest, StatsResponse,
};
pub use search_request::{CaregiverSearchRequest, OverrideDto, SearchLocationDto};

/// Input rejected before any matching work starts.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Care level must be between 1 and 3")]
    CareLevelOutOfRange,
    #[error(
        "Invalid time slots format. Expected: [{{day: \"monday\", startTime: \"08:00\", endTime: \"12:00\"}}]"
    )]
    InvalidTimeSlot,
    #[error("topN must be between 1 and {max}")]
    TopNOutOfRange { max: usize },
    #[error("ageRange min must not exceed max")]
    InvalidAgeRange,
    #[error("maxDistance must be greater than 0")]
    InvalidMaxDistance,
    #[error("minRating must be between 0 and 5")]
    InvalidMinRating,
    #[error("budgetPerHour must be greater than 0")]
    InvalidBudget,
    #[error("genderPreference must be male or female")]
    InvalidGender,
    #[error("location coordinates are out of range")]
    InvalidLocation,
    #[error("location.address is required")]
    MissingAddress,
    #[error("Please provide both skill1 and skill2")]
    MissingSkills,
    #[error("Package ID is required")]
    MissingPackageId,
    #[error("maxResults must be between 1 and {max}")]
    MaxResultsOutOfRange { max: usize },
}
