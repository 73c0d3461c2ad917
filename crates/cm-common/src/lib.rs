pub mod api;
pub mod db;
pub mod geo;
pub mod geocode;
pub mod logging;
pub mod matching;
pub mod oracle;
pub mod similarity;

use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};

pub use geo::Coordinates;

static CLOCK_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([01]\d|2[0-3]):([0-5]\d)$").unwrap());

/// Parse a 24h `HH:mm` label into minutes after midnight.
pub fn parse_clock(label: &str) -> Option<u16> {
    let caps = CLOCK_PATTERN.captures(label.trim())?;
    let hours: u16 = caps[1].parse().ok()?;
    let minutes: u16 = caps[2].parse().ok()?;
    Some(hours * 60 + minutes)
}

/// Ordinal education level. Stored labels are the Vietnamese ones used by profile forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EducationLevel {
    LowerSecondary,
    UpperSecondary,
    Bachelor,
    Graduate,
}

impl EducationLevel {
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "trung học cơ sở" | "lower_secondary" => Some(Self::LowerSecondary),
            "trung học phổ thông" | "upper_secondary" => Some(Self::UpperSecondary),
            "đại học" | "bachelor" => Some(Self::Bachelor),
            "sau đại học" | "graduate" => Some(Self::Graduate),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::LowerSecondary => "trung học cơ sở",
            Self::UpperSecondary => "trung học phổ thông",
            Self::Bachelor => "đại học",
            Self::Graduate => "sau đại học",
        }
    }

    /// Credential points, 1..=4.
    pub fn points(&self) -> f64 {
        match self {
            Self::LowerSecondary => 1.0,
            Self::UpperSecondary => 2.0,
            Self::Bachelor => 3.0,
            Self::Graduate => 4.0,
        }
    }

    pub fn is_higher_education(&self) -> bool {
        matches!(self, Self::Bachelor | Self::Graduate)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    /// Accepts stored labels (`Nam` / `Nữ`) as well as `male` / `female`.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "nam" | "male" => Some(Self::Male),
            "nữ" | "female" => Some(Self::Female),
            _ => None,
        }
    }

    pub fn stored_label(&self) -> &'static str {
        match self {
            Self::Male => "Nam",
            Self::Female => "Nữ",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "monday" => Some(Self::Monday),
            "tuesday" => Some(Self::Tuesday),
            "wednesday" => Some(Self::Wednesday),
            "thursday" => Some(Self::Thursday),
            "friday" => Some(Self::Friday),
            "saturday" => Some(Self::Saturday),
            "sunday" => Some(Self::Sunday),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl ProfileStatus {
    pub fn parse(label: &str) -> Self {
        match label {
            "approved" => Self::Approved,
            "rejected" => Self::Rejected,
            _ => Self::Pending,
        }
    }
}

/// Half-open clock range in minutes after midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: u16,
    pub end: u16,
}

impl TimeRange {
    pub fn parse(start: &str, end: &str) -> Option<Self> {
        Some(Self {
            start: parse_clock(start)?,
            end: parse_clock(end)?,
        })
    }

    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// A requested visit: day of week plus clock range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSlot {
    pub day: Weekday,
    pub range: TimeRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Recurrence {
    #[default]
    Weekly,
    Daily,
    Once,
}

impl Recurrence {
    pub fn parse(label: &str) -> Self {
        match label {
            "daily" => Self::Daily,
            "once" => Self::Once,
            _ => Self::Weekly,
        }
    }
}

/// Declared availability of a caregiver. Only weekly windows are tied to specific days.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AvailabilityWindow {
    pub recurrence: Recurrence,
    pub days_of_week: Vec<Weekday>,
    pub time_slots: Vec<TimeRange>,
}

impl AvailabilityWindow {
    pub fn covers(&self, slot: &TimeSlot) -> bool {
        if self.recurrence == Recurrence::Weekly && !self.days_of_week.contains(&slot.day) {
            return false;
        }
        self.time_slots.iter().any(|range| slot.range.overlaps(range))
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    pub name: String,
    pub certificate_type: Option<String>,
    pub issuing_organization: Option<String>,
    pub issue_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Skill {
    pub name: String,
    pub description: Option<String>,
}

/// Aggregated booking history of a caregiver.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BookingStats {
    pub total_bookings: u32,
    pub completion_rate: f64,
    pub cancel_rate: f64,
}

/// Lifecycle state of a booking as stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Ongoing,
    Completed,
    Cancelled,
    Rejected,
}

impl BookingStatus {
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "confirmed" | "accepted" => Some(Self::Confirmed),
            "ongoing" | "in_progress" => Some(Self::Ongoing),
            "completed" => Some(Self::Completed),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    /// Only finished bookings feed the trust signal.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

impl BookingStats {
    /// Aggregate `(status, count)` pairs; non-terminal statuses are ignored.
    pub fn from_status_counts(counts: impl IntoIterator<Item = (BookingStatus, u32)>) -> Self {
        let (mut completed, mut cancelled) = (0u32, 0u32);
        for (status, n) in counts {
            match status {
                BookingStatus::Completed => completed = completed.saturating_add(n),
                BookingStatus::Cancelled => cancelled = cancelled.saturating_add(n),
                _ => {}
            }
        }
        Self::from_counts(completed.saturating_add(cancelled), completed, cancelled)
    }

    pub fn from_counts(total: u32, completed: u32, cancelled: u32) -> Self {
        if total == 0 {
            return Self::default();
        }
        Self {
            total_bookings: total,
            completion_rate: completed as f64 / total as f64,
            cancel_rate: cancelled as f64 / total as f64,
        }
    }
}

/// Per-candidate detail loaded after the cheap pre-prune.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CandidateContext {
    pub skills: Vec<Skill>,
    pub availability: Vec<AvailabilityWindow>,
    pub review_ratings: Vec<u8>,
    pub booking_stats: BookingStats,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CandidateProfile {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub status: ProfileStatus,
    pub gender: Option<Gender>,
    pub date_of_birth: Option<NaiveDate>,
    pub education: Option<EducationLevel>,
    pub years_of_experience: u32,
    pub certificates: Vec<Certificate>,
    pub coordinates: Option<Coordinates>,
    pub id_card_number: Option<String>,
    pub address: Option<String>,
    pub hourly_rate: Option<u64>,
    pub skills: Vec<Skill>,
    pub availability: Vec<AvailabilityWindow>,
    pub review_ratings: Vec<u8>,
    pub booking_stats: BookingStats,
}

impl CandidateProfile {
    pub fn with_context(mut self, context: CandidateContext) -> Self {
        self.skills = context.skills;
        self.availability = context.availability;
        self.review_ratings = context.review_ratings;
        self.booking_stats = context.booking_stats;
        self
    }

    /// Calendar age, one less when the birthday has not been reached yet this year.
    pub fn age_on(&self, today: NaiveDate) -> Option<u32> {
        let dob = self.date_of_birth?;
        let mut age = today.year() - dob.year();
        if (today.month(), today.day()) < (dob.month(), dob.day()) {
            age -= 1;
        }
        u32::try_from(age).ok()
    }

    /// Mean review rating; 0 when there are no reviews.
    pub fn average_rating(&self) -> f64 {
        if self.review_ratings.is_empty() {
            return 0.0;
        }
        let sum: u32 = self.review_ratings.iter().map(|r| u32::from(*r)).sum();
        sum as f64 / self.review_ratings.len() as f64
    }

    pub fn has_verified_identity(&self) -> bool {
        self.id_card_number
            .as_deref()
            .is_some_and(|id| !id.trim().is_empty())
    }

    pub fn skill_names(&self) -> impl Iterator<Item = &str> {
        self.skills.iter().map(|s| s.name.as_str())
    }

    pub fn has_certificate_named(&self, name: &str) -> bool {
        let wanted = name.trim().to_lowercase();
        self.certificates
            .iter()
            .any(|c| c.name.trim().to_lowercase() == wanted)
    }
}

/// Care recipient details that can seed a geography-first search.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ElderlyProfile {
    pub id: String,
    pub medical_conditions: Vec<String>,
    pub personality_type: Option<String>,
    pub special_needs: Option<String>,
}

/// Service package whose requirements are merged into a geography-first search.
/// `required_skills` doubles as the list of services the package covers.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CarePackage {
    pub id: String,
    pub name: String,
    pub package_type: Option<String>,
    /// VND per booking.
    pub price: Option<f64>,
    pub duration_hours: Option<f64>,
    pub required_skills: Vec<String>,
    pub required_certificates: Vec<String>,
    pub optional_certificates: Vec<String>,
}
