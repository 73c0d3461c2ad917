use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::ValidationError;
use crate::matching::config::{DEFAULT_PACKAGE_MATCHES, PACKAGE_RANK_POOL};
use crate::matching::result::{OracleCheck, PackageRanking, RankingComparison, WeightedMatch};

pub const RULE_BASED_PROVIDER: &str = "Rule-based Algorithm";
pub const COMPARISON_MESSAGE: &str = "Comparison complete";
pub const ORACLE_CHECK_MESSAGE: &str = "LLM connection successful";

/// Body of the package ranking and comparison endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageMatchRequest {
    pub package_id: Option<String>,
    pub max_results: Option<usize>,
}

impl PackageMatchRequest {
    pub fn package_id(&self) -> Result<&str, ValidationError> {
        self.package_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or(ValidationError::MissingPackageId)
    }

    pub fn max_results(&self) -> Result<usize, ValidationError> {
        match self.max_results {
            None => Ok(DEFAULT_PACKAGE_MATCHES),
            Some(n) if (1..=PACKAGE_RANK_POOL).contains(&n) => Ok(n),
            Some(_) => Err(ValidationError::MaxResultsOutOfRange {
                max: PACKAGE_RANK_POOL,
            }),
        }
    }
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackageInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub package_type: Option<String>,
    pub price: Option<f64>,
    /// Hours.
    pub duration: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageRankingData {
    pub matches: Vec<WeightedMatch>,
    pub total_caregivers: usize,
    pub package_info: PackageInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageRankingMeta {
    pub ai_provider: String,
    pub fallback: bool,
    pub response_time: u64,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackageRankingResponse {
    pub success: bool,
    pub message: String,
    pub data: PackageRankingData,
    pub meta: PackageRankingMeta,
}

impl From<PackageRanking> for PackageRankingResponse {
    fn from(ranking: PackageRanking) -> Self {
        let package = ranking.package;
        Self {
            success: true,
            message: format!(
                "Found {} matching caregivers using {}",
                ranking.matches.len(),
                ranking.provider
            ),
            data: PackageRankingData {
                matches: ranking.matches,
                total_caregivers: ranking.total_caregivers,
                package_info: PackageInfo {
                    name: package.name,
                    package_type: package.package_type,
                    price: package.price,
                    duration: package.duration_hours,
                },
            },
            meta: PackageRankingMeta {
                ai_provider: ranking.provider,
                fallback: ranking.fallback,
                response_time: ranking.elapsed_ms,
                timestamp: timestamp(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonSide {
    pub matches: Vec<WeightedMatch>,
    pub response_time: u64,
    pub provider: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonData {
    pub groq: ComparisonSide,
    pub rule_based: ComparisonSide,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonResponse {
    pub success: bool,
    pub message: &'static str,
    pub data: ComparisonData,
}

impl From<RankingComparison> for ComparisonResponse {
    fn from(comparison: RankingComparison) -> Self {
        let oracle = comparison.oracle;
        Self {
            success: true,
            message: COMPARISON_MESSAGE,
            data: ComparisonData {
                groq: ComparisonSide {
                    matches: oracle.matches,
                    response_time: oracle.elapsed_ms,
                    provider: oracle.provider,
                },
                rule_based: ComparisonSide {
                    matches: comparison.rule_based,
                    response_time: comparison.rule_based_ms,
                    provider: RULE_BASED_PROVIDER.to_string(),
                },
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OracleCheckData {
    #[serde(flatten)]
    pub check: OracleCheck,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OracleCheckResponse {
    pub success: bool,
    pub message: &'static str,
    pub data: OracleCheckData,
}

impl From<OracleCheck> for OracleCheckResponse {
    fn from(check: OracleCheck) -> Self {
        Self {
            success: true,
            message: ORACLE_CHECK_MESSAGE,
            data: OracleCheckData {
                check,
                timestamp: timestamp(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CarePackage;
    use serde_json::json;

    #[test]
    fn package_id_is_required_and_max_results_bounded() {
        let request: PackageMatchRequest = serde_json::from_value(json!({ "packageId": "  " })).unwrap();
        assert_eq!(request.package_id(), Err(ValidationError::MissingPackageId));
        assert_eq!(request.max_results(), Ok(DEFAULT_PACKAGE_MATCHES));

        let request: PackageMatchRequest =
            serde_json::from_value(json!({ "packageId": "pkg-1", "maxResults": 21 })).unwrap();
        assert_eq!(request.package_id(), Ok("pkg-1"));
        assert!(matches!(
            request.max_results(),
            Err(ValidationError::MaxResultsOutOfRange { max: 20 })
        ));
    }

    #[test]
    fn ranking_response_carries_package_info() {
        let ranking = PackageRanking {
            package: CarePackage {
                id: "pkg-1".into(),
                name: "Gói cơ bản".into(),
                package_type: Some("basic".into()),
                price: Some(350_000.0),
                duration_hours: Some(4.0),
                ..CarePackage::default()
            },
            total_caregivers: 7,
            matches: Vec::new(),
            fallback: true,
            provider: "Groq (llama-3.1-8b-instant)".into(),
            elapsed_ms: 12,
        };

        let value = serde_json::to_value(PackageRankingResponse::from(ranking)).unwrap();
        assert_eq!(
            value["message"],
            json!("Found 0 matching caregivers using Groq (llama-3.1-8b-instant)")
        );
        assert_eq!(value["data"]["totalCaregivers"], json!(7));
        assert_eq!(value["data"]["packageInfo"]["type"], json!("basic"));
        assert_eq!(value["data"]["packageInfo"]["duration"], json!(4.0));
        assert_eq!(value["meta"]["fallback"], json!(true));
        assert_eq!(value["meta"]["responseTime"], json!(12));
    }
}
