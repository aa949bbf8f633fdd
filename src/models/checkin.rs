use serde::{Deserialize, Serialize};

/// Periodic athlete check-in: weight plus simple biofeedback scores.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckIn {
    pub id: String,
    pub athlete_id: String,
    pub weight_kg: Option<f64>,
    /// Biofeedback, 1-5 scales
    pub energy: Option<i32>,
    pub sleep_quality: Option<i32>,
    pub stress: Option<i32>,
    pub notes: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCheckIn {
    #[serde(default)]
    pub weight_kg: Option<f64>,
    #[serde(default)]
    pub energy: Option<i32>,
    #[serde(default)]
    pub sleep_quality: Option<i32>,
    #[serde(default)]
    pub stress: Option<i32>,
    #[serde(default)]
    pub notes: Option<String>,
}
