use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::{LotteryResult, Tier};

/// Marks a prediction field the analyser could not fill.
pub const PLACEHOLDER: &str = "--";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AnalyzeStatus {
    Idle,
    Loading,
    Success,
    Error,
}

impl AnalyzeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalyzeStatus::Idle => "IDLE",
            AnalyzeStatus::Loading => "LOADING",
            AnalyzeStatus::Success => "SUCCESS",
            AnalyzeStatus::Error => "ERROR",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "IDLE" => Some(AnalyzeStatus::Idle),
            "LOADING" => Some(AnalyzeStatus::Loading),
            "SUCCESS" => Some(AnalyzeStatus::Success),
            "ERROR" => Some(AnalyzeStatus::Error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionStat {
    pub category: String,
    pub numbers: String,
    pub trend: String,
    pub data_ref: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TomorrowPrediction {
    pub bach_thu: String,
    pub song_thu: String,
    pub dac_biet: String,
    pub description: String,
    #[serde(default)]
    pub detailed_stats: Vec<PredictionStat>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub summary: String,
    pub hot_numbers: Vec<String>,
    pub lucky_prediction: String,
    pub tomorrow: TomorrowPrediction,
}

impl AnalysisResult {
    /// What an analyser returns instead of an error.
    pub fn unavailable() -> Self {
        Self {
            summary: "Thần tài đang bận đi vắng, chưa thể phân tích lúc này!".to_string(),
            hot_numbers: vec![PLACEHOLDER.to_string(); 3],
            lucky_prediction: PLACEHOLDER.to_string(),
            tomorrow: TomorrowPrediction {
                bach_thu: PLACEHOLDER.to_string(),
                song_thu: PLACEHOLDER.to_string(),
                dac_biet: PLACEHOLDER.to_string(),
                description: "Hệ thống đang bận, vui lòng thử lại sau.".to_string(),
                detailed_stats: Vec::new(),
            },
        }
    }

    pub fn status(&self) -> AnalyzeStatus {
        match self.hot_numbers.first() {
            Some(first) if first == PLACEHOLDER => AnalyzeStatus::Error,
            _ => AnalyzeStatus::Success,
        }
    }
}

/// Produces commentary for a draw. Implementations fold their own failures
/// into [`AnalysisResult::unavailable`].
#[async_trait]
pub trait Predictor: Send + Sync {
    async fn analyze(&self, result: &LotteryResult) -> AnalysisResult;
}

/// Plain-text rendering of a draw, used as analyser input.
pub fn describe_result(result: &LotteryResult) -> String {
    let mut text = format!("Kết quả Xổ Số Miền Bắc ngày {}:\n", result.date);
    for tier in Tier::ALL {
        text.push_str(&format!("{}: {}\n", tier.display_name(), result.tier(tier).join(", ")));
    }

    text.push_str("\nBảng Lô Tô (Đầu):\n");
    for (head, bucket) in result.loto_head.iter() {
        let numbers = if bucket.is_empty() {
            "CÂM".to_string()
        } else {
            bucket.join(",")
        };
        text.push_str(&format!("Đầu {}: {}\n", head, numbers));
    }

    let lo_gan = if result.lo_gan.is_empty() {
        "Không có dữ liệu".to_string()
    } else {
        result
            .lo_gan
            .iter()
            .map(|i| format!("{}({} ngày)", i.number, i.days))
            .collect::<Vec<_>>()
            .join(", ")
    };
    text.push_str(&format!("\nLô Gan (Lâu chưa về): {}\n", lo_gan));

    let hay_ve = if result.loto_hay_ve.is_empty() {
        "Không có dữ liệu".to_string()
    } else {
        result
            .loto_hay_ve
            .iter()
            .map(|i| format!("{}({} lần)", i.number, i.count))
            .collect::<Vec<_>>()
            .join(", ")
    };
    text.push_str(&format!("Lô Hay Về (30 ngày qua): {}\n", hay_ve));

    text
}
