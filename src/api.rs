use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{Result, XsmbError};
use crate::lookup::ResultLookup;
use crate::prediction::{AnalysisResult, Predictor, describe_result};
use crate::types::LotteryResult;

const SAFETY_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub safety_settings: Vec<SafetySetting>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

#[derive(Serialize, Debug)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct Part {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Serialize, Debug)]
pub struct SafetySetting {
    pub category: String,
    pub threshold: String,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_mime_type: String,
}

#[derive(Deserialize, Debug)]
pub struct GenerateResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Deserialize, Debug)]
pub struct Candidate {
    pub content: Option<CandidateContent>,
}

#[derive(Deserialize, Debug)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl GenerateResponse {
    /// Text of the first candidate, all parts joined.
    pub fn text(&self) -> Result<String> {
        let text: String = self
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect()
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            Err(XsmbError::NoJsonFound)
        } else {
            Ok(text)
        }
    }
}

fn user_prompt(prompt: String) -> Vec<Content> {
    vec![Content {
        role: "user".to_string(),
        parts: vec![Part { text: Some(prompt) }],
    }]
}

pub fn lookup_prompt(search_date: &str) -> String {
    format!(
        r#"Tra cứu kết quả xổ số miền Bắc (XSMB) ngày {search_date}.
Chỉ dùng số liệu tìm thấy, không tự bịa số. Giải nào chưa có kết quả thì ghi "...".
Kèm thống kê Lô Gan (5 số lâu chưa về nhất) và Lô Hay Về (5 số về nhiều nhất trong 30 ngày).
Chỉ trả về một đối tượng JSON:
{{"prizeSpecial": "string", "prize1": "string",
 "prize2": [2 chuỗi], "prize3": [6 chuỗi], "prize4": [4 chuỗi],
 "prize5": [6 chuỗi], "prize6": [3 chuỗi], "prize7": [4 chuỗi],
 "loGan": [{{"number": "2 chữ số", "days": số nguyên}}],
 "lotoHayVe": [{{"number": "2 chữ số", "count": số nguyên}}]}}"#
    )
}

pub fn analysis_prompt(result: &LotteryResult) -> String {
    format!(
        r#"Bạn là chuyên gia soi cầu XSMB. Dựa trên dữ liệu sau, nhận xét ngắn gọn kết quả,
chọn 3 số lô tô nổi bật và chốt số ngày mai (bạch thủ, song thủ, đặc biệt) kèm lời bình
và thống kê chi tiết cho từng số.

{}
Trả về JSON với các trường: summary, hotNumbers, luckyPrediction,
tomorrow {{bachThu, songThu, dacBiet, description, detailedStats [{{category, numbers, trend, dataRef}}]}}."#,
        describe_result(result)
    )
}

pub fn build_lookup_request(search_date: &str) -> GenerateRequest {
    GenerateRequest {
        contents: user_prompt(lookup_prompt(search_date)),
        tools: vec![json!({ "google_search": {} })],
        safety_settings: SAFETY_CATEGORIES
            .iter()
            .map(|category| SafetySetting {
                category: category.to_string(),
                threshold: "BLOCK_NONE".to_string(),
            })
            .collect(),
        generation_config: None,
    }
}

pub fn build_analysis_request(result: &LotteryResult) -> GenerateRequest {
    GenerateRequest {
        contents: user_prompt(analysis_prompt(result)),
        tools: Vec::new(),
        safety_settings: Vec::new(),
        generation_config: Some(GenerationConfig {
            response_mime_type: "application/json".to_string(),
        }),
    }
}

/// Gemini `generateContent` client acting as both lookup and predictor.
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    api_base: String,
}

impl GeminiClient {
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| XsmbError::Config("GEMINI_API_KEY is not set".to_string()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            api_base: config.api_base.clone(),
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.api_base, self.model)
    }

    pub async fn generate(&self, request: &GenerateRequest) -> Result<String> {
        let response = self
            .client
            .post(self.endpoint())
            .header("Content-Type", "application/json")
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(XsmbError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: GenerateResponse = response.json().await?;
        body.text()
    }
}

#[async_trait]
impl ResultLookup for GeminiClient {
    async fn lookup(&self, search_date: &str) -> Result<String> {
        debug!("Looking up XSMB result for {}", search_date);
        self.generate(&build_lookup_request(search_date)).await
    }
}

#[async_trait]
impl Predictor for GeminiClient {
    async fn analyze(&self, result: &LotteryResult) -> AnalysisResult {
        let analysis = async {
            let text = self.generate(&build_analysis_request(result)).await?;
            Ok::<_, XsmbError>(serde_json::from_str::<AnalysisResult>(text.trim())?)
        };

        match analysis.await {
            Ok(analysis) => analysis,
            Err(e) => {
                warn!("AI analysis for {} failed: {}", result.date, e);
                AnalysisResult::unavailable()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::from_source;

    fn config_with_key(key: Option<&str>) -> Config {
        let key = key.map(str::to_string);
        from_source(move |name| match name {
            "GEMINI_API_KEY" => key.clone(),
            "XSMB_API_BASE" => Some("http://localhost:9".to_string()),
            _ => None,
        })
        .unwrap()
    }

    #[test]
    fn lookup_request_enables_search_tool() {
        let value = serde_json::to_value(build_lookup_request("09/05/2024")).unwrap();

        assert_eq!(value["tools"], json!([{ "google_search": {} }]));
        assert_eq!(value["safetySettings"].as_array().unwrap().len(), 4);
        assert!(value.get("generationConfig").is_none());
        let prompt = value["contents"][0]["parts"][0]["text"].as_str().unwrap();
        assert!(prompt.contains("09/05/2024"));
        assert!(prompt.contains("\"prize7\""));
    }

    #[test]
    fn analysis_request_asks_for_json() {
        let result = LotteryResult::empty("2024-05-09", 0);
        let value = serde_json::to_value(build_analysis_request(&result)).unwrap();

        assert_eq!(value["generationConfig"]["responseMimeType"], json!("application/json"));
        assert!(value.get("tools").is_none());
        let prompt = value["contents"][0]["parts"][0]["text"].as_str().unwrap();
        assert!(prompt.contains("2024-05-09"));
    }

    #[test]
    fn response_text_joins_parts() {
        let response: GenerateResponse = serde_json::from_value(json!({
            "candidates": [{ "content": { "parts": [{ "text": "{\"a\":" }, { "text": " 1}" }] } }]
        }))
        .unwrap();
        assert_eq!(response.text().unwrap(), "{\"a\": 1}");
    }

    #[test]
    fn empty_response_has_no_json() {
        let response: GenerateResponse = serde_json::from_value(json!({})).unwrap();
        assert!(matches!(response.text(), Err(XsmbError::NoJsonFound)));

        let blank: GenerateResponse =
            serde_json::from_value(json!({ "candidates": [{ "content": { "parts": [{}] } }] })).unwrap();
        assert!(matches!(blank.text(), Err(XsmbError::NoJsonFound)));
    }

    #[test]
    fn client_requires_api_key() {
        assert!(matches!(
            GeminiClient::new(&config_with_key(None)),
            Err(XsmbError::Config(_))
        ));

        let client = GeminiClient::new(&config_with_key(Some("k"))).unwrap();
        assert_eq!(
            client.endpoint(),
            "http://localhost:9/models/gemini-2.5-flash:generateContent"
        );
    }

    #[tokio::test]
    async fn unreachable_backend_yields_placeholder_analysis() {
        let client = GeminiClient::new(&config_with_key(Some("k"))).unwrap();
        let result = LotteryResult::empty("2024-05-09", 0);

        let analysis = client.analyze(&result).await;
        assert_eq!(analysis, AnalysisResult::unavailable());
    }
}
