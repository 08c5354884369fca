use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Body of a `generateContent` call
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub system_instruction: Content,
    pub contents: Vec<Content>,
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// A content part: either text or an inline base64 blob
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }

    pub fn inline(mime_type: &str, data: &str) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: mime_type.to_string(),
                data: data.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_mime_type: String,
    pub response_schema: Value,
    pub temperature: f64,
}

/// Successful `generateContent` response (only the fields we read)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<Content>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    pub block_reason: Option<String>,
}

/// Error envelope returned with non-2xx statuses
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    pub code: Option<i64>,
    pub message: String,
    pub status: Option<String>,
}

/// Schema the model must follow; every field is required
pub fn analysis_response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "strengths": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "description": "Positive aspects of the trade execution or setup."
            },
            "weaknesses": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "description": "Negative aspects or mistakes made during the trade."
            },
            "potentialImprovements": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "description": "Actionable advice for future trades."
            },
            "overallRating": {
                "type": "NUMBER",
                "description": "A numerical rating from 1 to 10 on the quality of the trade."
            },
            "summary": {
                "type": "STRING",
                "description": "A brief one-sentence summary of the trade analysis."
            }
        },
        "required": ["strengths", "weaknesses", "potentialImprovements", "overallRating", "summary"]
    })
}
