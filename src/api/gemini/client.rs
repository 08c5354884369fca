use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::StatusCode;
use std::time::Duration;

use crate::api::{
    client::{RateLimitConfig, TradeAnalyzer},
    error::ApiError,
    rate_limiter::RateLimiter,
};
use crate::models::{AiAnalysis, Screenshot, TradeDraft, round_cents};

use super::types::{
    analysis_response_schema, Content, ErrorEnvelope, GenerateContentRequest,
    GenerateContentResponse, GenerationConfig, Part,
};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const API_VERSION: &str = "v1beta";

const SYSTEM_INSTRUCTION: &str = "You are a world-class trading coach and analyst for foreign exchange (FX) markets. \
Your task is to provide an objective, insightful, and constructive analysis of a submitted trade. \
Focus on risk management, trade setup, execution, and potential psychological factors. \
Provide a rating out of 10. Be concise and use bullet points.";

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f64,
    pub base_url: String,
    pub timeout: Duration,
}

pub struct GeminiClient {
    config: GeminiConfig,
    http_client: reqwest::Client,
    rate_limiter: RateLimiter,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self, ApiError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            rate_limiter: RateLimiter::new(Self::quota()),
            config,
            http_client,
        })
    }

    // Free-tier flash quota
    fn quota() -> RateLimitConfig {
        RateLimitConfig {
            requests_per_minute: 10,
            burst_size: 2,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            API_VERSION,
            self.config.model
        )
    }

    fn build_headers(&self, api_key: &str) -> Result<HeaderMap, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        headers.insert(
            "x-goog-api-key",
            HeaderValue::from_str(api_key)
                .map_err(|e| ApiError::InvalidCredentials(format!("Malformed API key: {}", e)))?,
        );
        Ok(headers)
    }

    pub fn build_request(
        &self,
        trade: &TradeDraft,
        screenshot: Option<&Screenshot>,
    ) -> GenerateContentRequest {
        let mut parts = Vec::with_capacity(2);
        if let Some(image) = screenshot {
            parts.push(Part::inline(&image.mime_type, &image.data));
        }
        parts.push(Part::text(build_prompt(trade, screenshot.is_some())));

        GenerateContentRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part::text(SYSTEM_INSTRUCTION)],
            },
            contents: vec![Content {
                role: Some("user".to_string()),
                parts,
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_schema: analysis_response_schema(),
                temperature: self.config.temperature,
            },
        }
    }
}

/// Prompt text describing the trade
pub fn build_prompt(trade: &TradeDraft, with_screenshot: bool) -> String {
    let pnl = round_cents(trade.pnl);
    let sign = if pnl > 0.0 { "+" } else { "" };
    let notes = trade
        .notes
        .as_deref()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or("No notes provided.");

    format!(
        "Please analyze the following trade based on the provided data{}:\n\n\
         - Asset/Pair: {}\n\
         - Direction: {}\n\
         - Entry Price: {}\n\
         - Exit Price: {}\n\
         - P&L: {}{:.2}\n\
         - Date: {}\n\
         - Trader's Notes: {}\n",
        if with_screenshot { " and screenshot" } else { "" },
        trade.pair,
        trade.direction,
        trade.entry,
        trade.exit,
        sign,
        pnl,
        trade.date.format("%Y-%m-%d"),
        notes,
    )
}

/// Extract the analysis from a successful response body
pub fn parse_response(body: &str) -> Result<AiAnalysis, ApiError> {
    let response: GenerateContentResponse = serde_json::from_str(body)
        .map_err(|e| ApiError::ParseError(format!("Failed to parse response: {}", e)))?;

    let Some(candidate) = response.candidates.into_iter().next() else {
        let reason = response
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .unwrap_or_else(|| "no candidates returned".to_string());
        return Err(ApiError::ParseError(format!("Empty response: {}", reason)));
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    let text = text.trim();

    if text.is_empty() {
        return Err(ApiError::ParseError(format!(
            "Candidate has no text (finish reason: {})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        )));
    }

    serde_json::from_str(text).map_err(|e| {
        log::error!("Failed to parse analysis JSON: {}", text);
        ApiError::ParseError(format!("Received an invalid analysis format: {}", e))
    })
}

fn error_from_status(status: StatusCode, body: &str) -> ApiError {
    let envelope = serde_json::from_str::<ErrorEnvelope>(body).ok();
    let message = envelope
        .as_ref()
        .map(|e| e.error.message.clone())
        .unwrap_or_else(|| body.chars().take(200).collect());

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::AuthenticationError(message),
        StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimitError(message),
        _ => ApiError::ServiceError {
            code: envelope
                .and_then(|e| e.error.status.or_else(|| e.error.code.map(|c| c.to_string())))
                .unwrap_or_else(|| status.as_u16().to_string()),
            message,
        },
    }
}

#[async_trait]
impl TradeAnalyzer for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn analyze(
        &self,
        trade: &TradeDraft,
        screenshot: Option<&Screenshot>,
    ) -> Result<AiAnalysis, ApiError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ApiError::InvalidCredentials("API key not set".to_string()))?;

        let headers = self.build_headers(api_key)?;
        let request = self.build_request(trade, screenshot);

        self.rate_limiter.acquire().await;

        log::debug!(
            "Requesting analysis for {} from {} (screenshot: {} bytes)",
            trade.pair,
            self.config.model,
            screenshot.map(Screenshot::size).unwrap_or(0)
        );

        let response = self
            .http_client
            .post(self.endpoint())
            .headers(headers)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ApiError::TimeoutError(format!("No response within {:?}", self.config.timeout))
                } else {
                    ApiError::HttpError(e)
                }
            })?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(error_from_status(status, &body));
        }

        let analysis = parse_response(&body)?;
        log::info!(
            "Analysis received for {}: rated {}/10",
            trade.pair,
            analysis.overall_rating
        );
        Ok(analysis)
    }

    fn rate_limit(&self) -> RateLimitConfig {
        Self::quota()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TradeDirection;
    use chrono::NaiveDate;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn draft() -> TradeDraft {
        TradeDraft {
            pair: "EUR/USD".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(),
            direction: TradeDirection::Long,
            entry: 1.0850,
            exit: 1.0900,
            pnl: 50.0,
            notes: None,
            screenshot: None,
        }
    }

    fn config(base_url: &str, api_key: Option<&str>) -> GeminiConfig {
        GeminiConfig {
            api_key: api_key.map(str::to_string),
            model: "gemini-2.5-flash".to_string(),
            temperature: 0.7,
            base_url: base_url.to_string(),
            timeout: Duration::from_secs(5),
        }
    }

    const ANALYSIS_JSON: &str = r#"{"strengths":["Waited for confirmation"],"weaknesses":["Late exit"],"potentialImprovements":["Trail the stop"],"overallRating":7,"summary":"Good patience, sloppy exit."}"#;

    fn success_body() -> String {
        serde_json::json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": ANALYSIS_JSON }] },
                "finishReason": "STOP"
            }]
        })
        .to_string()
    }

    /// Serve exactly one canned HTTP response and hand back the raw request
    async fn serve_once(status_line: &'static str, body: String) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];

            // Read headers, then the body announced by Content-Length
            let header_end = loop {
                let n = socket.read(&mut buf).await.unwrap();
                assert!(n > 0, "client closed before sending headers");
                request.extend_from_slice(&buf[..n]);
                if let Some(pos) = request.windows(4).position(|w| w == b"\r\n\r\n") {
                    break pos + 4;
                }
            };
            let headers = String::from_utf8_lossy(&request[..header_end]).to_lowercase();
            let content_length = headers
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .map(|v| v.trim().parse::<usize>().unwrap())
                .unwrap_or(0);
            while request.len() < header_end + content_length {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }

            let response = format!(
                "{}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();

            String::from_utf8_lossy(&request).to_string()
        });

        (format!("http://{}", addr), handle)
    }

    #[test]
    fn test_prompt_contents() {
        let prompt = build_prompt(&draft(), false);

        assert!(prompt.starts_with("Please analyze the following trade based on the provided data:"));
        assert!(prompt.contains("- Asset/Pair: EUR/USD"));
        assert!(prompt.contains("- Direction: Long"));
        assert!(prompt.contains("- P&L: +50.00"));
        assert!(prompt.contains("- Date: 2025-03-14"));
        assert!(prompt.contains("- Trader's Notes: No notes provided."));
    }

    #[test]
    fn test_prompt_losing_trade_with_screenshot() {
        let mut trade = draft();
        trade.pnl = -12.345;
        trade.notes = Some("Moved my stop".to_string());

        let prompt = build_prompt(&trade, true);
        assert!(prompt.contains("provided data and screenshot:"));
        assert!(prompt.contains("- P&L: -12.35"));
        assert!(!prompt.contains("+-"));
        assert!(prompt.contains("- Trader's Notes: Moved my stop"));
    }

    #[test]
    fn test_prompt_breakeven_has_no_sign() {
        let mut trade = draft();
        trade.pnl = -0.001;

        let prompt = build_prompt(&trade, false);
        assert!(prompt.contains("- P&L: 0.00\n"));
    }

    #[test]
    fn test_request_shape() {
        let client = GeminiClient::new(config(DEFAULT_BASE_URL, Some("k"))).unwrap();
        let image = Screenshot {
            mime_type: "image/png".to_string(),
            data: "iVBORw==".to_string(),
        };

        let request = client.build_request(&draft(), Some(&image));
        let value = serde_json::to_value(&request).unwrap();

        assert!(value["systemInstruction"]["parts"][0]["text"]
            .as_str()
            .unwrap()
            .starts_with("You are a world-class trading coach"));

        // Image goes before the prompt text
        let parts = value["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/png");
        assert_eq!(parts[0]["inlineData"]["data"], "iVBORw==");
        assert!(parts[1]["text"].as_str().unwrap().contains("and screenshot"));

        let config = &value["generationConfig"];
        assert_eq!(config["responseMimeType"], "application/json");
        assert_eq!(config["temperature"], 0.7);
        assert_eq!(config["responseSchema"]["required"].as_array().unwrap().len(), 5);
    }

    #[test]
    fn test_endpoint() {
        let client = GeminiClient::new(config("http://localhost:9999/", Some("k"))).unwrap();
        assert_eq!(
            client.endpoint(),
            "http://localhost:9999/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn test_parse_response() {
        let analysis = parse_response(&success_body()).unwrap();

        assert_eq!(analysis.strengths, vec!["Waited for confirmation".to_string()]);
        assert_eq!(analysis.potential_improvements, vec!["Trail the stop".to_string()]);
        assert_eq!(analysis.overall_rating, 7.0);
        assert_eq!(analysis.summary, "Good patience, sloppy exit.");
    }

    #[test]
    fn test_parse_rejects_non_json_text() {
        let body = serde_json::json!({
            "candidates": [{ "content": { "parts": [{ "text": "Great trade, 8/10!" }] } }]
        })
        .to_string();

        assert!(matches!(parse_response(&body), Err(ApiError::ParseError(_))));
    }

    #[test]
    fn test_parse_rejects_schema_mismatch() {
        let body = serde_json::json!({
            "candidates": [{ "content": { "parts": [{ "text": "{\"strengths\": [], \"summary\": \"x\"}" }] } }]
        })
        .to_string();

        assert!(matches!(parse_response(&body), Err(ApiError::ParseError(_))));
    }

    #[test]
    fn test_parse_blocked_prompt() {
        let body = r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#;
        match parse_response(body) {
            Err(ApiError::ParseError(msg)) => assert!(msg.contains("SAFETY")),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_before_network() {
        // Nothing listens on this port; a request would fail differently
        let client = GeminiClient::new(config("http://127.0.0.1:9", None)).unwrap();
        let err = client.analyze(&draft(), None).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidCredentials(_)));
    }

    #[tokio::test]
    async fn test_analyze_round_trip() {
        let (base_url, server) = serve_once("HTTP/1.1 200 OK", success_body()).await;
        let client = GeminiClient::new(config(&base_url, Some("test-key"))).unwrap();

        let analysis = client.analyze(&draft(), None).await.unwrap();
        assert_eq!(analysis.overall_rating, 7.0);

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /v1beta/models/gemini-2.5-flash:generateContent"));
        assert!(request.to_lowercase().contains("x-goog-api-key: test-key"));
        assert!(request.contains("Asset/Pair: EUR/USD"));
    }

    #[test]
    fn test_error_code_used_without_status() {
        let body = r#"{"error": {"code": 503, "message": "The model is overloaded."}}"#;
        match error_from_status(StatusCode::SERVICE_UNAVAILABLE, body) {
            ApiError::ServiceError { code, message } => {
                assert_eq!(code, "503");
                assert_eq!(message, "The model is overloaded.");
            }
            other => panic!("unexpected: {:?}", other),
        }

        match error_from_status(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>") {
            ApiError::ServiceError { code, .. } => assert_eq!(code, "502"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rate_limited_status() {
        let body = r#"{"error": {"code": 429, "message": "Resource has been exhausted", "status": "RESOURCE_EXHAUSTED"}}"#;
        let (base_url, _server) = serve_once("HTTP/1.1 429 Too Many Requests", body.to_string()).await;
        let client = GeminiClient::new(config(&base_url, Some("test-key"))).unwrap();

        let err = client.analyze(&draft(), None).await.unwrap_err();
        assert!(matches!(err, ApiError::RateLimitError(ref m) if m.contains("exhausted")));
    }

    #[tokio::test]
    async fn test_invalid_key_status() {
        let body = r#"{"error": {"code": 400, "message": "API key not valid. Please pass a valid API key.", "status": "INVALID_ARGUMENT"}}"#;
        let (base_url, _server) = serve_once("HTTP/1.1 400 Bad Request", body.to_string()).await;
        let client = GeminiClient::new(config(&base_url, Some("bad-key"))).unwrap();

        match client.analyze(&draft(), None).await {
            Err(ApiError::ServiceError { code, message }) => {
                assert_eq!(code, "INVALID_ARGUMENT");
                assert!(message.starts_with("API key not valid"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }
}
