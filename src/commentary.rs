//! Optional referee commentary from a Gemini-compatible text service.
//!
//! Failures never reach the caller: they are logged and the phase-keyed
//! instruction is used instead.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::game::{phase_instruction, GamePhase, Team, Trilingual};
use crate::log::warn_line;

const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const DEFAULT_MODEL: &str = "gemini-2.5-flash";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CommentaryConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub endpoint: String,
    pub model: String,
}

impl Default for CommentaryConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

impl CommentaryConfig {
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        let key = api_key.into();
        self.api_key = if key.trim().is_empty() { None } else { Some(key) };
        self
    }

    fn url(&self, api_key: &str) -> String {
        format!(
            "{}/{}:generateContent?key={api_key}",
            self.endpoint.trim_end_matches('/'),
            self.model
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum CommentaryError {
    MissingApiKey,
    Request { message: String },
    Status { code: u16 },
    EmptyResponse,
    Malformed { message: String },
}

impl fmt::Display for CommentaryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommentaryError::MissingApiKey => f.write_str("no API key configured"),
            CommentaryError::Request { message } => write!(f, "request failed: {message}"),
            CommentaryError::Status { code } => write!(f, "service answered HTTP {code}"),
            CommentaryError::EmptyResponse => f.write_str("service returned no text"),
            CommentaryError::Malformed { message } => write!(f, "unreadable reply: {message}"),
        }
    }
}

impl std::error::Error for CommentaryError {}

/// Teams ranked by meter magnitude, e.g. `Zinc: 2.34V, Copper: 0.14V`.
pub fn status_summary(teams: &[Team]) -> String {
    let mut ranked: Vec<&Team> = teams.iter().collect();
    ranked.sort_by(|a, b| b.total_voltage.abs().total_cmp(&a.total_voltage.abs()));
    ranked
        .iter()
        .map(|team| format!("{}: {:.2}V", team.name, team.total_voltage.abs()))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn build_prompt(teams: &[Team], last_action: &str) -> String {
    format!(
        "You are the \"Voltage Wars\" Game Instructor.\n\
         \n\
         Context:\n\
         - Current Leaderboard (Magnitude): {}\n\
         - Recent Event/Phase: {last_action}\n\
         \n\
         Task:\n\
         - Give one short, clear instruction telling the players what to do NEXT.\n\
         - Stay neutral and stick to the rules; no play-by-play drama.\n\
         - Example: \"Team A, please draw your components.\"\n\
         \n\
         Reply with JSON only, using the keys 'zh', 'en' and 'ja'.",
        status_summary(teams)
    )
}

pub fn request_body(prompt: &str) -> Value {
    json!({
        "contents": [{ "parts": [{ "text": prompt }] }],
        "generationConfig": { "responseMimeType": "application/json" },
    })
}

#[derive(Deserialize)]
struct Reply {
    en: String,
    #[serde(default)]
    zh: Option<String>,
    #[serde(default)]
    ja: Option<String>,
}

/// Reads `candidates[0].content.parts[0].text` and parses it as `{zh, en, ja}`.
/// Only `en` is required; the other languages fall back to it.
pub fn parse_response(body: &str) -> Result<Trilingual, CommentaryError> {
    let envelope: Value = serde_json::from_str(body).map_err(|error| CommentaryError::Malformed {
        message: error.to_string(),
    })?;
    let text = envelope
        .pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
        .filter(|text| !text.trim().is_empty())
        .ok_or(CommentaryError::EmptyResponse)?;
    let reply: Reply = serde_json::from_str(text).map_err(|error| CommentaryError::Malformed {
        message: error.to_string(),
    })?;

    let Reply { en, zh, ja } = reply;
    let or_english = |text: Option<String>| {
        text.filter(|text| !text.is_empty())
            .unwrap_or_else(|| en.clone())
    };
    Ok(Trilingual {
        zh: or_english(zh),
        ja: or_english(ja),
        en,
    })
}

pub fn resolve_or_fallback(
    outcome: Result<Trilingual, CommentaryError>,
    phase: GamePhase,
    active_team: Option<&str>,
) -> Trilingual {
    outcome.unwrap_or_else(|error| {
        warn_line(&format!("[voltage-duel] commentary unavailable: {error}"));
        phase_instruction(phase, active_team)
    })
}

#[cfg(target_arch = "wasm32")]
async fn fetch_text(url: &str, body: &str) -> Result<String, CommentaryError> {
    use wasm_bindgen::{JsCast, JsValue};
    use wasm_bindgen_futures::JsFuture;
    use web_sys::{Request, RequestInit, RequestMode, Response};

    let request_error = |error: JsValue| CommentaryError::Request {
        message: error
            .as_string()
            .unwrap_or_else(|| format!("{error:?}")),
    };

    let init = RequestInit::new();
    init.set_method("POST");
    init.set_mode(RequestMode::Cors);
    init.set_body(&JsValue::from_str(body));

    let request = Request::new_with_str_and_init(url, &init).map_err(request_error)?;
    request
        .headers()
        .set("Content-Type", "application/json")
        .map_err(request_error)?;

    let window = web_sys::window().ok_or_else(|| CommentaryError::Request {
        message: "no window object".to_string(),
    })?;
    let response = JsFuture::from(window.fetch_with_request(&request))
        .await
        .map_err(request_error)?;
    let response: Response = response.dyn_into().map_err(request_error)?;
    if !response.ok() {
        return Err(CommentaryError::Status {
            code: response.status(),
        });
    }
    let text = JsFuture::from(response.text().map_err(request_error)?)
        .await
        .map_err(request_error)?;
    text.as_string().ok_or(CommentaryError::EmptyResponse)
}

#[cfg(not(target_arch = "wasm32"))]
async fn fetch_text(_url: &str, _body: &str) -> Result<String, CommentaryError> {
    Err(CommentaryError::Request {
        message: "network commentary needs a browser".to_string(),
    })
}

async fn request_commentary(
    config: &CommentaryConfig,
    teams: &[Team],
    last_action: &str,
) -> Result<Trilingual, CommentaryError> {
    let api_key = config
        .api_key
        .as_deref()
        .ok_or(CommentaryError::MissingApiKey)?;
    let body = request_body(&build_prompt(teams, last_action)).to_string();
    let text = fetch_text(&config.url(api_key), &body).await?;
    parse_response(&text)
}

/// Asks the service for the next instruction. Always yields something to show.
pub async fn generate_commentary(
    config: &CommentaryConfig,
    teams: &[Team],
    last_action: &str,
    phase: GamePhase,
    active_team: Option<&str>,
) -> Trilingual {
    let outcome = request_commentary(config, teams, last_action).await;
    resolve_or_fallback(outcome, phase, active_team)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Side;

    fn team(side: Side, name: &str, voltage: f64) -> Team {
        let mut team = Team::new(side, name);
        team.total_voltage = voltage;
        team
    }

    fn envelope(text: &str) -> String {
        json!({ "candidates": [{ "content": { "parts": [{ "text": text }] } }] }).to_string()
    }

    #[test]
    fn summary_ranks_by_magnitude() {
        let teams = [team(Side::A, "Zinc", 0.5), team(Side::B, "Copper", -2.34)];
        assert_eq!(status_summary(&teams), "Copper: 2.34V, Zinc: 0.50V");
    }

    #[test]
    fn prompt_carries_leaderboard_and_action() {
        let teams = [team(Side::A, "Zinc", 1.1), team(Side::B, "Copper", 0.0)];
        let prompt = build_prompt(&teams, "B_ACTION_1");
        assert!(prompt.contains("Zinc: 1.10V, Copper: 0.00V"));
        assert!(prompt.contains("Recent Event/Phase: B_ACTION_1"));
        let body = request_body(&prompt);
        assert_eq!(
            body["generationConfig"]["responseMimeType"],
            "application/json"
        );
    }

    #[test]
    fn missing_languages_fall_back_to_english() {
        let body = envelope(r#"{"en": "Team A, draw now.", "zh": ""}"#);
        let text = parse_response(&body).expect("english is present");
        assert_eq!(text.zh, "Team A, draw now.");
        assert_eq!(text.ja, "Team A, draw now.");
    }

    #[test]
    fn unreadable_replies_are_errors() {
        assert_eq!(
            parse_response(r#"{"candidates": []}"#),
            Err(CommentaryError::EmptyResponse)
        );
        assert!(matches!(
            parse_response(&envelope("not json")),
            Err(CommentaryError::Malformed { .. })
        ));
        assert!(matches!(
            parse_response(&envelope(r#"{"zh": "只有中文"}"#)),
            Err(CommentaryError::Malformed { .. })
        ));
    }

    #[test]
    fn failures_use_the_phase_instruction() {
        let text = resolve_or_fallback(
            Err(CommentaryError::MissingApiKey),
            GamePhase::AWiring,
            Some("Zinc"),
        );
        assert_eq!(text, phase_instruction(GamePhase::AWiring, Some("Zinc")));
    }

    #[test]
    fn blank_key_counts_as_missing() {
        let config = CommentaryConfig::default().with_api_key("  ");
        assert!(config.api_key.is_none());
        let config = CommentaryConfig::default().with_api_key("abc");
        assert_eq!(
            config.url("abc"),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent?key=abc"
        );
    }
}
