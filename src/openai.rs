//! Minimal OpenAI client for our use-cases.
//!
//! We only call chat.completions: strict-JSON case generation, patient
//! roleplay, hints, and the examiner scoring call. Calls are instrumented and
//! log model names, latencies, and response sizes (not contents).
//!
//! NOTE: We never log the API key and we keep payload truncations short to
//! avoid leaking simulated-patient details into logs.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::config::Prompts;
use crate::domain::{CaseFile, Speaker, Turn};
use crate::util::fill_template;

#[derive(Clone)]
pub struct OpenAI {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  /// Higher-temperature roleplay model.
  pub patient_model: String,
  /// Low-temperature model for case generation and scoring.
  pub examiner_model: String,
}

impl OpenAI {
  /// Construct the client if we find OPENAI_API_KEY; otherwise return None.
  pub fn from_env() -> Option<Self> {
    let api_key = std::env::var("OPENAI_API_KEY").ok()?;
    let base_url =
      std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
    let patient_model =
      std::env::var("OPENAI_PATIENT_MODEL").unwrap_or_else(|_| "gpt-4.1".into());
    let examiner_model =
      std::env::var("OPENAI_EXAMINER_MODEL").unwrap_or_else(|_| "gpt-4o".into());

    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .ok()?;

    Some(Self { client, api_key, base_url, patient_model, examiner_model })
  }

  /// Single chat-completions round trip; returns the raw message text.
  #[instrument(level = "info", skip(self, messages), fields(model = %model, n_messages = messages.len()))]
  async fn chat(
    &self,
    model: &str,
    messages: Vec<ChatMessageReq>,
    temperature: f32,
    max_tokens: Option<u32>,
    json_object: bool,
  ) -> Result<String, String> {
    let url = format!("{}/chat/completions", self.base_url);
    let req = ChatCompletionRequest {
      model: model.to_string(),
      messages,
      temperature,
      response_format: json_object.then(|| ResponseFormat { r#type: "json_object".into() }),
      max_tokens,
    };

    let res = self.client.post(&url)
      .header(USER_AGENT, "osce-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await.map_err(|e| e.to_string())?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let msg = extract_openai_error(&body).unwrap_or_else(|| body);
      return Err(format!("OpenAI HTTP {}: {}", status, msg));
    }

    let body: ChatCompletionResponse = res.json().await.map_err(|e| e.to_string())?;
    if let Some(usage) = &body.usage {
      info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "OpenAI usage");
    }
    let text = body.choices.get(0)
      .and_then(|c| c.message.content.clone())
      .unwrap_or_default().trim().to_string();

    Ok(text)
  }

  /// Plain system+user completion. Used for hints and examiner scoring.
  async fn chat_plain(
    &self,
    model: &str,
    system: &str,
    user: &str,
    temperature: f32,
    max_tokens: Option<u32>,
  ) -> Result<String, String> {
    let messages = vec![
      ChatMessageReq { role: "system".into(), content: system.into() },
      ChatMessageReq { role: "user".into(), content: user.into() },
    ];
    self.chat(model, messages, temperature, max_tokens, false).await
  }

  /// JSON-object completion. Generic over the target type T.
  async fn chat_json<T: for<'a> Deserialize<'a>>(
    &self,
    model: &str,
    system: &str,
    user: &str,
    temperature: f32,
  ) -> Result<T, String> {
    let messages = vec![
      ChatMessageReq { role: "system".into(), content: system.into() },
      ChatMessageReq { role: "user".into(), content: user.into() },
    ];
    let text = self.chat(model, messages, temperature, None, true).await?;
    serde_json::from_str::<T>(&text).map_err(|e| format!("JSON parse error: {}", e))
  }

  // --- High-level helpers (domain-specialized) ---

  /// Generate a new OSCE station case file for a chief complaint.
  #[instrument(level = "info", skip(self, prompts), fields(%lang, %chief, model = %self.examiner_model))]
  pub async fn generate_case(
    &self,
    prompts: &Prompts,
    lang: &str,
    chief: &str,
  ) -> Result<CaseFile, String> {
    let system = fill_template(&prompts.case_system_template, &[("lang", lang)]);
    let user = fill_template(&prompts.case_user_template, &[("chief", chief)]);
    let start = std::time::Instant::now();
    let result = self.chat_json::<CaseFile>(&self.examiner_model, &system, &user, 0.8).await;
    let elapsed = start.elapsed();

    match &result {
      Ok(case) => {
        info!(
          ?elapsed,
          chief_complaint = %case.chief_complaint,
          n_findings = case.physical_findings.len(),
          "Case generated"
        );
      }
      Err(e) => {
        error!(?elapsed, error = %e, "Model call failed during case generation");
      }
    }

    let case = result?;
    if case.answer_key.main_diagnosis.trim().is_empty() {
      return Err("generated case is missing answer_key.main_diagnosis".into());
    }
    Ok(case)
  }

  /// Patient roleplay reply; prior conversation is threaded through so the
  /// simulated patient stays consistent.
  #[instrument(level = "info", skip(self, prompts, case, history, user_message),
               fields(history_len = history.len(), msg_len = user_message.len(), model = %self.patient_model))]
  pub async fn patient_reply(
    &self,
    prompts: &Prompts,
    case: &CaseFile,
    history: &[Turn],
    user_message: &str,
  ) -> Result<String, String> {
    let system = fill_template(
      &prompts.patient_system_template,
      &[
        ("name", case.patient_info.name.as_str()),
        ("age", case.patient_info.age.as_str()),
        ("gender", case.patient_info.gender.as_str()),
        ("chief", case.chief_complaint.as_str()),
        ("history", &case.history_details.to_string()),
        ("pmh", &case.past_medical_history.join(", ")),
        ("meds", &case.medications.join(", ")),
      ],
    );

    let mut messages = vec![ChatMessageReq { role: "system".into(), content: system }];
    for turn in history {
      let role = match turn.speaker {
        Speaker::Student => "user",
        Speaker::Patient => "assistant",
      };
      messages.push(ChatMessageReq { role: role.into(), content: turn.text.clone() });
    }
    messages.push(ChatMessageReq { role: "user".into(), content: user_message.into() });

    // Higher temperature for realistic, variable patient responses.
    self.chat(&self.patient_model, messages, 0.7, Some(150), false).await
  }

  /// One short coaching hint based on the transcript so far.
  #[instrument(level = "info", skip(self, prompts, transcript), fields(%lang, transcript_len = transcript.len()))]
  pub async fn hint(&self, prompts: &Prompts, lang: &str, transcript: &str) -> Result<String, String> {
    let system = fill_template(&prompts.hint_system_template, &[("lang", lang)]);
    self.chat_plain(&self.examiner_model, &system, transcript, 0.3, Some(600)).await
  }

  /// Examiner scoring call. Returns the raw response text; the evaluation
  /// engine owns parsing/repair, so no JSON handling happens here.
  #[instrument(level = "info", skip(self, prompts, user_prompt), fields(%lang, prompt_len = user_prompt.len(), model = %self.examiner_model))]
  pub async fn examiner_score(
    &self,
    prompts: &Prompts,
    lang: &str,
    user_prompt: &str,
  ) -> Result<String, String> {
    let system = fill_template(&prompts.examiner_system_template, &[("lang", lang)]);
    // Low temperature: this is a scoring task, not a creative one.
    self.chat_plain(&self.examiner_model, &system, user_prompt, 0.1, Some(1000)).await
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_format: Option<ResponseFormat>,
  #[serde(skip_serializing_if = "Option::is_none")]
  max_tokens: Option<u32>,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }
#[derive(Serialize)]
struct ResponseFormat { #[serde(rename = "type")] r#type: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  match serde_json::from_str::<EWrap>(body) {
    Ok(w) => Some(w.error.message),
    Err(_) => None,
  }
}
