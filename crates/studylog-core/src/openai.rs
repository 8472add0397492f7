//! OpenAI-compatible chat-completions advice generator

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use studylog_api::AdviceRequest;
use studylog_config::AdviceSettings;
use tracing::{debug, info};

use crate::{AdviceError, AdviceGenerator};

const SYSTEM_PROMPT: &str = "You are a study-efficiency coach. Analyze the data and give \
concrete, practical study advice. Always answer with valid JSON only.";

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Advice generator backed by a chat-completions endpoint
pub struct OpenAiAdviceGenerator {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiAdviceGenerator {
    pub fn new(settings: &AdviceSettings, api_key: String) -> Result<Self, AdviceError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| AdviceError::Network(e.to_string()))?;

        Ok(Self {
            client,
            api_key,
            endpoint: settings.endpoint.clone(),
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        })
    }

    /// Build from settings, reading the key from the configured variable
    pub fn from_settings(settings: &AdviceSettings) -> Result<Self, AdviceError> {
        let api_key = settings
            .api_key()
            .ok_or_else(|| AdviceError::MissingApiKey(settings.api_key_env.clone()))?;
        Self::new(settings, api_key)
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl AdviceGenerator for OpenAiAdviceGenerator {
    async fn generate(&self, request: &AdviceRequest) -> Result<String, AdviceError> {
        let payload = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: build_prompt(request),
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        info!(model = %self.model, "Requesting study advice");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AdviceError::Network(e.to_string()))?;

        let status = response.status();
        debug!(status = status.as_u16(), "Received advice response");

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AdviceError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| AdviceError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        extract_content(body)
    }
}

fn extract_content(body: ChatCompletionResponse) -> Result<String, AdviceError> {
    body.choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| AdviceError::InvalidResponse("Response contained no content".to_string()))
}

/// Render the user prompt for `request`
pub fn build_prompt(request: &AdviceRequest) -> String {
    let pattern = &request.study_pattern;
    let or_unknown = |v: &Option<String>| v.clone().unwrap_or_else(|| "unknown".to_string());
    let join_or_none = |v: &[String]| {
        if v.is_empty() {
            "none".to_string()
        } else {
            v.join(", ")
        }
    };

    let mut prompt = String::from("Analyze the following study data and give specific advice.\n\n");

    prompt.push_str("# Profile\n");
    prompt.push_str(&format!("- Grade: {}\n", or_unknown(&request.profile.grade)));
    prompt.push_str(&format!(
        "- Target school: {}\n\n",
        or_unknown(&request.profile.target_school)
    ));

    prompt.push_str("# Study pattern (last 30 days)\n");
    prompt.push_str(&format!(
        "- Average session: {} minutes\n",
        pattern.average_study_time
    ));
    prompt.push_str(&format!(
        "- Most productive time: {}\n",
        pattern.productive_time_label()
    ));
    prompt.push_str(&format!(
        "- Strong subjects: {}\n",
        join_or_none(&pattern.strong_subjects)
    ));
    prompt.push_str(&format!(
        "- Weak subjects: {}\n",
        join_or_none(&pattern.weak_subjects)
    ));
    prompt.push_str(&format!(
        "- Study frequency: {} days/week\n",
        pattern.study_frequency
    ));
    prompt.push_str(&format!("- Recent trend: {}\n\n", pattern.recent_trend));

    prompt.push_str("# Goals\n");
    if request.goals.is_empty() {
        prompt.push_str("No goals set\n");
    }
    for goal in &request.goals {
        let subject = goal
            .subject_id
            .as_ref()
            .map_or_else(|| "all subjects".to_string(), |id| id.to_string());
        prompt.push_str(&format!(
            "- {}: {} minutes ({})\n",
            goal.goal_type, goal.target_minutes, subject
        ));
    }

    prompt.push_str("\n# Recent sessions\n");
    if request.recent_sessions.is_empty() {
        prompt.push_str("No sessions recorded\n");
    }
    for s in &request.recent_sessions {
        let duration = s
            .duration
            .map_or_else(|| "?".to_string(), |d| d.to_string());
        prompt.push_str(&format!(
            "{} ({}): {} - {} minutes\n",
            s.date, s.day_of_week, s.subject, duration
        ));
    }

    prompt.push_str(
        r#"
Reply with JSON in exactly this shape:

{
  "todaysPlan": [{"subject": "subject name", "duration": minutes, "reason": "why"}],
  "weeklyGoalProgress": {"onTrack": true/false, "message": "progress summary", "adjustmentNeeded": minutes},
  "efficiencyTips": ["tip 1", "tip 2", "tip 3"],
  "motivationalMessage": "message for today",
  "longTermPrediction": {"goalAchievable": true/false, "estimatedDate": "YYYY-MM-DD" or null, "recommendedPace": minutes per day}
}
"#,
    );

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use studylog_api::{GoalSummary, GoalType, Profile, RecentSession, StudyPattern, Trend};

    fn request() -> AdviceRequest {
        AdviceRequest {
            profile: Profile {
                grade: Some("11".into()),
                target_school: None,
            },
            study_pattern: StudyPattern {
                average_study_time: 45,
                most_productive_hour: Some(20),
                strong_subjects: vec!["Math".into(), "English".into()],
                weak_subjects: vec![],
                study_frequency: 5,
                recent_trend: Trend::Stable,
            },
            goals: vec![GoalSummary {
                goal_type: GoalType::Weekly,
                target_minutes: 300,
                subject_id: Some("math".into()),
            }],
            recent_sessions: vec![RecentSession {
                date: NaiveDate::from_ymd_opt(2025, 6, 30).unwrap(),
                subject: "Math".into(),
                duration: Some(45),
                day_of_week: "Monday".into(),
            }],
        }
    }

    #[test]
    fn test_prompt_includes_context() {
        let prompt = build_prompt(&request());

        assert!(prompt.contains("- Grade: 11"));
        assert!(prompt.contains("- Target school: unknown"));
        assert!(prompt.contains("around 20:00"));
        assert!(prompt.contains("Strong subjects: Math, English"));
        assert!(prompt.contains("Weak subjects: none"));
        assert!(prompt.contains("- weekly: 300 minutes (math)"));
        assert!(prompt.contains("2025-06-30 (Monday): Math - 45 minutes"));
        assert!(prompt.contains("\"longTermPrediction\""));
    }

    #[test]
    fn test_extract_first_choice() {
        let body: ChatCompletionResponse = serde_json::from_str(
            r#"{"choices": [{"message": {"role": "assistant", "content": "{}"}}, {"message": {"role": "assistant", "content": "x"}}]}"#,
        )
        .unwrap();
        assert_eq!(extract_content(body).unwrap(), "{}");

        let empty: ChatCompletionResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(matches!(
            extract_content(empty),
            Err(AdviceError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_missing_api_key() {
        let settings = AdviceSettings {
            api_key_env: "STUDYLOG_TEST_UNSET_ADVICE_KEY".into(),
            ..AdviceSettings::default()
        };

        let result = OpenAiAdviceGenerator::from_settings(&settings);
        assert!(matches!(result, Err(AdviceError::MissingApiKey(var)) if var == "STUDYLOG_TEST_UNSET_ADVICE_KEY"));
    }

    #[test]
    fn test_new_uses_settings() {
        let generator = OpenAiAdviceGenerator::new(&AdviceSettings::default(), "sk-test".into()).unwrap();
        assert_eq!(generator.model(), "gpt-4o-mini");
        assert_eq!(generator.endpoint, studylog_config::DEFAULT_ADVICE_ENDPOINT);
    }
}
