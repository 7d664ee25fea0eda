use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

pub const API_KEY_ENV: &str = "EXAMOCR_API_KEY";

pub trait RepairService {
    fn repair_json(&self, malformed: &str) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: String,
    pub max_tokens: u32,
}

pub struct LlmClient {
    config: LlmConfig,
    client: reqwest::blocking::Client,
}

impl LlmClient {
    pub fn new(base_url: &str, model: &str, max_tokens: u32) -> Result<Self> {
        let api_key = std::env::var(API_KEY_ENV).unwrap_or_default();
        if api_key.is_empty() {
            bail!("{API_KEY_ENV} environment variable not set");
        }

        Ok(Self {
            config: LlmConfig {
                base_url: base_url.trim_end_matches('/').to_string(),
                model: model.to_string(),
                api_key,
                max_tokens,
            },
            client: reqwest::blocking::Client::new(),
        })
    }

    pub fn parse_block(&self, block_text: &str, syllabus_context: &str) -> Result<String> {
        let system_prompt = build_parse_system_prompt(syllabus_context);
        let user_prompt = format!(
            "QUESTION BLOCK:\n----------------\n{}",
            block_text.trim()
        );

        self.chat(&system_prompt, &user_prompt)
    }

    fn chat(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        #[derive(Serialize)]
        struct ChatRequest {
            model: String,
            messages: Vec<Message>,
            temperature: f64,
            max_tokens: u32,
        }

        #[derive(Serialize)]
        struct Message {
            role: String,
            content: String,
        }

        #[derive(Deserialize)]
        struct ChatResponse {
            choices: Vec<Choice>,
        }

        #[derive(Deserialize)]
        struct Choice {
            message: ResponseMessage,
        }

        #[derive(Deserialize)]
        struct ResponseMessage {
            content: String,
        }

        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: system_prompt.to_string(),
                },
                Message {
                    role: "user".to_string(),
                    content: user_prompt.to_string(),
                },
            ],
            temperature: 0.0,
            max_tokens: self.config.max_tokens,
        };

        let url = format!("{}/chat/completions", self.config.base_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .with_context(|| format!("failed to call {url}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            bail!("chat completion request failed with {status}: {body}");
        }

        let chat_response: ChatResponse = response
            .json()
            .context("failed to parse chat completion response body")?;

        let content = chat_response
            .choices
            .first()
            .context("chat completion response contained no choices")?
            .message
            .content
            .clone();

        Ok(content.trim().to_string())
    }
}

impl RepairService for LlmClient {
    fn repair_json(&self, malformed: &str) -> Result<String> {
        let system_prompt = "You repair malformed JSON. The user message contains text that was \
                             supposed to be one strict JSON value but failed to parse. Reply with \
                             the corrected strict JSON only, with newlines inside string values \
                             escaped as \\n. Do not add commentary, markdown fences, or any other \
                             text.";

        self.chat(system_prompt, malformed)
    }
}

pub(crate) fn build_parse_system_prompt(syllabus_context: &str) -> String {
    format!(
        "You convert one multiple-choice exam question block, recovered from noisy OCR text, \
         into a single strict JSON object. Reply with the JSON object only. Use exactly these \
         fields:\n\
         {{\n  \
           \"question\": \"full question text, wording unchanged\",\n  \
           \"options\": {{\"A\": \"...\", \"B\": \"...\"}},\n  \
           \"subject\": \"subject from the syllabus below, or null\",\n  \
           \"topic\": \"topic from the syllabus below, or null\",\n  \
           \"sub_topic\": \"finer topic, or null\",\n  \
           \"keywords\": [\"3-6 short keywords\"],\n  \
           \"correct_answer\": null,\n  \
           \"is_multi_correct\": false\n\
         }}\n\n\
         Never reword, translate, or summarise the question or the options; only remove OCR \
         noise that is clearly not part of the wording. Escape newlines inside string values \
         as \\n.\n\n\
         SYLLABUS:\n{syllabus_context}"
    )
}
