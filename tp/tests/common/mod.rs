//! Shared fakes for the integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tripplanner::config::Config;
use tripplanner::llm::{CompletionRequest, CompletionResponse, LlmClient, LlmError};
use tripplanner::planner::Collaborators;
use tripplanner::prompts::PromptLoader;
use tripplanner::providers::{
    Geocoder, KnowledgeBase, KnowledgeRecord, MemorySink, NullPlaces, ProviderError,
};

pub const TWO_DAYS: &str = r#"```json
{"days": [
  {"dayNumber": 2, "theme": "Riverside", "activities": [
    {"name": "Hotel Ribeira", "type": "accommodation", "startTime": "08:00", "durationMinutes": 60, "estimatedCost": 90},
    {"name": "Port Cellars", "type": "activity", "startTime": "09:30", "durationMinutes": 120, "estimatedCost": "$25"},
    {"name": "Francesinha Lunch", "type": "dining", "startTime": "12:00", "durationMinutes": 60, "estimatedCost": 18},
    {"name": "Douro Cruise", "type": "activity", "startTime": "14:00", "durationMinutes": 90, "estimatedCost": 15}
  ]},
  {"dayNumber": 1, "theme": "Old Town", "activities": [
    {"name": "Hotel Ribeira", "type": "accommodation", "startTime": "08:00", "durationMinutes": 60, "estimatedCost": 90},
    {"name": "Livraria Lello", "type": "activity", "startTime": "09:30", "durationMinutes": 60, "estimatedCost": 10},
    {"name": "Bolhao Market", "type": "dining", "startTime": "11:00", "durationMinutes": 60, "estimatedCost": 20},
    {"name": "Clerigos Tower", "type": "activity", "startTime": "13:00", "durationMinutes": 90, "estimatedCost": 8}
  ]}
]}
```"#;

/// Reasoning client answering by prompt kind
///
/// Reasoning-loop prompts are answered from a script, then from `react_default`.
pub struct FakeLlm {
    react: Mutex<VecDeque<String>>,
    react_default: String,
    pub itinerary: String,
    pub critique: String,
    pub candidates: String,
    pub rank: String,
    pub reasons: String,
    prompts: Mutex<Vec<String>>,
}

impl FakeLlm {
    pub fn new() -> Self {
        Self {
            react: Mutex::new(VecDeque::new()),
            react_default: "Thought: nothing new\nAction: FINISH".to_string(),
            itinerary: TWO_DAYS.to_string(),
            critique: "PASS - balanced and realistic".to_string(),
            candidates: "[]".to_string(),
            rank: "[]".to_string(),
            reasons: "[]".to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_react<I: IntoIterator<Item = &'static str>>(mut self, replies: I, default: &str) -> Self {
        self.react = Mutex::new(replies.into_iter().map(String::from).collect());
        self.react_default = default.to_string();
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn prompts_starting_with(&self, prefix: &str) -> Vec<String> {
        self.prompts().into_iter().filter(|p| p.starts_with(prefix)).collect()
    }
}

#[async_trait]
impl LlmClient for FakeLlm {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let prompt = request.messages.last().map(|m| m.content.clone()).unwrap_or_default();
        self.prompts.lock().unwrap().push(prompt.clone());

        let reply = if prompt.starts_with("You are a travel planning agent") {
            self.react
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| self.react_default.clone())
        } else if prompt.starts_with("You are a travel expert reviewing") {
            self.critique.clone()
        } else if prompt.contains("-day travel itinerary") {
            self.itinerary.clone()
        } else if prompt.starts_with("Generate 10 diverse") {
            self.candidates.clone()
        } else if prompt.starts_with("Rank these") {
            self.rank.clone()
        } else if prompt.starts_with("Explain in one or two") {
            self.reasons.clone()
        } else {
            return Err(LlmError::InvalidResponse(format!("unexpected prompt: {}", prompt)));
        };
        Ok(CompletionResponse::text(reply))
    }

    fn model(&self) -> &str {
        "fake"
    }
}

/// Fixed attraction records for any query
pub struct FakeKnowledge;

#[async_trait]
impl KnowledgeBase for FakeKnowledge {
    async fn search(&self, _query: &str, max_results: usize) -> Result<Vec<KnowledgeRecord>, ProviderError> {
        let records = [
            ("Livraria Lello", "bookshop", "$10"),
            ("Clerigos Tower", "landmark", "8 EUR"),
            ("Port Cellars", "tasting", "$25"),
            ("Crystal Palace Gardens", "park", "free"),
        ];
        Ok(records
            .iter()
            .take(max_results)
            .map(|(name, category, price)| KnowledgeRecord {
                name: name.to_string(),
                category: category.to_string(),
                price: price.to_string(),
                description: format!("{} in Porto", name),
                score: 0.9,
                source: "fake".to_string(),
            })
            .collect())
    }
}

/// Every location resolves to the same point
pub struct FakeGeocoder;

#[async_trait]
impl Geocoder for FakeGeocoder {
    async fn geocode(&self, _location: &str) -> Result<Option<(f64, f64)>, ProviderError> {
        Ok(Some((41.1456, -8.6110)))
    }
}

pub fn collaborators(llm: Arc<FakeLlm>, sink: Arc<MemorySink>) -> Collaborators {
    Collaborators {
        llm,
        knowledge: Arc::new(FakeKnowledge),
        geocoder: Arc::new(FakeGeocoder),
        places: Arc::new(NullPlaces),
        sink,
        prompts: Arc::new(PromptLoader::embedded_only()),
    }
}

pub fn config(plans_dir: &Path) -> Config {
    let mut config = Config::default();
    config.storage.plans_dir = Some(plans_dir.to_path_buf());
    config
}
