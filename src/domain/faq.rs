use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Faq {
    pub id: Uuid,
    pub question: String,
    pub answer: String,
    pub category: Option<String>,
    /// Display order, ascending
    pub position: i32,
    pub published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FaqInput {
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub position: i32,
    #[serde(default = "default_published")]
    pub published: bool,
}

fn default_published() -> bool {
    true
}

impl Faq {
    pub fn new(input: FaqInput) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            question: input.question.trim().to_string(),
            answer: input.answer.trim().to_string(),
            category: input.category,
            position: input.position,
            published: input.published,
            created_at: now,
            updated_at: now,
        }
    }
}
