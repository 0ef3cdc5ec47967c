use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Help-center question and answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaqItem {
    pub id: Uuid,
    pub question: String,
    pub answer: String,
    pub category: String,
    pub order: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl FaqItem {
    pub fn new(question: String, answer: String, category: String, order: i32, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            question,
            answer,
            category,
            order,
            is_active: true,
            created_at: now,
        }
    }

    pub fn apply(&mut self, update: &FaqUpdate) {
        if let Some(question) = &update.question {
            self.question = question.clone();
        }
        if let Some(answer) = &update.answer {
            self.answer = answer.clone();
        }
        if let Some(category) = &update.category {
            self.category = category.clone();
        }
        if let Some(order) = update.order {
            self.order = order;
        }
        if let Some(is_active) = update.is_active {
            self.is_active = is_active;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FaqUpdate {
    pub question: Option<String>,
    pub answer: Option<String>,
    pub category: Option<String>,
    pub order: Option<i32>,
    pub is_active: Option<bool>,
}
