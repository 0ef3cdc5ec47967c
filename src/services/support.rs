use crate::clock::Clock;
use crate::error::{AppError, AppResult};
use crate::models::{FaqItem, FaqUpdate};
use crate::repositories::FaqRepository;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Help-center content
pub struct SupportService {
    repo: Arc<dyn FaqRepository>,
    clock: Arc<dyn Clock>,
}

impl SupportService {
    pub fn new(repo: Arc<dyn FaqRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }

    pub async fn create(
        &self,
        question: &str,
        answer: &str,
        category: &str,
        order: i32,
    ) -> AppResult<FaqItem> {
        require("question", question)?;
        require("answer", answer)?;
        require("category", category)?;

        let item = FaqItem::new(
            question.trim().to_string(),
            answer.trim().to_string(),
            category.trim().to_string(),
            order,
            self.clock.now(),
        );
        self.repo.insert(&item).await?;

        info!("Created FAQ item {} in {}", item.id, item.category);
        Ok(item)
    }

    /// Active items, by display order then creation time
    pub async fn list(&self, category: Option<&str>) -> AppResult<Vec<FaqItem>> {
        Ok(self.repo.list(category, true).await?)
    }

    pub async fn get(&self, id: Uuid) -> AppResult<FaqItem> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("FAQ item {} not found", id)))
    }

    pub async fn update(&self, id: Uuid, update: &FaqUpdate) -> AppResult<FaqItem> {
        if let Some(question) = &update.question {
            require("question", question)?;
        }
        if let Some(answer) = &update.answer {
            require("answer", answer)?;
        }
        if let Some(category) = &update.category {
            require("category", category)?;
        }

        self.repo
            .update(id, update)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("FAQ item {} not found", id)))
    }

    pub async fn delete(&self, id: Uuid) -> AppResult<bool> {
        Ok(self.repo.delete(id).await?)
    }

    /// Distinct categories of active items, sorted
    pub async fn categories(&self) -> AppResult<Vec<String>> {
        let categories: BTreeSet<String> = self
            .repo
            .list(None, true)
            .await?
            .into_iter()
            .map(|item| item.category)
            .collect();

        Ok(categories.into_iter().collect())
    }
}

fn require(field: &str, value: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("FAQ {} must not be empty", field)));
    }
    Ok(())
}
