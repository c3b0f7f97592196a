use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use skills_catalog_core::{
    normalized_text, parse_category, parse_device, recommend, select_page, CatalogError,
    CatalogStore, Category, Device, ListQuery, NewSkill, Skill, SkillDraft, StoreInfo,
    DEFAULT_DEVICE, DEFAULT_PAGE, DEFAULT_PAGE_SIZE,
};
use skills_catalog_store_sqlite::SqliteCatalog;

/// Raw listing parameters as they arrive from the transport. Pagination
/// values stay strings here so that a malformed number surfaces as a
/// validation error rather than a transport-level decode failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    pub q: Option<String>,
    pub category: Option<String>,
    pub device: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
}

/// Raw recommendation parameters as they arrive from the transport.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecommendParams {
    pub goal: Option<String>,
    pub device: Option<String>,
    pub persona: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    Deleted,
    AlreadyAbsent,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeedOutcome {
    pub created: bool,
    pub skills: Vec<Skill>,
}

/// The catalog facade: validation and normalization in front of an injected
/// storage backend. Holds no state beyond the store handle, so every
/// operation reads current storage state at call time.
#[derive(Debug, Clone)]
pub struct CatalogApi<S> {
    store: S,
}

impl CatalogApi<SqliteCatalog> {
    #[must_use]
    pub fn open_sqlite(db_path: impl Into<PathBuf>) -> Self {
        Self::new(SqliteCatalog::new(db_path))
    }
}

impl<S: CatalogStore> CatalogApi<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Validate, normalize, and persist one record, returning it as stored.
    ///
    /// # Errors
    /// Returns [`CatalogError::Validation`] on bad input, or
    /// [`CatalogError::Storage`] when persistence fails. Nothing is
    /// persisted on failure.
    pub fn create(&self, draft: SkillDraft) -> Result<Skill, CatalogError> {
        let skill = draft.validate()?;
        self.store.insert(&skill)
    }

    /// List one page of records matching the raw parameters, applying the
    /// documented defaults when values are absent.
    ///
    /// # Errors
    /// Returns [`CatalogError::Validation`] for malformed filters or
    /// out-of-range pagination, or [`CatalogError::Storage`] on read failure.
    pub fn list(&self, params: ListParams) -> Result<Vec<Skill>, CatalogError> {
        let query = parse_list_params(params)?;
        let records = self.store.all()?;
        Ok(select_page(&records, &query))
    }

    /// Fetch one record by id.
    ///
    /// # Errors
    /// Returns [`CatalogError::NotFound`] when the id does not exist.
    pub fn get(&self, id: i64) -> Result<Skill, CatalogError> {
        self.store.fetch(id)?.ok_or(CatalogError::NotFound(id))
    }

    /// Delete one record by id. Idempotent: absence is reported as
    /// [`DeleteOutcome::AlreadyAbsent`], never as an error.
    ///
    /// # Errors
    /// Returns [`CatalogError::Storage`] when the delete fails.
    pub fn delete(&self, id: i64) -> Result<DeleteOutcome, CatalogError> {
        if self.store.remove(id)? {
            Ok(DeleteOutcome::Deleted)
        } else {
            Ok(DeleteOutcome::AlreadyAbsent)
        }
    }

    /// Insert the curated demo set when the catalog is empty; otherwise a
    /// no-op returning the existing records.
    ///
    /// # Errors
    /// Returns [`CatalogError::Storage`] when reads or the batch insert fail.
    pub fn seed_demo(&self) -> Result<SeedOutcome, CatalogError> {
        let existing = self.store.all()?;
        if !existing.is_empty() {
            return Ok(SeedOutcome { created: false, skills: existing });
        }

        let skills = self.store.insert_batch(&demo_catalog())?;
        Ok(SeedOutcome { created: true, skills })
    }

    /// Recommend records for a goal. `device` defaults to `any`; `persona`
    /// is accepted but does not affect matching.
    ///
    /// # Errors
    /// Returns [`CatalogError::Validation`] when `goal` is missing or not a
    /// known category, or [`CatalogError::Storage`] on read failure.
    pub fn recommend(&self, params: RecommendParams) -> Result<Vec<Skill>, CatalogError> {
        let Some(goal_raw) = normalized_text(params.goal) else {
            return Err(CatalogError::Validation("goal is required".to_string()));
        };
        let goal = parse_category(&goal_raw)?;
        let device = match normalized_text(params.device) {
            Some(raw) => parse_device(&raw)?,
            None => DEFAULT_DEVICE,
        };

        let records = self.store.all()?;
        Ok(recommend(&records, goal, device))
    }

    /// Describe the storage backend for diagnostics.
    ///
    /// # Errors
    /// Returns [`CatalogError::Storage`] when the backend cannot be probed.
    pub fn info(&self) -> Result<StoreInfo, CatalogError> {
        self.store.describe()
    }
}

fn parse_list_params(params: ListParams) -> Result<ListQuery, CatalogError> {
    let category = normalized_text(params.category).map(|raw| parse_category(&raw)).transpose()?;
    let device = normalized_text(params.device).map(|raw| parse_device(&raw)).transpose()?;
    let page = parse_page_value(params.page, "page", DEFAULT_PAGE)?;
    let page_size = parse_page_value(params.page_size, "page_size", DEFAULT_PAGE_SIZE)?;
    ListQuery::new(params.q, category, device, page, page_size)
}

fn parse_page_value(raw: Option<String>, field: &str, default: i64) -> Result<i64, CatalogError> {
    match normalized_text(raw) {
        None => Ok(default),
        Some(value) => value.parse::<i64>().map_err(|_| {
            CatalogError::Validation(format!("{field} must be an integer (got `{value}`)"))
        }),
    }
}

/// The curated demo dataset: eight records spanning every category.
#[must_use]
pub fn demo_catalog() -> Vec<NewSkill> {
    let demo: [(&str, Category, Device, &str, &str, f64); 8] = [
        (
            "5-min Box Breathing",
            Category::Stress,
            Device::Any,
            "Short guided breathing for stress relief.",
            "Let's do a 5-minute box breathing together. Inhale... hold... exhale...",
            10.0,
        ),
        (
            "Medication reminder (8 AM)",
            Category::Meds,
            Device::Phone,
            "Daily reminder with quick confirm.",
            "It's time for your morning medication. Would you like to log it?",
            5.0,
        ),
        (
            "Hydration nudge",
            Category::Nutrition,
            Device::Watch,
            "Watch tap + short prompt.",
            "Time to drink a glass of water. I'll check again in 2 hours.",
            2.5,
        ),
        (
            "Gentle mobility: 10-min walk",
            Category::Mobility,
            Device::Watch,
            "Starts a watch workout.",
            "A gentle 10-minute walk would help today. Start an Outdoor Walk?",
            7.5,
        ),
        (
            "Wind-down for sleep",
            Category::Sleep,
            Device::Phone,
            "Bedtime routine helper.",
            "Let's dim the noise. I'll start a 10-minute wind-down routine.",
            6.0,
        ),
        (
            "Fall-risk check-in",
            Category::Safety,
            Device::Watch,
            "Daily stability check-in.",
            "How steady are you feeling today? Any dizziness or unsteadiness?",
            4.0,
        ),
        (
            "Yoga Mat Flow (10-min)",
            Category::Mobility,
            Device::Any,
            "Gentle yoga mobility.",
            "Ready for a quick 10-minute mat flow? I'll guide the moves.",
            8.0,
        ),
        (
            "Gratitude check",
            Category::Stress,
            Device::Phone,
            "Positive reflection to lower stress.",
            "Take a moment - what's one thing you're grateful for today?",
            3.0,
        ),
    ];

    demo.into_iter()
        .map(|(name, category, device, description, voice_prompt, reward)| NewSkill {
            name: name.to_string(),
            category,
            device,
            description: Some(description.to_string()),
            voice_prompt: Some(voice_prompt.to_string()),
            price: 0.0,
            reward: Some(reward),
        })
        .collect()
}
