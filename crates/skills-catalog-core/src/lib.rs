use serde::{Deserialize, Serialize};

/// First page number; pages are 1-based.
pub const DEFAULT_PAGE: i64 = 1;
/// Page size applied when the caller does not provide one.
pub const DEFAULT_PAGE_SIZE: i64 = 12;
/// Upper bound on a caller-provided page size.
pub const MAX_PAGE_SIZE: i64 = 50;
/// Cap on the number of records a recommendation returns.
pub const RECOMMEND_LIMIT: usize = 5;
/// Device assumed when a create request omits one.
pub const DEFAULT_DEVICE: Device = Device::Any;
/// Price assumed when a create request omits one.
pub const DEFAULT_PRICE: f64 = 0.0;

pub const MAX_NAME_CHARS: usize = 120;
pub const MAX_DESCRIPTION_CHARS: usize = 2000;
pub const MAX_VOICE_PROMPT_CHARS: usize = 240;

const CATEGORY_VALUES: &str = "sleep, stress, mobility, meds, safety, nutrition";
const DEVICE_VALUES: &str = "watch, phone, any";

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum CatalogError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("no skill with id {0}")]
    NotFound(i64),
    #[error("storage error: {0}")]
    Storage(String),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Sleep,
    Stress,
    Mobility,
    Meds,
    Safety,
    Nutrition,
}

impl Category {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sleep => "sleep",
            Self::Stress => "stress",
            Self::Mobility => "mobility",
            Self::Meds => "meds",
            Self::Safety => "safety",
            Self::Nutrition => "nutrition",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "sleep" => Some(Self::Sleep),
            "stress" => Some(Self::Stress),
            "mobility" => Some(Self::Mobility),
            "meds" => Some(Self::Meds),
            "safety" => Some(Self::Safety),
            "nutrition" => Some(Self::Nutrition),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Device {
    Watch,
    Phone,
    Any,
}

impl Device {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Watch => "watch",
            Self::Phone => "phone",
            Self::Any => "any",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "watch" => Some(Self::Watch),
            "phone" => Some(Self::Phone),
            "any" => Some(Self::Any),
            _ => None,
        }
    }
}

/// Parse a category value, rejecting anything outside the enumeration.
///
/// # Errors
/// Returns [`CatalogError::Validation`] listing the allowed values.
pub fn parse_category(value: &str) -> Result<Category, CatalogError> {
    Category::parse(value).ok_or_else(|| {
        CatalogError::Validation(format!(
            "category must be one of: {CATEGORY_VALUES} (got `{value}`)"
        ))
    })
}

/// Parse a device value, rejecting anything outside the enumeration.
///
/// # Errors
/// Returns [`CatalogError::Validation`] listing the allowed values.
pub fn parse_device(value: &str) -> Result<Device, CatalogError> {
    Device::parse(value).ok_or_else(|| {
        CatalogError::Validation(format!("device must be one of: {DEVICE_VALUES} (got `{value}`)"))
    })
}

/// A stored catalog record. Field order matches the wire shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Skill {
    pub id: i64,
    pub name: String,
    pub category: Category,
    pub device: Device,
    pub description: Option<String>,
    pub voice_prompt: Option<String>,
    pub price: f64,
    pub reward: Option<f64>,
}

/// A validated, normalized record awaiting an id from storage.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSkill {
    pub name: String,
    pub category: Category,
    pub device: Device,
    pub description: Option<String>,
    pub voice_prompt: Option<String>,
    pub price: f64,
    pub reward: Option<f64>,
}

/// Raw create input as it arrives at the boundary. Every field is optional
/// here so that validation, not deserialization, reports what is missing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SkillDraft {
    pub name: Option<String>,
    pub category: Option<String>,
    pub device: Option<String>,
    pub description: Option<String>,
    pub voice_prompt: Option<String>,
    pub price: Option<f64>,
    pub reward: Option<f64>,
    pub prize: Option<f64>,
}

impl SkillDraft {
    /// Validate and normalize raw input into a storable record shape.
    ///
    /// # Errors
    /// Returns [`CatalogError::Validation`] naming the offending field.
    pub fn validate(self) -> Result<NewSkill, CatalogError> {
        let Some(name) = normalized_text(self.name) else {
            return Err(CatalogError::Validation("name must not be empty".to_string()));
        };
        if name.chars().count() > MAX_NAME_CHARS {
            return Err(CatalogError::Validation(format!(
                "name must be at most {MAX_NAME_CHARS} characters"
            )));
        }

        let Some(category_raw) = normalized_text(self.category) else {
            return Err(CatalogError::Validation(format!(
                "category is required and must be one of: {CATEGORY_VALUES}"
            )));
        };
        let category = parse_category(&category_raw)?;

        let device = match normalized_text(self.device) {
            Some(raw) => parse_device(&raw)?,
            None => DEFAULT_DEVICE,
        };

        let description = normalized_text(self.description);
        if description.as_ref().is_some_and(|value| value.chars().count() > MAX_DESCRIPTION_CHARS)
        {
            return Err(CatalogError::Validation(format!(
                "description must be at most {MAX_DESCRIPTION_CHARS} characters"
            )));
        }

        let voice_prompt = normalized_text(self.voice_prompt);
        if voice_prompt
            .as_ref()
            .is_some_and(|value| value.chars().count() > MAX_VOICE_PROMPT_CHARS)
        {
            return Err(CatalogError::Validation(format!(
                "voice_prompt must be at most {MAX_VOICE_PROMPT_CHARS} characters"
            )));
        }

        let price = self.price.unwrap_or(DEFAULT_PRICE);
        if !price.is_finite() || price < 0.0 {
            return Err(CatalogError::Validation(format!(
                "price must be a non-negative number (got {price})"
            )));
        }

        let reward = resolve_reward(self.reward, self.prize);
        if let Some(value) = reward {
            if !value.is_finite() || value < 0.0 {
                return Err(CatalogError::Validation(format!(
                    "reward must be a non-negative number (got {value})"
                )));
            }
        }

        Ok(NewSkill { name, category, device, description, voice_prompt, price, reward })
    }
}

/// Legacy-field normalization: `prize` is accepted at the boundary and maps
/// to `reward`; `reward` wins when both are present.
#[must_use]
pub fn resolve_reward(reward: Option<f64>, prize: Option<f64>) -> Option<f64> {
    reward.or(prize)
}

/// Trim a textual input, treating blank values as absent.
#[must_use]
pub fn normalized_text(value: Option<String>) -> Option<String> {
    let trimmed = value?.trim().to_string();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

/// A validated listing request. Filters combine with logical AND; absent
/// filters impose no constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub q: Option<String>,
    pub category: Option<Category>,
    pub device: Option<Device>,
    pub page: i64,
    pub page_size: i64,
}

impl ListQuery {
    /// Build a listing request, rejecting out-of-range pagination rather
    /// than clamping it.
    ///
    /// # Errors
    /// Returns [`CatalogError::Validation`] when `page < 1` or `page_size`
    /// falls outside `[1, MAX_PAGE_SIZE]`.
    pub fn new(
        q: Option<String>,
        category: Option<Category>,
        device: Option<Device>,
        page: i64,
        page_size: i64,
    ) -> Result<Self, CatalogError> {
        if page < 1 {
            return Err(CatalogError::Validation(format!("page must be >= 1 (got {page})")));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(CatalogError::Validation(format!(
                "page_size must be between 1 and {MAX_PAGE_SIZE} (got {page_size})"
            )));
        }

        Ok(Self { q: normalized_text(q), category, device, page, page_size })
    }
}

/// Select one page of matching records, ordered by `id` descending.
///
/// A page beyond the available matches yields an empty sequence. The caller
/// only learns how many records were returned, not the total match count.
#[must_use]
pub fn select_page(records: &[Skill], query: &ListQuery) -> Vec<Skill> {
    let needle = query.q.as_ref().map(|q| q.to_lowercase());
    let mut matches: Vec<&Skill> = records
        .iter()
        .filter(|skill| {
            if let Some(needle) = &needle {
                if !skill.name.to_lowercase().contains(needle) {
                    return false;
                }
            }
            if let Some(category) = query.category {
                if skill.category != category {
                    return false;
                }
            }
            if let Some(device) = query.device {
                if skill.device != device {
                    return false;
                }
            }
            true
        })
        .collect();
    matches.sort_by(|lhs, rhs| rhs.id.cmp(&lhs.id));

    let Some(start) = query.page.checked_sub(1).and_then(|p| p.checked_mul(query.page_size))
    else {
        return Vec::new();
    };
    let start = usize::try_from(start).unwrap_or(usize::MAX);
    let take = usize::try_from(query.page_size).unwrap_or(0);
    matches.into_iter().skip(start).take(take).cloned().collect()
}

/// Recommend records for a goal, ordered by `id` descending and capped at
/// [`RECOMMEND_LIMIT`].
///
/// Device matching is permissive toward the universal value: a request for
/// `watch` or `phone` also matches records tagged `any`, and a request for
/// `any` imposes no device constraint at all.
#[must_use]
pub fn recommend(records: &[Skill], goal: Category, device: Device) -> Vec<Skill> {
    let mut matches: Vec<&Skill> = records
        .iter()
        .filter(|skill| skill.category == goal && device_matches(skill.device, device))
        .collect();
    matches.sort_by(|lhs, rhs| rhs.id.cmp(&lhs.id));
    matches.into_iter().take(RECOMMEND_LIMIT).cloned().collect()
}

fn device_matches(record: Device, requested: Device) -> bool {
    requested == Device::Any || record == requested || record == Device::Any
}

/// Diagnostic description of a storage backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreInfo {
    pub backend: String,
    pub location: String,
    pub server_version: Option<String>,
    pub skill_count: u64,
}

/// Durable storage for catalog records. Injected into the facade at
/// construction so tests can substitute an in-memory fake.
pub trait CatalogStore {
    /// Persist one record, assigning a fresh unique id, and return the
    /// stored record.
    ///
    /// # Errors
    /// Returns [`CatalogError::Storage`] when persistence fails.
    fn insert(&self, skill: &NewSkill) -> Result<Skill, CatalogError>;

    /// Persist a batch of records in one transaction, in order.
    ///
    /// # Errors
    /// Returns [`CatalogError::Storage`] when persistence fails; nothing is
    /// persisted on failure.
    fn insert_batch(&self, skills: &[NewSkill]) -> Result<Vec<Skill>, CatalogError>;

    /// Load one record by id, or `None` when absent.
    ///
    /// # Errors
    /// Returns [`CatalogError::Storage`] when the lookup fails.
    fn fetch(&self, id: i64) -> Result<Option<Skill>, CatalogError>;

    /// Delete one record by id. Reports whether a row existed; absence is
    /// not an error.
    ///
    /// # Errors
    /// Returns [`CatalogError::Storage`] when the delete fails.
    fn remove(&self, id: i64) -> Result<bool, CatalogError>;

    /// Load every record, ordered by `id` descending.
    ///
    /// # Errors
    /// Returns [`CatalogError::Storage`] when the read fails.
    fn all(&self) -> Result<Vec<Skill>, CatalogError>;

    /// Describe the backend for diagnostics.
    ///
    /// # Errors
    /// Returns [`CatalogError::Storage`] when the backend cannot be probed.
    fn describe(&self) -> Result<StoreInfo, CatalogError>;
}
