use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "ui_feedback_category", rename_all = "snake_case")]
pub enum UiFeedbackCategory {
    Bug,
    Usability,
    Design,
    FeatureRequest,
    Other,
}

impl UiFeedbackCategory {
    pub const ALL: [UiFeedbackCategory; 5] = [
        Self::Bug,
        Self::Usability,
        Self::Design,
        Self::FeatureRequest,
        Self::Other,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bug => "bug",
            Self::Usability => "usability",
            Self::Design => "design",
            Self::FeatureRequest => "feature_request",
            Self::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct UiFeedback {
    pub id: Uuid,
    pub category: UiFeedbackCategory,
    pub rating: i16,
    pub page: String,
    pub message: String,
    pub email: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ServiceFeedback {
    pub id: Uuid,
    pub service_name: String,
    pub overall_rating: i16,
    pub responsiveness_rating: i16,
    pub quality_rating: i16,
    pub would_recommend: bool,
    pub comments: Option<String>,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Raw UI feedback form as submitted.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUiFeedbackRequest {
    pub category: Option<UiFeedbackCategory>,
    pub rating: Option<i16>,
    pub page: Option<String>,
    pub message: Option<String>,
    pub email: Option<String>,
    pub user_agent: Option<String>,
}

/// Raw service feedback form as submitted.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateServiceFeedbackRequest {
    pub service_name: Option<String>,
    pub overall_rating: Option<i16>,
    pub responsiveness_rating: Option<i16>,
    pub quality_rating: Option<i16>,
    pub would_recommend: Option<bool>,
    pub comments: Option<String>,
    pub email: Option<String>,
}

/// Validated and normalized UI feedback, ready to store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUiFeedback {
    pub category: UiFeedbackCategory,
    pub rating: i16,
    pub page: String,
    pub message: String,
    pub email: Option<String>,
    pub user_agent: Option<String>,
}

/// Validated and normalized service feedback, ready to store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewServiceFeedback {
    pub service_name: String,
    pub overall_rating: i16,
    pub responsiveness_rating: i16,
    pub quality_rating: i16,
    pub would_recommend: bool,
    pub comments: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListUiFeedbackQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    #[serde(default)]
    pub order: SortOrder,
    pub category: Option<UiFeedbackCategory>,
    pub min_rating: Option<i16>,
    pub max_rating: Option<i16>,
    pub search: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl Default for ListUiFeedbackQuery {
    fn default() -> Self {
        Self {
            page: default_page(),
            per_page: default_per_page(),
            order: SortOrder::default(),
            category: None,
            min_rating: None,
            max_rating: None,
            search: None,
            from: None,
            to: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListServiceFeedbackQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    #[serde(default)]
    pub order: SortOrder,
    pub service_name: Option<String>,
    pub would_recommend: Option<bool>,
    pub min_rating: Option<i16>,
    pub max_rating: Option<i16>,
    pub search: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl Default for ListServiceFeedbackQuery {
    fn default() -> Self {
        Self {
            page: default_page(),
            per_page: default_per_page(),
            order: SortOrder::default(),
            service_name: None,
            would_recommend: None,
            min_rating: None,
            max_rating: None,
            search: None,
            from: None,
            to: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
    pub total_pages: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, page: u32, per_page: u32, total: u64) -> Self {
        let total_pages = if total == 0 {
            0
        } else {
            total.div_ceil(u64::from(per_page.max(1))) as u32
        };

        Self {
            items,
            page,
            per_page,
            total,
            total_pages,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryCount {
    pub category: UiFeedbackCategory,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UiFeedbackSummary {
    pub total: u64,
    pub average_rating: Option<f64>,
    pub by_category: Vec<CategoryCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceFeedbackSummary {
    pub total: u64,
    pub average_overall_rating: Option<f64>,
    pub would_recommend: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackSummary {
    pub ui: UiFeedbackSummary,
    pub service: ServiceFeedbackSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiMessage {
    pub message: String,
}

const fn default_page() -> u32 {
    1
}

const fn default_per_page() -> u32 {
    20
}
