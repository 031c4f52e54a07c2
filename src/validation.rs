//! Form and query validation.
//!
//! Every check runs; the caller gets the complete list of field errors so a
//! form can highlight all offending inputs at once.

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use crate::models::{
    CreateServiceFeedbackRequest, CreateUiFeedbackRequest, ListServiceFeedbackQuery,
    ListUiFeedbackQuery, NewServiceFeedback, NewUiFeedback,
};

pub const RATING_RANGE: std::ops::RangeInclusive<i16> = 1..=5;
pub const MAX_PAGE_LEN: usize = 2048;
pub const MAX_MESSAGE_LEN: usize = 5000;
pub const MAX_SERVICE_NAME_LEN: usize = 200;
pub const MAX_EMAIL_LEN: usize = 320;
pub const MAX_USER_AGENT_LEN: usize = 512;
pub const MAX_SEARCH_LEN: usize = 200;
pub const MAX_PER_PAGE: u32 = 100;

lazy_static! {
    static ref EMAIL_RE: Regex =
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid");
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Default)]
struct Errors(Vec<FieldError>);

impl Errors {
    fn push(&mut self, field: &str, message: impl Into<String>) {
        self.0.push(FieldError::new(field, message));
    }

    fn finish<T>(self, value: impl FnOnce() -> T) -> Result<T, Vec<FieldError>> {
        if self.0.is_empty() {
            Ok(value())
        } else {
            Err(self.0)
        }
    }
}

fn required_text(
    errors: &mut Errors,
    field: &str,
    value: Option<&str>,
    max_len: usize,
) -> Option<String> {
    let Some(trimmed) = value.map(str::trim) else {
        errors.push(field, "is required");
        return None;
    };
    if trimmed.is_empty() {
        errors.push(field, "must not be blank");
        return None;
    }
    if trimmed.chars().count() > max_len {
        errors.push(field, format!("must be at most {max_len} characters"));
        return None;
    }
    Some(trimmed.to_string())
}

fn optional_text(
    errors: &mut Errors,
    field: &str,
    value: Option<&str>,
    max_len: usize,
) -> Option<String> {
    let trimmed = value.map(str::trim).filter(|v| !v.is_empty())?;
    if trimmed.chars().count() > max_len {
        errors.push(field, format!("must be at most {max_len} characters"));
        return None;
    }
    Some(trimmed.to_string())
}

fn optional_email(errors: &mut Errors, value: Option<&str>) -> Option<String> {
    let email = optional_text(errors, "email", value, MAX_EMAIL_LEN)?;
    if !EMAIL_RE.is_match(&email) {
        errors.push("email", "must be a valid email address");
        return None;
    }
    Some(email.to_lowercase())
}

fn required_rating(errors: &mut Errors, field: &str, value: Option<i16>) -> i16 {
    match value {
        None => {
            errors.push(field, "is required");
            0
        }
        Some(rating) if !RATING_RANGE.contains(&rating) => {
            errors.push(field, "must be between 1 and 5");
            0
        }
        Some(rating) => rating,
    }
}

fn rating_bounds(errors: &mut Errors, min: Option<i16>, max: Option<i16>) {
    for (field, value) in [("min_rating", min), ("max_rating", max)] {
        if let Some(rating) = value
            && !RATING_RANGE.contains(&rating)
        {
            errors.push(field, "must be between 1 and 5");
        }
    }
    if let (Some(min), Some(max)) = (min, max)
        && min > max
    {
        errors.push("min_rating", "must not exceed max_rating");
    }
}

fn paging(errors: &mut Errors, page: u32, per_page: u32) {
    if page == 0 {
        errors.push("page", "must be greater than 0");
    }
    if per_page == 0 || per_page > MAX_PER_PAGE {
        errors.push("per_page", format!("must be between 1 and {MAX_PER_PAGE}"));
    }
}

fn date_range(errors: &mut Errors, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) {
    if let (Some(from), Some(to)) = (from, to)
        && from > to
    {
        errors.push("from", "must not be after to");
    }
}

fn search(errors: &mut Errors, value: Option<&str>) {
    if let Some(search) = value
        && search.chars().count() > MAX_SEARCH_LEN
    {
        errors.push("search", format!("must be at most {MAX_SEARCH_LEN} characters"));
    }
}

pub fn validate_ui_feedback(
    request: &CreateUiFeedbackRequest,
) -> Result<NewUiFeedback, Vec<FieldError>> {
    let mut errors = Errors::default();

    let category = request.category;
    if category.is_none() {
        errors.push("category", "is required");
    }
    let rating = required_rating(&mut errors, "rating", request.rating);
    let page = required_text(&mut errors, "page", request.page.as_deref(), MAX_PAGE_LEN);
    let message = required_text(
        &mut errors,
        "message",
        request.message.as_deref(),
        MAX_MESSAGE_LEN,
    );
    let email = optional_email(&mut errors, request.email.as_deref());
    let user_agent = optional_text(
        &mut errors,
        "user_agent",
        request.user_agent.as_deref(),
        MAX_USER_AGENT_LEN,
    );

    match (category, page, message) {
        (Some(category), Some(page), Some(message)) => errors.finish(|| NewUiFeedback {
            category,
            rating,
            page,
            message,
            email,
            user_agent,
        }),
        _ => Err(errors.0),
    }
}

pub fn validate_service_feedback(
    request: &CreateServiceFeedbackRequest,
) -> Result<NewServiceFeedback, Vec<FieldError>> {
    let mut errors = Errors::default();

    let service_name = required_text(
        &mut errors,
        "service_name",
        request.service_name.as_deref(),
        MAX_SERVICE_NAME_LEN,
    );
    let overall_rating = required_rating(&mut errors, "overall_rating", request.overall_rating);
    let responsiveness_rating = required_rating(
        &mut errors,
        "responsiveness_rating",
        request.responsiveness_rating,
    );
    let quality_rating = required_rating(&mut errors, "quality_rating", request.quality_rating);
    let would_recommend = request.would_recommend;
    if would_recommend.is_none() {
        errors.push("would_recommend", "is required");
    }
    let comments = optional_text(
        &mut errors,
        "comments",
        request.comments.as_deref(),
        MAX_MESSAGE_LEN,
    );
    let email = optional_email(&mut errors, request.email.as_deref());

    match (service_name, would_recommend) {
        (Some(service_name), Some(would_recommend)) => errors.finish(|| NewServiceFeedback {
            service_name,
            overall_rating,
            responsiveness_rating,
            quality_rating,
            would_recommend,
            comments,
            email,
        }),
        _ => Err(errors.0),
    }
}

pub fn validate_ui_query(query: &ListUiFeedbackQuery) -> Result<(), Vec<FieldError>> {
    let mut errors = Errors::default();
    paging(&mut errors, query.page, query.per_page);
    rating_bounds(&mut errors, query.min_rating, query.max_rating);
    date_range(&mut errors, query.from, query.to);
    search(&mut errors, query.search.as_deref());
    errors.finish(|| ())
}

pub fn validate_service_query(query: &ListServiceFeedbackQuery) -> Result<(), Vec<FieldError>> {
    let mut errors = Errors::default();
    paging(&mut errors, query.page, query.per_page);
    rating_bounds(&mut errors, query.min_rating, query.max_rating);
    date_range(&mut errors, query.from, query.to);
    search(&mut errors, query.search.as_deref());
    if let Some(name) = query.service_name.as_deref()
        && name.chars().count() > MAX_SERVICE_NAME_LEN
    {
        errors.push(
            "service_name",
            format!("must be at most {MAX_SERVICE_NAME_LEN} characters"),
        );
    }
    errors.finish(|| ())
}
