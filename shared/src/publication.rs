//! Multi-step publication authoring with client-side validation.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::model::{EmbassyId, PublicationStatus};
use crate::{AppError, ErrorKind};

pub const TITLE_MIN_LENGTH: usize = 3;
pub const TITLE_MAX_LENGTH: usize = 150;
pub const SUMMARY_MAX_LENGTH: usize = 300;
pub const BODY_MIN_LENGTH: usize = 20;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PublicationStep {
    #[default]
    Details,
    Content,
    Review,
}

impl PublicationStep {
    pub fn next(self) -> Self {
        match self {
            Self::Details => Self::Content,
            Self::Content | Self::Review => Self::Review,
        }
    }

    pub fn previous(self) -> Self {
        match self {
            Self::Details | Self::Content => Self::Details,
            Self::Review => Self::Content,
        }
    }

    /// 1-based position, for "Step 2 of 3".
    pub fn number(self) -> u8 {
        match self {
            Self::Details => 1,
            Self::Content => 2,
            Self::Review => 3,
        }
    }

    fn fields(self) -> &'static [PublicationField] {
        match self {
            Self::Details => &[
                PublicationField::Title,
                PublicationField::Category,
                PublicationField::Summary,
            ],
            Self::Content => &[PublicationField::Body],
            Self::Review => &[],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PublicationField {
    Title,
    Category,
    Summary,
    Body,
}

impl fmt::Display for PublicationField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Title => "Title",
            Self::Category => "Category",
            Self::Summary => "Summary",
            Self::Body => "Body",
        })
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldError {
    #[error("{field} is required")]
    Required { field: PublicationField },
    #[error("{field} must be at least {min} characters")]
    TooShort { field: PublicationField, min: usize },
    #[error("{field} must be at most {max} characters")]
    TooLong { field: PublicationField, max: usize },
}

impl FieldError {
    pub fn field(&self) -> PublicationField {
        match self {
            Self::Required { field } | Self::TooShort { field, .. } | Self::TooLong { field, .. } => {
                *field
            }
        }
    }
}

/// Body of `POST publications`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicationPayload {
    pub title: String,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub body: String,
    pub status: PublicationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embassy_id: Option<EmbassyId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationDraft {
    pub step: PublicationStep,
    pub title: String,
    pub category: String,
    pub summary: String,
    pub body: String,
    pub errors: Vec<FieldError>,
    pub submitting: bool,
}

impl PublicationDraft {
    pub fn value(&self, field: PublicationField) -> &str {
        match field {
            PublicationField::Title => &self.title,
            PublicationField::Category => &self.category,
            PublicationField::Summary => &self.summary,
            PublicationField::Body => &self.body,
        }
    }

    /// Edits a field and clears its error.
    pub fn set(&mut self, field: PublicationField, value: String) {
        match field {
            PublicationField::Title => self.title = value,
            PublicationField::Category => self.category = value,
            PublicationField::Summary => self.summary = value,
            PublicationField::Body => self.body = value,
        }
        self.errors.retain(|e| e.field() != field);
    }

    pub fn validate_field(&self, field: PublicationField) -> Option<FieldError> {
        let value = self.value(field).trim();
        let len = value.chars().count();
        match field {
            PublicationField::Title if value.is_empty() => Some(FieldError::Required { field }),
            PublicationField::Title if len < TITLE_MIN_LENGTH => Some(FieldError::TooShort {
                field,
                min: TITLE_MIN_LENGTH,
            }),
            PublicationField::Title if len > TITLE_MAX_LENGTH => Some(FieldError::TooLong {
                field,
                max: TITLE_MAX_LENGTH,
            }),
            PublicationField::Category if value.is_empty() => Some(FieldError::Required { field }),
            PublicationField::Summary if len > SUMMARY_MAX_LENGTH => Some(FieldError::TooLong {
                field,
                max: SUMMARY_MAX_LENGTH,
            }),
            PublicationField::Body if value.is_empty() => Some(FieldError::Required { field }),
            PublicationField::Body if len < BODY_MIN_LENGTH => Some(FieldError::TooShort {
                field,
                min: BODY_MIN_LENGTH,
            }),
            _ => None,
        }
    }

    pub fn validate_step(&self, step: PublicationStep) -> Vec<FieldError> {
        step.fields()
            .iter()
            .filter_map(|field| self.validate_field(*field))
            .collect()
    }

    /// Moves to the next step if the current one is valid. On failure the
    /// errors are kept on the draft for display.
    pub fn advance(&mut self) -> Result<PublicationStep, Vec<FieldError>> {
        let errors = self.validate_step(self.step);
        if !errors.is_empty() {
            self.errors.clone_from(&errors);
            return Err(errors);
        }
        self.errors.clear();
        self.step = self.step.next();
        Ok(self.step)
    }

    /// Going back never validates.
    pub fn back(&mut self) -> PublicationStep {
        self.step = self.step.previous();
        self.step
    }

    /// Validates every step and builds the request body.
    pub fn payload(
        &self,
        embassy_id: Option<EmbassyId>,
    ) -> Result<PublicationPayload, Vec<FieldError>> {
        let errors: Vec<FieldError> = [PublicationStep::Details, PublicationStep::Content]
            .into_iter()
            .flat_map(|step| self.validate_step(step))
            .collect();
        if !errors.is_empty() {
            return Err(errors);
        }

        let summary = self.summary.trim();
        Ok(PublicationPayload {
            title: self.title.trim().to_string(),
            category: self.category.trim().to_string(),
            summary: (!summary.is_empty()).then(|| summary.to_string()),
            body: self.body.trim().to_string(),
            status: PublicationStatus::Draft,
            embassy_id,
        })
    }
}

impl From<FieldError> for AppError {
    fn from(e: FieldError) -> Self {
        AppError::new(ErrorKind::Validation, e.to_string())
            .with_context("field", e.field().to_string())
    }
}
