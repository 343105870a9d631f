//! Session types and form validation.

use std::fmt;

use serde::{Deserialize, Serialize};

use trollbuddy_core::youtube;

/// Session record as stored under `sessions/<storeKey>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub session_id: String,
    pub user_id: String,
    /// Participant name.
    pub name: String,
    pub age: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub youtube_video_id: Option<String>,
}

/// A session together with the store key of its record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Store-assigned handle, needed to mutate or delete the record.
    pub store_key: String,
    pub record: SessionRecord,
}

impl Session {
    pub fn session_id(&self) -> &str {
        &self.record.session_id
    }

    pub fn user_id(&self) -> &str {
        &self.record.user_id
    }
}

/// Raw organizer input, exactly as typed.
#[derive(Debug, Clone, Default)]
pub struct SessionForm {
    pub name: String,
    pub age: String,
    pub youtube_link: Option<String>,
}

/// A single field-level validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldError {
    NameRequired,
    AgeRequired,
    AgeNotNumeric,
    InvalidYoutubeUrl,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::NameRequired => "name is required",
            Self::AgeRequired => "age is required",
            Self::AgeNotNumeric => "age must be a whole number",
            Self::InvalidYoutubeUrl => "not a valid YouTube link",
        };
        f.write_str(msg)
    }
}

/// All validation failures of one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormErrors(pub Vec<FieldError>);

impl FormErrors {
    pub fn contains(&self, error: FieldError) -> bool {
        self.0.contains(&error)
    }
}

impl fmt::Display for FormErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        f.write_str(&parts.join(", "))
    }
}

/// Input that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedForm {
    pub name: String,
    pub age: u32,
    /// `None` when the link was left empty.
    pub youtube_video_id: Option<String>,
}

impl SessionForm {
    pub fn new(name: &str, age: &str, youtube_link: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            age: age.to_string(),
            youtube_link: youtube_link.map(str::to_string),
        }
    }

    /// Validate every field. Invalid values are reported, never coerced.
    pub fn validate(&self) -> Result<ValidatedForm, FormErrors> {
        let mut errors = Vec::new();

        let name = self.name.trim();
        if name.is_empty() {
            errors.push(FieldError::NameRequired);
        }

        let age_raw = self.age.trim();
        let age = if age_raw.is_empty() {
            errors.push(FieldError::AgeRequired);
            None
        } else if let Ok(age) = age_raw.parse::<u32>() {
            Some(age)
        } else {
            errors.push(FieldError::AgeNotNumeric);
            None
        };

        let link = self
            .youtube_link
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty());
        let youtube_video_id = match link {
            Some(link) if youtube::is_valid_url(link) => youtube::extract_video_id(link),
            Some(_) => {
                errors.push(FieldError::InvalidYoutubeUrl);
                None
            }
            None => None,
        };

        match age {
            Some(age) if errors.is_empty() => Ok(ValidatedForm {
                name: name.to_string(),
                age,
                youtube_video_id,
            }),
            _ => Err(FormErrors(errors)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn valid_form_extracts_video_id() {
        let form = SessionForm::new(
            "Ann",
            "12",
            Some("https://www.youtube.com/watch?v=abcdefghijk"),
        );
        let valid = form.validate().unwrap();
        assert_eq!(valid.name, "Ann");
        assert_eq!(valid.age, 12);
        assert_eq!(valid.youtube_video_id.as_deref(), Some("abcdefghijk"));
    }

    #[test]
    fn youtube_link_is_optional() {
        let form = SessionForm::new("Ann", "12", Some("   "));
        assert!(form.validate().unwrap().youtube_video_id.is_none());
        let form = SessionForm::new("Ann", "12", None);
        assert!(form.validate().unwrap().youtube_video_id.is_none());
    }

    #[test]
    fn malformed_link_blocks_submission() {
        let form = SessionForm::new("Ann", "12", Some("not-a-url"));
        let errors = form.validate().unwrap_err();
        assert_eq!(errors, FormErrors(vec![FieldError::InvalidYoutubeUrl]));
    }

    #[test]
    fn missing_fields_are_all_reported() {
        let errors = SessionForm::new(" ", "", None).validate().unwrap_err();
        assert!(errors.contains(FieldError::NameRequired));
        assert!(errors.contains(FieldError::AgeRequired));
    }

    #[test]
    fn non_numeric_age_is_rejected() {
        let errors = SessionForm::new("Ann", "twelve", None).validate().unwrap_err();
        assert_eq!(errors, FormErrors(vec![FieldError::AgeNotNumeric]));
        assert!(SessionForm::new("Ann", "-3", None).validate().is_err());
    }

    #[test]
    fn record_uses_camel_case_fields() {
        let record = SessionRecord {
            session_id: "s-1".into(),
            user_id: "u-1".into(),
            name: "Ann".into(),
            age: 12,
            youtube_video_id: Some("abcdefghijk".into()),
        };
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({
                "sessionId": "s-1",
                "userId": "u-1",
                "name": "Ann",
                "age": 12,
                "youtubeVideoId": "abcdefghijk"
            })
        );
    }

    #[test]
    fn record_without_video_deserializes() {
        let record: SessionRecord = serde_json::from_value(json!({
            "sessionId": "s-1", "userId": "u-1", "name": "Ann", "age": 7
        }))
        .unwrap();
        assert!(record.youtube_video_id.is_none());
    }
}
