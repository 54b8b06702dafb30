use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::api::RegistrationDraft;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\S+@\S+\.\S+").expect("valid email regex"));
static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\d\s\-+()]+$").expect("valid phone regex"));

const MIN_NAME_CHARS: usize = 2;

/// Per-field messages for a rejected registration draft.
#[derive(Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct DraftErrors {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl DraftErrors {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.phone.is_none()
    }
}

impl RegistrationDraft {
    /// Checks the draft the way the registration form does before submitting.
    pub fn validate(&self) -> Result<(), DraftErrors> {
        let mut errors = DraftErrors::default();

        let name = self.name.trim();
        if name.is_empty() {
            errors.name = Some("Name is required".to_string());
        } else if name.chars().count() < MIN_NAME_CHARS {
            errors.name = Some("Name must be at least 2 characters".to_string());
        }

        if self.email.trim().is_empty() {
            errors.email = Some("Email is required".to_string());
        } else if !EMAIL_RE.is_match(&self.email) {
            errors.email = Some("Please enter a valid email address".to_string());
        }

        if self.phone.trim().is_empty() {
            errors.phone = Some("Phone number is required".to_string());
        } else if !PHONE_RE.is_match(&self.phone) {
            errors.phone = Some("Please enter a valid phone number".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// The draft with surrounding whitespace removed, as it should be submitted.
    pub fn trimmed(&self) -> Self {
        Self {
            event_id: self.event_id.clone(),
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            phone: self.phone.trim().to_string(),
        }
    }
}
