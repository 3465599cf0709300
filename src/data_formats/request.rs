use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::errors::FieldErrors;

const REQUIRED: &str = "This field is required.";
const BLANK: &str = "This field may not be blank.";
const NULL: &str = "This field may not be null.";
const NOT_A_STRING: &str = "Not a valid string.";
const NOT_AN_INTEGER: &str = "A valid integer is required.";

pub const USERNAME_MAX_LENGTH: usize = 150;
pub const CATEGORY_NAME_MAX_LENGTH: usize = 100;
pub const POST_TITLE_MAX_LENGTH: usize = 200;

/// Body fields arrive untyped so a bad one becomes a field error, not a rejected body.
/// A missing key stays `None`; an explicit `null` is `Some(Value::Null)`.
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

fn check_text(
    errors: &mut FieldErrors,
    field: &str,
    value: Option<Value>,
    required: bool,
    max_length: Option<usize>,
) -> Option<String> {
    let value = match value {
        None => {
            if required {
                errors.add(field, REQUIRED);
            }
            return None;
        }
        Some(Value::Null) => {
            errors.add(field, NULL);
            return None;
        }
        Some(Value::String(value)) => value.trim().to_owned(),
        Some(_) => {
            errors.add(field, NOT_A_STRING);
            return None;
        }
    };
    if value.is_empty() {
        errors.add(field, BLANK);
        return None;
    }
    if let Some(max_length) = max_length {
        if value.chars().count() > max_length {
            errors.add(
                field,
                format!("Ensure this field has no more than {max_length} characters."),
            );
            return None;
        }
    }
    Some(value)
}

/// Optional text where `null` or blank clears the stored value.
fn check_nullable_text(
    errors: &mut FieldErrors,
    field: &str,
    value: Option<Value>,
) -> Option<Option<String>> {
    match value {
        None => None,
        Some(Value::Null) => Some(None),
        Some(Value::String(text)) => {
            let text = text.trim();
            Some((!text.is_empty()).then(|| text.to_owned()))
        }
        Some(_) => {
            errors.add(field, NOT_A_STRING);
            None
        }
    }
}

/// Accepts `3` as well as `"3"`, the way form-encoded clients send ids.
pub fn parse_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn check_id(
    errors: &mut FieldErrors,
    field: &str,
    value: Option<Value>,
    required: bool,
) -> Option<i64> {
    match value {
        None => {
            if required {
                errors.add(field, REQUIRED);
            }
            None
        }
        Some(Value::Null) => {
            errors.add(field, NULL);
            None
        }
        Some(value) => {
            let id = parse_id(&value);
            if id.is_none() {
                errors.add(field, NOT_AN_INTEGER);
            }
            id
        }
    }
}

// ----------------- User Request -----------------
#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct RegisterRequest {
    #[serde(deserialize_with = "present")]
    pub username: Option<Value>,
    #[serde(deserialize_with = "present")]
    pub password: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub password: String,
}

fn is_valid_username(username: &str) -> bool {
    username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
}

impl RegisterRequest {
    pub fn validate(self) -> Result<NewUser, FieldErrors> {
        let mut errors = FieldErrors::new();
        let username = check_text(
            &mut errors,
            "username",
            self.username,
            true,
            Some(USERNAME_MAX_LENGTH),
        );
        if let Some(username) = &username {
            if !is_valid_username(username) {
                errors.add(
                    "username",
                    "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
                );
            }
        }
        let password = check_text(&mut errors, "password", self.password, true, None);
        match (username, password) {
            (Some(username), Some(password)) if errors.is_empty() => {
                Ok(NewUser { username, password })
            }
            _ => Err(errors),
        }
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct TokenRequest {
    #[serde(deserialize_with = "present")]
    pub username: Option<Value>,
    #[serde(deserialize_with = "present")]
    pub password: Option<Value>,
}

impl TokenRequest {
    pub fn validate(self) -> Result<(String, String), FieldErrors> {
        let mut errors = FieldErrors::new();
        let username = check_text(&mut errors, "username", self.username, true, None);
        let password = check_text(&mut errors, "password", self.password, true, None);
        match (username, password) {
            (Some(username), Some(password)) => Ok((username, password)),
            _ => Err(errors),
        }
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct RefreshRequest {
    #[serde(deserialize_with = "present")]
    pub refresh: Option<Value>,
}

impl RefreshRequest {
    pub fn validate(self) -> Result<String, FieldErrors> {
        let mut errors = FieldErrors::new();
        check_text(&mut errors, "refresh", self.refresh, true, None).ok_or(errors)
    }
}

// ----------------- Category Request -----------------
#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct CategoryRequest {
    #[serde(deserialize_with = "present")]
    pub name: Option<Value>,
}

impl CategoryRequest {
    /// `None` on a partial update means "leave the name alone".
    pub fn validate(self, partial: bool) -> Result<Option<String>, FieldErrors> {
        let mut errors = FieldErrors::new();
        let name = check_text(
            &mut errors,
            "name",
            self.name,
            !partial,
            Some(CATEGORY_NAME_MAX_LENGTH),
        );
        if errors.is_empty() {
            Ok(name)
        } else {
            Err(errors)
        }
    }
}

// ----------------- Post Request -----------------
#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct PostRequest {
    #[serde(deserialize_with = "present")]
    pub title: Option<Value>,
    #[serde(deserialize_with = "present")]
    pub content: Option<Value>,
    #[serde(deserialize_with = "present")]
    pub category_id: Option<Value>,
    #[serde(deserialize_with = "present")]
    pub image: Option<Value>,
}

/// Validated post fields; `None` leaves the stored value untouched.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PostChanges {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category_id: Option<i64>,
    pub image: Option<Option<String>>,
}

impl PostRequest {
    pub fn validate(self, partial: bool) -> Result<PostChanges, FieldErrors> {
        let mut errors = FieldErrors::new();
        let title = check_text(
            &mut errors,
            "title",
            self.title,
            !partial,
            Some(POST_TITLE_MAX_LENGTH),
        );
        let content = check_text(&mut errors, "content", self.content, !partial, None);
        let category_id = check_id(&mut errors, "category_id", self.category_id, !partial);
        let image = check_nullable_text(&mut errors, "image", self.image);
        if errors.is_empty() {
            Ok(PostChanges {
                title,
                content,
                category_id,
                image,
            })
        } else {
            Err(errors)
        }
    }
}

// ----------------- Comment Request -----------------
#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct CommentRequest {
    #[serde(deserialize_with = "present")]
    pub content: Option<Value>,
    #[serde(deserialize_with = "present")]
    pub parent: Option<Value>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CommentChanges {
    pub content: Option<String>,
    pub parent: Option<Option<i64>>,
}

impl CommentRequest {
    pub fn validate(self, partial: bool) -> Result<CommentChanges, FieldErrors> {
        let mut errors = FieldErrors::new();
        let content = check_text(&mut errors, "content", self.content, !partial, None);
        let parent = match self.parent {
            None => None,
            Some(Value::Null) => Some(None),
            Some(value) => match parse_id(&value) {
                Some(id) => Some(Some(id)),
                None => {
                    errors.add("parent", NOT_AN_INTEGER);
                    None
                }
            },
        };
        if errors.is_empty() {
            Ok(CommentChanges { content, parent })
        } else {
            Err(errors)
        }
    }
}
