//! Grade entity and payload validation.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use utoipa::ToSchema;

/// Store-assigned grade identifier.
pub type GradeId = i64;

/// Longest accepted student name, in characters.
pub const MAX_STUDENT_NAME_CHARS: usize = 100;

const REQUIRED: &str = "This field is required.";
const NULL: &str = "This field may not be null.";
const BLANK: &str = "This field may not be blank.";
const NOT_A_STRING: &str = "Not a valid string.";
const NOT_AN_INTEGER: &str = "A valid integer is required.";

/// A persisted grade record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Grade {
    /// Unique id, never reused.
    pub id: GradeId,
    /// Student name, trimmed and non-empty.
    #[schema(example = "Alice")]
    pub student_name: String,
    /// Score; no range rule beyond the integer width.
    #[schema(example = 85)]
    pub score: i32,
    /// Creation time, immutable.
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, format = DateTime)]
    pub created_at: OffsetDateTime,
}

impl Grade {
    /// Overwrite the mutable fields present in `changes`.
    pub fn apply(&mut self, changes: &GradeChanges) {
        if let Some(name) = &changes.student_name {
            self.student_name = name.clone();
        }
        if let Some(score) = changes.score {
            self.score = score;
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.student_name, self.score)
    }
}

/// A validated grade ready to be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGrade {
    /// Student name.
    pub student_name: String,
    /// Score.
    pub score: i32,
}

/// Validated changes to an existing grade. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GradeChanges {
    /// Replacement student name.
    pub student_name: Option<String>,
    /// Replacement score.
    pub score: Option<i32>,
}

impl From<NewGrade> for GradeChanges {
    fn from(grade: NewGrade) -> Self {
        Self {
            student_name: Some(grade.student_name),
            score: Some(grade.score),
        }
    }
}

/// Field-level validation messages, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    /// Record a message against a field.
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    /// True when no field has errors.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Messages recorded for `field`.
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }
}

/// Raw create/update payload as sent by a client.
///
/// Fields stay untyped until validation so that a bad value yields a
/// field-level message instead of a deserialization failure. Unknown keys,
/// including `id` and `created_at`, are ignored. An absent field is `None`;
/// an explicit `null` is kept as `Some(Value::Null)`.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct GradePayload {
    /// Student name.
    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<String>, example = "Bob")]
    pub student_name: Option<Value>,
    /// Score.
    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<i32>, example = 90)]
    pub score: Option<Value>,
}

fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl GradePayload {
    /// Validate a full payload (create or replace).
    pub fn validate(&self) -> Result<NewGrade, FieldErrors> {
        let mut errors = FieldErrors::default();
        let student_name = required(
            &mut errors,
            "student_name",
            self.student_name.as_ref(),
            parse_student_name,
        );
        let score = required(&mut errors, "score", self.score.as_ref(), parse_score);

        match (student_name, score) {
            (Some(student_name), Some(score)) if errors.is_empty() => Ok(NewGrade {
                student_name,
                score,
            }),
            _ => Err(errors),
        }
    }

    /// Validate only the fields present (partial update).
    pub fn validate_partial(&self) -> Result<GradeChanges, FieldErrors> {
        let mut errors = FieldErrors::default();
        let student_name = optional(
            &mut errors,
            "student_name",
            self.student_name.as_ref(),
            parse_student_name,
        );
        let score = optional(&mut errors, "score", self.score.as_ref(), parse_score);

        if errors.is_empty() {
            Ok(GradeChanges {
                student_name,
                score,
            })
        } else {
            Err(errors)
        }
    }
}

fn required<T>(
    errors: &mut FieldErrors,
    field: &str,
    value: Option<&Value>,
    parse: fn(&Value) -> Result<T, String>,
) -> Option<T> {
    match value {
        Some(value) => optional(errors, field, Some(value), parse),
        None => {
            errors.add(field, REQUIRED);
            None
        }
    }
}

fn optional<T>(
    errors: &mut FieldErrors,
    field: &str,
    value: Option<&Value>,
    parse: fn(&Value) -> Result<T, String>,
) -> Option<T> {
    let value = value?;
    if value.is_null() {
        errors.add(field, NULL);
        return None;
    }
    match parse(value) {
        Ok(parsed) => Some(parsed),
        Err(message) => {
            errors.add(field, message);
            None
        }
    }
}

fn parse_student_name(value: &Value) -> Result<String, String> {
    let raw = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return Err(NOT_A_STRING.to_string()),
    };

    let name = raw.trim();
    if name.is_empty() {
        return Err(BLANK.to_string());
    }
    if name.chars().count() > MAX_STUDENT_NAME_CHARS {
        return Err(format!(
            "Ensure this field has no more than {} characters.",
            MAX_STUDENT_NAME_CHARS
        ));
    }
    Ok(name.to_string())
}

fn parse_score(value: &Value) -> Result<i32, String> {
    let wide: i128 = match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i128::from(i)
            } else if let Some(u) = n.as_u64() {
                i128::from(u)
            } else {
                match n.as_f64() {
                    Some(f) if f.is_finite() && f.fract() == 0.0 => f as i128,
                    _ => return Err(NOT_AN_INTEGER.to_string()),
                }
            }
        }
        Value::String(s) => parse_integer_text(s).ok_or_else(|| NOT_AN_INTEGER.to_string())?,
        _ => return Err(NOT_AN_INTEGER.to_string()),
    };

    if wide > i128::from(i32::MAX) {
        return Err(format!(
            "Ensure this value is less than or equal to {}.",
            i32::MAX
        ));
    }
    if wide < i128::from(i32::MIN) {
        return Err(format!(
            "Ensure this value is greater than or equal to {}.",
            i32::MIN
        ));
    }
    Ok(wide as i32)
}

/// Integer text, optionally followed by a zero fraction such as `"90.00"`.
fn parse_integer_text(text: &str) -> Option<i128> {
    let text = text.trim();
    let digits = match text.split_once('.') {
        Some((head, tail)) if tail.chars().all(|c| c == '0') => head,
        Some(_) => return None,
        None => text,
    };
    digits.parse().ok()
}
