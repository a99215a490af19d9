use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Number, Value};

use crate::error::ApiError;
use crate::types::{parse_timestamp, timestamp, Document};

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$")
        .expect("email regex is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Number,
    Integer,
    Boolean,
    /// RFC3339 date or datetime, stored in the fixed-width UTC form
    Timestamp,
    /// Id of a document in another collection
    Reference,
    Object,
    Array(ElementType),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    Any,
    String,
    Timestamp,
    Reference,
}

/// Validation and normalisation rules for one document field
#[derive(Debug, Clone)]
pub struct Field {
    pub name: &'static str,
    pub kind: FieldType,
    required: Option<&'static str>,
    trim: bool,
    lowercase: bool,
    min_length: Option<(usize, &'static str)>,
    max_length: Option<(usize, &'static str)>,
    min: Option<(f64, &'static str)>,
    max: Option<(f64, &'static str)>,
    one_of: Option<(&'static [&'static str], &'static str)>,
    email: Option<&'static str>,
    default: Option<Value>,
    internal: bool,
}

impl Field {
    fn new(name: &'static str, kind: FieldType) -> Self {
        Self {
            name,
            kind,
            required: None,
            trim: false,
            lowercase: false,
            min_length: None,
            max_length: None,
            min: None,
            max: None,
            one_of: None,
            email: None,
            default: None,
            internal: false,
        }
    }

    pub fn string(name: &'static str) -> Self {
        Self::new(name, FieldType::String)
    }

    pub fn number(name: &'static str) -> Self {
        Self::new(name, FieldType::Number)
    }

    pub fn integer(name: &'static str) -> Self {
        Self::new(name, FieldType::Integer)
    }

    pub fn boolean(name: &'static str) -> Self {
        Self::new(name, FieldType::Boolean)
    }

    pub fn timestamp(name: &'static str) -> Self {
        Self::new(name, FieldType::Timestamp)
    }

    pub fn reference(name: &'static str) -> Self {
        Self::new(name, FieldType::Reference)
    }

    pub fn object(name: &'static str) -> Self {
        Self::new(name, FieldType::Object)
    }

    pub fn array(name: &'static str, of: ElementType) -> Self {
        Self::new(name, FieldType::Array(of))
    }

    pub fn required(mut self, message: &'static str) -> Self {
        self.required = Some(message);
        self
    }

    pub fn trim(mut self) -> Self {
        self.trim = true;
        self
    }

    pub fn lowercase(mut self) -> Self {
        self.lowercase = true;
        self
    }

    pub fn min_length(mut self, len: usize, message: &'static str) -> Self {
        self.min_length = Some((len, message));
        self
    }

    pub fn max_length(mut self, len: usize, message: &'static str) -> Self {
        self.max_length = Some((len, message));
        self
    }

    pub fn min(mut self, min: f64, message: &'static str) -> Self {
        self.min = Some((min, message));
        self
    }

    pub fn max(mut self, max: f64, message: &'static str) -> Self {
        self.max = Some((max, message));
        self
    }

    pub fn one_of(mut self, values: &'static [&'static str], message: &'static str) -> Self {
        self.one_of = Some((values, message));
        self
    }

    pub fn email(mut self, message: &'static str) -> Self {
        self.email = Some(message);
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Written only by lifecycle steps, never accepted from request bodies
    pub fn internal(mut self) -> Self {
        self.internal = true;
        self
    }

    fn normalize(&self, value: Value) -> Value {
        match (self.kind, value) {
            (FieldType::String, Value::String(s)) => {
                let s = if self.trim { s.trim().to_string() } else { s };
                Value::String(if self.lowercase { s.to_lowercase() } else { s })
            }
            (FieldType::Timestamp, v) => normalize_timestamp(v),
            (FieldType::Array(ElementType::Timestamp), Value::Array(items)) => {
                Value::Array(items.into_iter().map(normalize_timestamp).collect())
            }
            (_, v) => v,
        }
    }

    /// Message for the first rule the value breaks
    fn check(&self, value: &Value) -> Option<String> {
        if value.is_null() || value.as_str() == Some("") {
            return self.required.map(str::to_string);
        }
        if !self.type_matches(value) {
            return Some(format!("Invalid {}: {}", self.name, value));
        }

        if let Some(s) = value.as_str() {
            let len = s.chars().count();
            if let Some((min, message)) = self.min_length {
                if len < min {
                    return Some(message.to_string());
                }
            }
            if let Some((max, message)) = self.max_length {
                if len > max {
                    return Some(message.to_string());
                }
            }
            if let Some((values, message)) = self.one_of {
                if !values.contains(&s) {
                    return Some(message.to_string());
                }
            }
            if let Some(message) = self.email {
                if !EMAIL_RE.is_match(s) {
                    return Some(message.to_string());
                }
            }
        }

        if let Some(n) = value.as_f64() {
            if let Some((min, message)) = self.min {
                if n < min {
                    return Some(message.to_string());
                }
            }
            if let Some((max, message)) = self.max {
                if n > max {
                    return Some(message.to_string());
                }
            }
        }

        None
    }

    fn type_matches(&self, value: &Value) -> bool {
        match (self.kind, value) {
            (FieldType::String, Value::String(_)) => true,
            (FieldType::Number, Value::Number(_)) => true,
            (FieldType::Integer, Value::Number(n)) => n.as_f64().is_some_and(|f| f.fract() == 0.0),
            (FieldType::Boolean, Value::Bool(_)) => true,
            (FieldType::Timestamp, v) => parse_timestamp(v).is_some(),
            (FieldType::Reference, Value::String(s)) => !s.is_empty(),
            (FieldType::Object, Value::Object(_)) => true,
            (FieldType::Array(of), Value::Array(items)) => items.iter().all(|item| match of {
                ElementType::Any => true,
                ElementType::String => item.is_string(),
                ElementType::Timestamp => parse_timestamp(item).is_some(),
                ElementType::Reference => item.as_str().is_some_and(|s| !s.is_empty()),
            }),
            _ => false,
        }
    }
}

// Accepts dates (2021-03-21) and any RFC3339 offset; anything else is left
// for the type check to reject.
fn normalize_timestamp(value: Value) -> Value {
    let Some(s) = value.as_str() else {
        return value;
    };
    if let Some(at) = parse_timestamp(&value) {
        return timestamp(at);
    }
    match chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        Ok(date) => date
            .and_hms_opt(0, 0, 0)
            .map(|dt| timestamp(dt.and_utc()))
            .unwrap_or(value),
        Err(_) => value,
    }
}

/// Cross-field rule: `(merged document, changed fields) -> Some((field, message))`
pub type Check = fn(&Document, &Document) -> Option<(&'static str, String)>;

/// Field violations keyed by field name
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ValidationErrors(BTreeMap<String, String>);

impl ValidationErrors {
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_insert_with(|| message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        let joined = errors.0.values().cloned().collect::<Vec<_>>().join(". ");
        ApiError::validation_error(format!("Invalid input data. {}", joined), errors.0)
    }
}

/// Strict document schema: unknown and internal fields are dropped from
/// input, known fields are normalised and validated.
#[derive(Debug, Clone)]
pub struct Schema {
    fields: Vec<Field>,
    checks: Vec<Check>,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields, checks: Vec::new() }
    }

    pub fn check(mut self, check: Check) -> Self {
        self.checks.push(check);
        self
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Keep only client-writable fields, normalised
    fn accept(&self, input: Document) -> Document {
        input
            .into_iter()
            .filter_map(|(key, value)| {
                let field = self.field(&key).filter(|f| !f.internal)?;
                Some((key, field.normalize(value)))
            })
            .collect()
    }

    /// Validate a new document, filling in defaults
    pub fn prepare_create(&self, input: Document) -> Result<Document, ValidationErrors> {
        let mut doc = self.accept(input);
        for field in &self.fields {
            if let Some(default) = &field.default {
                if doc.get(field.name).map_or(true, Value::is_null) {
                    doc.insert(field.name.to_string(), default.clone());
                }
            }
        }

        let mut errors = ValidationErrors::default();
        for field in &self.fields {
            if let Some(message) = field.check(doc.get(field.name).unwrap_or(&Value::Null)) {
                errors.add(field.name, message);
            }
        }
        self.run_checks(&doc, &doc, &mut errors);

        // Optional fields sent as null are simply absent
        doc.retain(|_, v| !v.is_null());

        if errors.is_empty() {
            Ok(doc)
        } else {
            Err(errors)
        }
    }

    /// Validate the changed fields of an existing document. Returns the
    /// accepted changes, not the merged document.
    pub fn prepare_update(&self, existing: &Document, input: Document) -> Result<Document, ValidationErrors> {
        let changes = self.accept(input);

        let mut errors = ValidationErrors::default();
        for (key, value) in &changes {
            if let Some(field) = self.field(key) {
                if let Some(message) = field.check(value) {
                    errors.add(key.clone(), message);
                }
            }
        }

        let mut merged = existing.clone();
        for (key, value) in &changes {
            if value.is_null() {
                merged.remove(key);
            } else {
                merged.insert(key.clone(), value.clone());
            }
        }
        self.run_checks(&merged, &changes, &mut errors);

        if errors.is_empty() {
            Ok(changes)
        } else {
            Err(errors)
        }
    }

    fn run_checks(&self, merged: &Document, changes: &Document, errors: &mut ValidationErrors) {
        for check in &self.checks {
            if let Some((field, message)) = check(merged, changes) {
                errors.add(field, message);
            }
        }
    }
}

/// Integer JSON value when `f` has no fractional part
pub fn number(f: f64) -> Value {
    if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Value::Number((f as i64).into())
    } else {
        Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    fn schema() -> Schema {
        Schema::new(vec![
            Field::string("name").required("name is required").trim().min_length(3, "too short"),
            Field::string("email").lowercase().email("bad email"),
            Field::integer("rating").min(1.0, "rating too low").max(5.0, "rating too high"),
            Field::string("level").one_of(&["a", "b"], "bad level").default_value("a"),
            Field::timestamp("startsAt"),
            Field::boolean("active").internal().default_value(true),
        ])
        .check(|merged, _| {
            (merged.get("name").and_then(Value::as_str) == Some("admin"))
                .then(|| ("name", "reserved".to_string()))
        })
    }

    #[test]
    fn create_normalises_and_defaults() {
        let out = schema()
            .prepare_create(doc(json!({
                "name": "  Alice ",
                "email": "ALICE@Example.COM",
                "startsAt": "2021-03-21",
                "unknown": 1,
                "active": false
            })))
            .unwrap();
        assert_eq!(
            Value::Object(out),
            json!({
                "name": "Alice",
                "email": "alice@example.com",
                "startsAt": "2021-03-21T00:00:00.000Z",
                "level": "a",
                "active": true
            })
        );
    }

    #[test]
    fn create_collects_every_violation() {
        let errors = schema()
            .prepare_create(doc(json!({"email": "nope", "rating": 4.5, "level": "z"})))
            .unwrap_err();
        assert_eq!(errors.get("name"), Some("name is required"));
        assert_eq!(errors.get("email"), Some("bad email"));
        assert_eq!(errors.get("rating"), Some("Invalid rating: 4.5"));
        assert_eq!(errors.get("level"), Some("bad level"));
    }

    #[test]
    fn update_validates_only_changed_fields() {
        let existing = doc(json!({"name": "Alice", "rating": 3}));
        let changes = schema().prepare_update(&existing, doc(json!({"rating": 5}))).unwrap();
        assert_eq!(Value::Object(changes), json!({"rating": 5}));

        let errors = schema().prepare_update(&existing, doc(json!({"name": null}))).unwrap_err();
        assert_eq!(errors.get("name"), Some("name is required"));

        let errors = schema().prepare_update(&existing, doc(json!({"name": "admin"}))).unwrap_err();
        assert_eq!(errors.get("name"), Some("reserved"));
    }

    #[test]
    fn validation_errors_become_one_message() {
        let mut errors = ValidationErrors::default();
        errors.add("a", "first");
        errors.add("b", "second");
        let err: ApiError = errors.into();
        assert_eq!(err.message(), "Invalid input data. first. second");
    }

    #[test]
    fn number_prefers_integers() {
        assert_eq!(number(7.0), json!(7));
        assert_eq!(number(4.5), json!(4.5));
    }
}
