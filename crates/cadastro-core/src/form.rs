//! Form state store, validation schema and submission.
//!
//! The store is a cheap-clone handle: the search controller holds one to
//! commit the selected person, the front-end holds another to edit the
//! remaining fields and submit.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{CadastroError, Result};

static DIGITS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]+$").expect("valid digits regex"));
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[a-z0-9_'+\-]+(\.[a-z0-9_'+\-]+)*@([a-z0-9][a-z0-9\-]*\.)+[a-z]{2,}$")
        .expect("valid email regex")
});

pub const TELEFONE_MESSAGE: &str = "Telefone deve conter apenas números";
pub const EMAIL_MESSAGE: &str = "Email inválido";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Pessoa,
    Telefone,
    Email,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pessoa => "pessoa",
            Self::Telefone => "telefone",
            Self::Email => "email",
        }
    }

    /// Human-facing label, as printed next to the input.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pessoa => "Pessoa",
            Self::Telefone => "Telefone",
            Self::Email => "Email",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-field error readout. At most one message per field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldErrors(BTreeMap<Field, String>);

impl FieldErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.0.get(&field).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &str)> {
        self.0.iter().map(|(f, m)| (*f, m.as_str()))
    }

    fn record(&mut self, field: Field, message: String) {
        self.0.entry(field).or_insert(message);
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, message) in self.iter() {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{field}: {message}")?;
            first = false;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormState {
    pub pessoa: Option<i64>,
    pub telefone: String,
    pub email: String,
}

/// Validated payload handed to the submit callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pessoa: Option<i64>,
    pub telefone: String,
    pub email: String,
}

impl From<&FormState> for Submission {
    fn from(state: &FormState) -> Self {
        Self {
            pessoa: state.pessoa,
            telefone: state.telefone.clone(),
            email: state.email.clone(),
        }
    }
}

type Rule = Box<dyn Fn(&FormState) -> std::result::Result<(), String> + Send + Sync>;

/// Ordered list of per-field predicates. The first failing rule of a field
/// supplies its message.
#[derive(Default)]
pub struct FormSchema {
    rules: Vec<(Field, Rule)>,
}

impl FormSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rule<F>(mut self, field: Field, rule: F) -> Self
    where
        F: Fn(&FormState) -> std::result::Result<(), String> + Send + Sync + 'static,
    {
        self.rules.push((field, Box::new(rule)));
        self
    }

    /// `pessoa` optional, `telefone` digits only, `email` well-formed.
    pub fn standard() -> Self {
        Self::new()
            .rule(Field::Telefone, |s| {
                if DIGITS_RE.is_match(&s.telefone) {
                    Ok(())
                } else {
                    Err(TELEFONE_MESSAGE.to_string())
                }
            })
            .rule(Field::Email, |s| {
                if EMAIL_RE.is_match(&s.email) {
                    Ok(())
                } else {
                    Err(EMAIL_MESSAGE.to_string())
                }
            })
    }

    pub fn validate(&self, state: &FormState) -> FieldErrors {
        let mut errors = FieldErrors::default();
        for (field, rule) in &self.rules {
            if errors.get(*field).is_some() {
                continue;
            }
            if let Err(message) = rule(state) {
                errors.record(*field, message);
            }
        }
        errors
    }
}

impl fmt::Debug for FormSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormSchema")
            .field("rules", &self.rules.iter().map(|(f, _)| *f).collect::<Vec<_>>())
            .finish()
    }
}

/// Shared handle to the form's field values.
#[derive(Debug, Clone, Default)]
pub struct FormStore {
    inner: Arc<RwLock<FormState>>,
}

impl FormStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selection(&self) -> Option<i64> {
        self.inner.read().pessoa
    }

    pub fn set_selection(&self, id: Option<i64>) {
        self.inner.write().pessoa = id;
    }

    pub fn telefone(&self) -> String {
        self.inner.read().telefone.clone()
    }

    pub fn set_telefone(&self, value: impl Into<String>) {
        self.inner.write().telefone = value.into();
    }

    pub fn email(&self) -> String {
        self.inner.read().email.clone()
    }

    pub fn set_email(&self, value: impl Into<String>) {
        self.inner.write().email = value.into();
    }

    pub fn state(&self) -> FormState {
        self.inner.read().clone()
    }

    pub fn errors(&self, schema: &FormSchema) -> FieldErrors {
        schema.validate(&self.inner.read())
    }

    /// Validate and, if clean, hand the payload to `on_submit`.
    pub fn submit<F>(&self, schema: &FormSchema, on_submit: F) -> Result<Submission>
    where
        F: FnOnce(&Submission),
    {
        let state = self.state();
        let errors = schema.validate(&state);
        if !errors.is_empty() {
            return Err(CadastroError::Validation(errors));
        }
        let submission = Submission::from(&state);
        on_submit(&submission);
        Ok(submission)
    }
}

/// Default submit callback: log the payload.
pub fn log_submission(submission: &Submission) {
    match serde_json::to_string(submission) {
        Ok(payload) => tracing::info!(%payload, "cadastro enviado"),
        Err(e) => tracing::warn!(error = %e, ?submission, "cadastro enviado (payload not serializable)"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(telefone: &str, email: &str) -> FormStore {
        let store = FormStore::new();
        store.set_telefone(telefone);
        store.set_email(email);
        store
    }

    #[test]
    fn standard_schema_accepts_valid_form() {
        let store = filled("11987654321", "ana@example.com.br");
        assert!(store.errors(&FormSchema::standard()).is_empty());
    }

    #[test]
    fn telefone_must_be_digits() {
        let schema = FormSchema::standard();
        for bad in ["", "11 9876", "(11)98765", "abc", "١٢٣", "١٢٣٤٥", "１２３"] {
            let errors = filled(bad, "ana@example.com").errors(&schema);
            assert_eq!(errors.get(Field::Telefone), Some(TELEFONE_MESSAGE), "{bad:?}");
            assert_eq!(errors.get(Field::Email), None);
        }
    }

    #[test]
    fn email_must_be_well_formed() {
        let schema = FormSchema::standard();
        for bad in ["", "ana", "ana@", "@example.com", "ana@example", ".ana@example.com", "a..b@example.com"] {
            let errors = filled("123", bad).errors(&schema);
            assert_eq!(errors.get(Field::Email), Some(EMAIL_MESSAGE), "{bad:?}");
        }
    }

    #[test]
    fn email_is_validated_as_stored() {
        let schema = FormSchema::standard();
        for padded in ["  ana@example.com", "ana@example.com ", "\tana@example.com"] {
            let store = filled("123", padded);
            assert_eq!(store.errors(&schema).get(Field::Email), Some(EMAIL_MESSAGE), "{padded:?}");
            let err = store.submit(&schema, |_| panic!("must not submit")).unwrap_err();
            assert!(matches!(err, CadastroError::Validation(_)));
        }
    }

    #[test]
    fn first_failing_rule_wins_per_field() {
        let schema = FormSchema::new()
            .rule(Field::Telefone, |_| Err("first".into()))
            .rule(Field::Telefone, |_| Err("second".into()));
        let errors = schema.validate(&FormState::default());
        assert_eq!(errors.get(Field::Telefone), Some("first"));
    }

    #[test]
    fn submit_blocked_by_validation() {
        let store = filled("12a", "nope");
        let mut called = false;
        let err = store
            .submit(&FormSchema::standard(), |_| called = true)
            .unwrap_err();
        assert!(!called);
        match err {
            CadastroError::Validation(errors) => {
                assert_eq!(errors.iter().count(), 2);
                assert_eq!(
                    errors.to_string(),
                    format!("telefone: {TELEFONE_MESSAGE}; email: {EMAIL_MESSAGE}")
                );
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn submit_hands_payload_to_callback() {
        let store = filled("123", "ana@example.com");
        store.set_selection(Some(42));
        let mut seen = None;
        let submission = store
            .submit(&FormSchema::standard(), |s| seen = Some(s.clone()))
            .unwrap();
        assert_eq!(seen.as_ref(), Some(&submission));
        assert_eq!(
            serde_json::to_value(&submission).unwrap(),
            serde_json::json!({"pessoa": 42, "telefone": "123", "email": "ana@example.com"})
        );
    }

    #[test]
    fn submission_omits_absent_pessoa() {
        let submission = Submission::from(&FormState {
            pessoa: None,
            telefone: "1".into(),
            email: "a@b.co".into(),
        });
        let json = serde_json::to_value(&submission).unwrap();
        assert!(json.get("pessoa").is_none());
    }
}
