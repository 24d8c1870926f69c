use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::catalog::QuestionCatalog;
use super::domain::{OptionId, Question, QuestionId, QuestionType};

/// Value held for one question. Unset is the absence of a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Boolean(bool),
    Number(f64),
    Text(String),
    List(Vec<String>),
}

impl AnswerValue {
    pub const fn shape(&self) -> &'static str {
        match self {
            AnswerValue::Boolean(_) => "boolean",
            AnswerValue::Number(_) => "number",
            AnswerValue::Text(_) => "string",
            AnswerValue::List(_) => "list",
        }
    }

    /// Whether this value is a legal shape for answers to `kind`.
    pub fn fits(&self, kind: QuestionType) -> bool {
        match kind {
            QuestionType::Boolean => matches!(self, AnswerValue::Boolean(_)),
            QuestionType::Numero => matches!(self, AnswerValue::Number(value) if value.is_finite()),
            QuestionType::Texto | QuestionType::Select => matches!(self, AnswerValue::Text(_)),
            QuestionType::Data => matches!(
                self,
                AnswerValue::Text(text) if NaiveDate::parse_from_str(text, "%Y-%m-%d").is_ok()
            ),
            QuestionType::Multiselect => matches!(self, AnswerValue::List(_)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnswerError {
    #[error("question {0} is not part of this process")]
    UnknownQuestion(QuestionId),
    #[error("question {question} expects a {expected} answer, got {found}")]
    ShapeMismatch {
        question: QuestionId,
        expected: &'static str,
        found: &'static str,
    },
    #[error("option {option} is not offered by question {question}")]
    UnknownOption {
        question: QuestionId,
        option: OptionId,
    },
    #[error("question {0} has no selection yet; the placeholder cannot be chosen")]
    PlaceholderSelected(QuestionId),
}

/// Answers of one form session, keyed by question id.
///
/// Every stored value matches the declared type of its question; writes that
/// do not are rejected, so readers never have to re-check shapes.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AnswerMap {
    values: BTreeMap<QuestionId, AnswerValue>,
}

impl AnswerMap {
    /// Initial answers for a catalog: free-text questions start as an empty
    /// string (the controlled input's value), everything else unset.
    pub fn seeded(catalog: &QuestionCatalog) -> Self {
        let values = catalog
            .iter()
            .filter(|question| question.kind == QuestionType::Texto)
            .map(|question| (question.id.clone(), AnswerValue::Text(String::new())))
            .collect();
        Self { values }
    }

    pub fn get(&self, question: &QuestionId) -> Option<&AnswerValue> {
        self.values.get(question)
    }

    /// Store `value` for `question`, or clear it when `value` is `None`.
    ///
    /// Repeated ids in a list keep their first position only.
    pub fn set(
        &mut self,
        question: &Question,
        value: Option<AnswerValue>,
    ) -> Result<(), AnswerError> {
        let Some(mut value) = value else {
            self.values.remove(&question.id);
            return Ok(());
        };

        if !value.fits(question.kind) {
            return Err(AnswerError::ShapeMismatch {
                question: question.id.clone(),
                expected: question.kind.label(),
                found: value.shape(),
            });
        }

        match &value {
            AnswerValue::Text(option) if question.kind == QuestionType::Select => {
                ensure_offered(question, option)?;
            }
            AnswerValue::List(options) => {
                for option in options {
                    ensure_offered(question, option)?;
                }
            }
            _ => {}
        }

        if let AnswerValue::List(options) = &mut value {
            let mut seen = BTreeSet::new();
            options.retain(|option| seen.insert(option.clone()));
        }

        self.values.insert(question.id.clone(), value);
        Ok(())
    }

    /// Required-ness check: blank text and empty selections do not count.
    pub fn is_answered(&self, question: &QuestionId) -> bool {
        match self.values.get(question) {
            None => false,
            Some(AnswerValue::Text(text)) => !text.trim().is_empty(),
            Some(AnswerValue::List(items)) => !items.is_empty(),
            Some(AnswerValue::Boolean(_)) | Some(AnswerValue::Number(_)) => true,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&QuestionId, &AnswerValue)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn ensure_offered(question: &Question, option: &str) -> Result<(), AnswerError> {
    let id = OptionId(option.to_string());
    if question.option(&id).is_some() {
        Ok(())
    } else {
        Err(AnswerError::UnknownOption {
            question: question.id.clone(),
            option: id,
        })
    }
}
