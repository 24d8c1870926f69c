//! Per-question controls and coercion of raw UI input into answers.
//!
//! Coercion never reports malformed numbers or dates: they become unset, and
//! required questions are only enforced when the inscription is submitted.

use chrono::NaiveDate;
use serde::Serialize;

use super::answers::{AnswerError, AnswerValue};
use super::domain::{OptionId, Question, QuestionId, QuestionType};

/// Character limits applied to free text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldLimits {
    /// TEXTO answers of an inscription.
    pub text_max_len: usize,
    /// Generic text areas around the form (address complement and similar).
    pub text_area_max_len: usize,
}

impl Default for FieldLimits {
    fn default() -> Self {
        Self {
            text_max_len: 500,
            text_area_max_len: 250,
        }
    }
}

/// Raw event emitted by a control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldInput {
    /// Yes/no radio choice.
    YesNo(bool),
    /// Contents of a text, number or date input.
    Text(String),
    /// Option picked in a single-choice select. An empty id is the placeholder.
    Choose(OptionId),
    /// Checkbox flipped in a multiple-choice list.
    Toggle(OptionId),
}

impl FieldInput {
    const fn label(&self) -> &'static str {
        match self {
            FieldInput::YesNo(_) => "yes/no choice",
            FieldInput::Text(_) => "text",
            FieldInput::Choose(_) => "option choice",
            FieldInput::Toggle(_) => "option toggle",
        }
    }
}

/// Coerce `input` for `question` given its `current` answer.
///
/// `Ok(None)` means the field is now unset.
pub fn coerce(
    question: &Question,
    current: Option<&AnswerValue>,
    input: FieldInput,
    limits: &FieldLimits,
) -> Result<Option<AnswerValue>, AnswerError> {
    match question.kind {
        QuestionType::Boolean => match input {
            FieldInput::YesNo(value) => Ok(Some(AnswerValue::Boolean(value))),
            other => Err(mismatch(question, &other)),
        },
        QuestionType::Numero => match input {
            FieldInput::Text(raw) => Ok(parse_number(&raw).map(AnswerValue::Number)),
            other => Err(mismatch(question, &other)),
        },
        QuestionType::Texto => match input {
            FieldInput::Text(raw) => Ok(Some(AnswerValue::Text(truncate_chars(
                &raw,
                limits.text_max_len,
            )))),
            other => Err(mismatch(question, &other)),
        },
        QuestionType::Data => match input {
            FieldInput::Text(raw) => Ok(normalize_date(&raw).map(AnswerValue::Text)),
            other => Err(mismatch(question, &other)),
        },
        QuestionType::Select => match input {
            FieldInput::Choose(option) => {
                if option.as_str().trim().is_empty() {
                    return Err(AnswerError::PlaceholderSelected(question.id.clone()));
                }
                offered(question, &option)?;
                Ok(Some(AnswerValue::Text(option.0)))
            }
            other => Err(mismatch(question, &other)),
        },
        QuestionType::Multiselect => match input {
            FieldInput::Toggle(option) => {
                offered(question, &option)?;
                let selected = match current {
                    Some(AnswerValue::List(items)) => items.clone(),
                    _ => Vec::new(),
                };
                let toggled = toggle_option(selected, option.as_str());
                Ok((!toggled.is_empty()).then_some(AnswerValue::List(toggled)))
            }
            other => Err(mismatch(question, &other)),
        },
    }
}

fn mismatch(question: &Question, input: &FieldInput) -> AnswerError {
    AnswerError::ShapeMismatch {
        question: question.id.clone(),
        expected: question.kind.label(),
        found: input.label(),
    }
}

fn offered(question: &Question, option: &OptionId) -> Result<(), AnswerError> {
    match question.option(option) {
        Some(_) => Ok(()),
        None => Err(AnswerError::UnknownOption {
            question: question.id.clone(),
            option: option.clone(),
        }),
    }
}

/// Parse numeric text. Empty, non-numeric and non-finite input is unset.
pub fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|value| value.is_finite())
}

/// Date portion of a stored value: everything before a `T`, if any.
pub fn display_date(stored: &str) -> &str {
    match stored.split_once('T') {
        Some((date, _)) => date,
        None => stored,
    }
}

/// Normalize date input to `YYYY-MM-DD`; empty or invalid input is unset.
pub fn normalize_date(raw: &str) -> Option<String> {
    let candidate = display_date(raw.trim());
    if candidate.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(candidate, "%Y-%m-%d")
        .ok()
        .map(|date| date.format("%Y-%m-%d").to_string())
}

/// Truncate to at most `max` characters without splitting a code point.
pub fn truncate_chars(raw: &str, max: usize) -> String {
    match raw.char_indices().nth(max) {
        Some((cut, _)) => raw[..cut].to_string(),
        None => raw.to_string(),
    }
}

/// Add `option` when absent, remove it when present. Others keep their order.
pub fn toggle_option(mut selected: Vec<String>, option: &str) -> Vec<String> {
    if selected.iter().any(|item| item == option) {
        selected.retain(|item| item != option);
    } else {
        selected.push(option.to_string());
    }
    selected
}

/// What the view needs to draw one question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldView {
    pub question_id: QuestionId,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub required: bool,
    pub control: FieldControl,
}

impl FieldView {
    /// Title with the required marker appended.
    pub fn label(&self) -> String {
        if self.required {
            format!("{} *", self.title)
        } else {
            self.title.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "control", rename_all = "snake_case")]
pub enum FieldControl {
    YesNo {
        selected: Option<bool>,
    },
    Number {
        value: String,
    },
    TextArea {
        value: String,
        max_len: usize,
    },
    Date {
        value: String,
    },
    Select {
        placeholder: &'static str,
        options: Vec<ChoiceView>,
    },
    Checklist {
        options: Vec<ChoiceView>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChoiceView {
    pub id: OptionId,
    pub label: String,
    pub selected: bool,
}

pub const SELECT_PLACEHOLDER: &str = "Selecione uma opção";

/// Build the control for `question` showing `answer`.
pub fn render(
    question: &Question,
    answer: Option<&AnswerValue>,
    limits: &FieldLimits,
) -> FieldView {
    let control = match question.kind {
        QuestionType::Boolean => FieldControl::YesNo {
            selected: match answer {
                Some(AnswerValue::Boolean(value)) => Some(*value),
                _ => None,
            },
        },
        QuestionType::Numero => FieldControl::Number {
            value: match answer {
                Some(AnswerValue::Number(value)) => value.to_string(),
                _ => String::new(),
            },
        },
        QuestionType::Texto => FieldControl::TextArea {
            value: text_of(answer).to_string(),
            max_len: limits.text_max_len,
        },
        QuestionType::Data => FieldControl::Date {
            value: display_date(text_of(answer)).to_string(),
        },
        QuestionType::Select => {
            let selected = text_of(answer);
            FieldControl::Select {
                placeholder: SELECT_PLACEHOLDER,
                options: choices(question, |id| id == selected),
            }
        }
        QuestionType::Multiselect => {
            let selected: &[String] = match answer {
                Some(AnswerValue::List(items)) => items.as_slice(),
                _ => &[],
            };
            FieldControl::Checklist {
                options: choices(question, |id| selected.iter().any(|item| item == id)),
            }
        }
    };

    FieldView {
        question_id: question.id.clone(),
        title: question.title.clone(),
        description: question.description.clone(),
        required: question.required,
        control,
    }
}

fn text_of(answer: Option<&AnswerValue>) -> &str {
    match answer {
        Some(AnswerValue::Text(text)) => text,
        _ => "",
    }
}

fn choices(question: &Question, is_selected: impl Fn(&str) -> bool) -> Vec<ChoiceView> {
    question
        .options
        .iter()
        .map(|option| ChoiceView {
            id: option.id.clone(),
            label: option.label.clone(),
            selected: is_selected(option.id.as_str()),
        })
        .collect()
}
