use serde::{Deserialize, Serialize};
use tracing::warn;

use super::answers::{AnswerMap, AnswerValue};
use super::catalog::QuestionCatalog;
use super::domain::{OptionId, QuestionId, QuestionType};
use super::fields::normalize_date;

/// Wire answer for one question.
///
/// Only the field matching the question type is serialized. The outer
/// `Option` controls presence, the inner one carries `null` for unanswered
/// questions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerPayload {
    #[serde(rename = "id_pergunta")]
    pub question_id: QuestionId,
    #[serde(rename = "valor_boolean", default, skip_serializing_if = "Option::is_none")]
    pub boolean: Option<Option<bool>>,
    #[serde(rename = "valor_numero", default, skip_serializing_if = "Option::is_none")]
    pub number: Option<Option<f64>>,
    #[serde(rename = "valor_texto", default, skip_serializing_if = "Option::is_none")]
    pub text: Option<Option<String>>,
    #[serde(rename = "valor_data", default, skip_serializing_if = "Option::is_none")]
    pub date: Option<Option<String>>,
    #[serde(rename = "opcao_id", default, skip_serializing_if = "Option::is_none")]
    pub choice: Option<Option<OptionId>>,
    #[serde(rename = "opcoes_ids", default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<Option<Vec<OptionId>>>,
}

impl AnswerPayload {
    fn bare(question_id: QuestionId) -> Self {
        Self {
            question_id,
            boolean: None,
            number: None,
            text: None,
            date: None,
            choice: None,
            choices: None,
        }
    }

    /// Payload of an unanswered question: its own field present and `null`.
    pub fn unanswered(question_id: QuestionId, kind: QuestionType) -> Self {
        Self::for_answer(question_id, kind, None)
    }

    /// Shape `answer` for a question of type `kind`. Values of the wrong
    /// shape are sent as `null`.
    pub fn for_answer(
        question_id: QuestionId,
        kind: QuestionType,
        answer: Option<&AnswerValue>,
    ) -> Self {
        let answer = answer.filter(|value| value.fits(kind));
        let mut payload = Self::bare(question_id);
        match kind {
            QuestionType::Boolean => {
                payload.boolean = Some(match answer {
                    Some(AnswerValue::Boolean(value)) => Some(*value),
                    _ => None,
                });
            }
            QuestionType::Numero => {
                payload.number = Some(match answer {
                    Some(AnswerValue::Number(value)) => Some(*value),
                    _ => None,
                });
            }
            QuestionType::Texto => payload.text = Some(text_value(answer)),
            QuestionType::Data => payload.date = Some(text_value(answer)),
            QuestionType::Select => payload.choice = Some(text_value(answer).map(OptionId)),
            QuestionType::Multiselect => {
                payload.choices = Some(match answer {
                    Some(AnswerValue::List(items)) => {
                        Some(items.iter().map(|item| OptionId(item.clone())).collect())
                    }
                    _ => None,
                });
            }
        }
        payload
    }

    /// Read the answer back for a question of type `kind`.
    pub fn answer(&self, kind: QuestionType) -> Option<AnswerValue> {
        match kind {
            QuestionType::Boolean => self.boolean.flatten().map(AnswerValue::Boolean),
            QuestionType::Numero => self
                .number
                .flatten()
                .filter(|value| value.is_finite())
                .map(AnswerValue::Number),
            QuestionType::Texto => self.text.clone().flatten().map(AnswerValue::Text),
            QuestionType::Data => self
                .date
                .as_ref()
                .and_then(|value| value.as_deref())
                .and_then(normalize_date)
                .map(AnswerValue::Text),
            QuestionType::Select => self
                .choice
                .clone()
                .flatten()
                .map(|option| AnswerValue::Text(option.0)),
            QuestionType::Multiselect => self
                .choices
                .clone()
                .flatten()
                .filter(|items| !items.is_empty())
                .map(|items| AnswerValue::List(items.into_iter().map(|item| item.0).collect())),
        }
    }
}

fn text_value(answer: Option<&AnswerValue>) -> Option<String> {
    match answer {
        Some(AnswerValue::Text(text)) => Some(text.clone()),
        _ => None,
    }
}

/// One payload per catalog question, in catalog order, answered or not.
pub fn build_payload(catalog: &QuestionCatalog, answers: &AnswerMap) -> Vec<AnswerPayload> {
    catalog
        .iter()
        .map(|question| {
            AnswerPayload::for_answer(question.id.clone(), question.kind, answers.get(&question.id))
        })
        .collect()
}

/// Rebuild an answer map from stored payloads on top of `base`.
///
/// Payloads for questions outside the catalog, or whose values no longer fit
/// it (an option that was deactivated, say), are skipped.
pub fn interpret_payload(
    catalog: &QuestionCatalog,
    payloads: &[AnswerPayload],
    base: AnswerMap,
) -> AnswerMap {
    let mut answers = base;
    for payload in payloads {
        let Some(question) = catalog.get(&payload.question_id) else {
            warn!(question = %payload.question_id, "stored answer for unknown question ignored");
            continue;
        };
        let Some(value) = payload.answer(question.kind) else {
            continue;
        };
        if let Err(err) = answers.set(question, Some(value)) {
            warn!(question = %question.id, error = %err, "stored answer no longer fits question");
        }
    }
    answers
}
