use super::answers::AnswerMap;
use super::catalog::QuestionCatalog;
use super::domain::{PositionId, QuestionId};

/// Client-side reasons that keep an inscription from being sent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmissionBlocker {
    #[error("select a position before continuing")]
    NoPositionSelected,
    #[error("{} required question(s) still unanswered", .0.len())]
    MissingRequired(Vec<QuestionId>),
}

/// Required questions without a usable answer, in catalog order.
pub fn missing_required(catalog: &QuestionCatalog, answers: &AnswerMap) -> Vec<QuestionId> {
    catalog
        .required()
        .filter(|question| !answers.is_answered(&question.id))
        .map(|question| question.id.clone())
        .collect()
}

pub fn check_submission(
    catalog: &QuestionCatalog,
    answers: &AnswerMap,
    position: Option<&PositionId>,
) -> Result<(), SubmissionBlocker> {
    if position.is_none() {
        return Err(SubmissionBlocker::NoPositionSelected);
    }

    let missing = missing_required(catalog, answers);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(SubmissionBlocker::MissingRequired(missing))
    }
}
