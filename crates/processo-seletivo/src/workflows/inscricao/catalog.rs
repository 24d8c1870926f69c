use serde::Serialize;

use super::domain::{Question, QuestionId};

/// Drop inactive questions and options, then order both by `order`.
///
/// Sorting is stable, so equal `order` values keep their incoming sequence
/// and normalizing an already normalized list returns it unchanged.
pub fn normalize_catalog(questions: Vec<Question>) -> Vec<Question> {
    let mut active: Vec<Question> = questions
        .into_iter()
        .filter(|question| question.active)
        .map(|mut question| {
            question.options.retain(|option| option.active);
            question.options.sort_by_key(|option| option.order);
            question
        })
        .collect();

    active.sort_by_key(|question| question.order);
    active
}

/// Render-ready question list of one process.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct QuestionCatalog {
    questions: Vec<Question>,
}

impl QuestionCatalog {
    pub fn new(questions: Vec<Question>) -> Self {
        Self {
            questions: normalize_catalog(questions),
        }
    }

    pub fn get(&self, id: &QuestionId) -> Option<&Question> {
        self.questions.iter().find(|question| &question.id == id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Question> {
        self.questions.iter()
    }

    pub fn required(&self) -> impl Iterator<Item = &Question> {
        self.questions.iter().filter(|question| question.required)
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

impl<'a> IntoIterator for &'a QuestionCatalog {
    type Item = &'a Question;
    type IntoIter = std::slice::Iter<'a, Question>;

    fn into_iter(self) -> Self::IntoIter {
        self.questions.iter()
    }
}
