//! Typed inscription form engine.
//!
//! A process definition is normalized into a question catalog, every question
//! renders to one control whose events are coerced into typed answers, and
//! the lifecycle controller saves and submits those answers against the
//! backend through [`InscricaoApi`].

pub mod answers;
pub mod cache;
pub mod catalog;
pub mod client;
pub mod domain;
pub mod fields;
pub mod lifecycle;
pub mod notify;
pub mod payload;
pub mod validation;

#[cfg(test)]
mod tests;

pub use answers::{AnswerError, AnswerMap, AnswerValue};
pub use cache::{DraftCache, DraftKey};
pub use catalog::{normalize_catalog, QuestionCatalog};
pub use client::{ApiError, CreateDraftRequest, HttpInscricaoApi, InscricaoApi, SaveAnswersRequest};
pub use domain::{
    FormCapabilities, InscricaoId, Inscription, InscriptionStatus, OptionId, Position, PositionId,
    ProcessDefinition, ProcessId, Question, QuestionId, QuestionOption, QuestionType,
    SubmitReceipt,
};
pub use fields::{
    coerce, render, ChoiceView, FieldControl, FieldInput, FieldLimits, FieldView,
    SELECT_PLACEHOLDER,
};
pub use lifecycle::{InscricaoController, InscricaoError, LifecycleState};
pub use notify::{
    Notification, NotificationLevel, Notifier, RecordingNotifier, TracingNotifier, UserAction,
};
pub use payload::{build_payload, interpret_payload, AnswerPayload};
pub use validation::{check_submission, missing_required, SubmissionBlocker};
