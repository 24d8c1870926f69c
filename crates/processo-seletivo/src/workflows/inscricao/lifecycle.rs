//! Start, save and submit of one candidate's inscription.
//!
//! The controller owns the answer map of a form session. Saves and submits
//! for the session go through a single in-flight guard: a save waits for the
//! previous request to finish, while a submit (or a position switch) is
//! refused as busy instead of queueing behind it.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use super::answers::{AnswerError, AnswerMap, AnswerValue};
use super::cache::{DraftCache, DraftKey};
use super::catalog::QuestionCatalog;
use super::client::{ApiError, CreateDraftRequest, InscricaoApi};
use super::domain::{
    FormCapabilities, InscricaoId, Inscription, InscriptionStatus, PositionId, ProcessDefinition,
    ProcessId, QuestionId, SubmitReceipt,
};
use super::fields::{coerce, render, FieldInput, FieldLimits, FieldView};
use super::notify::{Notification, Notifier, UserAction};
use super::payload::{build_payload, interpret_payload, AnswerPayload};
use super::validation::{check_submission, missing_required, SubmissionBlocker};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleState {
    NoDraft,
    DraftLoading,
    DraftReady,
    Saving,
    Submitting,
    Submitted,
}

impl LifecycleState {
    pub const fn is_pending(self) -> bool {
        matches!(
            self,
            LifecycleState::DraftLoading | LifecycleState::Saving | LifecycleState::Submitting
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InscricaoError {
    #[error(transparent)]
    Blocked(#[from] SubmissionBlocker),
    #[error(transparent)]
    Answer(#[from] AnswerError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("position {0} is not offered by this process")]
    UnknownPosition(PositionId),
    #[error("inscription is no longer editable")]
    ReadOnly,
    #[error("another request for this inscription is still in flight")]
    Busy,
}

impl InscricaoError {
    /// Caught before any request reached the backend.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            InscricaoError::Blocked(_)
                | InscricaoError::Answer(_)
                | InscricaoError::UnknownPosition(_)
                | InscricaoError::ReadOnly
        )
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            InscricaoError::Api(err) => err.is_retryable(),
            InscricaoError::Busy => true,
            _ => false,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            InscricaoError::Blocked(SubmissionBlocker::NoPositionSelected) => {
                "Select a position before continuing.".to_string()
            }
            InscricaoError::Blocked(SubmissionBlocker::MissingRequired(missing)) => format!(
                "Answer every required question before sending ({} pending).",
                missing.len()
            ),
            InscricaoError::Answer(err) => err.to_string(),
            InscricaoError::Api(err) => err.user_message(),
            InscricaoError::UnknownPosition(_) => {
                "The selected position is not available in this process.".to_string()
            }
            InscricaoError::ReadOnly => {
                "This inscription was already sent and can no longer be changed.".to_string()
            }
            InscricaoError::Busy => "Please wait for the current request to finish.".to_string(),
        }
    }
}

#[derive(Debug)]
struct FormSession {
    state: LifecycleState,
    position: Option<PositionId>,
    draft: Option<Inscription>,
    answers: AnswerMap,
}

/// Drives one candidate's inscription in one process.
pub struct InscricaoController<A, N> {
    api: Arc<A>,
    notifier: Arc<N>,
    cache: Arc<DraftCache>,
    process: ProcessDefinition,
    catalog: QuestionCatalog,
    limits: FieldLimits,
    snapshot: Map<String, Value>,
    session: Mutex<FormSession>,
    in_flight: tokio::sync::Mutex<()>,
}

impl<A, N> InscricaoController<A, N>
where
    A: InscricaoApi + 'static,
    N: Notifier + 'static,
{
    /// Fetch the process definition and start an empty session.
    pub async fn open(
        api: Arc<A>,
        notifier: Arc<N>,
        cache: Arc<DraftCache>,
        process_id: &ProcessId,
        limits: FieldLimits,
    ) -> Result<Self, InscricaoError> {
        match api.fetch_process(process_id).await {
            Ok(process) => Ok(Self::from_definition(api, notifier, cache, process, limits)),
            Err(err) => {
                let err = InscricaoError::from(err);
                warn!(process = %process_id, error = %err, "process definition unavailable");
                notifier.notify(Notification::error(UserAction::LoadProcess, &err));
                Err(err)
            }
        }
    }

    pub fn from_definition(
        api: Arc<A>,
        notifier: Arc<N>,
        cache: Arc<DraftCache>,
        process: ProcessDefinition,
        limits: FieldLimits,
    ) -> Self {
        let catalog = QuestionCatalog::new(process.questions.clone());
        let answers = AnswerMap::seeded(&catalog);

        Self {
            api,
            notifier,
            cache,
            process,
            catalog,
            limits,
            snapshot: Map::new(),
            session: Mutex::new(FormSession {
                state: LifecycleState::NoDraft,
                position: None,
                draft: None,
                answers,
            }),
            in_flight: tokio::sync::Mutex::new(()),
        }
    }

    /// Candidate fields sent along when the draft is created.
    pub fn with_snapshot(mut self, snapshot: Map<String, Value>) -> Self {
        self.snapshot = snapshot;
        self
    }

    fn session(&self) -> MutexGuard<'_, FormSession> {
        self.session.lock().expect("form session mutex poisoned")
    }

    pub fn process(&self) -> &ProcessDefinition {
        &self.process
    }

    pub fn catalog(&self) -> &QuestionCatalog {
        &self.catalog
    }

    pub fn state(&self) -> LifecycleState {
        self.session().state
    }

    pub fn position(&self) -> Option<PositionId> {
        self.session().position.clone()
    }

    pub fn draft(&self) -> Option<Inscription> {
        self.session().draft.clone()
    }

    pub fn status(&self) -> Option<InscriptionStatus> {
        self.session().draft.as_ref().map(|draft| draft.status)
    }

    pub fn answers(&self) -> AnswerMap {
        self.session().answers.clone()
    }

    pub fn answer(&self, question: &QuestionId) -> Option<AnswerValue> {
        self.session().answers.get(question).cloned()
    }

    pub fn capabilities(&self) -> FormCapabilities {
        let session = self.session();
        Self::capabilities_of(&session)
    }

    fn capabilities_of(session: &FormSession) -> FormCapabilities {
        let status = match session.state {
            LifecycleState::Submitted => Some(
                session
                    .draft
                    .as_ref()
                    .map_or(InscriptionStatus::Enviada, |draft| draft.status),
            ),
            _ => session.draft.as_ref().map(|draft| draft.status),
        };
        FormCapabilities::derive(status, session.position.is_some(), session.state.is_pending())
    }

    /// Controls for every catalog question with the current answers.
    pub fn fields(&self) -> Vec<FieldView> {
        let session = self.session();
        self.catalog
            .iter()
            .map(|question| render(question, session.answers.get(&question.id), &self.limits))
            .collect()
    }

    pub fn payload(&self) -> Vec<AnswerPayload> {
        build_payload(&self.catalog, &self.session().answers)
    }

    pub fn missing_required(&self) -> Vec<QuestionId> {
        missing_required(&self.catalog, &self.session().answers)
    }

    /// Apply one control event. Field-level problems are returned, not notified.
    pub fn set_answer(
        &self,
        question: &QuestionId,
        input: FieldInput,
    ) -> Result<Option<AnswerValue>, InscricaoError> {
        let mut session = self.session();
        if !Self::capabilities_of(&session).editable {
            return Err(InscricaoError::ReadOnly);
        }

        let question = self
            .catalog
            .get(question)
            .ok_or_else(|| AnswerError::UnknownQuestion(question.clone()))?;
        let value = coerce(question, session.answers.get(&question.id), input, &self.limits)?;
        session.answers.set(question, value.clone())?;
        Ok(value)
    }

    /// Choose the position and load its draft, from cache or backend.
    ///
    /// Without a stored draft the current answers are kept and the draft is
    /// created by the first save.
    pub async fn select_position(&self, position: PositionId) -> Result<(), InscricaoError> {
        let result = match self.in_flight.try_lock() {
            Ok(_guard) => self.load_draft(position).await,
            Err(_) => Err(InscricaoError::Busy),
        };
        result.map_err(|err| self.fail(UserAction::LoadDraft, err))
    }

    async fn load_draft(&self, position: PositionId) -> Result<(), InscricaoError> {
        if self.process.position(&position).is_none() {
            return Err(InscricaoError::UnknownPosition(position));
        }

        let key = DraftKey::new(self.process.id.clone(), position.clone());
        {
            let mut session = self.session();
            if session.state == LifecycleState::Submitted {
                return Err(InscricaoError::ReadOnly);
            }
            if let Some(draft) = self.cache.get(&key) {
                self.hydrate(&mut session, position, Some(draft));
                return Ok(());
            }
            session.state = LifecycleState::DraftLoading;
        }

        match self.api.find_draft(&self.process.id, &position).await {
            Ok(found) => {
                if let Some(draft) = &found {
                    self.cache.store(key, draft.clone());
                }
                let mut session = self.session();
                self.hydrate(&mut session, position, found);
                Ok(())
            }
            Err(err) => {
                let mut session = self.session();
                session.state = if session.position.is_some() {
                    LifecycleState::DraftReady
                } else {
                    LifecycleState::NoDraft
                };
                Err(err.into())
            }
        }
    }

    fn hydrate(&self, session: &mut FormSession, position: PositionId, draft: Option<Inscription>) {
        session.position = Some(position);
        session.state = LifecycleState::DraftReady;

        let Some(draft) = draft else {
            session.draft = None;
            return;
        };

        session.answers = interpret_payload(
            &self.catalog,
            &draft.answers,
            AnswerMap::seeded(&self.catalog),
        );
        if !draft.status.is_editable() {
            session.state = LifecycleState::Submitted;
        }
        session.draft = Some(draft);
    }

    /// Persist the current answers, creating the draft on first use.
    pub async fn save(&self) -> Result<Inscription, InscricaoError> {
        let result = {
            let _guard = self.in_flight.lock().await;
            let result = self.persist(LifecycleState::Saving).await;
            if result.is_ok() {
                self.session().state = LifecycleState::DraftReady;
            }
            result
        };

        match result {
            Ok(draft) => {
                self.notifier
                    .notify(Notification::success(UserAction::Save, "Answers saved."));
                Ok(draft)
            }
            Err(err) => Err(self.fail(UserAction::Save, err)),
        }
    }

    /// Save the latest answers, then send the inscription.
    pub async fn submit(&self) -> Result<SubmitReceipt, InscricaoError> {
        let result = match self.in_flight.try_lock() {
            Ok(_guard) => self.send_inscription().await,
            Err(_) => Err(InscricaoError::Busy),
        };

        match result {
            Ok(receipt) => {
                info!(
                    process = %self.process.id,
                    status = receipt.status.label(),
                    total_score = receipt.total_score,
                    "inscription submitted"
                );
                self.notifier.notify(Notification::success(
                    UserAction::Submit,
                    format!("Inscription sent. Total score: {}", receipt.total_score),
                ));
                Ok(receipt)
            }
            Err(err) => Err(self.fail(UserAction::Submit, err)),
        }
    }

    async fn send_inscription(&self) -> Result<SubmitReceipt, InscricaoError> {
        let draft = self.persist(LifecycleState::Submitting).await?;

        let receipt = match self.api.submit(&self.process.id, &draft.id).await {
            Ok(receipt) => receipt,
            Err(err) => {
                self.session().state = LifecycleState::DraftReady;
                return Err(err.into());
            }
        };

        let mut sent = draft;
        sent.status = receipt.status;
        sent.total_score = Some(receipt.total_score);

        let mut session = self.session();
        session.state = if receipt.status.is_editable() {
            LifecycleState::DraftReady
        } else {
            LifecycleState::Submitted
        };
        self.refresh_cache(session.position.clone(), &sent);
        session.draft = Some(sent);
        Ok(receipt)
    }

    /// Push the answer payload, leaving the session in `transient` meanwhile.
    /// On failure the session returns to `DraftReady` with its answers intact.
    async fn persist(&self, transient: LifecycleState) -> Result<Inscription, InscricaoError> {
        let (position, draft_id, payload) = {
            let mut session = self.session();
            if !Self::capabilities_of(&session).editable {
                return Err(InscricaoError::ReadOnly);
            }
            if transient == LifecycleState::Submitting {
                check_submission(&self.catalog, &session.answers, session.position.as_ref())?;
            }
            let position = session
                .position
                .clone()
                .ok_or(SubmissionBlocker::NoPositionSelected)?;

            session.state = transient;
            (
                position,
                session.draft.as_ref().map(|draft| draft.id.clone()),
                build_payload(&self.catalog, &session.answers),
            )
        };

        let result = self.push_answers(position, draft_id, &payload).await;
        if result.is_err() {
            self.session().state = LifecycleState::DraftReady;
        }
        result
    }

    async fn push_answers(
        &self,
        position: PositionId,
        draft_id: Option<InscricaoId>,
        payload: &[AnswerPayload],
    ) -> Result<Inscription, InscricaoError> {
        let draft_id = match draft_id {
            Some(id) => id,
            None => {
                let request = CreateDraftRequest {
                    position_id: position.clone(),
                    snapshot: self.snapshot.clone(),
                };
                let created = self.api.create_draft(&self.process.id, &request).await?;
                info!(process = %self.process.id, inscricao = %created.id, "draft created");

                let id = created.id.clone();
                self.refresh_cache(Some(position.clone()), &created);
                self.session().draft = Some(created);
                id
            }
        };

        let saved = self
            .api
            .save_answers(&self.process.id, &draft_id, payload)
            .await?;

        self.refresh_cache(Some(position), &saved);
        self.session().draft = Some(saved.clone());
        Ok(saved)
    }

    fn refresh_cache(&self, position: Option<PositionId>, draft: &Inscription) {
        let Some(position) = position else {
            return;
        };
        let key = DraftKey::new(self.process.id.clone(), position);
        self.cache.invalidate(&key);
        self.cache.store(key, draft.clone());
    }

    fn fail(&self, action: UserAction, err: InscricaoError) -> InscricaoError {
        warn!(
            process = %self.process.id,
            action = action.label(),
            error = %err,
            "inscription action failed"
        );
        self.notifier.notify(Notification::error(action, &err));
        err
    }
}
