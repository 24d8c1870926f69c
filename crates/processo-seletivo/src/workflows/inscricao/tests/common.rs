use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::StatusCode;
use tokio::sync::Notify;

use crate::workflows::inscricao::{
    ApiError, AnswerPayload, CreateDraftRequest, DraftCache, FieldLimits, InscricaoApi,
    InscricaoController, InscricaoId, Inscription, InscriptionStatus, OptionId, Position,
    PositionId, ProcessDefinition, ProcessId, Question, QuestionId, QuestionOption, QuestionType,
    RecordingNotifier, SubmitReceipt,
};

pub(super) fn question(id: &str, kind: QuestionType, order: i32) -> Question {
    Question {
        id: QuestionId::from(id),
        title: format!("Pergunta {id}"),
        description: None,
        kind,
        required: false,
        order,
        active: true,
        options: Vec::new(),
    }
}

pub(super) fn option(id: &str, order: i32, active: bool) -> QuestionOption {
    QuestionOption {
        id: OptionId::from(id),
        label: format!("Opção {id}"),
        value: id.to_uppercase(),
        order,
        active,
    }
}

fn positions() -> Vec<Position> {
    vec![
        Position {
            id: PositionId::from("v1"),
            name: "Analista de Sistemas".to_string(),
            description: None,
        },
        Position {
            id: PositionId::from("v2"),
            name: "Técnico Administrativo".to_string(),
            description: None,
        },
    ]
}

/// Required BOOLEAN `q-bool` followed by optional TEXTO `q-text`.
pub(super) fn two_question_process() -> ProcessDefinition {
    let mut cnh = question("q-bool", QuestionType::Boolean, 1);
    cnh.required = true;
    let notes = question("q-text", QuestionType::Texto, 2);

    ProcessDefinition {
        id: ProcessId::from("p1"),
        title: "Processo Seletivo 01/2025".to_string(),
        positions: positions(),
        questions: vec![notes, cnh],
    }
}

/// One question of every type, in type declaration order.
pub(super) fn full_process() -> ProcessDefinition {
    let mut select = question("q-select", QuestionType::Select, 4);
    select.options = vec![option("a", 2, true), option("b", 1, true), option("c", 0, false)];
    let mut multi = question("q-multi", QuestionType::Multiselect, 5);
    multi.options = vec![option("x", 0, true), option("y", 1, true), option("z", 2, true)];

    ProcessDefinition {
        id: ProcessId::from("p2"),
        title: "Processo Seletivo 02/2025".to_string(),
        positions: positions(),
        questions: vec![
            question("q-bool", QuestionType::Boolean, 1),
            question("q-num", QuestionType::Numero, 2),
            question("q-text", QuestionType::Texto, 3),
            select,
            multi,
            question("q-date", QuestionType::Data, 6),
        ],
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(super) enum Call {
    FetchProcess,
    FindDraft(PositionId),
    CreateDraft(PositionId),
    SaveAnswers(InscricaoId, Vec<AnswerPayload>),
    Submit(InscricaoId),
}

/// In-memory backend recording every call.
pub(super) struct FakeApi {
    process: ProcessDefinition,
    drafts: Mutex<HashMap<InscricaoId, Inscription>>,
    calls: Mutex<Vec<Call>>,
    failures: Mutex<HashMap<&'static str, StatusCode>>,
    save_gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeApi {
    pub(super) fn new(process: ProcessDefinition) -> Self {
        Self {
            process,
            drafts: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            save_gate: Mutex::new(None),
        }
    }

    pub(super) fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("calls mutex poisoned").clone()
    }

    pub(super) fn count(&self, matcher: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|call| matcher(call)).count()
    }

    /// Make the next call of `operation` answer with `status`.
    pub(super) fn fail_next(&self, operation: &'static str, status: StatusCode) {
        self.failures
            .lock()
            .expect("failures mutex poisoned")
            .insert(operation, status);
    }

    /// Park every save until the returned handle is notified.
    pub(super) fn hold_saves(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.save_gate.lock().expect("gate mutex poisoned") = Some(gate.clone());
        gate
    }

    pub(super) fn seed_draft(&self, draft: Inscription) {
        self.drafts
            .lock()
            .expect("drafts mutex poisoned")
            .insert(draft.id.clone(), draft);
    }

    fn record(&self, call: Call) {
        self.calls.lock().expect("calls mutex poisoned").push(call);
    }

    fn injected(&self, operation: &'static str) -> Result<(), ApiError> {
        match self
            .failures
            .lock()
            .expect("failures mutex poisoned")
            .remove(operation)
        {
            Some(status) => Err(ApiError::from_status(
                status,
                r#"{"message":"injected failure"}"#,
            )),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl InscricaoApi for FakeApi {
    async fn fetch_process(&self, process: &ProcessId) -> Result<ProcessDefinition, ApiError> {
        self.record(Call::FetchProcess);
        self.injected("fetch")?;
        if process == &self.process.id {
            Ok(self.process.clone())
        } else {
            Err(ApiError::NotFound)
        }
    }

    async fn find_draft(
        &self,
        _process: &ProcessId,
        position: &PositionId,
    ) -> Result<Option<Inscription>, ApiError> {
        tokio::task::yield_now().await;
        self.record(Call::FindDraft(position.clone()));
        self.injected("find")?;
        Ok(self
            .drafts
            .lock()
            .expect("drafts mutex poisoned")
            .values()
            .find(|draft| draft.position_id.as_ref() == Some(position))
            .cloned())
    }

    async fn create_draft(
        &self,
        process: &ProcessId,
        request: &CreateDraftRequest,
    ) -> Result<Inscription, ApiError> {
        tokio::task::yield_now().await;
        self.record(Call::CreateDraft(request.position_id.clone()));
        self.injected("create")?;

        let mut drafts = self.drafts.lock().expect("drafts mutex poisoned");
        let draft = Inscription {
            id: InscricaoId(format!("insc-{}", drafts.len() + 1)),
            process_id: process.clone(),
            position_id: Some(request.position_id.clone()),
            status: InscriptionStatus::Rascunho,
            total_score: None,
            answers: Vec::new(),
        };
        drafts.insert(draft.id.clone(), draft.clone());
        Ok(draft)
    }

    async fn save_answers(
        &self,
        _process: &ProcessId,
        inscricao: &InscricaoId,
        answers: &[AnswerPayload],
    ) -> Result<Inscription, ApiError> {
        self.record(Call::SaveAnswers(inscricao.clone(), answers.to_vec()));
        let gate = self.save_gate.lock().expect("gate mutex poisoned").clone();
        match gate {
            Some(gate) => gate.notified().await,
            None => tokio::task::yield_now().await,
        }
        self.injected("save")?;

        let mut drafts = self.drafts.lock().expect("drafts mutex poisoned");
        let draft = drafts.get_mut(inscricao).ok_or(ApiError::NotFound)?;
        draft.answers = answers.to_vec();
        Ok(draft.clone())
    }

    async fn submit(
        &self,
        _process: &ProcessId,
        inscricao: &InscricaoId,
    ) -> Result<SubmitReceipt, ApiError> {
        tokio::task::yield_now().await;
        self.record(Call::Submit(inscricao.clone()));
        self.injected("submit")?;

        let mut drafts = self.drafts.lock().expect("drafts mutex poisoned");
        let draft = drafts.get_mut(inscricao).ok_or(ApiError::NotFound)?;
        draft.status = InscriptionStatus::Enviada;
        let score = draft.answers.len() as f64;
        draft.total_score = Some(score);
        Ok(SubmitReceipt {
            status: draft.status,
            total_score: score,
        })
    }
}

pub(super) struct Harness {
    pub api: Arc<FakeApi>,
    pub notifier: Arc<RecordingNotifier>,
    pub cache: Arc<DraftCache>,
    pub controller: InscricaoController<FakeApi, RecordingNotifier>,
}

pub(super) fn harness(process: ProcessDefinition) -> Harness {
    let api = Arc::new(FakeApi::new(process.clone()));
    let notifier = Arc::new(RecordingNotifier::default());
    let cache = Arc::new(DraftCache::new());
    let controller = InscricaoController::from_definition(
        api.clone(),
        notifier.clone(),
        cache.clone(),
        process,
        FieldLimits::default(),
    );

    Harness {
        api,
        notifier,
        cache,
        controller,
    }
}
