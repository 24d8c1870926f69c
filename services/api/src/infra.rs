use metrics_exporter_prometheus::PrometheusHandle;
use processo_seletivo::workflows::inscricao::{
    check_submission, interpret_payload, AnswerMap, AnswerPayload, CreateDraftRequest, InscricaoId,
    Inscription, InscriptionStatus, OptionId, Position, PositionId, ProcessDefinition, ProcessId,
    Question, QuestionCatalog, QuestionId, QuestionOption, QuestionType, SubmitReceipt,
};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum BackendError {
    ProcessNotFound(ProcessId),
    DraftNotFound,
    PositionNotOffered(PositionId),
    NotEditable(InscriptionStatus),
    Incomplete(String),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::ProcessNotFound(id) => write!(f, "processo {id} não encontrado"),
            BackendError::DraftNotFound => write!(f, "inscrição não encontrada"),
            BackendError::PositionNotOffered(id) => {
                write!(f, "vaga {id} não pertence a este processo")
            }
            BackendError::NotEditable(status) => {
                write!(f, "inscrição com status {} não pode ser alterada", status.label())
            }
            BackendError::Incomplete(reason) => write!(f, "inscrição incompleta: {reason}"),
        }
    }
}

/// Process backend kept in memory for local development and the CLI demo.
#[derive(Default, Clone)]
pub(crate) struct InMemoryBackend {
    state: Arc<Mutex<BackendState>>,
}

#[derive(Default)]
struct BackendState {
    processes: HashMap<ProcessId, ProcessDefinition>,
    inscriptions: BTreeMap<InscricaoId, Inscription>,
    next_id: u64,
}

impl InMemoryBackend {
    pub(crate) fn with_process(process: ProcessDefinition) -> Self {
        let backend = Self::default();
        backend.insert_process(process);
        backend
    }

    pub(crate) fn insert_process(&self, process: ProcessDefinition) {
        let mut guard = self.state.lock().expect("backend mutex poisoned");
        guard.processes.insert(process.id.clone(), process);
    }

    pub(crate) fn process(&self, id: &ProcessId) -> Result<ProcessDefinition, BackendError> {
        let guard = self.state.lock().expect("backend mutex poisoned");
        guard
            .processes
            .get(id)
            .cloned()
            .ok_or_else(|| BackendError::ProcessNotFound(id.clone()))
    }

    pub(crate) fn find_draft(
        &self,
        process: &ProcessId,
        position: &PositionId,
    ) -> Result<Inscription, BackendError> {
        let guard = self.state.lock().expect("backend mutex poisoned");
        guard
            .inscriptions
            .values()
            .find(|inscription| {
                &inscription.process_id == process
                    && inscription.position_id.as_ref() == Some(position)
            })
            .cloned()
            .ok_or(BackendError::DraftNotFound)
    }

    /// Returns the candidate's inscription for the position, creating it when
    /// absent. The flag tells whether a new one was created.
    pub(crate) fn upsert_draft(
        &self,
        process: &ProcessId,
        request: &CreateDraftRequest,
    ) -> Result<(Inscription, bool), BackendError> {
        let mut guard = self.state.lock().expect("backend mutex poisoned");
        let definition = guard
            .processes
            .get(process)
            .ok_or_else(|| BackendError::ProcessNotFound(process.clone()))?;
        if definition.position(&request.position_id).is_none() {
            return Err(BackendError::PositionNotOffered(request.position_id.clone()));
        }
        let existing = guard.inscriptions.values().find(|inscription| {
            &inscription.process_id == process
                && inscription.position_id.as_ref() == Some(&request.position_id)
        });
        if let Some(existing) = existing {
            return Ok((existing.clone(), false));
        }

        guard.next_id += 1;
        let inscription = Inscription {
            id: InscricaoId(guard.next_id.to_string()),
            process_id: process.clone(),
            position_id: Some(request.position_id.clone()),
            status: InscriptionStatus::Rascunho,
            total_score: None,
            answers: Vec::new(),
        };
        guard
            .inscriptions
            .insert(inscription.id.clone(), inscription.clone());
        Ok((inscription, true))
    }

    pub(crate) fn save_answers(
        &self,
        process: &ProcessId,
        id: &InscricaoId,
        answers: Vec<AnswerPayload>,
    ) -> Result<Inscription, BackendError> {
        let mut guard = self.state.lock().expect("backend mutex poisoned");
        let inscription = guard
            .inscriptions
            .get_mut(id)
            .filter(|inscription| &inscription.process_id == process)
            .ok_or(BackendError::DraftNotFound)?;
        if !inscription.status.is_editable() {
            return Err(BackendError::NotEditable(inscription.status));
        }
        inscription.answers = answers;
        Ok(inscription.clone())
    }

    /// Sends the inscription. Scores one point per answered question.
    pub(crate) fn submit(
        &self,
        process: &ProcessId,
        id: &InscricaoId,
    ) -> Result<SubmitReceipt, BackendError> {
        let definition = self.process(process)?;
        let catalog = QuestionCatalog::new(definition.questions);

        let mut guard = self.state.lock().expect("backend mutex poisoned");
        let inscription = guard
            .inscriptions
            .get_mut(id)
            .filter(|inscription| &inscription.process_id == process)
            .ok_or(BackendError::DraftNotFound)?;
        if !inscription.status.is_editable() {
            return Err(BackendError::NotEditable(inscription.status));
        }

        let answers = interpret_payload(&catalog, &inscription.answers, AnswerMap::default());
        check_submission(&catalog, &answers, inscription.position_id.as_ref())
            .map_err(|blocker| BackendError::Incomplete(blocker.to_string()))?;

        let score = catalog
            .iter()
            .filter(|question| answers.is_answered(&question.id))
            .count() as f64;
        inscription.status = InscriptionStatus::Enviada;
        inscription.total_score = Some(score);

        Ok(SubmitReceipt {
            status: inscription.status,
            total_score: score,
        })
    }
}

fn question(id: &str, title: &str, kind: QuestionType, order: i32, required: bool) -> Question {
    Question {
        id: QuestionId::from(id),
        title: title.to_string(),
        description: None,
        kind,
        required,
        order,
        active: true,
        options: Vec::new(),
    }
}

fn choice(id: &str, label: &str, order: i32) -> QuestionOption {
    QuestionOption {
        id: OptionId::from(id),
        label: label.to_string(),
        value: id.to_string(),
        order,
        active: true,
    }
}

/// Sample process served by `serve` and walked through by `demo`.
pub(crate) fn demo_process() -> ProcessDefinition {
    let mut schooling = question("4", "Maior titulação", QuestionType::Select, 4, true);
    schooling.options = vec![
        choice("doutorado", "Doutorado", 3),
        choice("mestrado", "Mestrado", 2),
        choice("especializacao", "Especialização", 1),
        choice("graduacao", "Graduação", 0),
    ];

    let mut shifts = question("5", "Turnos disponíveis", QuestionType::Multiselect, 5, false);
    shifts.options = vec![
        choice("manha", "Manhã", 0),
        choice("tarde", "Tarde", 1),
        choice("noite", "Noite", 2),
    ];
    let mut retired = choice("integral", "Integral", 3);
    retired.active = false;
    shifts.options.push(retired);

    let mut experience = question(
        "2",
        "Anos de experiência docente",
        QuestionType::Numero,
        2,
        true,
    );
    experience.description = Some("Considere apenas a rede pública".to_string());

    let mut legacy = question("7", "Possui veículo próprio?", QuestionType::Boolean, 0, false);
    legacy.active = false;

    ProcessDefinition {
        id: ProcessId::from("ps-2025-01"),
        title: "Processo Seletivo Simplificado 01/2025".to_string(),
        positions: vec![
            Position {
                id: PositionId::from("prof-mat"),
                name: "Professor de Matemática".to_string(),
                description: Some("20 horas semanais".to_string()),
            },
            Position {
                id: PositionId::from("prof-port"),
                name: "Professor de Língua Portuguesa".to_string(),
                description: None,
            },
        ],
        questions: vec![
            question("1", "Possui licenciatura na área?", QuestionType::Boolean, 1, true),
            experience,
            question("3", "Conte sobre sua trajetória", QuestionType::Texto, 3, false),
            schooling,
            shifts,
            question("6", "Data de conclusão do curso", QuestionType::Data, 6, false),
            legacy,
        ],
    }
}
