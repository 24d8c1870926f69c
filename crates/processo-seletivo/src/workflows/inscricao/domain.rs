use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use super::payload::AnswerPayload;

/// Backends hand out ids as strings or bare numbers; both collapse to a string.
fn deserialize_opaque_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(value) => value,
        RawId::Number(value) => value.to_string(),
    })
}

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(#[serde(deserialize_with = "deserialize_opaque_id")] pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

opaque_id!(
    /// Identifier of a selective process.
    ProcessId
);
opaque_id!(
    /// Identifier of a position (vaga) offered by a process.
    PositionId
);
opaque_id!(
    /// Identifier of a screening question, unique within its process.
    QuestionId
);
opaque_id!(OptionId);
opaque_id!(
    /// Server-assigned identity of an inscription draft.
    InscricaoId
);

fn active_by_default() -> bool {
    true
}

/// Answer shape a question expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QuestionType {
    Boolean,
    Numero,
    Texto,
    Select,
    Multiselect,
    Data,
}

impl QuestionType {
    pub const fn label(self) -> &'static str {
        match self {
            QuestionType::Boolean => "BOOLEAN",
            QuestionType::Numero => "NUMERO",
            QuestionType::Texto => "TEXTO",
            QuestionType::Select => "SELECT",
            QuestionType::Multiselect => "MULTISELECT",
            QuestionType::Data => "DATA",
        }
    }

    pub const fn has_options(self) -> bool {
        matches!(self, QuestionType::Select | QuestionType::Multiselect)
    }
}

/// One selectable choice of a SELECT/MULTISELECT question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub id: OptionId,
    #[serde(alias = "texto")]
    pub label: String,
    #[serde(rename = "valor", default)]
    pub value: String,
    #[serde(rename = "ordem", default)]
    pub order: i32,
    #[serde(rename = "ativa", default = "active_by_default")]
    pub active: bool,
}

/// Screening question attached to a process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    #[serde(rename = "titulo")]
    pub title: String,
    #[serde(rename = "descricao", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "tipo")]
    pub kind: QuestionType,
    #[serde(rename = "obrigatoria", default)]
    pub required: bool,
    #[serde(rename = "ordem", default)]
    pub order: i32,
    #[serde(rename = "ativa", default = "active_by_default")]
    pub active: bool,
    #[serde(rename = "opcoes", default)]
    pub options: Vec<QuestionOption>,
}

impl Question {
    pub fn option(&self, id: &OptionId) -> Option<&QuestionOption> {
        self.options.iter().find(|option| &option.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub id: PositionId,
    #[serde(rename = "nome", alias = "titulo")]
    pub name: String,
    #[serde(rename = "descricao", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Process definition as served by `GET /processo/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessDefinition {
    pub id: ProcessId,
    #[serde(rename = "titulo", default)]
    pub title: String,
    #[serde(rename = "vagas", default)]
    pub positions: Vec<Position>,
    #[serde(rename = "perguntas", default)]
    pub questions: Vec<Question>,
}

impl ProcessDefinition {
    pub fn position(&self, id: &PositionId) -> Option<&Position> {
        self.positions.iter().find(|position| &position.id == id)
    }
}

/// Status of an inscription. Only drafts accept edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InscriptionStatus {
    Rascunho,
    Enviada,
    Cancelada,
    EmAnalise,
    Deferida,
    Indeferida,
}

impl InscriptionStatus {
    pub const fn label(self) -> &'static str {
        match self {
            InscriptionStatus::Rascunho => "RASCUNHO",
            InscriptionStatus::Enviada => "ENVIADA",
            InscriptionStatus::Cancelada => "CANCELADA",
            InscriptionStatus::EmAnalise => "EM_ANALISE",
            InscriptionStatus::Deferida => "DEFERIDA",
            InscriptionStatus::Indeferida => "INDEFERIDA",
        }
    }

    pub const fn is_editable(self) -> bool {
        matches!(self, InscriptionStatus::Rascunho)
    }
}

/// Inscription aggregate as returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inscription {
    pub id: InscricaoId,
    #[serde(rename = "id_processo")]
    pub process_id: ProcessId,
    #[serde(rename = "id_vaga", default)]
    pub position_id: Option<PositionId>,
    pub status: InscriptionStatus,
    #[serde(rename = "pontuacao_total", default)]
    pub total_score: Option<f64>,
    #[serde(rename = "respostas", default)]
    pub answers: Vec<AnswerPayload>,
}

/// Response body of the submit endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitReceipt {
    pub status: InscriptionStatus,
    #[serde(rename = "pontuacao_total")]
    pub total_score: f64,
}

/// What the view may offer, derived once from status and controller activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FormCapabilities {
    pub editable: bool,
    pub can_save: bool,
    pub can_submit: bool,
}

impl FormCapabilities {
    /// `status` is `None` while no draft exists server-side.
    pub fn derive(status: Option<InscriptionStatus>, position_selected: bool, busy: bool) -> Self {
        let editable = status.map_or(true, InscriptionStatus::is_editable);
        Self {
            editable,
            can_save: editable && position_selected,
            can_submit: editable && position_selected && !busy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_ids_deserialize_as_strings() {
        let question: Question = serde_json::from_value(json!({
            "id": 42,
            "titulo": "Possui CNH?",
            "tipo": "BOOLEAN",
            "obrigatoria": true,
            "ordem": 1
        }))
        .expect("question parses");

        assert_eq!(question.id, QuestionId::from("42"));
        assert!(question.active, "missing flag defaults to active");
        assert!(question.options.is_empty());
    }

    #[test]
    fn status_round_trips_screaming_case() {
        let status: InscriptionStatus =
            serde_json::from_value(json!("EM_ANALISE")).expect("status parses");
        assert_eq!(status, InscriptionStatus::EmAnalise);
        assert_eq!(
            serde_json::to_value(InscriptionStatus::Enviada).expect("serializes"),
            json!("ENVIADA")
        );
    }

    #[test]
    fn only_drafts_are_editable() {
        assert!(InscriptionStatus::Rascunho.is_editable());
        for status in [
            InscriptionStatus::Enviada,
            InscriptionStatus::Cancelada,
            InscriptionStatus::EmAnalise,
            InscriptionStatus::Deferida,
            InscriptionStatus::Indeferida,
        ] {
            assert!(!status.is_editable(), "{} must be read-only", status.label());
        }
    }

    #[test]
    fn capabilities_follow_status_and_activity() {
        let fresh = FormCapabilities::derive(None, false, false);
        assert!(fresh.editable);
        assert!(!fresh.can_save);
        assert!(!fresh.can_submit);

        let busy = FormCapabilities::derive(Some(InscriptionStatus::Rascunho), true, true);
        assert!(busy.can_save);
        assert!(!busy.can_submit);

        let sent = FormCapabilities::derive(Some(InscriptionStatus::Enviada), true, false);
        assert_eq!(
            sent,
            FormCapabilities {
                editable: false,
                can_save: false,
                can_submit: false
            }
        );
    }
}
