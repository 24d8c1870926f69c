use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::json;

use super::common::{full_process, harness, two_question_process, Call, FakeApi};
use crate::workflows::inscricao::{
    AnswerPayload, AnswerValue, ApiError, DraftCache, DraftKey, FieldInput, FieldLimits,
    InscricaoController, InscricaoError, InscricaoId, Inscription, InscriptionStatus,
    LifecycleState, NotificationLevel, PositionId, ProcessId, QuestionId, QuestionType,
    RecordingNotifier, SubmissionBlocker, UserAction,
};

fn q(id: &str) -> QuestionId {
    QuestionId::from(id)
}

#[tokio::test]
async fn submits_answered_form_with_typed_payload() {
    let h = harness(two_question_process());
    h.controller
        .set_answer(&q("q-bool"), FieldInput::YesNo(true))
        .expect("boolean answer accepted");
    h.controller
        .select_position(PositionId::from("v1"))
        .await
        .expect("lookup succeeds");

    let receipt = h.controller.submit().await.expect("submission succeeds");
    assert_eq!(receipt.status, InscriptionStatus::Enviada);

    let calls = h.api.calls();
    assert_eq!(calls.len(), 4);
    assert_eq!(calls[0], Call::FindDraft(PositionId::from("v1")));
    assert_eq!(calls[1], Call::CreateDraft(PositionId::from("v1")));
    match &calls[2] {
        Call::SaveAnswers(id, payload) => {
            assert_eq!(id, &InscricaoId::from("insc-1"));
            assert_eq!(
                serde_json::to_value(payload).expect("payload serializes"),
                json!([
                    {"id_pergunta": "q-bool", "valor_boolean": true},
                    {"id_pergunta": "q-text", "valor_texto": ""}
                ])
            );
        }
        other => panic!("expected answers to be saved, got {other:?}"),
    }
    assert_eq!(calls[3], Call::Submit(InscricaoId::from("insc-1")));

    assert_eq!(h.controller.state(), LifecycleState::Submitted);
    let draft = h.controller.draft().expect("draft kept after submit");
    assert_eq!(draft.total_score, Some(receipt.total_score));
    assert!(!h.controller.capabilities().editable);

    let events = h.notifier.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].action, UserAction::Submit);
    assert_eq!(events[0].level, NotificationLevel::Success);
}

#[tokio::test]
async fn missing_required_answer_blocks_submit_before_the_network() {
    let h = harness(two_question_process());
    h.controller
        .select_position(PositionId::from("v1"))
        .await
        .expect("lookup succeeds");

    let err = h.controller.submit().await.expect_err("submit is blocked");
    match &err {
        InscricaoError::Blocked(SubmissionBlocker::MissingRequired(missing)) => {
            assert_eq!(missing, &vec![q("q-bool")]);
        }
        other => panic!("expected missing required answer, got {other:?}"),
    }
    assert!(err.is_validation());

    assert_eq!(h.api.calls(), vec![Call::FindDraft(PositionId::from("v1"))]);
    assert_eq!(h.controller.state(), LifecycleState::DraftReady);

    let events = h.notifier.events();
    assert_eq!(events.len(), 1);
    assert!(events[0].is_error());
    assert!(!events[0].retryable);
}

#[tokio::test]
async fn submit_without_position_never_reaches_the_backend() {
    let h = harness(two_question_process());
    h.controller
        .set_answer(&q("q-bool"), FieldInput::YesNo(false))
        .expect("boolean answer accepted");
    h.controller
        .set_answer(&q("q-text"), FieldInput::Text("Licenciatura".to_string()))
        .expect("text answer accepted");

    let err = h.controller.submit().await.expect_err("submit is blocked");
    assert!(matches!(
        err,
        InscricaoError::Blocked(SubmissionBlocker::NoPositionSelected)
    ));
    assert!(h.api.calls().is_empty());
    assert!(!h.controller.capabilities().can_submit);
}

#[tokio::test]
async fn overlapping_saves_create_a_single_draft() {
    let h = harness(two_question_process());
    h.controller
        .select_position(PositionId::from("v1"))
        .await
        .expect("lookup succeeds");

    let (first, second) = tokio::join!(h.controller.save(), h.controller.save());
    let first = first.expect("first save succeeds");
    let second = second.expect("second save succeeds");
    assert_eq!(first.id, second.id);

    assert_eq!(h.api.count(|call| matches!(call, Call::CreateDraft(_))), 1);
    let saved_ids: Vec<InscricaoId> = h
        .api
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            Call::SaveAnswers(id, _) => Some(id),
            _ => None,
        })
        .collect();
    assert_eq!(saved_ids, vec![first.id.clone(), first.id]);

    let saves = h
        .notifier
        .events()
        .into_iter()
        .filter(|event| event.action == UserAction::Save)
        .count();
    assert_eq!(saves, 2);
}

#[tokio::test]
async fn failed_save_keeps_answers_and_reuses_the_draft_on_retry() {
    let h = harness(two_question_process());
    h.controller
        .select_position(PositionId::from("v1"))
        .await
        .expect("lookup succeeds");
    h.controller
        .set_answer(&q("q-text"), FieldInput::Text("Mestrado".to_string()))
        .expect("text answer accepted");

    h.api.fail_next("save", StatusCode::SERVICE_UNAVAILABLE);
    let err = h.controller.save().await.expect_err("backend outage");
    assert!(matches!(err, InscricaoError::Api(ApiError::Server { status: 503, .. })));
    assert!(err.is_retryable());

    assert_eq!(h.controller.state(), LifecycleState::DraftReady);
    assert_eq!(
        h.controller.answer(&q("q-text")),
        Some(AnswerValue::Text("Mestrado".to_string()))
    );
    assert!(h.controller.draft().is_some(), "created draft is remembered");

    h.controller.save().await.expect("retry succeeds");
    assert_eq!(h.api.count(|call| matches!(call, Call::CreateDraft(_))), 1);

    let levels: Vec<NotificationLevel> = h
        .notifier
        .events()
        .into_iter()
        .map(|event| event.level)
        .collect();
    assert_eq!(levels, vec![NotificationLevel::Error, NotificationLevel::Success]);
}

#[tokio::test]
async fn submit_is_refused_while_a_save_is_in_flight() {
    let h = harness(two_question_process());
    h.controller
        .set_answer(&q("q-bool"), FieldInput::YesNo(true))
        .expect("boolean answer accepted");
    h.controller
        .select_position(PositionId::from("v1"))
        .await
        .expect("lookup succeeds");

    let gate = h.api.hold_saves();
    let (saved, submitted) = tokio::join!(h.controller.save(), async {
        while h.api.count(|call| matches!(call, Call::SaveAnswers(..))) == 0 {
            tokio::task::yield_now().await;
        }
        assert_eq!(h.controller.state(), LifecycleState::Saving);
        assert!(!h.controller.capabilities().can_submit);
        let submitted = h.controller.submit().await;
        gate.notify_one();
        submitted
    });

    saved.expect("save completes once released");
    assert!(matches!(submitted, Err(InscricaoError::Busy)));
    assert_eq!(h.api.count(|call| matches!(call, Call::Submit(_))), 0);
}

#[tokio::test]
async fn stored_draft_hydrates_the_form() {
    let h = harness(full_process());
    let stored: Vec<AnswerPayload> = serde_json::from_value(json!([
        {"id_pergunta": "q-bool", "valor_boolean": false},
        {"id_pergunta": "q-date", "valor_data": "2023-11-20T00:00:00Z"},
        {"id_pergunta": "q-multi", "opcoes_ids": ["y"]}
    ]))
    .expect("stored answers parse");
    h.api.seed_draft(Inscription {
        id: InscricaoId::from("77"),
        process_id: ProcessId::from("p2"),
        position_id: Some(PositionId::from("v2")),
        status: InscriptionStatus::Rascunho,
        total_score: None,
        answers: stored,
    });

    h.controller
        .select_position(PositionId::from("v2"))
        .await
        .expect("lookup succeeds");

    assert_eq!(h.controller.state(), LifecycleState::DraftReady);
    assert_eq!(h.controller.answer(&q("q-bool")), Some(AnswerValue::Boolean(false)));
    assert_eq!(
        h.controller.answer(&q("q-date")),
        Some(AnswerValue::Text("2023-11-20".to_string()))
    );
    assert_eq!(
        h.controller.answer(&q("q-text")),
        Some(AnswerValue::Text(String::new()))
    );

    h.controller.save().await.expect("save succeeds");
    assert_eq!(h.api.count(|call| matches!(call, Call::CreateDraft(_))), 0);
    assert_eq!(
        h.api.count(|call| matches!(call, Call::SaveAnswers(id, _) if id.as_str() == "77")),
        1
    );
}

#[tokio::test]
async fn sent_inscription_is_read_only() {
    let h = harness(two_question_process());
    h.api.seed_draft(Inscription {
        id: InscricaoId::from("9"),
        process_id: ProcessId::from("p1"),
        position_id: Some(PositionId::from("v1")),
        status: InscriptionStatus::EmAnalise,
        total_score: Some(8.0),
        answers: vec![AnswerPayload::for_answer(
            q("q-bool"),
            QuestionType::Boolean,
            Some(&AnswerValue::Boolean(true)),
        )],
    });

    h.controller
        .select_position(PositionId::from("v1"))
        .await
        .expect("lookup succeeds");
    assert_eq!(h.controller.state(), LifecycleState::Submitted);
    assert!(!h.controller.capabilities().editable);

    assert!(matches!(
        h.controller.set_answer(&q("q-bool"), FieldInput::YesNo(false)),
        Err(InscricaoError::ReadOnly)
    ));
    assert!(matches!(h.controller.save().await, Err(InscricaoError::ReadOnly)));
    assert_eq!(h.controller.answer(&q("q-bool")), Some(AnswerValue::Boolean(true)));
}

#[tokio::test]
async fn failed_lookup_is_reported_and_can_be_retried() {
    let h = harness(two_question_process());
    h.api.fail_next("find", StatusCode::INTERNAL_SERVER_ERROR);

    let err = h
        .controller
        .select_position(PositionId::from("v1"))
        .await
        .expect_err("lookup fails");
    assert!(err.is_retryable());
    assert_eq!(h.controller.state(), LifecycleState::NoDraft);
    assert_eq!(h.controller.position(), None);

    let events = h.notifier.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].action, UserAction::LoadDraft);

    h.controller
        .select_position(PositionId::from("v1"))
        .await
        .expect("retry succeeds");
    assert_eq!(h.controller.state(), LifecycleState::DraftReady);
}

#[tokio::test]
async fn unknown_position_is_rejected_locally() {
    let h = harness(two_question_process());
    let err = h
        .controller
        .select_position(PositionId::from("v9"))
        .await
        .expect_err("position is not offered");
    assert!(matches!(err, InscricaoError::UnknownPosition(_)));
    assert!(h.api.calls().is_empty());
}

#[tokio::test]
async fn saved_draft_is_served_from_cache_to_the_next_session() {
    let h = harness(two_question_process());
    h.controller
        .select_position(PositionId::from("v1"))
        .await
        .expect("lookup succeeds");
    h.controller
        .set_answer(&q("q-bool"), FieldInput::YesNo(true))
        .expect("boolean answer accepted");
    let saved = h.controller.save().await.expect("save succeeds");

    let key = DraftKey::new(ProcessId::from("p1"), PositionId::from("v1"));
    assert_eq!(h.cache.get(&key), Some(saved));

    let reopened = InscricaoController::from_definition(
        h.api.clone(),
        Arc::new(RecordingNotifier::default()),
        h.cache.clone(),
        two_question_process(),
        FieldLimits::default(),
    );
    reopened
        .select_position(PositionId::from("v1"))
        .await
        .expect("cached draft is used");

    assert_eq!(h.api.count(|call| matches!(call, Call::FindDraft(_))), 1);
    assert_eq!(reopened.answer(&q("q-bool")), Some(AnswerValue::Boolean(true)));
}

#[tokio::test]
async fn open_reports_a_missing_process() {
    let api = Arc::new(FakeApi::new(two_question_process()));
    let notifier = Arc::new(RecordingNotifier::default());

    let result = InscricaoController::open(
        api.clone(),
        notifier.clone(),
        Arc::new(DraftCache::new()),
        &ProcessId::from("missing"),
        FieldLimits::default(),
    )
    .await;

    assert!(matches!(result, Err(InscricaoError::Api(ApiError::NotFound))));
    let events = notifier.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].action, UserAction::LoadProcess);

    let opened = InscricaoController::open(
        api,
        notifier,
        Arc::new(DraftCache::new()),
        &ProcessId::from("p1"),
        FieldLimits::default(),
    )
    .await
    .expect("known process opens");
    assert_eq!(opened.catalog().len(), 2);
    assert_eq!(opened.fields()[0].question_id, q("q-bool"));
}
