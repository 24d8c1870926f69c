use crate::infra::{demo_process, InMemoryBackend};
use crate::routes::backend_router;
use chrono::{NaiveDate, Utc};
use clap::Args;
use processo_seletivo::config::{AppConfig, BackendConfig, CepConfig};
use processo_seletivo::error::AppError;
use processo_seletivo::workflows::cadastro::{
    format_cpf, format_phone, validate_cpf, validate_phone, AddressForm, CepAutofill, CepOutcome,
    JsonFileReminderStore, Reminder, ReminderError, ReminderPolicy, ViaCepLookup,
};
use processo_seletivo::workflows::inscricao::{
    render, ApiError, DraftCache, FieldControl, FieldInput, FieldLimits, FieldView,
    HttpInscricaoApi, InscricaoController, InscricaoError, OptionId, PositionId,
    ProcessDefinition, ProcessId, QuestionCatalog, QuestionId, RecordingNotifier,
};
use serde_json::{json, Map};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use url::Url;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Position to apply for.
    #[arg(long, default_value = "prof-mat")]
    pub(crate) position: String,
    /// Course completion date (YYYY-MM-DD) answered on the date question.
    #[arg(long, value_parser = parse_date)]
    pub(crate) concluded_on: Option<NaiveDate>,
    /// Candidate CPF to format and validate before the inscription starts.
    #[arg(long)]
    pub(crate) cpf: Option<String>,
    /// Candidate phone to format and validate before the inscription starts.
    #[arg(long)]
    pub(crate) phone: Option<String>,
    /// Candidate CEP whose address is looked up on the configured CEP service.
    #[arg(long)]
    pub(crate) cep: Option<String>,
    /// Address complement, cut to the configured text area limit.
    #[arg(long)]
    pub(crate) complement: Option<String>,
    /// JSON file holding the profile reminder schedule.
    #[arg(long)]
    pub(crate) reminder_state: Option<PathBuf>,
    /// Talk to the backend at APP_API_BASE_URL instead of an embedded one.
    #[arg(long)]
    pub(crate) remote: bool,
    /// Stop after saving the draft.
    #[arg(long)]
    pub(crate) skip_submit: bool,
}

#[derive(Args, Debug)]
pub(crate) struct CatalogArgs {
    /// Process definition as returned by `GET /processo/{id}`.
    pub(crate) file: PathBuf,
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

pub(crate) fn run_catalog(args: CatalogArgs) -> Result<(), AppError> {
    let raw = std::fs::read_to_string(&args.file)?;
    let process: ProcessDefinition = serde_json::from_str(&raw)?;

    println!("{} ({})", process.title, process.id);
    println!("Positions:");
    for position in &process.positions {
        println!("  - {} [{}]", position.name, position.id);
    }

    let limits = AppConfig::load()?.limits;
    let catalog = QuestionCatalog::new(process.questions);
    println!("Form ({} active questions):", catalog.len());
    for question in catalog.iter() {
        let view = render(question, None, &limits);
        print_field(&view);
    }
    Ok(())
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        position,
        concluded_on,
        cpf,
        phone,
        cep,
        complement,
        reminder_state,
        remote,
        skip_submit,
    } = args;
    let config = AppConfig::load()?;

    println!("Inscription form demo");
    if let Some(path) = reminder_state {
        match poll_reminder(config.reminder, &path) {
            Ok(true) => println!("- Profile reminder shown"),
            Ok(false) => println!("- Profile reminder not due yet"),
            Err(err) => println!("- Profile reminder unavailable: {}", err),
        }
    }
    if let Some(cpf) = cpf {
        match validate_cpf(&cpf) {
            Ok(_) => println!("- CPF {} accepted", format_cpf(&cpf)),
            Err(err) => println!("- CPF {} rejected: {}", format_cpf(&cpf), err),
        }
    }
    if let Some(phone) = phone {
        match validate_phone(&phone) {
            Ok(_) => println!("- Phone {} accepted", format_phone(&phone)),
            Err(err) => println!("- Phone {} rejected: {}", format_phone(&phone), err),
        }
    }

    if let Some(cep) = cep {
        let form = lookup_address(&config.cep, &config.limits, &cep, complement.as_deref()).await;
        println!(
            "- Address for CEP {}: {} {}, {} - {}/{}",
            form.cep, form.street, form.complement, form.neighborhood, form.city, form.state
        );
    }

    let (backend_config, server) = if remote {
        (config.backend.clone(), None)
    } else {
        let backend = InMemoryBackend::with_process(demo_process());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let server =
            tokio::spawn(async move { axum::serve(listener, backend_router(backend)).await });
        let local = embedded_backend(&config.backend, addr).map_err(InscricaoError::from)?;
        (local, Some(server))
    };
    let api = Arc::new(HttpInscricaoApi::new(&backend_config).map_err(InscricaoError::from)?);
    let notifier = Arc::new(RecordingNotifier::default());
    let cache = Arc::new(DraftCache::new());

    let mut snapshot = Map::new();
    snapshot.insert("nome".to_string(), json!("Candidata Demonstração"));
    let controller = InscricaoController::open(
        api,
        notifier.clone(),
        cache,
        &ProcessId::from("ps-2025-01"),
        config.limits,
    )
    .await?
    .with_snapshot(snapshot);

    println!("\n{}", controller.process().title);
    for view in controller.fields() {
        print_field(&view);
    }

    if let Err(err) = controller.submit().await {
        println!("\n- Sending before choosing a position: {}", err.user_message());
    }

    controller.select_position(PositionId::from(position.as_str())).await?;
    println!("- Position {} selected", position);

    controller.set_answer(&QuestionId::from("1"), FieldInput::YesNo(true))?;
    controller.set_answer(&QuestionId::from("2"), FieldInput::Text("6".to_string()))?;
    controller.set_answer(
        &QuestionId::from("3"),
        FieldInput::Text("Leciono na rede municipal desde 2019.".to_string()),
    )?;
    controller.set_answer(
        &QuestionId::from("4"),
        FieldInput::Choose(OptionId::from("mestrado")),
    )?;
    controller.set_answer(&QuestionId::from("5"), FieldInput::Toggle(OptionId::from("manha")))?;
    controller.set_answer(&QuestionId::from("5"), FieldInput::Toggle(OptionId::from("noite")))?;
    if let Some(date) = concluded_on {
        controller.set_answer(
            &QuestionId::from("6"),
            FieldInput::Text(date.format("%Y-%m-%d").to_string()),
        )?;
    }

    let draft = controller.save().await?;
    println!("- Draft {} saved with {} answers", draft.id, draft.answers.len());

    if !skip_submit {
        let receipt = controller.submit().await?;
        println!(
            "- Inscription {} | total score {}",
            receipt.status.label(),
            receipt.total_score
        );
        let capabilities = controller.capabilities();
        println!(
            "- Editable after sending: {}",
            if capabilities.editable { "yes" } else { "no" }
        );
    }

    println!("\nNotifications:");
    for event in notifier.events() {
        println!(
            "  - [{:?}] {}: {}",
            event.level,
            event.action.label(),
            event.message
        );
    }

    if let Some(server) = server {
        server.abort();
    }
    Ok(())
}

/// Embedded backend address, keeping the configured bearer token.
fn embedded_backend(
    configured: &BackendConfig,
    addr: SocketAddr,
) -> Result<BackendConfig, ApiError> {
    Ok(BackendConfig {
        base_url: Url::parse(&format!("http://{addr}/"))?,
        token: configured.token.clone(),
    })
}

fn poll_reminder(policy: ReminderPolicy, path: &Path) -> Result<bool, ReminderError> {
    Reminder::new(policy, JsonFileReminderStore::new(path)).poll(Utc::now())
}

async fn lookup_address(
    config: &CepConfig,
    limits: &FieldLimits,
    raw: &str,
    complement: Option<&str>,
) -> AddressForm {
    let mut form = AddressForm::default();
    form.set_cep(raw);
    if let Some(complement) = complement {
        form.set_complement(complement, limits);
    }

    let autofill = CepAutofill::new(Arc::new(ViaCepLookup::new(config)));
    let mut results = autofill.subscribe();
    if autofill.trigger(&form.cep).is_none() {
        println!("- CEP {} is incomplete", form.cep);
        return form;
    }
    if results.changed().await.is_err() {
        return form;
    }

    let resolution = results.borrow_and_update().clone();
    if let Some(resolution) = resolution {
        match &resolution.outcome {
            CepOutcome::Found(_) => {
                form.apply(&resolution);
            }
            CepOutcome::NotFound => println!("- CEP {} not found", resolution.cep),
            CepOutcome::Failed(reason) => println!("- CEP lookup failed: {}", reason),
        }
    }
    form
}

fn print_field(view: &FieldView) {
    println!("  - {}", view.label());
    if let Some(description) = &view.description {
        println!("      {}", description);
    }
    match &view.control {
        FieldControl::YesNo { .. } => println!("      [Sim] [Não]"),
        FieldControl::Number { .. } => println!("      number input"),
        FieldControl::TextArea { max_len, .. } => {
            println!("      text area (up to {} characters)", max_len)
        }
        FieldControl::Date { .. } => println!("      date input"),
        FieldControl::Select {
            placeholder,
            options,
        } => {
            let labels: Vec<&str> = options.iter().map(|option| option.label.as_str()).collect();
            println!("      select: {} | {}", placeholder, labels.join(", "));
        }
        FieldControl::Checklist { options } => {
            for option in options {
                println!("      [ ] {}", option.label);
            }
        }
    }
}
