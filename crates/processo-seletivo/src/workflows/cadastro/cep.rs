//! Address autofill from the postal code.
//!
//! Each keystroke that changes the CEP field re-triggers the lookup. The
//! previous request is aborted and its generation retired, so a slow answer
//! for an older CEP can never overwrite the address of the current one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;
use url::Url;

use super::validators::{format_cep, Cep};
use crate::config::CepConfig;
use crate::workflows::inscricao::fields::truncate_chars;
use crate::workflows::inscricao::FieldLimits;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    #[serde(rename = "logradouro", default)]
    pub street: String,
    #[serde(rename = "bairro", default)]
    pub neighborhood: String,
    #[serde(rename = "localidade", default)]
    pub city: String,
    #[serde(rename = "uf", default)]
    pub state: String,
    #[serde(rename = "complemento", default)]
    pub complement: String,
}

#[derive(Debug, thiserror::Error)]
pub enum CepError {
    #[error("CEP {0} was not found")]
    NotFound(Cep),
    #[error("CEP service answered HTTP {0}")]
    Status(u16),
    #[error("CEP service unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid CEP service address: {0}")]
    Url(#[from] url::ParseError),
}

#[async_trait]
pub trait CepLookup: Send + Sync {
    async fn lookup(&self, cep: &Cep) -> Result<Address, CepError>;
}

/// ViaCEP style service: `GET {base}/{cep}/json/`.
#[derive(Debug, Clone)]
pub struct ViaCepLookup {
    http: reqwest::Client,
    base_url: Url,
}

#[derive(Deserialize)]
struct ViaCepResponse {
    #[serde(default)]
    erro: Option<serde_json::Value>,
    #[serde(flatten)]
    address: Address,
}

impl ViaCepLookup {
    pub fn new(config: &CepConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    pub fn with_client(http: reqwest::Client, config: &CepConfig) -> Self {
        Self {
            http,
            base_url: config.base_url.clone(),
        }
    }

    fn endpoint(&self, cep: &Cep) -> Result<Url, CepError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| CepError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(&[cep.digits(), "json", ""]);
        Ok(url)
    }
}

#[async_trait]
impl CepLookup for ViaCepLookup {
    async fn lookup(&self, cep: &Cep) -> Result<Address, CepError> {
        let url = self.endpoint(cep)?;
        let response = self.http.get(url).send().await?;
        let status = response.status();
        debug!(%status, %cep, "cep service responded");

        if status == reqwest::StatusCode::NOT_FOUND || status == reqwest::StatusCode::BAD_REQUEST {
            return Err(CepError::NotFound(cep.clone()));
        }
        if !status.is_success() {
            return Err(CepError::Status(status.as_u16()));
        }

        let body: ViaCepResponse = response.json().await?;
        match body.erro {
            Some(serde_json::Value::Bool(false)) | None => Ok(body.address),
            Some(_) => Err(CepError::NotFound(cep.clone())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CepOutcome {
    Found(Address),
    NotFound,
    Failed(String),
}

/// Result of the latest lookup that was not superseded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CepResolution {
    pub cep: Cep,
    pub generation: u64,
    pub outcome: CepOutcome,
}

/// Runs at most one CEP lookup at a time and publishes the current result.
pub struct CepAutofill<L> {
    lookup: Arc<L>,
    generation: Arc<AtomicU64>,
    pending: Mutex<Option<JoinHandle<()>>>,
    results: Arc<watch::Sender<Option<CepResolution>>>,
}

impl<L> CepAutofill<L>
where
    L: CepLookup + 'static,
{
    pub fn new(lookup: Arc<L>) -> Self {
        let (results, _) = watch::channel(None);
        Self {
            lookup,
            generation: Arc::new(AtomicU64::new(0)),
            pending: Mutex::new(None),
            results: Arc::new(results),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<CepResolution>> {
        self.results.subscribe()
    }

    pub fn latest(&self) -> Option<CepResolution> {
        self.results.borrow().clone()
    }

    /// React to a new value of the CEP field.
    ///
    /// Any lookup in flight is cancelled. A complete CEP starts a new lookup
    /// and its generation is returned; partial input only cancels.
    /// Must be called from within a Tokio runtime.
    pub fn trigger(&self, raw: &str) -> Option<u64> {
        let generation = self.retire_pending();
        let cep = Cep::parse(raw).ok()?;

        let lookup = self.lookup.clone();
        let current = self.generation.clone();
        let results = self.results.clone();
        let handle = tokio::spawn(async move {
            let outcome = match lookup.lookup(&cep).await {
                Ok(address) => CepOutcome::Found(address),
                Err(CepError::NotFound(_)) => CepOutcome::NotFound,
                Err(err) => CepOutcome::Failed(err.to_string()),
            };

            let resolution = CepResolution {
                cep,
                generation,
                outcome,
            };
            if !publish_current(&results, &current, resolution) {
                debug!(generation, "stale cep lookup discarded");
            }
        });

        *self.pending.lock().expect("cep task mutex poisoned") = Some(handle);
        Some(generation)
    }

    /// Drop the lookup in flight, if any.
    pub fn cancel(&self) {
        self.retire_pending();
    }

    fn retire_pending(&self) -> u64 {
        // Bumped under the channel lock so a publish in progress sees it.
        let mut generation = 0;
        self.results.send_if_modified(|_| {
            generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            false
        });
        if let Some(handle) = self.pending.lock().expect("cep task mutex poisoned").take() {
            handle.abort();
        }
        generation
    }
}

/// Publish `resolution` unless a newer trigger retired its generation. The
/// generation is re-read while the channel is locked.
fn publish_current(
    results: &watch::Sender<Option<CepResolution>>,
    current: &AtomicU64,
    resolution: CepResolution,
) -> bool {
    results.send_if_modified(|slot| {
        if current.load(Ordering::SeqCst) != resolution.generation {
            return false;
        }
        *slot = Some(resolution);
        true
    })
}

impl<L> Drop for CepAutofill<L> {
    fn drop(&mut self) {
        if let Ok(mut pending) = self.pending.lock() {
            if let Some(handle) = pending.take() {
                handle.abort();
            }
        }
    }
}

/// Address block of the profile form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AddressForm {
    pub cep: String,
    pub street: String,
    pub number: String,
    pub neighborhood: String,
    pub city: String,
    pub state: String,
    pub complement: String,
}

impl AddressForm {
    /// Store the masked CEP as typed.
    pub fn set_cep(&mut self, raw: &str) {
        self.cep = format_cep(raw);
    }

    pub fn set_complement(&mut self, raw: &str, limits: &FieldLimits) {
        self.complement = truncate_chars(raw, limits.text_area_max_len);
    }

    /// Fill the address from `resolution` when it belongs to the CEP now in
    /// the field. Returns whether anything was applied.
    pub fn apply(&mut self, resolution: &CepResolution) -> bool {
        let matches_field = Cep::parse(&self.cep)
            .map(|cep| cep == resolution.cep)
            .unwrap_or(false);
        if !matches_field {
            return false;
        }

        match &resolution.outcome {
            CepOutcome::Found(address) => {
                self.street = address.street.clone();
                self.neighborhood = address.neighborhood.clone();
                self.city = address.city.clone();
                self.state = address.state.clone();
                if self.complement.is_empty() {
                    self.complement = address.complement.clone();
                }
                true
            }
            CepOutcome::NotFound | CepOutcome::Failed(_) => false,
        }
    }
}
