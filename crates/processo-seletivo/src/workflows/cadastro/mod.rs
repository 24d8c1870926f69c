//! Candidate profile helpers: document and contact validation, CEP address
//! autofill and the profile reminder schedule.

pub mod cep;
pub mod reminder;
pub mod validators;

pub use cep::{
    Address, AddressForm, CepAutofill, CepError, CepLookup, CepOutcome, CepResolution,
    ViaCepLookup,
};
pub use reminder::{
    JsonFileReminderStore, Reminder, ReminderError, ReminderPolicy, ReminderState, ReminderStore,
};
pub use validators::{
    digits, format_cep, format_cpf, format_phone, password_strength, validate_cpf,
    validate_password, validate_phone, Cep, PasswordRule, PasswordStrength, ProfileError,
    StrengthLevel,
};
