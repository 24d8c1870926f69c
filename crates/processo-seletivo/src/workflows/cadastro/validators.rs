//! Formatting and validation of the candidate profile fields.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProfileError {
    #[error("CPF must have 11 digits, got {found}")]
    CpfLength { found: usize },
    #[error("CPF check digits do not match")]
    CpfChecksum,
    #[error("phone must have 10 or 11 digits, got {found}")]
    PhoneLength { found: usize },
    #[error("CEP must have 8 digits, got {found}")]
    CepLength { found: usize },
    #[error("password does not meet: {}", rule_list(.0))]
    WeakPassword(Vec<PasswordRule>),
    #[error("password confirmation does not match")]
    PasswordMismatch,
}

fn rule_list(rules: &[PasswordRule]) -> String {
    rules
        .iter()
        .map(|rule| rule.label())
        .collect::<Vec<_>>()
        .join(", ")
}

/// ASCII digits of `raw`, everything else dropped.
pub fn digits(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// Mask a partially typed CPF as `000.000.000-00`.
pub fn format_cpf(raw: &str) -> String {
    let mut masked = String::with_capacity(14);
    for (index, digit) in digits(raw).chars().take(11).enumerate() {
        match index {
            3 | 6 => masked.push('.'),
            9 => masked.push('-'),
            _ => {}
        }
        masked.push(digit);
    }
    masked
}

/// Validate a CPF and return it masked.
pub fn validate_cpf(raw: &str) -> Result<String, ProfileError> {
    let numbers: Vec<u32> = digits(raw).chars().filter_map(|c| c.to_digit(10)).collect();
    if numbers.len() != 11 {
        return Err(ProfileError::CpfLength {
            found: numbers.len(),
        });
    }
    if numbers.iter().all(|digit| *digit == numbers[0]) {
        return Err(ProfileError::CpfChecksum);
    }
    if check_digit(&numbers[..9]) != numbers[9] || check_digit(&numbers[..10]) != numbers[10] {
        return Err(ProfileError::CpfChecksum);
    }
    Ok(format_cpf(raw))
}

fn check_digit(prefix: &[u32]) -> u32 {
    let weight_start = prefix.len() as u32 + 1;
    let sum: u32 = prefix
        .iter()
        .enumerate()
        .map(|(index, digit)| digit * (weight_start - index as u32))
        .sum();
    match (sum * 10) % 11 {
        10 => 0,
        rest => rest,
    }
}

/// Mask a partially typed phone as `(00) 0000-0000` or `(00) 00000-0000`.
pub fn format_phone(raw: &str) -> String {
    let numbers: String = digits(raw).chars().take(11).collect();
    let len = numbers.len();
    if len == 0 {
        return String::new();
    }
    if len <= 2 {
        return format!("({numbers}");
    }

    let (area, local) = numbers.split_at(2);
    if len <= 6 {
        return format!("({area}) {local}");
    }

    let split = if len == 11 { 5 } else { 4 };
    let (head, tail) = local.split_at(split.min(local.len()));
    format!("({area}) {head}-{tail}")
}

pub fn validate_phone(raw: &str) -> Result<String, ProfileError> {
    let found = digits(raw).len();
    match found {
        10 | 11 => Ok(format_phone(raw)),
        _ => Err(ProfileError::PhoneLength { found }),
    }
}

/// Mask a partially typed CEP as `00000-000`.
pub fn format_cep(raw: &str) -> String {
    let numbers: String = digits(raw).chars().take(8).collect();
    if numbers.len() <= 5 {
        return numbers;
    }
    let (head, tail) = numbers.split_at(5);
    format!("{head}-{tail}")
}

/// Brazilian postal code, stored as its 8 digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cep(String);

impl Cep {
    pub fn parse(raw: &str) -> Result<Self, ProfileError> {
        let numbers = digits(raw);
        if numbers.len() != 8 {
            return Err(ProfileError::CepLength {
                found: numbers.len(),
            });
        }
        Ok(Self(numbers))
    }

    pub fn digits(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (head, tail) = self.0.split_at(5);
        write!(f, "{head}-{tail}")
    }
}

impl TryFrom<String> for Cep {
    type Error = ProfileError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Cep::parse(&value)
    }
}

impl From<Cep> for String {
    fn from(value: Cep) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PasswordRule {
    MinLength,
    Lowercase,
    Uppercase,
    Digit,
    Symbol,
}

impl PasswordRule {
    pub const ALL: [PasswordRule; 5] = [
        PasswordRule::MinLength,
        PasswordRule::Lowercase,
        PasswordRule::Uppercase,
        PasswordRule::Digit,
        PasswordRule::Symbol,
    ];

    pub const MIN_LENGTH: usize = 8;

    pub const fn label(self) -> &'static str {
        match self {
            PasswordRule::MinLength => "at least 8 characters",
            PasswordRule::Lowercase => "a lowercase letter",
            PasswordRule::Uppercase => "an uppercase letter",
            PasswordRule::Digit => "a digit",
            PasswordRule::Symbol => "a symbol",
        }
    }

    pub fn is_met(self, password: &str) -> bool {
        match self {
            PasswordRule::MinLength => password.chars().count() >= Self::MIN_LENGTH,
            PasswordRule::Lowercase => password.chars().any(char::is_lowercase),
            PasswordRule::Uppercase => password.chars().any(char::is_uppercase),
            PasswordRule::Digit => password.chars().any(|c| c.is_ascii_digit()),
            PasswordRule::Symbol => password
                .chars()
                .any(|c| !c.is_alphanumeric() && !c.is_whitespace()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrengthLevel {
    Weak,
    Medium,
    Strong,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PasswordStrength {
    pub level: StrengthLevel,
    pub unmet: Vec<PasswordRule>,
}

/// Strength meter shown while the password is typed.
pub fn password_strength(password: &str) -> PasswordStrength {
    let unmet: Vec<PasswordRule> = PasswordRule::ALL
        .into_iter()
        .filter(|rule| !rule.is_met(password))
        .collect();
    let level = match PasswordRule::ALL.len() - unmet.len() {
        5 => StrengthLevel::Strong,
        3 | 4 => StrengthLevel::Medium,
        _ => StrengthLevel::Weak,
    };
    PasswordStrength { level, unmet }
}

pub fn validate_password(password: &str, confirmation: &str) -> Result<(), ProfileError> {
    let strength = password_strength(password);
    if !strength.unmet.is_empty() {
        return Err(ProfileError::WeakPassword(strength.unmet));
    }
    if password != confirmation {
        return Err(ProfileError::PasswordMismatch);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpf_is_masked_while_typing() {
        assert_eq!(format_cpf("529"), "529");
        assert_eq!(format_cpf("5299"), "529.9");
        assert_eq!(format_cpf("5299822"), "529.982.2");
        assert_eq!(format_cpf("52998224725999"), "529.982.247-25");
    }

    #[test]
    fn cpf_check_digits_are_verified() {
        assert_eq!(validate_cpf("52998224725"), Ok("529.982.247-25".to_string()));
        assert_eq!(validate_cpf("529.982.247-24"), Err(ProfileError::CpfChecksum));
        assert_eq!(validate_cpf("111.111.111-11"), Err(ProfileError::CpfChecksum));
        assert_eq!(
            validate_cpf("529.982"),
            Err(ProfileError::CpfLength { found: 6 })
        );
    }

    #[test]
    fn phones_accept_landlines_and_mobiles() {
        assert_eq!(validate_phone("3132345678"), Ok("(31) 3234-5678".to_string()));
        assert_eq!(validate_phone("(11) 98765-4321"), Ok("(11) 98765-4321".to_string()));
        assert_eq!(
            validate_phone("98765-4321"),
            Err(ProfileError::PhoneLength { found: 9 })
        );
        assert_eq!(format_phone("11"), "(11");
        assert_eq!(format_phone("119876"), "(11) 9876");
        assert_eq!(format_phone("1198765"), "(11) 9876-5");
    }

    #[test]
    fn cep_displays_with_hyphen() {
        let cep = Cep::parse("30140000").expect("valid cep");
        assert_eq!(cep.to_string(), "30140-000");
        assert_eq!(cep.digits(), "30140000");
        assert_eq!(Cep::parse("01310-100").expect("valid").to_string(), "01310-100");
        assert_eq!(Cep::parse("0131"), Err(ProfileError::CepLength { found: 4 }));
        assert_eq!(format_cep("301"), "301");
        assert_eq!(format_cep("3014000099"), "30140-000");
    }

    #[test]
    fn password_strength_counts_rules() {
        assert_eq!(password_strength("abc").level, StrengthLevel::Weak);
        assert_eq!(password_strength("abcdefG1").level, StrengthLevel::Medium);

        let strong = password_strength("Selecao#2025");
        assert_eq!(strong.level, StrengthLevel::Strong);
        assert!(strong.unmet.is_empty());

        assert_eq!(
            validate_password("abcdefgh", "abcdefgh"),
            Err(ProfileError::WeakPassword(vec![
                PasswordRule::Uppercase,
                PasswordRule::Digit,
                PasswordRule::Symbol,
            ]))
        );
        assert_eq!(
            validate_password("Selecao#2025", "Selecao#2024"),
            Err(ProfileError::PasswordMismatch)
        );
        assert_eq!(validate_password("Selecao#2025", "Selecao#2025"), Ok(()));
    }
}
