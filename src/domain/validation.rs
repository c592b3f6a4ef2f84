//! Sanitization and validation of registration payloads before they leave the
//! process. Every failure maps onto a non-retryable [`IntegrationError`].

use crate::domain::integration::{
    IntegrationError, IntegrationErrorType, InstitutoUserData, ORIGEM_CADASTRO,
};
use chrono::DateTime;

const NAME_MAX_CHARS: usize = 100;
const EMAIL_MAX_LEN: usize = 255;

/// Returns a trimmed, normalized copy of `data` or the first violation found.
pub fn sanitize_user_data(data: &InstitutoUserData) -> Result<InstitutoUserData, IntegrationError> {
    if !data.consentimento_data_sharing {
        return Err(IntegrationError::new(
            IntegrationErrorType::ConsentError,
            "Consent is required to share registration data",
        ));
    }

    let sanitized = InstitutoUserData {
        nome: collapse_whitespace(&data.nome),
        email: data.email.trim().to_lowercase(),
        telefone: digits_only(&data.telefone),
        cpf: digits_only(&data.cpf),
        origem_cadastro: data.origem_cadastro.trim().to_string(),
        consentimento_data_sharing: true,
        created_at: data.created_at.trim().to_string(),
    };

    validate_name(&sanitized.nome)?;
    validate_email(&sanitized.email)?;
    if !is_valid_phone(&sanitized.telefone) {
        return Err(IntegrationError::validation("Phone must have 10 or 11 digits"));
    }
    if !is_valid_cpf(&sanitized.cpf) {
        return Err(IntegrationError::validation("Invalid CPF"));
    }
    if sanitized.origem_cadastro != ORIGEM_CADASTRO {
        return Err(IntegrationError::validation(format!(
            "Unknown registration origin: {}",
            sanitized.origem_cadastro
        )));
    }
    if DateTime::parse_from_rfc3339(&sanitized.created_at).is_err() {
        return Err(IntegrationError::validation(
            "created_at must be an RFC 3339 timestamp",
        ));
    }

    Ok(sanitized)
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn digits_only(s: &str) -> String {
    s.chars().filter(char::is_ascii_digit).collect()
}

fn validate_name(name: &str) -> Result<(), IntegrationError> {
    let len = name.chars().count();
    if !(2..=NAME_MAX_CHARS).contains(&len) {
        return Err(IntegrationError::validation(
            "Name must have between 2 and 100 characters",
        ));
    }
    if !name.chars().all(|c| c.is_alphabetic() || c == ' ') {
        return Err(IntegrationError::validation(
            "Name must contain only letters and spaces",
        ));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), IntegrationError> {
    let invalid = || IntegrationError::validation("Invalid email address");
    if email.len() > EMAIL_MAX_LEN || email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|l| l.is_empty()) {
        return Err(invalid());
    }
    Ok(())
}

fn is_valid_phone(digits: &str) -> bool {
    matches!(digits.len(), 10 | 11)
}

/// Brazilian CPF: 11 digits, not a repeated digit, with two mod-11 check digits.
pub fn is_valid_cpf(digits: &str) -> bool {
    let d: Vec<u32> = digits.chars().filter_map(|c| c.to_digit(10)).collect();
    if d.len() != 11 || digits.len() != 11 {
        return false;
    }
    if d.iter().all(|&x| x == d[0]) {
        return false;
    }
    let check = |n: usize| {
        let sum: u32 = d[..n]
            .iter()
            .enumerate()
            .map(|(i, &x)| x * (n as u32 + 1 - i as u32))
            .sum();
        let rem = (sum * 10) % 11;
        if rem == 10 { 0 } else { rem }
    };
    check(9) == d[9] && check(10) == d[10]
}

/// Redacts an email for log output: `m***@example.com`.
pub fn mask_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) => {
            let first = local.chars().next().map(String::from).unwrap_or_default();
            format!("{first}***@{domain}")
        }
        None => "***".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> InstitutoUserData {
        InstitutoUserData {
            nome: "  José   da Silva ".to_string(),
            email: " Jose@Example.COM ".to_string(),
            telefone: "(11) 98765-4321".to_string(),
            cpf: "529.982.247-25".to_string(),
            origem_cadastro: ORIGEM_CADASTRO.to_string(),
            consentimento_data_sharing: true,
            created_at: "2026-03-01T10:15:30.123Z".to_string(),
        }
    }

    #[test]
    fn test_sanitizes_valid_payload() {
        let clean = sanitize_user_data(&valid()).unwrap();
        assert_eq!(clean.nome, "José da Silva");
        assert_eq!(clean.email, "jose@example.com");
        assert_eq!(clean.telefone, "11987654321");
        assert_eq!(clean.cpf, "52998224725");
    }

    #[test]
    fn test_missing_consent_is_consent_error() {
        let data = InstitutoUserData {
            consentimento_data_sharing: false,
            ..valid()
        };
        let err = sanitize_user_data(&data).unwrap_err();
        assert_eq!(err.kind, IntegrationErrorType::ConsentError);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_invalid_fields_are_validation_errors() {
        let cases = [
            InstitutoUserData { nome: "J".into(), ..valid() },
            InstitutoUserData { nome: "R2D2".into(), ..valid() },
            InstitutoUserData { email: "jose.example.com".into(), ..valid() },
            InstitutoUserData { email: "jose@localhost".into(), ..valid() },
            InstitutoUserData { telefone: "12345".into(), ..valid() },
            InstitutoUserData { cpf: "111.111.111-11".into(), ..valid() },
            InstitutoUserData { cpf: "529.982.247-26".into(), ..valid() },
            InstitutoUserData { origem_cadastro: "site".into(), ..valid() },
            InstitutoUserData { created_at: "yesterday".into(), ..valid() },
        ];
        for case in cases {
            let err = sanitize_user_data(&case).unwrap_err();
            assert_eq!(err.kind, IntegrationErrorType::ValidationError, "{case:?}");
        }
    }

    #[test]
    fn test_cpf_check_digits() {
        assert!(is_valid_cpf("52998224725"));
        assert!(!is_valid_cpf("52998224724"));
        assert!(!is_valid_cpf("5299822472"));
        assert!(!is_valid_cpf("00000000000"));
    }

    #[test]
    fn test_created_at_must_be_a_real_instant() {
        for ok in ["2026-03-01T10:15:30Z", "2026-03-01T10:15:30-03:00", "2024-02-29T00:00:00Z"] {
            let data = InstitutoUserData { created_at: ok.into(), ..valid() };
            assert!(sanitize_user_data(&data).is_ok(), "{ok}");
        }
        for bad in [
            "2026-13-45T25:61:61Z",
            "2025-02-29T00:00:00Z",
            "2026-03-01T10:15:30",
            "2026-03-01T10:15:30.Z",
        ] {
            let data = InstitutoUserData { created_at: bad.into(), ..valid() };
            let err = sanitize_user_data(&data).unwrap_err();
            assert_eq!(err.kind, IntegrationErrorType::ValidationError, "{bad}");
        }
    }

    #[test]
    fn test_mask_email() {
        assert_eq!(mask_email("maria@example.com"), "m***@example.com");
        assert_eq!(mask_email("broken"), "***");
    }
}
