use crate::errors::AppError;

/// Accumulates field-level validation failures so a request reports every
/// violated field at once, not just the first.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<String>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    /// `field` must be present and non-blank.
    pub fn require(&mut self, field: &str, value: Option<&str>) {
        match value {
            Some(v) if !v.trim().is_empty() => {}
            _ => self.errors.push(format!("{field} can't be blank")),
        }
    }

    /// Character-count ceiling, only enforced when the value is present.
    pub fn max_len(&mut self, field: &str, value: Option<&str>, max: usize) {
        if let Some(v) = value {
            if v.chars().count() > max {
                self.errors
                    .push(format!("{field} is too long (maximum is {max} characters)"));
            }
        }
    }

    /// Loose shape check, not RFC 5322. Matches the original's intent of
    /// rejecting obviously broken addresses.
    pub fn email_format(&mut self, field: &str, value: Option<&str>) {
        if let Some(v) = value {
            if !is_plausible_email(v) {
                self.errors.push(format!("{field} is invalid"));
            }
        }
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn finish(self) -> Result<(), AppError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::validation(self.errors))
        }
    }
}

pub fn is_plausible_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && domain.contains('.')
        && !value.contains(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_rejects_missing_and_blank() {
        let mut v = Validator::new();
        v.require("Title", None);
        v.require("Description", Some("   "));
        let err = v.finish().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation error: Title can't be blank, Description can't be blank"
        );
    }

    #[test]
    fn max_len_counts_chars_not_bytes() {
        let mut v = Validator::new();
        let value = "é".repeat(100);
        v.max_len("Title", Some(&value), 100);
        assert!(v.is_ok());
        v.max_len("Title", Some(&format!("{value}é")), 100);
        assert!(!v.is_ok());
    }

    #[test]
    fn max_len_skips_absent_values() {
        let mut v = Validator::new();
        v.max_len("Requirements", None, 2000);
        assert!(v.finish().is_ok());
    }

    #[test]
    fn email_shapes() {
        assert!(is_plausible_email("jane@example.com"));
        assert!(!is_plausible_email("jane@example"));
        assert!(!is_plausible_email("@example.com"));
        assert!(!is_plausible_email("jane example@foo.com"));
        assert!(!is_plausible_email("no-at-sign"));
    }

    #[test]
    fn finish_is_ok_when_clean() {
        let mut v = Validator::new();
        v.require("Title", Some("Backend Engineer"));
        v.email_format("Contact email", Some("jobs@acme.com"));
        assert!(v.finish().is_ok());
    }
}
