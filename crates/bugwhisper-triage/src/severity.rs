//! Severity classification by keyword containment.

use bugwhisper_core::Severity;

/// Keywords checked first; any hit is Critical.
const CRITICAL_KEYWORDS: &[&str] = &["ConnectionError", "ZeroDivisionError"];

const WARNING_KEYWORDS: &[&str] = &["SyntaxError"];

const INFO_KEYWORDS: &[&str] = &["NameError"];

/// Map raw error text to a severity label.
///
/// Precedence is Critical, then Warning, then Info; text matching nothing is Info.
pub fn classify(error_text: &str) -> Severity {
    if contains_any(error_text, CRITICAL_KEYWORDS) {
        Severity::Critical
    } else if contains_any(error_text, WARNING_KEYWORDS) {
        Severity::Warning
    } else if contains_any(error_text, INFO_KEYWORDS) {
        Severity::Info
    } else {
        Severity::Info
    }
}

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| text.contains(k))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_critical_keywords() {
        assert_eq!(classify("ZeroDivisionError: division by zero"), Severity::Critical);
        assert_eq!(
            classify("ConnectionError: Failed to connect to database"),
            Severity::Critical
        );
    }

    #[test]
    fn test_warning_and_info() {
        assert_eq!(classify("SyntaxError: unexpected EOF while parsing"), Severity::Warning);
        assert_eq!(classify("NameError: name 'x' is not defined"), Severity::Info);
        assert_eq!(classify("KeyError: 'missing'"), Severity::Info);
        assert_eq!(classify(""), Severity::Info);
    }

    #[test]
    fn test_precedence_critical_over_warning() {
        let text = "SyntaxError raised while handling ZeroDivisionError";
        assert_eq!(classify(text), Severity::Critical);
    }

    #[test]
    fn test_case_sensitive() {
        assert_eq!(classify("zerodivisionerror: division by zero"), Severity::Info);
    }
}
