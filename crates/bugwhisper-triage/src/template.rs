//! Canned cause/fix explanations for recognized error categories.

/// A known error category and its explanation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Template {
    /// Substring that identifies the category.
    pub marker: &'static str,
    pub suggestion: &'static str,
}

/// Checked in order; the first marker found wins.
pub const TEMPLATES: &[Template] = &[
    Template {
        marker: "ZeroDivisionError",
        suggestion: "Cause: Division by zero.\nFix: Check denominator before dividing.",
    },
    Template {
        marker: "NameError",
        suggestion: "Cause: A variable was used before being defined.\nFix: Ensure the variable is initialized.",
    },
    Template {
        marker: "SyntaxError",
        suggestion: "Cause: Code syntax is invalid.\nFix: Review and correct code syntax.",
    },
    Template {
        marker: "ConnectionError",
        suggestion: "Cause: Failed to connect to the database.\nFix: Verify host, port, and credentials.",
    },
];

/// Return the canned suggestion for the first matching category, if any.
pub fn resolve(error_text: &str) -> Option<&'static str> {
    TEMPLATES
        .iter()
        .find(|t| error_text.contains(t.marker))
        .map(|t| t.suggestion)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify;
    use bugwhisper_core::Severity;

    #[test]
    fn test_zero_division_template_and_severity() {
        for text in [
            "ZeroDivisionError: division by zero",
            "Traceback (most recent call last): ZeroDivisionError: integer division or modulo by zero",
        ] {
            assert_eq!(classify(text), Severity::Critical);
            assert_eq!(
                resolve(text),
                Some("Cause: Division by zero.\nFix: Check denominator before dividing.")
            );
        }
    }

    #[test]
    fn test_known_categories() {
        assert!(resolve("NameError: name 'x' is not defined")
            .unwrap()
            .contains("initialized"));
        assert!(resolve("SyntaxError: unexpected EOF").unwrap().contains("syntax"));
        assert!(resolve("ConnectionError: refused").unwrap().contains("credentials"));
    }

    #[test]
    fn test_no_match() {
        assert_eq!(resolve("KeyError: 'user_id'"), None);
        assert_eq!(resolve(""), None);
    }

    #[test]
    fn test_first_template_wins() {
        let text = "NameError while formatting ZeroDivisionError";
        assert_eq!(resolve(text), Some(TEMPLATES[0].suggestion));
    }

    #[test]
    fn test_every_template_has_fix_marker() {
        assert!(TEMPLATES.iter().all(|t| t.suggestion.contains("Fix:")));
    }
}
