//! Bug Whisperer Triage: rule-based severity and templated explanations.
//!
//! Both functions are pure and case-sensitive: they look for the exception
//! class name (e.g. `ZeroDivisionError`) as a substring of the raw error text.

pub mod severity;
pub mod template;

pub use severity::classify;
pub use template::{resolve, Template, TEMPLATES};
