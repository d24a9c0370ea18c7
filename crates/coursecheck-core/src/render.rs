//! Plain-text rendering of validation results.

use std::fmt::Write as _;

use crate::types::ValidationResult;

impl ValidationResult {
    /// Render the result as readable text for a terminal or a history entry.
    pub fn to_pretty_text(&self) -> String {
        let mut out = String::new();

        let _ = writeln!(out, "Statut : {}", self.status);

        write_section(&mut out, "Points positifs", &self.points_positifs);
        write_section(&mut out, "Points à améliorer", &self.points_a_ameliorer);

        let _ = writeln!(out, "\nSuggestion :\n{}", self.suggestion.trim());
        out
    }
}

fn write_section(out: &mut String, title: &str, items: &[String]) {
    let _ = writeln!(out, "\n{} :", title);
    if items.is_empty() {
        out.push_str("  (aucun)\n");
        return;
    }
    for item in items {
        let _ = writeln!(out, "  - {}", item.trim());
    }
}

#[cfg(test)]
mod tests {
    use crate::types::{ValidationResult, ValidationStatus};

    #[test]
    fn test_pretty_text_lists_points() {
        let result = ValidationResult {
            status: ValidationStatus::Conforme,
            points_positifs: vec!["Objectif clair".to_string()],
            points_a_ameliorer: vec![],
            suggestion: "Rien à changer.".to_string(),
        };

        let text = result.to_pretty_text();
        assert!(text.starts_with("Statut : Conforme\n"));
        assert!(text.contains("  - Objectif clair"));
        assert!(text.contains("Points à améliorer :\n  (aucun)"));
        assert!(text.ends_with("Rien à changer.\n"));
    }
}
