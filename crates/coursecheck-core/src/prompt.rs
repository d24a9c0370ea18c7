//! Prompt construction for answer validation.
//!
//! The model has no structured-output guarantee, so the expected JSON shape
//! and the allowed status values are spelled out inside the prompt itself.
//! [`crate::normalize`] handles whatever comes back anyway.

use crate::types::ValidationStatus;

/// System instruction sent alongside every validation prompt.
pub const SYSTEM_INSTRUCTION: &str =
    "Tu réponds uniquement en JSON valide, sans aucun texte en dehors du JSON.";

/// Rule preset for French spelling and grammar review of free text.
pub const GRAMMAR_CORRECTION_RULE: &str = r#"
Tu es un correcteur de français (Québec ok). Analyse le texte de l'utilisateur.

Vérifie l'orthographe, la grammaire, les accords, la conjugaison, la ponctuation et le style.

Règles:
- Liste au plus 8 fautes dans "points_a_ameliorer", chacune sous la forme
  "Extrait: ... / Erreur: ... / Correction: ...".
- Si le texte est déjà correct, "points_a_ameliorer" est vide et le statut est "Conforme".
- La "suggestion" contient le texte COMPLET corrigé.
- Garde un ton professionnel, pas de blabla.
"#;

/// Question used with [`GRAMMAR_CORRECTION_RULE`].
pub const GRAMMAR_CORRECTION_QUESTION: &str = "Correction orthographe/grammaire";

/// Render the validation prompt for one answer.
///
/// Pure string assembly: never fails. A missing or blank `question` is left
/// out of the context block.
pub fn build_prompt(question: Option<&str>, answer: &str, rule: &str) -> String {
    let mut prompt = String::with_capacity(answer.len() + rule.len() + 1024);

    prompt.push_str(
        "Agis comme un expert pédagogique. Valide la réponse d'un enseignant pour un plan de cours.\n\n",
    );

    if let Some(question) = question.map(str::trim).filter(|q| !q.is_empty()) {
        prompt.push_str(&format!("Question : \"{}\"\n", question));
    }
    prompt.push_str(&format!("Réponse de l'enseignant : \"{}\"\n", answer.trim()));
    prompt.push_str(&format!("Règle à respecter : \"{}\"\n\n", rule.trim()));

    prompt.push_str(
        "Retourne UNIQUEMENT un objet JSON (sans texte avant ni après) avec ce format EXACT :\n",
    );
    prompt.push_str(&output_format());
    prompt.push_str("\nN'ajoute aucun texte, commentaire ou balise Markdown en dehors de l'objet JSON.\n");

    prompt
}

/// The JSON contract embedded in every prompt.
fn output_format() -> String {
    let statuses = ValidationStatus::MODEL_FACING
        .iter()
        .map(|s| format!("\"{}\"", s.label()))
        .collect::<Vec<_>>()
        .join(" | ");

    format!(
        r#"{{
  "status": {statuses},
  "points_positifs": ["point positif 1", "point positif 2"],
  "points_a_ameliorer": ["point à améliorer 1", "point à améliorer 2"],
  "suggestion": "Une suggestion de réécriture améliorée si nécessaire"
}}
"#
    )
}
