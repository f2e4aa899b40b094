// src/services/prompt.rs

use crate::models::quiz::Difficulty;

/// Builds the generation prompt for one batch.
///
/// The count and the "JSON only" rule are requests to the model, not
/// guarantees; the response parser enforces the shape.
pub fn build_prompt(content: &str, difficulty: Difficulty, count: usize) -> String {
    format!(
        r#"Generate exactly {count} multiple-choice questions of {difficulty} difficulty based on the content below.

CONTENT:
{content}

Respond ONLY with a valid JSON array of exactly {count} objects in this format:
[
  {{
    "question": "Question text",
    "options": {{ "A": "...", "B": "...", "C": "...", "D": "..." }},
    "correctAnswer": "A"
  }}
]

Every question must have four distinct, non-empty options A, B, C and D.
"correctAnswer" must be one of "A", "B", "C" or "D".
Do not wrap the array in markdown or add any explanation before or after it."#
    )
}
