// src/services/parser.rs

use std::fmt;

use serde_json::{Map, Value};

use crate::models::question::{GeneratedQuestion, OPTION_KEYS};

const OPTION_FIELDS: [&str; 4] = ["options.A", "options.B", "options.C", "options.D"];

/// The model response did not contain a usable question array.
#[derive(Debug, Clone, PartialEq)]
pub enum FormatError {
    /// No `[ ... ]` span in the response.
    NoArray,
    InvalidJson(String),
    /// The array parsed but held no questions.
    Empty,
    MissingField { index: usize, field: &'static str },
    InvalidAnswer { index: usize, value: String },
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatError::NoArray => write!(f, "response contains no JSON array"),
            FormatError::InvalidJson(msg) => write!(f, "response array is not valid JSON: {}", msg),
            FormatError::Empty => write!(f, "response array is empty"),
            FormatError::MissingField { index, field } => {
                write!(f, "question {} is missing '{}'", index, field)
            }
            FormatError::InvalidAnswer { index, value } => {
                write!(f, "question {} has invalid correctAnswer '{}'", index, value)
            }
        }
    }
}

impl std::error::Error for FormatError {}

/// Parses a raw model response into validated questions.
///
/// Code fences are stripped and the question array is located in the
/// surrounding prose. One malformed element rejects the whole response.
pub fn parse_questions(raw: &str) -> Result<Vec<GeneratedQuestion>, FormatError> {
    let clean = raw.replace("```json", "").replace("```", "");

    let items = locate_array(&clean)?;

    if items.is_empty() {
        return Err(FormatError::Empty);
    }

    items
        .iter()
        .enumerate()
        .map(|(index, item)| parse_question(index, item))
        .collect()
}

/// Tries each `[` in turn, parsing up to the bracket that closes it.
/// The first non-empty array of objects wins, else the first array that parsed.
fn locate_array(text: &str) -> Result<Vec<Value>, FormatError> {
    let first = text.find('[').ok_or(FormatError::NoArray)?;
    if !text.rfind(']').is_some_and(|end| end > first) {
        return Err(FormatError::NoArray);
    }

    let mut fallback: Option<Vec<Value>> = None;
    let mut first_error: Option<String> = None;
    for (start, _) in text.match_indices('[') {
        let mut values = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Vec<Value>>();
        match values.next() {
            Some(Ok(items)) if !items.is_empty() && items.iter().all(Value::is_object) => {
                return Ok(items);
            }
            Some(Ok(items)) => {
                fallback.get_or_insert(items);
            }
            Some(Err(e)) => {
                first_error.get_or_insert_with(|| e.to_string());
            }
            None => {}
        }
    }

    fallback.ok_or_else(|| FormatError::InvalidJson(first_error.unwrap_or_default()))
}

fn parse_question(index: usize, item: &Value) -> Result<GeneratedQuestion, FormatError> {
    let missing = |field| FormatError::MissingField { index, field };

    let question_text = non_empty_str(item.get("question")).ok_or_else(|| missing("question"))?;
    let options: &Map<String, Value> = item
        .get("options")
        .and_then(Value::as_object)
        .ok_or_else(|| missing("options"))?;

    let mut texts: [String; 4] = Default::default();
    for ((slot, key), field) in texts.iter_mut().zip(OPTION_KEYS).zip(OPTION_FIELDS) {
        *slot = non_empty_str(options.get(key)).ok_or_else(|| missing(field))?.to_string();
    }

    let answer = item
        .get("correctAnswer")
        .and_then(Value::as_str)
        .ok_or_else(|| missing("correctAnswer"))?;
    let answer_index = OPTION_KEYS
        .iter()
        .position(|key| *key == answer.trim())
        .ok_or_else(|| FormatError::InvalidAnswer {
            index,
            value: answer.to_string(),
        })?;

    let hint = non_empty_str(item.get("hint")).map(str::to_string);

    Ok(GeneratedQuestion {
        question_text: question_text.to_string(),
        correct_option: texts[answer_index].clone(),
        options: texts,
        hint,
    })
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}
