//! Grading prompts and the structured output schema

use serde_json::json;

use crate::batch::BatchRequest;
use crate::providers::{JsonSchemaSpec, Message, ResponseFormat};

use super::GradingRequest;

pub const GRADING_SYSTEM_PROMPT: &str = "You are a teacher tasked with determining whether a \
student's answer to a question was correct, based on a set of possible correct answers. You must \
only use the provided possible correct answers to determine if the student's response was correct.";

/// User message for one grading request
pub fn grading_user_prompt(request: &GradingRequest) -> String {
    format!(
        "Question: {}
Student's Response: {}
Possible Correct Answers: {}

Your response should be a valid JSON in the following format:
{{
\"explanation\": \"(str): A short explanation of why the student's answer was correct or incorrect.\",
\"score\": \"(bool): true if the student's answer was correct, false if it was incorrect.\"
}}",
        request.question, request.student_response, request.reference_answer
    )
}

/// Strict `{explanation, score}` schema for the grading model's reply
pub fn grading_response_format() -> ResponseFormat {
    ResponseFormat::JsonSchema {
        json_schema: JsonSchemaSpec {
            name: "grading_output".to_string(),
            schema: json!({
                "type": "object",
                "properties": {
                    "explanation": {
                        "type": "string",
                        "description": "A short explanation of why the student's answer was correct or incorrect."
                    },
                    "score": {
                        "type": "boolean",
                        "description": "True if the student's answer is correct, false otherwise."
                    }
                },
                "required": ["explanation", "score"],
                "additionalProperties": false
            }),
            strict: true,
        },
    }
}

/// One schema-constrained batch request per pair
pub fn build_grading_requests(
    pairs: &[GradingRequest],
    model: &str,
    temperature: f32,
) -> Vec<BatchRequest> {
    pairs
        .iter()
        .map(|pair| {
            BatchRequest::chat(
                pair.id.clone(),
                model,
                Some(temperature),
                vec![
                    Message::system(GRADING_SYSTEM_PROMPT),
                    Message::user(grading_user_prompt(pair)),
                ],
            )
            .with_response_format(grading_response_format())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> GradingRequest {
        GradingRequest {
            id: "1. Capital of France?".to_string(),
            index: 0,
            question: "Capital of France?".to_string(),
            student_response: "Paris, France".to_string(),
            reference_answer: "paris".to_string(),
        }
    }

    #[test]
    fn test_user_prompt_substitution() {
        let prompt = grading_user_prompt(&pair());
        assert!(prompt.starts_with("Question: Capital of France?\n"));
        assert!(prompt.contains("Student's Response: Paris, France"));
        assert!(prompt.contains("Possible Correct Answers: paris"));
        assert!(prompt.contains("\"score\""));
    }

    #[test]
    fn test_placeholder_text_in_response_kept_verbatim() {
        let mut request = pair();
        request.student_response = "I'd say {correct_answer}".to_string();
        request.question = "Capital of {student_response}?".to_string();

        let prompt = grading_user_prompt(&request);
        assert!(prompt.starts_with("Question: Capital of {student_response}?\n"));
        assert!(prompt.contains("Student's Response: I'd say {correct_answer}\n"));
        assert!(prompt.contains("Possible Correct Answers: paris\n"));
    }

    #[test]
    fn test_requests_carry_schema() {
        let requests = build_grading_requests(&[pair()], "gpt-4o", 0.2);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].custom_id, "1. Capital of France?");
        assert_eq!(requests[0].body.model, "gpt-4o");

        let value = serde_json::to_value(&requests[0]).unwrap();
        let schema = &value["body"]["response_format"]["json_schema"];
        assert_eq!(schema["name"], "grading_output");
        assert_eq!(schema["schema"]["required"], json!(["explanation", "score"]));
        assert_eq!(schema["schema"]["properties"]["score"]["type"], "boolean");
    }
}
