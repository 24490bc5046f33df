use std::time::Duration;

use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use squad_eval::analysis::evaluate_file;
use squad_eval::batch::{read_jsonl, BatchError, BatchRequest, BatchRun, BatchStatus, PollPolicy};
use squad_eval::dataset::{extract_questions, load_dataset_from_str, Extraction, QuestionRecord};
use squad_eval::grading::{pair_with_questions, rejected_path, run_grading};
use squad_eval::providers::{AzureInferenceClient, OpenAIClient};
use squad_eval::runner::{run_batch_answers, AnswerPrompt, AnswerRecord, SerialAnswerer};

const DATASET: &str = r#"{
  "version": "v2.0",
  "data": [{
    "title": "Capitals",
    "paragraphs": [{
      "context": "Paris is the capital of France. Berlin is the capital of Germany.",
      "qas": [
        {"id": "q1", "question": "What is the capital of France?", "is_impossible": false,
         "answers": [{"text": "Paris", "answer_start": 0}]},
        {"id": "q2", "question": "What is the capital of Mars?", "is_impossible": true, "answers": []},
        {"id": "q3", "question": "What is the capital of Germany?", "is_impossible": false,
         "answers": [{"text": "Berlin", "answer_start": 32}]}
      ]
    }]
  }]
}"#;

fn questions() -> Vec<QuestionRecord> {
    let dataset = load_dataset_from_str(DATASET).unwrap();
    extract_questions(&dataset, 500, Extraction::QuestionsOnly)
}

fn fast_policy(max_attempts: Option<u32>) -> PollPolicy {
    PollPolicy {
        initial_interval: Duration::from_millis(1),
        max_interval: Duration::from_millis(5),
        multiplier: 2.0,
        max_attempts,
        timeout: Duration::from_secs(10),
    }
}

fn result_line(custom_id: &str, content: &str) -> String {
    json!({
        "id": format!("batch_req_{}", custom_id.len()),
        "custom_id": custom_id,
        "response": {
            "status_code": 200,
            "request_id": "req",
            "body": {
                "model": "gpt-4o",
                "choices": [{"index": 0, "message": {"role": "assistant", "content": content}, "finish_reason": "stop"}],
                "usage": {"prompt_tokens": 40, "completion_tokens": 12, "total_tokens": 52}
            }
        },
        "error": null
    })
    .to_string()
}

/// Mount the four Batch API endpoints for one job with the given status
async fn mount_batch_api(server: &MockServer, status: &str, output: Option<String>) {
    Mock::given(method("POST"))
        .and(path("/v1/files"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "file-in",
            "object": "file",
            "purpose": "batch"
        })))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/batches"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "batch_1",
            "object": "batch",
            "status": "validating",
            "input_file_id": "file-in"
        })))
        .expect(1)
        .mount(server)
        .await;

    let output_file_id = output.as_ref().map(|_| "file-out");
    Mock::given(method("GET"))
        .and(path("/v1/batches/batch_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "batch_1",
            "object": "batch",
            "status": status,
            "input_file_id": "file-in",
            "output_file_id": output_file_id,
            "request_counts": {"total": 2, "completed": 2, "failed": 0}
        })))
        .mount(server)
        .await;

    if let Some(body) = output {
        Mock::given(method("GET"))
            .and(path("/v1/files/file-out/content"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .expect(1)
            .mount(server)
            .await;
    }
}

fn client(server: &MockServer) -> OpenAIClient {
    OpenAIClient::new("sk-test".to_string()).with_base_url(format!("{}/v1", server.uri()))
}

#[tokio::test]
async fn test_grading_paris_berlin() {
    let server = MockServer::start().await;
    let questions = questions();
    let answers = vec![
        AnswerRecord {
            question: "What is the capital of France?".to_string(),
            response: "Paris".to_string(),
            input_tokens: 0,
            output_tokens: 0,
        },
        AnswerRecord {
            question: "What is the capital of Germany?".to_string(),
            response: "Munich".to_string(),
            input_tokens: 0,
            output_tokens: 0,
        },
    ];
    let pairs = pair_with_questions(&questions, &answers).unwrap();
    assert_eq!(pairs.len(), 2);
    assert_eq!(pairs[1].reference_answer, "berlin");

    let output = [
        result_line(&pairs[0].id, r#"{"explanation": "Paris matches the reference.", "score": true}"#),
        result_line(
            &pairs[1].id,
            "```json\n{\"explanation\": \"Munich is not Berlin.\", \"score\": false}\n```",
        ),
    ]
    .join("\n");
    mount_batch_api(&server, "completed", Some(output)).await;

    let dir = TempDir::new().unwrap();
    let run = BatchRun::new(dir.path().join("grading-in.jsonl"), dir.path().join("grading-out.jsonl"))
        .with_poll_policy(fast_policy(None));

    let report = run_grading(&client(&server), &pairs, "gpt-4o", 0.2, &run)
        .await
        .unwrap();

    let scores: Vec<bool> = report.graded.iter().map(|g| g.judgment.score).collect();
    assert_eq!(scores, vec![true, false]);
    assert!(report.graded.iter().all(|g| !g.judgment.explanation.is_empty()));
    assert!(report.rejected.is_empty());
    assert!(!rejected_path(&run.output_path).exists());

    let requests: Vec<BatchRequest> = read_jsonl(&run.input_path).unwrap();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].url, "/v1/chat/completions");
    let body = serde_json::to_value(&requests[0].body).unwrap();
    assert_eq!(body["response_format"]["type"], "json_schema");

    let summary = evaluate_file(&run.output_path).unwrap();
    assert_eq!(summary.correct, 1);
    assert_eq!(summary.total, 2);
    assert_eq!(summary.describe(), format!("Accuracy for {}: 50.00%", run.output_path.display()));
}

#[tokio::test]
async fn test_grading_quarantines_unparseable_reply() {
    let server = MockServer::start().await;
    let questions = questions();
    let answers: Vec<AnswerRecord> = questions
        .iter()
        .map(|q| AnswerRecord {
            question: q.question.clone(),
            response: "I don't know".to_string(),
            input_tokens: 0,
            output_tokens: 0,
        })
        .collect();
    let pairs = pair_with_questions(&questions, &answers).unwrap();

    let output = [
        result_line(&pairs[0].id, "Looks wrong to me."),
        result_line(&pairs[1].id, r#"{"explanation": "Not an answer.", "score": false}"#),
    ]
    .join("\n");
    mount_batch_api(&server, "completed", Some(output)).await;

    let dir = TempDir::new().unwrap();
    let run = BatchRun::new(dir.path().join("in.jsonl"), dir.path().join("out.jsonl"))
        .with_poll_policy(fast_policy(None));

    let report = run_grading(&client(&server), &pairs, "gpt-4o", 0.2, &run)
        .await
        .unwrap();
    assert_eq!(report.graded.len(), 1);
    assert_eq!(report.rejected.len(), 1);

    let rejected: Vec<Value> = read_jsonl(rejected_path(&run.output_path)).unwrap();
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0]["custom_id"], pairs[0].id.as_str());
}

#[tokio::test]
async fn test_batch_answers_correlate_by_custom_id() {
    let server = MockServer::start().await;
    // Results arrive in reverse order
    let output = [
        result_line("question_2", "Berlin"),
        result_line("question_1", "Paris"),
    ]
    .join("\n");
    mount_batch_api(&server, "completed", Some(output)).await;

    let dir = TempDir::new().unwrap();
    let run = BatchRun::new(dir.path().join("answers-in.jsonl"), dir.path().join("answers-out.jsonl"))
        .with_poll_policy(fast_policy(None));
    let prompt = AnswerPrompt {
        system_prompt: "You are an intelligent AI.".to_string(),
        user_template: "Answer this question concisely: {question}".to_string(),
    };

    let questions = questions();
    let answers = run_batch_answers(&client(&server), &questions, &prompt, "gpt-4o-mini", 0.2, &run)
        .await
        .unwrap();

    assert_eq!(answers.len(), 2);
    assert_eq!(answers[0].question.question, "What is the capital of France?");
    assert_eq!(answers[0].content(), Some("Paris"));
    assert_eq!(answers[1].content(), Some("Berlin"));

    let requests: Vec<BatchRequest> = read_jsonl(&run.input_path).unwrap();
    assert_eq!(requests.len(), questions.len());
    assert_eq!(requests[0].custom_id, "question_1");
    assert_eq!(
        requests[1].user_content(),
        Some("Answer this question concisely: What is the capital of Germany?")
    );
    assert!(run.output_path.exists());
}

#[tokio::test]
async fn test_pending_batch_is_reported_not_awaited_forever() {
    let server = MockServer::start().await;
    mount_batch_api(&server, "in_progress", None).await;

    let dir = TempDir::new().unwrap();
    let run = BatchRun::new(dir.path().join("in.jsonl"), dir.path().join("out.jsonl"))
        .with_poll_policy(fast_policy(Some(3)));

    let prompt = AnswerPrompt {
        system_prompt: "s".to_string(),
        user_template: "{question}".to_string(),
    };
    let err = run_batch_answers(&client(&server), &questions(), &prompt, "gpt-4o-mini", 0.2, &run)
        .await
        .unwrap_err();

    match err {
        BatchError::StillPending { status, attempts, .. } => {
            assert_eq!(status, BatchStatus::InProgress);
            assert_eq!(attempts, 3);
        }
        other => panic!("expected pending, got {other}"),
    }
    assert!(!run.output_path.exists());
}

#[tokio::test]
async fn test_failed_batch_is_an_error() {
    let server = MockServer::start().await;
    mount_batch_api(&server, "failed", None).await;

    let dir = TempDir::new().unwrap();
    let run = BatchRun::new(dir.path().join("in.jsonl"), dir.path().join("out.jsonl"))
        .with_poll_policy(fast_policy(None));
    let prompt = AnswerPrompt {
        system_prompt: "s".to_string(),
        user_template: "{question}".to_string(),
    };

    let err = run_batch_answers(&client(&server), &questions(), &prompt, "gpt-4o-mini", 0.2, &run)
        .await
        .unwrap_err();
    assert!(matches!(err, BatchError::JobFailed { status: BatchStatus::Failed, .. }));
}

#[tokio::test]
async fn test_serial_answers_append_against_azure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(query_param("api-version", "2024-05-01-preview"))
        .and(header("api-key", "azure-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "Llama-3.2-11B-Vision-Instruct",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "Paris."}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 30, "completion_tokens": 3, "total_tokens": 33}
        })))
        .expect(4)
        .mount(&server)
        .await;

    let provider = AzureInferenceClient::new(server.uri(), "azure-key".to_string());
    let answerer = SerialAnswerer::new(std::sync::Arc::new(provider), "You are an intelligent AI.");

    let dir = TempDir::new().unwrap();
    let output = dir.path().join("llama-answers.jsonl");
    let questions = questions();

    let summary = answerer.run(&questions, &output).await.unwrap();
    assert_eq!(summary.answered, 2);
    assert_eq!(summary.input_tokens, 60);
    assert_eq!(summary.output_tokens, 6);

    let records: Vec<AnswerRecord> = read_jsonl(&output).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].question, "What is the capital of Germany?");
    assert_eq!(records[1].response, "Paris.");

    // A second run appends rather than truncating
    answerer.run(&questions, &output).await.unwrap();
    let records: Vec<AnswerRecord> = read_jsonl(&output).unwrap();
    assert_eq!(records.len(), 4);
}
