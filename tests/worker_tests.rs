use mockito::Matcher;
use serde_json::json;

use jobgenie::{
    models::{SubmitOutcome, TaskId, TaskKind, TaskStatus},
    services::{HttpWorker, RecommendationWorker},
    AppError,
};

fn task_id(id: &str) -> TaskId {
    TaskId::new(id).unwrap()
}

#[tokio::test]
async fn test_submit_returns_queued_task() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/recommendations")
        .match_body(Matcher::Json(json!({"email": "ada@example.com"})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"task_id": "abc-123", "message": "Recommendation task queued"}"#)
        .create_async()
        .await;

    let worker = HttpWorker::new(server.url());
    let outcome = worker.submit_recommendations("ada@example.com").await.unwrap();

    mock.assert_async().await;
    assert_eq!(
        outcome,
        SubmitOutcome::Queued {
            task_id: task_id("abc-123"),
            message: Some("Recommendation task queued".to_string()),
        }
    );
}

#[tokio::test]
async fn test_submit_returns_jobs_immediately() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/recommendations")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!([
                {"id": 1, "title": "Backend Engineer", "company": "Acme", "matchScore": 0.92},
                {"title": "Data Analyst", "company": "Globex"}
            ])
            .to_string(),
        )
        .create_async()
        .await;

    let worker = HttpWorker::new(server.url());
    let outcome = worker.submit_recommendations("ada@example.com").await.unwrap();

    match outcome {
        SubmitOutcome::Immediate(jobs) => {
            assert_eq!(jobs.len(), 2);
            assert_eq!(jobs[0].title(), "Backend Engineer");
            assert_eq!(jobs[1].company(), Some("Globex"));
        }
        other => panic!("expected immediate jobs, got {:?}", other),
    }
}

#[tokio::test]
async fn test_submit_server_error_is_submission_failure() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/recommendations")
        .with_status(500)
        .with_body("internal error")
        .create_async()
        .await;

    let worker = HttpWorker::new(server.url());
    let err = worker
        .submit_recommendations("ada@example.com")
        .await
        .unwrap_err();

    match err {
        AppError::SubmissionFailed(message) => assert!(message.contains("500")),
        other => panic!("expected SubmissionFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_submit_rejects_empty_task_id() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/recommendations")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"task_id": ""}"#)
        .create_async()
        .await;

    let worker = HttpWorker::new(server.url());
    let err = worker
        .submit_recommendations("ada@example.com")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::SubmissionFailed(_)));
}

#[tokio::test]
async fn test_status_pending() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/recommendations/abc-123")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"status": "pending"}"#)
        .create_async()
        .await;

    let worker = HttpWorker::new(server.url());
    let status = worker
        .task_status(TaskKind::Recommendation, &task_id("abc-123"))
        .await
        .unwrap();
    assert_eq!(status, TaskStatus::Pending);
}

#[tokio::test]
async fn test_status_completed_with_data() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/recommendations/abc-123")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"status": "completed", "data": [{"title": "Engineer"}]}).to_string())
        .create_async()
        .await;

    let worker = HttpWorker::new(server.url());
    let status = worker
        .task_status(TaskKind::Recommendation, &task_id("abc-123"))
        .await
        .unwrap();
    assert_eq!(
        status,
        TaskStatus::Completed {
            data: Some(json!([{"title": "Engineer"}]))
        }
    );
}

#[tokio::test]
async fn test_status_error_carries_message() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/recommendations/abc-123")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"status": "error", "message": "embedding missing"}"#)
        .create_async()
        .await;

    let worker = HttpWorker::new(server.url());
    let status = worker
        .task_status(TaskKind::Recommendation, &task_id("abc-123"))
        .await
        .unwrap();
    assert_eq!(
        status,
        TaskStatus::Failed {
            message: "embedding missing".to_string()
        }
    );
}

#[tokio::test]
async fn test_status_unknown_state_is_transport_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/recommendations/abc-123")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"status": "running"}"#)
        .create_async()
        .await;

    let worker = HttpWorker::new(server.url());
    let err = worker
        .task_status(TaskKind::Recommendation, &task_id("abc-123"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::PollingTransportError(_)));
}

#[tokio::test]
async fn test_status_http_error_is_transport_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/recommendations/abc-123")
        .with_status(502)
        .create_async()
        .await;

    let worker = HttpWorker::new(server.url());
    let err = worker
        .task_status(TaskKind::Recommendation, &task_id("abc-123"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::PollingTransportError(_)));
}

#[tokio::test]
async fn test_embedding_status_uses_its_own_path() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/precompute-embedding/emb-9")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"status": "completed"}"#)
        .expect(1)
        .create_async()
        .await;

    let worker = HttpWorker::new(server.url());
    let status = worker
        .task_status(TaskKind::Embedding, &task_id("emb-9"))
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(status, TaskStatus::Completed { data: None });
}
