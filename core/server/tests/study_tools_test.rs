mod common;

use axum::http::StatusCode;
use chrono::Duration;
use serde_json::{json, Value};
use study_desk_engine::JSON_INSTRUCTION;
use study_desk_schemas::PomodoroSession;

use common::{ids, start, test_app};

fn roles(session: &Value) -> Vec<String> {
    session["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["role"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_brainstorm_panel_flow() {
    let app = test_app();

    let (status, session) = app
        .post(
            "/api/v1/brainstorm/sessions",
            json!({ "userId": "u1", "topic": "A four-day school week" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["status"], "active");
    assert_eq!(session["messages"], json!([]));
    let id = session["id"].as_str().unwrap().to_string();

    for reply in ["More rest", "Lost teaching time", "Mixed evidence", "Project Fridays"] {
        app.llm.push(reply);
    }
    let (status, session) = app
        .post(
            &format!("/api/v1/brainstorm/sessions/{}/start-discussion", id),
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        roles(&session),
        vec!["optimist", "pessimist", "realist", "creative"]
    );
    assert_eq!(session["messages"][1]["content"], "Lost teaching time");
    assert!(app
        .llm
        .calls()
        .iter()
        .all(|call| call[1].content.contains("\"A four-day school week\"")));

    let (status, _) = app
        .post(
            &format!("/api/v1/brainstorm/sessions/{}/deep-dive", id),
            json!({ "focusPoint": "" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    for reply in ["a", "b", "c", "d"] {
        app.llm.push(reply);
    }
    let (status, session) = app
        .post(
            &format!("/api/v1/brainstorm/sessions/{}/deep-dive", id),
            json!({ "focusPoint": "childcare" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["messages"].as_array().unwrap().len(), 8);
    assert!(app.llm.calls()[4][1].content.contains("Focus: childcare"));

    app.llm.push("Pilot it in one district first.");
    let (status, session) = app
        .post(
            &format!("/api/v1/brainstorm/sessions/{}/synthesize", id),
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["status"], "completed");
    assert_eq!(session["synthesis"], "Pilot it in one district first.");
    let transcript = &app.llm.calls()[8][1].content;
    assert!(transcript.contains("[optimist]: More rest"));
    assert!(transcript.contains("[creative]: d"));

    let (_, list) = app.get("/api/v1/brainstorm/sessions?userId=u1").await;
    assert_eq!(ids(&list), vec![id.clone()]);
    let (_, fetched) = app.get(&format!("/api/v1/brainstorm/sessions/{}", id)).await;
    assert_eq!(fetched, session);

    let (status, _) = app
        .delete(&format!("/api/v1/brainstorm/sessions/{}", id))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = app.get(&format!("/api/v1/brainstorm/sessions/{}", id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Session not found");
}

#[tokio::test]
async fn test_brainstorm_missing_session() {
    let app = test_app();

    let (status, _) = app
        .post(
            "/api/v1/brainstorm/sessions/brain_missing/start-discussion",
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app
        .post(
            "/api/v1/brainstorm/sessions",
            json!({ "userId": "u1", "topic": "  " }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(app.llm.calls().is_empty());
}

#[tokio::test]
async fn test_pomodoro_sessions_and_stats() {
    let app = test_app();

    let (status, body) = app.post("/api/pomodoro/start", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "userId cannot be empty");
    for duration in [0, 181] {
        let (status, _) = app
            .post(
                "/api/pomodoro/start",
                json!({ "userId": "u1", "duration": duration }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    let (status, first) = app
        .post(
            "/api/pomodoro/start",
            json!({ "userId": "u1", "task": "Read chapter 3" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["duration"], 25);
    assert_eq!(first["completed"], false);
    assert_eq!(first["endTime"], Value::Null);
    let first_id = first["id"].as_str().unwrap().to_string();

    let (_, active) = app.get("/api/pomodoro/user/u1/active").await;
    assert_eq!(active["id"], first["id"]);

    app.clock.advance(Duration::minutes(25));
    let (status, _) = app
        .post(&format!("/api/pomodoro/{}/complete", first_id), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, active) = app.get("/api/pomodoro/user/u1/active").await;
    assert_eq!(active, Value::Null);

    let (_, second) = app
        .post("/api/pomodoro/start", json!({ "userId": "u1", "duration": 50 }))
        .await;
    app.clock.advance(Duration::minutes(50));
    app.post(
        &format!("/api/pomodoro/{}/complete", second["id"].as_str().unwrap()),
        json!({}),
    )
    .await;

    app.clock.advance(Duration::days(1));
    let (_, third) = app
        .post("/api/pomodoro/start", json!({ "userId": "u1" }))
        .await;

    let (status, stats) = app.get("/api/pomodoro/user/u1/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["totalSessions"], 3);
    assert_eq!(stats["completedSessions"], 2);
    assert_eq!(stats["totalFocusTime"], 75);
    assert_eq!(stats["averageSessionLength"], 37.5);
    assert_eq!(
        stats["dailyStats"],
        json!([{ "date": "2025-03-01", "sessions": 2, "focusTime": 75 }])
    );

    let (_, recent) = app.get("/api/pomodoro/user/u1?limit=2").await;
    assert_eq!(
        ids(&recent),
        vec![
            third["id"].as_str().unwrap().to_string(),
            second["id"].as_str().unwrap().to_string()
        ]
    );

    let (_, all) = app.get("/api/pomodoro/user/u1").await;
    let sessions: Vec<PomodoroSession> = serde_json::from_value(all).unwrap();
    assert_eq!(sessions.len(), 3);
    let finished = sessions.iter().find(|s| s.id.0 == first_id).unwrap();
    assert_eq!(finished.end_time, Some(start() + Duration::minutes(25)));

    let (status, _) = app
        .post("/api/pomodoro/pomo_missing/complete", json!({}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_guided_problem_session() {
    let app = test_app();

    app.llm.push(
        r#"{"problemType": "quadratic", "difficulty": "easy", "requiredConcepts": ["factoring"], "estimatedTime": "15 ", "solutionApproach": ["Factor", "Solve"]}"#,
    );
    let (status, analysis) = app
        .post(
            "/api/v1/problems/analyze",
            json!({ "question": "x^2 - 5x + 6 = 0", "subject": "math" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(analysis["estimatedTime"], 15.0);
    assert!(app.llm.calls()[0][1].content.ends_with(JSON_INSTRUCTION));

    app.llm.push(
        r#"{"problemType": "quadratic", "difficulty": "easy", "requiredConcepts": ["factoring"], "solutionApproach": ["Factor", "Solve"]}"#,
    );
    let (status, session) = app
        .post(
            "/api/v1/problems/start-session",
            json!({ "userId": "u1", "question": "x^2 - 5x + 6 = 0", "subject": "math" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["problemId"], session["id"]);
    assert_eq!(session["currentStep"], 0);
    assert_eq!(session["userProgress"], json!([]));
    let session_id = session["id"].as_str().unwrap().to_string();

    let (_, active) = app.get("/api/v1/problems/active-session/u1").await;
    assert_eq!(active["id"], session["id"]);

    app.clock.advance(Duration::minutes(4));
    app.llm.push("Good factoring.");
    let (status, feedback) = app
        .post(
            "/api/v1/problems/process-step",
            json!({ "sessionId": session_id, "userInput": "(x-2)(x-3)" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(feedback["feedback"], "Good factoring.");
    assert_eq!(feedback["shouldProceed"], true);
    assert!(app.llm.calls()[2][1].content.contains("Step: 1"));

    app.clock.advance(Duration::minutes(7));
    app.llm.push("Correct.");
    app.post(
        "/api/v1/problems/process-step",
        json!({ "sessionId": session_id, "userInput": "x = 2 or x = 3" }),
    )
    .await;
    assert!(app.llm.calls()[3][1].content.contains("Step: 2"));

    app.llm.push(r#"{"hintLevel": "gentle", "content": "Check both roots"}"#);
    let (status, hint) = app
        .post("/api/v1/problems/hint", json!({ "sessionId": session_id }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(hint["stepNumber"], 3);
    assert_eq!(hint["revealsSolution"], false);

    let (status, history) = app.get("/api/v1/problems/history/u1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history["problems"][0]["difficulty"], "easy");
    assert_eq!(history["sessions"][0]["currentStep"], 2);
    assert_eq!(
        history["sessions"][0]["userProgress"][1]["userInput"],
        "x = 2 or x = 3"
    );
    let summary = &history["summaries"][0];
    assert_eq!(summary["method"], "Factor");
    assert_eq!(summary["keySteps"], json!(["(x-2)(x-3)", "x = 2 or x = 3"]));
    assert_eq!(summary["timeSpent"], 11);
    assert_eq!(summary["hintsUsed"], 1);

    let (status, _) = app
        .post(
            "/api/v1/problems/complete-session",
            json!({ "sessionId": session_id }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, active) = app.get("/api/v1/problems/active-session/u1").await;
    assert_eq!(active, Value::Null);
}

#[tokio::test]
async fn test_similar_problems() {
    let app = test_app();

    app.llm.push(r#"{"problemType": "quadratic"}"#);
    let (_, session) = app
        .post(
            "/api/v1/problems/start-session",
            json!({ "userId": "u1", "question": "x^2 - 5x + 6 = 0", "subject": "math" }),
        )
        .await;
    assert_eq!(session["currentStep"], 0);
    let problem_id = session["problemId"].as_str().unwrap().to_string();

    app.llm.push(r#"[{"question": "x^2 - 7x + 12 = 0", "subject": "math"}]"#);
    let (status, similar) = app
        .post(
            "/api/v1/problems/generate-similar",
            json!({ "problemId": problem_id, "count": 50 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(similar.as_array().unwrap().len(), 1);
    assert_eq!(similar[0]["difficulty"], "medium");
    assert!(app.llm.calls()[1][1].content.contains("Write 10 problems"));

    app.llm.push(r#"{"problems": ["not", "a", "list"]}"#);
    let (status, similar) = app
        .post(
            "/api/v1/problems/generate-similar",
            json!({ "problemId": problem_id }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(similar, json!([]));
    assert!(app.llm.calls()[2][1].content.contains("Write 3 problems"));
}

#[tokio::test]
async fn test_problem_errors() {
    let app = test_app();

    let (status, body) = app
        .post(
            "/api/v1/problems/process-step",
            json!({ "sessionId": "prob_missing", "userInput": "x = 1" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Session not found");

    let (status, _) = app
        .post(
            "/api/v1/problems/process-step",
            json!({ "sessionId": "prob_missing", "userInput": "" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(
            "/api/v1/problems/complete-session",
            json!({ "sessionId": "prob_missing" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .post(
            "/api/v1/problems/generate-similar",
            json!({ "problemId": "prob_missing" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(app.llm.calls().is_empty());
}

#[tokio::test]
async fn test_resource_search_and_format() {
    let app = test_app();

    app.llm.push(
        r#"{
            "searchStrategy": "Start with official material",
            "resources": [
                {"id": "uuid", "title": "The Rust Book", "url": "https://doc.rust-lang.org/book/", "source": "rust-lang.org", "contentType": "book", "relevanceScore": "0.95", "authors": ["Klabnik", "Nichols"], "publishDate": "2023"},
                {"id": "uuid", "title": "Rust in 100 Seconds", "contentType": "video"},
                {"title": "Ferris Says", "relevanceScore": 0.4}
            ]
        }"#,
    );
    let (status, search) = app
        .post(
            "/api/v1/resources/search",
            json!({ "userId": "u1", "query": "learn Rust" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(search["totalResults"], 3);
    assert_eq!(search["resources"][0]["relevanceScore"], 0.95);

    let resource_ids = ids(&search["resources"]);
    assert!(resource_ids.iter().all(|id| id.starts_with("res_")));
    assert_ne!(resource_ids[0], resource_ids[1]);

    let categories = search["categorizedResources"].as_object().unwrap();
    let keys: Vec<&str> = categories.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["book", "other", "video"]);

    let (status, citation) = app
        .post(
            &format!("/api/v1/resources/{}/format", resource_ids[0]),
            json!({ "format": "citation" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        citation["content"],
        "Klabnik, Nichols. The Rust Book. rust-lang.org. 2023"
    );

    let (status, markdown) = app
        .send(
            "POST",
            &format!("/api/v1/resources/{}/format", resource_ids[1]),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(markdown["content"]
        .as_str()
        .unwrap()
        .starts_with("# Rust in 100 Seconds"));

    let (status, _) = app
        .post("/api/v1/resources/res_missing/format", json!({}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_resource_history() {
    let app = test_app();

    let (status, _) = app
        .post("/api/v1/resources/search", json!({ "userId": "u1", "query": "" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut search_ids = Vec::new();
    for query in ["ownership", "lifetimes"] {
        app.llm.push(r#"{"searchStrategy": "docs", "resources": []}"#);
        let (_, search) = app
            .post(
                "/api/v1/resources/search",
                json!({ "userId": "u1", "query": query }),
            )
            .await;
        search_ids.push(search["id"].as_str().unwrap().to_string());
        app.clock.advance(Duration::minutes(1));
    }

    let (status, history) = app.get("/api/v1/resources/history/u1?limit=1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&history), vec![search_ids[1].clone()]);
    assert_eq!(history[0]["query"], "lifetimes");

    let (_, history) = app.get("/api/v1/resources/history/u1").await;
    assert_eq!(history.as_array().unwrap().len(), 2);
    let (_, history) = app.get("/api/v1/resources/history/u2").await;
    assert_eq!(history, json!([]));
}
