mod common;

use axum::http::StatusCode;
use chrono::Duration;
use serde_json::{json, Value};
use std::io::{Cursor, Write};
use study_desk_engine::JSON_INSTRUCTION;
use study_desk_schemas::MessageRole;
use zip::write::SimpleFileOptions;

use common::{ids, multipart_body, test_app, TestApp};

fn docx(paragraphs: &[&str]) -> Vec<u8> {
    let body: String = paragraphs
        .iter()
        .map(|text| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", text))
        .collect();
    let xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
        body
    );

    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file("word/document.xml", SimpleFileOptions::default())
        .unwrap();
    writer.write_all(xml.as_bytes()).unwrap();
    writer.finish().unwrap().into_inner()
}

async fn create_book(app: &TestApp, title: &str) -> String {
    let (status, book) = app
        .post(
            "/api/v1/books",
            json!({ "userId": "u1", "title": title, "author": "Henry David Thoreau", "content": "I went to the woods." }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    book["id"].as_str().unwrap().to_string()
}

async fn create_paper(app: &TestApp, content: &str) -> String {
    let (status, paper) = app
        .post(
            "/api/v1/papers",
            json!({
                "userId": "u1",
                "title": "Attention Is All You Need",
                "authors": ["Vaswani", "Shazeer"],
                "abstract": "The dominant sequence transduction models...",
                "content": content
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    paper["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_document_lifecycle() {
    let app = test_app();

    let (status, doc) = app
        .post(
            "/api/v1/documents",
            json!({ "userId": "u1", "title": "Draft", "content": "First pass." }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let doc_id = doc["id"].as_str().unwrap().to_string();
    assert!(doc_id.starts_with("doc_"));
    assert_eq!(doc["createdAt"], doc["updatedAt"]);

    app.clock.advance(Duration::minutes(5));
    let (status, updated) = app
        .send(
            "PUT",
            &format!("/api/v1/documents/{}", doc_id),
            Some(json!({ "title": "Essay", "content": "Second pass." })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["title"], "Essay");
    assert_eq!(updated["createdAt"], doc["createdAt"]);
    assert_ne!(updated["updatedAt"], doc["updatedAt"]);

    let (_, fetched) = app.get(&format!("/api/v1/documents/{}", doc_id)).await;
    assert_eq!(fetched, updated);

    let (_, list) = app.get("/api/v1/documents/user/u1").await;
    assert_eq!(ids(&list), vec![doc_id.clone()]);

    let (status, body) = app.delete(&format!("/api/v1/documents/{}", doc_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "ok");

    let (status, body) = app.get(&format!("/api/v1/documents/{}", doc_id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Document not found");

    let (status, _) = app
        .send(
            "PUT",
            &format!("/api/v1/documents/{}", doc_id),
            Some(json!({ "title": "ghost" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_document_chat_and_generate() {
    let app = test_app();

    let (_, doc) = app
        .post(
            "/api/v1/documents",
            json!({ "userId": "u1", "title": "Cover letter", "content": "Dear team," }),
        )
        .await;
    let doc_id = doc["id"].as_str().unwrap();

    app.llm.push("Try opening with what drew you to the role.");
    let (status, body) = app
        .post(
            &format!("/api/v1/documents/{}/chat", doc_id),
            json!({ "history": [
                { "role": "user", "content": "Improve the opening" },
                { "role": "assistant", "content": "Sure, which tone?" },
                { "role": "user", "content": "Warm" }
            ] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["reply"].as_str().unwrap().contains("opening"));

    let calls = app.llm.calls();
    assert_eq!(calls[0].len(), 4);
    assert_eq!(calls[0][0].role, MessageRole::System);
    assert!(calls[0][0].content.contains("Document title: Cover letter"));
    assert!(calls[0][0].content.contains("Dear team,"));
    assert_eq!(calls[0][3].content, "Warm");

    app.llm.push(r##"{"title": "  ", "content": "# Intro\nRust is a systems language."}"##);
    let (status, generated) = app
        .post(
            "/api/v1/documents/generate",
            json!({ "userId": "u1", "prompt": "Explain Rust in one paragraph" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(generated["title"], "Untitled document");
    assert!(generated["content"].as_str().unwrap().starts_with("# Intro"));
    assert!(app.llm.calls()[1][1].content.ends_with(JSON_INSTRUCTION));

    let (_, list) = app.get("/api/v1/documents/user/u1").await;
    assert_eq!(list.as_array().unwrap().len(), 2);

    let (status, _) = app
        .post("/api/v1/documents/doc_missing/chat", json!({ "history": [] }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app
        .post("/api/v1/documents/generate", json!({ "userId": "u1", "prompt": " " }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.llm.calls().len(), 2);
}

#[tokio::test]
async fn test_paper_upload_rejections() {
    let app = test_app();

    let body = multipart_body("pdf", "notes.txt", b"plain text", &[]);
    let (status, body) = app.upload("/api/v1/papers/upload", body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Only PDF files are supported");

    let body = multipart_body("attachment", "paper.pdf", b"%PDF-1.4", &[]);
    let (status, body) = app.upload("/api/v1/papers/upload", body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "No file uploaded");
}

#[tokio::test]
async fn test_paper_translation_in_chunks() {
    let app = test_app();
    let content = format!("{}\n{}", "a".repeat(1500), "b".repeat(1500));
    let paper_id = create_paper(&app, &content).await;

    app.llm.push("第一部分");
    app.llm.push("第二部分");
    let (status, body) = app
        .post(&format!("/api/v1/papers/{}/translate", paper_id), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["translatedContent"], "第一部分\n\n第二部分");

    let calls = app.llm.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls[0][1].content.contains("part 1 of 2"));
    assert!(calls[1][1].content.contains(&"b".repeat(1500)));

    let (_, list) = app.get("/api/v1/papers?userId=u1").await;
    assert_eq!(list[0]["translatedContent"], "第一部分\n\n第二部分");
    assert_eq!(list[0]["abstract"], "The dominant sequence transduction models...");
    assert_eq!(list[0]["authors"], json!(["Vaswani", "Shazeer"]));

    let (_, others) = app.get("/api/v1/papers?userId=u2").await;
    assert_eq!(others, json!([]));

    let (status, _) = app
        .post("/api/v1/papers/paper_missing/translate", json!({}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_paper_reading_aids() {
    let app = test_app();
    let paper_id = create_paper(&app, "Self-attention relates positions of a sequence.").await;

    app.llm.push("It lets every token look at every other token.");
    let (status, body) = app
        .post(
            &format!("/api/v1/papers/{}/question", paper_id),
            json!({ "question": "What does this mean?", "context": "Self-attention" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["answer"].as_str().unwrap().contains("token"));
    let prompt = &app.llm.calls()[0][1].content;
    assert!(prompt.contains("\"Self-attention\""));
    assert!(prompt.contains("reference only"));

    app.llm.push(
        r#"{"annotations": [{"term": "self-attention", "explanation": "attention within one sequence"}]}"#,
    );
    let (status, body) = app
        .post(
            &format!("/api/v1/papers/{}/terms", paper_id),
            json!({ "text": "Self-attention relates positions." }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["annotations"][0]["term"], "self-attention");
    assert_eq!(body["annotations"][0]["context"], "");

    app.llm.push(
        r#"```json
{"overview": "A new architecture", "keyFindings": ["No recurrence needed"], "methodology": "Experiments on WMT"}
```"#,
    );
    let (status, body) = app
        .post(&format!("/api/v1/papers/{}/summary", paper_id), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["keyFindings"], json!(["No recurrence needed"]));
    assert_eq!(body["significance"], "");

    let (status, _) = app
        .post(
            &format!("/api/v1/papers/{}/question", paper_id),
            json!({ "question": "" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app
        .post("/api/v1/papers/paper_missing/summary", json!({}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(app.llm.calls().len(), 3);
}

#[tokio::test]
async fn test_book_uploads() {
    let app = test_app();

    let body = multipart_body(
        "book",
        "walden.txt",
        "Chapter 1\nEconomy".as_bytes(),
        &[("title", "Walden"), ("author", "Thoreau"), ("userId", "u1")],
    );
    let (status, book) = app.upload("/api/v1/books/upload", body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(book["title"], "Walden");
    assert_eq!(book["author"], "Thoreau");
    assert_eq!(book["content"], "Chapter 1\nEconomy");
    assert_eq!(book["summary"], Value::Null);

    let body = multipart_body(
        "book",
        "Civil Disobedience.docx",
        &docx(&["Resistance to Civil Government", "I heartily accept the motto"]),
        &[("userId", "u1")],
    );
    let (status, book) = app.upload("/api/v1/books/upload", body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(book["title"], "Civil Disobedience");
    assert_eq!(
        book["content"],
        "Resistance to Civil Government\nI heartily accept the motto"
    );

    let body = multipart_body("book", "slides.pptx", b"PK", &[("userId", "u1")]);
    let (status, body) = app.upload("/api/v1/books/upload", body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("unsupported"));

    let (_, list) = app.get("/api/v1/books/user/u1").await;
    assert_eq!(list.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_book_summary_and_guide() {
    let app = test_app();
    let book_id = create_book(&app, "Walden").await;

    app.llm.push("A year of simple living by a pond.");
    let (status, body) = app
        .send("POST", &format!("/api/v1/books/{}/summary", book_id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"], "A year of simple living by a pond.");
    let prompt = &app.llm.calls()[0][1].content;
    assert!(prompt.contains("concise summary"));
    assert!(prompt.contains("at most 500 words"));

    let (_, list) = app.get("/api/v1/books/user/u1").await;
    assert_eq!(list[0]["summary"], "A year of simple living by a pond.");

    app.llm.push(
        r#"{"steps": [
            {"step": "survey", "title": "Skim", "content": "Read the headings"},
            {"step": "question", "title": "Ask", "content": "Why the woods?"}
        ]}"#,
    );
    let (status, guide) = app
        .post(
            &format!("/api/v1/books/{}/sq3r-guide", book_id),
            json!({ "chapterTitle": "Economy" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(guide["steps"].as_array().unwrap().len(), 2);
    assert_eq!(guide["steps"][0]["completed"], false);
    assert!(app.llm.calls()[1][1].content.contains("\"Economy\""));

    let (status, _) = app
        .post("/api/v1/books/book_missing/sq3r-guide", json!({}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_reading_progress() {
    let app = test_app();
    let book_id = create_book(&app, "Walden").await;
    let progress_uri = format!("/api/v1/books/{}/progress/u1", book_id);

    let (status, progress) = app.get(&progress_uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(progress["currentChapter"], 1);
    assert_eq!(progress["completedSteps"], json!([]));
    assert_eq!(progress["comprehensionScore"], 0.0);

    let complete_uri = format!("{}/complete", progress_uri);
    let (status, _) = app
        .post(&complete_uri, json!({ "stepType": "survey", "userResponse": "Skimmed it" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, progress) = app.post(&complete_uri, json!({ "stepType": "question" })).await;
    assert_eq!(status, StatusCode::OK);

    let steps = progress["completedSteps"].as_array().unwrap();
    assert_eq!(steps.len(), 2);
    assert_eq!(steps[0]["step"], "survey");
    assert_eq!(steps[0]["userResponse"], "Skimmed it");
    assert_eq!(steps[1]["completed"], true);

    let (_, fetched) = app.get(&progress_uri).await;
    assert_eq!(fetched, progress);

    // Other readers keep their own progress
    let (_, other) = app
        .get(&format!("/api/v1/books/{}/progress/u2", book_id))
        .await;
    assert_eq!(other["completedSteps"], json!([]));

    let (status, _) = app.post(&complete_uri, json!({ "stepType": "skim" })).await;
    assert!(status.is_client_error());
    let (status, _) = app
        .post(
            "/api/v1/books/book_missing/progress/u1/complete",
            json!({ "stepType": "read" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Deleting the book drops its progress
    let (status, _) = app.delete(&format!("/api/v1/books/{}", book_id)).await;
    assert_eq!(status, StatusCode::OK);
    let (_, progress) = app.get(&progress_uri).await;
    assert_eq!(progress["completedSteps"], json!([]));
}

#[tokio::test]
async fn test_author_conversation() {
    let app = test_app();
    let book_id = create_book(&app, "Walden").await;

    app.llm.push("I am Thoreau. Ask me about the pond.");
    let (status, body) = app
        .post(&format!("/api/v1/books/{}/author-agent", book_id), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["bookId"], book_id.as_str());
    assert!(app.llm.calls()[0][0]
        .content
        .starts_with("You are Henry David Thoreau"));

    app.llm.push("To live deliberately.");
    let (status, body) = app
        .post(
            &format!("/api/v1/books/{}/author-chat", book_id),
            json!({
                "message": "Why did you go?",
                "conversationHistory": [
                    { "role": "assistant", "content": "I am Thoreau." }
                ]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "response": "To live deliberately." }));

    let chat = &app.llm.calls()[1];
    assert_eq!(chat.len(), 3);
    assert!(chat[0].content.contains("I went to the woods."));
    assert_eq!(chat[1].role, MessageRole::Assistant);
    assert_eq!(chat[2].content, "Why did you go?");

    let (status, _) = app
        .post("/api/v1/books/book_missing/author-agent", json!({}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
