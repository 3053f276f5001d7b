//! TelegramClient against a local mock of the Bot API.
//!
//! Teloxide requests `/bot<token>/<Method>` with the method name in
//! PascalCase (`SendMessage`), and downloads `/file/bot<token>/<path>` with the
//! file path pushed as one segment, so its `/` arrives as `%2F`.

use geminigram::chatbot::telegram::{ChatApi, FileInfo, TelegramClient};
use mockito::Matcher;
use teloxide::Bot;

const TEST_BOT_TOKEN: &str = "123456:TEST";

/// Bot API method path, matched regardless of the method name's case.
fn method(name: &str) -> Matcher {
    Matcher::Regex(format!("(?i)^/bot{TEST_BOT_TOKEN}/{name}$"))
}

fn client(server: &mockito::ServerGuard) -> TelegramClient {
    let url = reqwest::Url::parse(&server.url()).unwrap();
    TelegramClient::new(Bot::new(TEST_BOT_TOKEN).set_api_url(url))
}

#[tokio::test]
async fn test_send_message() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", method("sendMessage"))
        .match_body(Matcher::Regex(r#""chat_id":\s*42"#.to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{
            "ok": true,
            "result": {
                "message_id": 1,
                "date": 1706529600,
                "chat": {"id": 42, "type": "private"},
                "from": {"id": 123456, "is_bot": true, "first_name": "TestBot", "username": "testbot"},
                "text": "4"
            }
        }"#,
        )
        .create_async()
        .await;

    client(&server).send_message(42, "4").await.unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn test_send_message_api_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", method("sendMessage"))
        .with_status(400)
        .with_header("content-type", "application/json")
        .with_body(r#"{"ok": false, "error_code": 400, "description": "Bad Request: chat not found"}"#)
        .create_async()
        .await;

    assert!(client(&server).send_message(1, "hi").await.is_err());
}

#[tokio::test]
async fn test_get_file_and_download() {
    let mut server = mockito::Server::new_async().await;
    let get_file = server
        .mock("POST", method("getFile"))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{
            "ok": true,
            "result": {
                "file_id": "AgACAgIAAxk",
                "file_unique_id": "AQADq8Ax",
                "file_size": 4,
                "file_path": "photos/file_7.jpg"
            }
        }"#,
        )
        .create_async()
        .await;
    let download = server
        .mock(
            "GET",
            Matcher::Regex(format!(r"^/file/bot{TEST_BOT_TOKEN}/photos(/|%2F)file_7\.jpg$")),
        )
        .with_status(200)
        .with_body(b"\xff\xd8\xff\xe0")
        .create_async()
        .await;

    let telegram = client(&server);
    let file = telegram.get_file("AgACAgIAAxk").await.unwrap();
    assert_eq!(
        file,
        FileInfo {
            path: "photos/file_7.jpg".to_string()
        }
    );

    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("AQADq8Ax.jpg");
    telegram.download_file(&file, &dest).await.unwrap();
    assert_eq!(std::fs::read(&dest).unwrap(), b"\xff\xd8\xff\xe0");
    get_file.assert_async().await;
    download.assert_async().await;
}
