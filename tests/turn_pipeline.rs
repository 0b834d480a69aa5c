//! End-to-end turns against mock inference and speech servers.

use httpmock::prelude::*;
use reasoning_voice_chat::{
    audio_store::AudioStore,
    config::{InferenceConfig, SpeechConfig},
    conversation::{FailureKind, InferenceOutcome, SpeechOutcome, Turn, TurnOrchestrator},
    llm::OllamaClient,
    tts::OpenAiSpeechClient,
};
use serde_json::json;
use std::path::Path;
use std::time::Duration;

type Orchestrator = TurnOrchestrator<OllamaClient, OpenAiSpeechClient>;

fn orchestrator(llm_url: String, tts_url: String, audio_dir: &Path) -> Orchestrator {
    let llm = OllamaClient::new(InferenceConfig {
        base_url: llm_url,
        ..InferenceConfig::default()
    })
    .unwrap();
    let tts = OpenAiSpeechClient::new(SpeechConfig {
        url: tts_url,
        timeout: Duration::from_secs(5),
        ..SpeechConfig::default()
    })
    .unwrap();
    TurnOrchestrator::new(llm, tts, AudioStore::new(audio_dir, "mp3", 10))
}

#[test_log::test(tokio::test)]
async fn test_hello_turn_speaks_only_the_answer() {
    let llm_server = MockServer::start_async().await;
    let tts_server = MockServer::start_async().await;
    let dir = tempfile::tempdir().unwrap();

    let generate = llm_server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/generate")
                .json_body_partial(r#"{"prompt": "User: Hello\nAssistant: ", "stream": false}"#);
            then.status(200)
                .json_body(json!({ "response": "<think>greeting</think>Hi there!", "done": true }));
        })
        .await;
    let speech = tts_server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/audio/speech")
                .json_body_partial(r#"{"input": "Hi there!", "voice": "echo"}"#);
            then.status(200).body(b"mp3-bytes");
        })
        .await;

    let orch = orchestrator(
        llm_server.base_url(),
        tts_server.url("/v1/audio/speech"),
        dir.path(),
    );
    let (history, audio) = orch.handle_turn("Hello", &[]).await;

    generate.assert_async().await;
    speech.assert_async().await;

    let last = history.last().unwrap();
    assert_eq!(last.user(), "Hello");
    assert!(last.reply().contains("greeting"));
    assert!(last.reply().contains("Hi there!"));

    let audio = audio.expect("audio artifact");
    assert!(audio.starts_with(dir.path()));
    assert_eq!(std::fs::read(audio).unwrap(), b"mp3-bytes");
}

#[test_log::test(tokio::test)]
async fn test_connection_error_still_completes_turn() {
    let tts_server = MockServer::start_async().await;
    let dir = tempfile::tempdir().unwrap();
    let speech = tts_server
        .mock_async(|when, then| {
            when.method(POST);
            then.status(200).body(b"never");
        })
        .await;

    // Nothing listens on port 1
    let orch = orchestrator(
        "http://127.0.0.1:1".to_string(),
        tts_server.url("/v1/audio/speech"),
        dir.path(),
    );
    let history = vec![Turn::new("earlier", "reply")];
    let report = orch.run_turn("Hello", &history).await;

    assert!(matches!(
        report.inference,
        Some(InferenceOutcome::Failed {
            kind: FailureKind::Network,
            ..
        })
    ));
    assert_eq!(report.history.len(), 2);
    let reply = report.history[1].reply();
    assert!(!reply.trim().is_empty());
    assert!(reply.starts_with("Connection error"));
    assert!(report.audio_path().is_none());
    assert_eq!(speech.hits_async().await, 0);
}

#[test_log::test(tokio::test)]
async fn test_status_error_is_described() {
    let llm_server = MockServer::start_async().await;
    let dir = tempfile::tempdir().unwrap();
    llm_server
        .mock_async(|when, then| {
            when.method(POST).path("/api/generate");
            then.status(404).body(r#"{"error":"model not found"}"#);
        })
        .await;

    let orch = orchestrator(
        llm_server.base_url(),
        "http://127.0.0.1:1/v1/audio/speech".to_string(),
        dir.path(),
    );
    let (history, audio) = orch.handle_turn("Hello", &[]).await;

    assert!(history[0].reply().contains("status code: 404"));
    assert!(audio.is_none());
}

#[test_log::test(tokio::test)]
async fn test_speech_outage_keeps_text_reply() {
    let llm_server = MockServer::start_async().await;
    let tts_server = MockServer::start_async().await;
    let dir = tempfile::tempdir().unwrap();
    llm_server
        .mock_async(|when, then| {
            when.method(POST).path("/api/generate");
            then.status(200).json_body(json!({ "response": "Forty-two." }));
        })
        .await;
    tts_server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/audio/speech");
            then.status(503).body("busy");
        })
        .await;

    let orch = orchestrator(
        llm_server.base_url(),
        tts_server.url("/v1/audio/speech"),
        dir.path(),
    );
    let report = orch.run_turn("What is the answer?", &[]).await;

    assert!(matches!(report.speech, SpeechOutcome::Failed(_)));
    assert_eq!(
        report.history,
        vec![Turn::new("What is the answer?", "Forty-two.")]
    );
    assert!(!dir.path().exists() || std::fs::read_dir(dir.path()).unwrap().next().is_none());
}

#[test_log::test(tokio::test)]
async fn test_turns_prune_old_audio() {
    let llm_server = MockServer::start_async().await;
    let tts_server = MockServer::start_async().await;
    let dir = tempfile::tempdir().unwrap();
    llm_server
        .mock_async(|when, then| {
            when.method(POST).path("/api/generate");
            then.status(200).json_body(json!({ "response": "Noted." }));
        })
        .await;
    tts_server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/audio/speech");
            then.status(200).body(b"audio");
        })
        .await;

    for i in 0..12 {
        std::fs::write(dir.path().join(format!("output_{}.mp3", 1_600_000_000 + i)), b"old").unwrap();
        std::thread::sleep(Duration::from_millis(10));
    }

    let orch = orchestrator(
        llm_server.base_url(),
        tts_server.url("/v1/audio/speech"),
        dir.path(),
    );
    let (_, audio) = orch.handle_turn("Remember this", &[]).await;

    let audio = audio.expect("audio artifact");
    assert!(audio.exists());
    let count = std::fs::read_dir(dir.path()).unwrap().count();
    assert_eq!(count, 10);
    assert!(!dir.path().join("output_1600000000.mp3").exists());
    assert!(!dir.path().join("output_1600000002.mp3").exists());
    assert!(dir.path().join("output_1600000003.mp3").exists());
}
