//! End-to-end pipeline runs against a mocked Gemini endpoint and the real chess rules.

use std::time::Duration;

use scoresheet_engine::{CancelSignal, MovePair, PipelineConfig, cancel_pair};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{
    MOVE_MODEL, gemini_pipeline, gemini_reply, generate_path, mount_clock_error,
    mount_header_and_clocks, mount_metadata, mount_move, mount_moves, ply_marker, sheet_image,
    start_gemini_mock,
};

fn pair(white: &str, black: Option<&str>) -> MovePair {
    MovePair {
        white: white.to_string(),
        black: black.map(str::to_string),
    }
}

#[tokio::test]
async fn transcribes_header_clocks_and_moves() {
    let server = start_gemini_mock().await;
    mount_header_and_clocks(&server).await;
    mount_moves(&server, &["e4", "e5", "Nf3"]).await;

    let result = gemini_pipeline(&server, PipelineConfig::default())
        .run(&sheet_image(), CancelSignal::never())
        .await;

    assert!(result.is_complete(), "{result:?}");
    let metadata = result.metadata.as_ref().unwrap();
    assert_eq!(metadata["event"], "Spring Open");
    assert_eq!(metadata["round"], "2");
    let clocks = result.clocks.as_ref().unwrap();
    assert_eq!(clocks.len(), 2);
    assert_eq!(clocks[0].black.as_deref(), Some("1:29:55"));
    assert_eq!(clocks[1].black, None);
    assert_eq!(
        result.moves,
        Some(vec![pair("e4", Some("e5")), pair("Nf3", None)])
    );

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(
        json["moves"],
        serde_json::json!([{ "white": "e4", "black": "e5" }, { "white": "Nf3" }])
    );
    assert!(json.get("error").is_none());
    assert!(json.get("warnings").is_none());
}

#[tokio::test]
async fn unreadable_first_move_gives_empty_move_list() {
    let server = start_gemini_mock().await;
    mount_header_and_clocks(&server).await;
    mount_move(&server, 0, "Zz9").await;
    // The loop must stop at the unmatched read.
    Mock::given(method("POST"))
        .and(path(generate_path(MOVE_MODEL)))
        .and(body_string_contains(ply_marker(1)))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply("e5")))
        .expect(0)
        .mount(&server)
        .await;

    let result = gemini_pipeline(&server, PipelineConfig::default())
        .run(&sheet_image(), CancelSignal::never())
        .await;

    assert_eq!(result.moves, Some(Vec::new()));
    assert_eq!(result.error, None);
    assert_eq!(result.warnings.len(), 1);
    assert!(result.warnings[0].contains("\"Zz9\""), "{:?}", result.warnings);
}

#[tokio::test]
async fn failed_clock_request_is_isolated() {
    let server = start_gemini_mock().await;
    mount_metadata(&server, r#"{"site": "Reykjavik"}"#).await;
    mount_clock_error(&server, 503).await;
    mount_moves(&server, &["d4", "Nf6"]).await;

    let result = gemini_pipeline(&server, PipelineConfig::default())
        .run(&sheet_image(), CancelSignal::never())
        .await;

    assert_eq!(result.clocks, None);
    assert_eq!(result.moves, Some(vec![pair("d4", Some("Nf6"))]));
    assert_eq!(result.metadata.as_ref().unwrap()["site"], "Reykjavik");
    let error = result.error.expect("clock failure reported");
    assert!(error.starts_with("clock extraction failed"), "{error}");
    assert!(error.contains("503"), "{error}");
    assert!(error.contains("clock model overloaded"), "{error}");
}

#[tokio::test]
async fn mate_ends_transcription_without_further_requests() {
    let server = start_gemini_mock().await;
    mount_header_and_clocks(&server).await;
    for (ply, text) in ["f3", "e5", "g4", "Qh4"].into_iter().enumerate() {
        mount_move(&server, ply, text).await;
    }
    Mock::given(method("POST"))
        .and(path(generate_path(MOVE_MODEL)))
        .and(body_string_contains(ply_marker(4)))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply("Nc3")))
        .expect(0)
        .mount(&server)
        .await;

    let result = gemini_pipeline(&server, PipelineConfig::default())
        .run(&sheet_image(), CancelSignal::never())
        .await;

    assert_eq!(
        result.moves,
        Some(vec![pair("f3", Some("e5")), pair("g4", Some("Qh4#"))])
    );
    assert!(result.warnings.is_empty());
}

#[tokio::test]
async fn move_requests_carry_history_and_legal_moves() {
    let server = start_gemini_mock().await;
    mount_header_and_clocks(&server).await;
    mount_move(&server, 0, "e4").await;
    Mock::given(method("POST"))
        .and(path(generate_path(MOVE_MODEL)))
        .and(body_string_contains(ply_marker(1)))
        .and(body_string_contains("Moves so far: 1. e4"))
        .and(body_string_contains("Legal moves in this position:"))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply("c5")))
        .expect(1)
        .mount(&server)
        .await;
    mount_move(&server, 2, "END").await;

    let result = gemini_pipeline(&server, PipelineConfig::default())
        .run(&sheet_image(), CancelSignal::never())
        .await;
    assert_eq!(result.moves, Some(vec![pair("e4", Some("c5"))]));
}

#[tokio::test]
async fn move_request_failure_keeps_accepted_moves() {
    let server = start_gemini_mock().await;
    mount_header_and_clocks(&server).await;
    mount_move(&server, 0, "c4").await;
    // No mock for ply 1: the server answers 404.

    let result = gemini_pipeline(&server, PipelineConfig::default())
        .run(&sheet_image(), CancelSignal::never())
        .await;

    assert_eq!(result.moves, Some(vec![pair("c4", None)]));
    let error = result.error.unwrap();
    assert!(error.starts_with("move extraction stopped early"), "{error}");
    assert!(error.contains("404"), "{error}");
}

#[tokio::test]
async fn cancellation_returns_partial_result() {
    let server = start_gemini_mock().await;
    mount_header_and_clocks(&server).await;
    mount_move(&server, 0, "e4").await;
    Mock::given(method("POST"))
        .and(path(generate_path(MOVE_MODEL)))
        .and(body_string_contains(ply_marker(1)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(gemini_reply("e5"))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let (handle, signal) = cancel_pair();
    let pipeline = gemini_pipeline(&server, PipelineConfig::default());
    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        handle.cancel();
    });

    let started = std::time::Instant::now();
    let result = pipeline.run(&sheet_image(), signal).await;
    canceller.await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(result.moves, Some(vec![pair("e4", None)]));
    assert!(result.metadata.is_some());
    assert!(
        result.warnings.iter().any(|w| w.contains("cancelled after 1 plies")),
        "{:?}",
        result.warnings
    );
}

#[tokio::test]
async fn sequential_stages_produce_same_result() {
    let server = start_gemini_mock().await;
    mount_header_and_clocks(&server).await;
    mount_moves(&server, &["Nf3", "d5", "g3"]).await;

    let concurrent = gemini_pipeline(&server, PipelineConfig::default())
        .run(&sheet_image(), CancelSignal::never())
        .await;
    let sequential = gemini_pipeline(
        &server,
        PipelineConfig {
            concurrent_stages: false,
            ..PipelineConfig::default()
        },
    )
    .run(&sheet_image(), CancelSignal::never())
    .await;

    assert_eq!(concurrent, sequential);
    assert!(concurrent.is_complete());
}
