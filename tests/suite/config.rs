//! Config file driving a real pipeline run

use std::sync::Arc;

use scoresheet_engine::{
    CancelSignal, ChessRules, ConfigError, GeminiRecognizer, Pipeline, PipelineConfig,
    ScoresheetConfig,
};

use crate::common::{
    FAST_MODEL, MOVE_MODEL, TEST_API_KEY, mount_header_and_clocks, mount_moves, sheet_image,
    start_gemini_mock,
};

fn write_config(dir: &tempfile::TempDir, body: &str) -> std::path::PathBuf {
    let path = dir.path().join("config.toml");
    std::fs::write(&path, body).unwrap();
    path
}

#[tokio::test]
async fn config_file_points_pipeline_at_recognizer() {
    let server = start_gemini_mock().await;
    mount_header_and_clocks(&server).await;
    mount_moves(&server, &["e4", "e6", "d4", "d5"]).await;

    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        &format!(
            r#"
[recognizer]
model = "{MOVE_MODEL}"
fast_model = "{FAST_MODEL}"
base_url = "{}/v1beta"
max_retries = 0

[api_keys]
google = "{TEST_API_KEY}"

[pipeline]
concurrent_stages = false
max_plies = 3
"#,
            server.uri()
        ),
    );

    let config = ScoresheetConfig::load_from(&path).unwrap();
    let gemini = config.gemini_config().expect("key in file");
    let pipeline = Pipeline::new(
        Arc::new(GeminiRecognizer::new(gemini).unwrap()),
        Arc::new(ChessRules),
        PipelineConfig::from_config(&config),
    );
    let result = pipeline.run(&sheet_image(), CancelSignal::never()).await;

    let moves = result.moves.expect("moves");
    assert_eq!(moves.len(), 2);
    assert_eq!(moves[1].white, "d4");
    assert_eq!(moves[1].black, None);
    assert_eq!(
        result.warnings,
        vec!["transcription stopped after 3 plies: ply limit reached".to_string()]
    );
}

#[test]
fn broken_config_names_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "[matching\nmax_edit_distance = ");

    let err = ScoresheetConfig::load_from(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
    assert!(err.to_string().contains("config.toml"), "{err}");
}
