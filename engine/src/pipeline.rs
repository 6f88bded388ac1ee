//! Pipeline orchestration.
//!
//! One run takes a scoresheet image through the three stages, each writing
//! its own slot of a fresh [`StateStore`], then consolidates the completed
//! store. A stage failure never aborts the run: it becomes a failure marker
//! in that stage's slot.

use std::sync::Arc;
use std::time::Duration;

use scoresheet_providers::Recognizer;
use scoresheet_rules::RulesEngine;
use scoresheet_types::{ConsolidatedResult, ScoresheetImage};

use crate::cancel::CancelSignal;
use crate::config::ScoresheetConfig;
use crate::matching::{EditDistancePolicy, MatchPolicy};
use crate::merge::consolidate;
use crate::stages::{ClockStage, MetadataStage, MoveStage, Stage, StageContext};
use crate::state::{Fragment, FragmentKey, StageFailure, StateStore};
use crate::transcriber::{DEFAULT_MAX_PLIES, TranscriberSettings};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Run the stages concurrently rather than one after another.
    pub concurrent_stages: bool,
    pub max_plies: usize,
    pub max_edit_distance: usize,
    pub hint_legal_moves: bool,
    /// Whole-run deadline. Reaching it cancels the run.
    pub timeout: Option<Duration>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrent_stages: true,
            max_plies: DEFAULT_MAX_PLIES,
            max_edit_distance: crate::matching::DEFAULT_MAX_EDIT_DISTANCE,
            hint_legal_moves: true,
            timeout: None,
        }
    }
}

impl PipelineConfig {
    #[must_use]
    pub fn from_config(config: &ScoresheetConfig) -> Self {
        let matching = config.matching();
        let pipeline = config.pipeline();
        Self {
            concurrent_stages: pipeline.concurrent_stages,
            max_plies: pipeline.max_plies.unwrap_or(DEFAULT_MAX_PLIES),
            max_edit_distance: matching.max_edit_distance,
            hint_legal_moves: matching.hint_legal_moves,
            timeout: pipeline.timeout_secs.map(Duration::from_secs),
        }
    }

    #[must_use]
    pub fn transcriber_settings(&self) -> TranscriberSettings {
        TranscriberSettings {
            max_plies: self.max_plies,
            hint_legal_moves: self.hint_legal_moves,
        }
    }
}

pub struct Pipeline {
    recognizer: Arc<dyn Recognizer>,
    metadata: MetadataStage,
    clocks: ClockStage,
    moves: MoveStage,
    config: PipelineConfig,
}

impl Pipeline {
    /// Pipeline with the edit-distance match policy from `config`.
    #[must_use]
    pub fn new(
        recognizer: Arc<dyn Recognizer>,
        rules: Arc<dyn RulesEngine>,
        config: PipelineConfig,
    ) -> Self {
        let policy = Arc::new(EditDistancePolicy::new(config.max_edit_distance));
        Self::with_policy(recognizer, rules, policy, config)
    }

    #[must_use]
    pub fn with_policy(
        recognizer: Arc<dyn Recognizer>,
        rules: Arc<dyn RulesEngine>,
        policy: Arc<dyn MatchPolicy>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            recognizer,
            metadata: MetadataStage,
            clocks: ClockStage,
            moves: MoveStage::new(rules, policy, config.transcriber_settings()),
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every stage on `image` and consolidate the fragments.
    ///
    /// Always produces a result. Cancellation (or the configured timeout)
    /// stops the stages at their next recognizer call and keeps whatever
    /// they had accepted.
    pub async fn run(&self, image: &ScoresheetImage, cancel: CancelSignal) -> ConsolidatedResult {
        let cancel = match self.config.timeout {
            Some(timeout) => cancel.with_timeout(timeout),
            None => cancel,
        };
        let store = StateStore::new();
        let ctx = StageContext {
            image,
            recognizer: self.recognizer.as_ref(),
            cancel: &cancel,
        };

        tracing::info!(
            recognizer = self.recognizer.name(),
            bytes = image.len(),
            media_type = image.media_type().mime(),
            concurrent = self.config.concurrent_stages,
            "Pipeline started"
        );

        if self.config.concurrent_stages {
            tokio::join!(
                run_stage(&self.metadata, ctx, &store),
                run_stage(&self.clocks, ctx, &store),
                run_stage(&self.moves, ctx, &store),
            );
        } else {
            run_stage(&self.metadata, ctx, &store).await;
            run_stage(&self.clocks, ctx, &store).await;
            run_stage(&self.moves, ctx, &store).await;
        }

        let result = consolidate(store.into_complete());
        tracing::info!(
            complete = result.is_complete(),
            moves = result.moves.as_ref().map_or(0, Vec::len),
            warnings = result.warnings.len(),
            "Pipeline finished"
        );
        result
    }
}

async fn run_stage<S: Stage>(stage: &S, ctx: StageContext<'_>, store: &StateStore) {
    let key = <S::Key as FragmentKey>::KEY;
    tracing::debug!(stage = key.stage_name(), "Stage started");

    let fragment = match stage.extract(ctx).await {
        Ok(value) => Fragment::Data(value),
        Err(e) => {
            tracing::warn!(stage = key.stage_name(), error = %e, "Stage failed");
            Fragment::Failed(StageFailure::new(key, e.to_string()))
        }
    };

    if let Err(e) = store.writer::<S::Key>().write(fragment) {
        tracing::error!(stage = key.stage_name(), error = %e, "Dropped stage fragment");
    }
}
