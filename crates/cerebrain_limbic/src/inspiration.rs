//! Spark generation gated by a freshly drawn random float.
//!
//! One draw `r` per call. A spark fires when `r < trigger_threshold`; its
//! strength is `r` and its label is picked from the vocabulary by where `r`
//! falls inside `[0, threshold)`. The engine never holds spark state itself:
//! callers pass the [`InspirationState`] they own.

use crate::randomness::RandomnessSource;
use cerebrain_core::config::InspirationConfig;
use cerebrain_core::{InspirationState, Spark};
use std::sync::Arc;

const DEFAULT_VOCABULARY: &[&str] = &[
    "noise → filter → signal",
    "seed → root → bloom",
    "question → tension → insight",
    "pattern → break → pattern",
    "memory → echo → variation",
    "constraint → play → form",
    "drift → anchor → return",
    "spark → link → network",
];

pub struct InspirationEngine {
    source: Arc<dyn RandomnessSource>,
    config: InspirationConfig,
    vocabulary: Vec<String>,
}

impl InspirationEngine {
    pub fn new(source: Arc<dyn RandomnessSource>, config: InspirationConfig) -> Self {
        Self {
            source,
            config,
            vocabulary: DEFAULT_VOCABULARY.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Replace the label vocabulary. An empty list keeps the default one.
    pub fn with_vocabulary(mut self, vocabulary: Vec<String>) -> Self {
        if !vocabulary.is_empty() {
            self.vocabulary = vocabulary;
        }
        self
    }

    pub fn config(&self) -> &InspirationConfig {
        &self.config
    }

    /// Gate a single value against the threshold.
    pub fn spark_for(&self, r: f64, now: i64) -> Option<Spark> {
        let threshold = self.config.trigger_threshold;
        if !r.is_finite() || !(threshold > 0.0) || r < 0.0 || r >= threshold {
            return None;
        }
        let len = self.vocabulary.len();
        let idx = ((r / threshold) * len as f64).floor() as usize % len.max(1);
        let label = self
            .vocabulary
            .get(idx)
            .cloned()
            .unwrap_or_else(|| "spark".to_string());
        Some(Spark::new(label, r as f32, now))
    }

    /// Draw once and gate it. Touches no state; the orchestrator uses this
    /// for the side-effecting skill and folds the result in at commit.
    pub async fn draw(&self, now: i64) -> Option<Spark> {
        let r = self.source.next_float().await;
        let spark = self.spark_for(r, now);
        tracing::debug!(
            "Inspiration draw r={:.4} threshold={:.2} fired={}",
            r,
            self.config.trigger_threshold,
            spark.is_some()
        );
        spark
    }

    /// Prune expired sparks then store `spark`, evicting oldest beyond `max_active`.
    pub fn accept(&self, state: &mut InspirationState, spark: Spark, now: i64) {
        self.prune(state, now);
        state.push(spark, self.config.max_active);
    }

    pub fn prune(&self, state: &mut InspirationState, now: i64) -> usize {
        let removed = state.prune(now, self.config.spark_ttl_secs);
        if removed > 0 {
            tracing::debug!("Pruned {} expired sparks", removed);
        }
        removed
    }

    /// Prune, draw, and store a fired spark in one step.
    pub async fn maybe_spark(&self, state: &mut InspirationState, now: i64) -> Option<Spark> {
        self.prune(state, now);
        let spark = self.draw(now).await?;
        state.push(spark.clone(), self.config.max_active);
        tracing::info!("Spark: {} ({:.2})", spark.label, spark.strength);
        Some(spark)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::randomness::{RandomnessChain, RandomnessProvider};
    use async_trait::async_trait;
    use std::time::Duration;

    struct Constant(f64);

    #[async_trait]
    impl RandomnessSource for Constant {
        async fn next_float(&self) -> f64 {
            self.0
        }
    }

    struct Down;

    #[async_trait]
    impl RandomnessProvider for Down {
        fn name(&self) -> &str {
            "down"
        }
        async fn fetch(&self) -> anyhow::Result<f64> {
            anyhow::bail!("unreachable host")
        }
    }

    struct Fixed(f64);

    #[async_trait]
    impl RandomnessProvider for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }
        async fn fetch(&self) -> anyhow::Result<f64> {
            Ok(self.0)
        }
    }

    fn engine(r: f64) -> InspirationEngine {
        InspirationEngine::new(Arc::new(Constant(r)), InspirationConfig::default())
    }

    #[tokio::test]
    async fn test_fallback_value_below_threshold_fires() {
        let chain = RandomnessChain::new(
            vec![Box::new(Down)],
            Box::new(Fixed(0.42)),
            Duration::from_secs(1),
        );
        let engine = InspirationEngine::new(Arc::new(chain), InspirationConfig::default());
        let mut state = InspirationState::default();

        let spark = engine.maybe_spark(&mut state, 1_000).await.unwrap();
        assert!((spark.strength - 0.42).abs() < 1e-6);
        // floor(0.42 / 0.7 * 8) = 4
        assert_eq!(spark.label, DEFAULT_VOCABULARY[4]);
        assert_eq!(state.active_count(), 1);
    }

    #[tokio::test]
    async fn test_value_at_or_above_threshold_does_not_fire() {
        let mut state = InspirationState::default();
        assert!(engine(0.7).maybe_spark(&mut state, 0).await.is_none());
        assert!(engine(0.99).maybe_spark(&mut state, 0).await.is_none());
        assert_eq!(state.active_count(), 0);
    }

    #[tokio::test]
    async fn test_expired_sparks_pruned_on_every_call() {
        let e = engine(0.9);
        let mut state = InspirationState::default();
        state.push(Spark::new("old", 0.5, 0), 5);
        state.push(Spark::new("young", 0.5, 500), 5);
        assert!(e.maybe_spark(&mut state, 700).await.is_none());
        assert_eq!(state.active_count(), 1);
        assert_eq!(state.sparks[0].label, "young");
    }

    #[tokio::test]
    async fn test_draw_leaves_state_alone() {
        let e = engine(0.1);
        let state = InspirationState::default();
        let spark = e.draw(10).await.unwrap();
        assert_eq!(spark.label, DEFAULT_VOCABULARY[1]);
        assert_eq!(state.active_count(), 0);
    }

    #[test]
    fn test_zero_threshold_never_fires() {
        let cfg = InspirationConfig {
            trigger_threshold: 0.0,
            ..InspirationConfig::default()
        };
        let e = InspirationEngine::new(Arc::new(Constant(0.0)), cfg);
        assert!(e.spark_for(0.0, 0).is_none());
    }

    #[test]
    fn test_custom_vocabulary() {
        let e = engine(0.0).with_vocabulary(vec!["only".into()]);
        assert_eq!(e.spark_for(0.69, 0).unwrap().label, "only");
        let e = engine(0.0).with_vocabulary(vec![]);
        assert_eq!(e.spark_for(0.0, 0).unwrap().label, DEFAULT_VOCABULARY[0]);
    }
}
