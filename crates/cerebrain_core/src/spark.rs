use serde::{Deserialize, Serialize};

/// A transient inspiration record with strength and expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spark {
    pub label: String,
    /// Strength at creation (0.0 to 1.0).
    pub strength: f32,
    /// Unix timestamp (seconds).
    pub created_at: i64,
}

impl Spark {
    pub fn new(label: impl Into<String>, strength: f32, created_at: i64) -> Self {
        let strength = if strength.is_finite() {
            strength.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            label: label.into(),
            strength,
            created_at,
        }
    }

    pub fn age_secs(&self, now: i64) -> i64 {
        (now - self.created_at).max(0)
    }

    pub fn is_expired(&self, now: i64, ttl_secs: i64) -> bool {
        self.age_secs(now) > ttl_secs
    }

    /// Linear decay from `strength` at creation to zero at the TTL.
    pub fn strength_at(&self, now: i64, ttl_secs: i64) -> f32 {
        if ttl_secs <= 0 || self.is_expired(now, ttl_secs) {
            return 0.0;
        }
        let remaining = 1.0 - self.age_secs(now) as f32 / ttl_secs as f32;
        (self.strength * remaining).clamp(0.0, 1.0)
    }
}

/// Active sparks, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InspirationState {
    pub sparks: Vec<Spark>,
}

impl InspirationState {
    pub fn active_count(&self) -> usize {
        self.sparks.len()
    }

    pub fn latest(&self) -> Option<&Spark> {
        self.sparks.last()
    }

    /// Drop sparks older than the TTL. Returns how many were removed.
    pub fn prune(&mut self, now: i64, ttl_secs: i64) -> usize {
        let before = self.sparks.len();
        self.sparks.retain(|s| !s.is_expired(now, ttl_secs));
        before - self.sparks.len()
    }

    /// Append a spark, evicting the oldest beyond `max_active`.
    pub fn push(&mut self, spark: Spark, max_active: usize) {
        self.sparks.push(spark);
        let max_active = max_active.max(1);
        if self.sparks.len() > max_active {
            let overflow = self.sparks.len() - max_active;
            self.sparks.drain(0..overflow);
        }
    }
}
