//! Natural randomness with a local safety net.
//!
//! A [`RandomnessChain`] asks remote providers in priority order (quantum RNG,
//! random.org), then a mandatory local fallback, then a process-local
//! generator that cannot fail. A remote provider that fails once is marked
//! inactive for the lifetime of the chain; `reset()` or building a new chain
//! re-enables it.

use anyhow::{Context, Result};
use async_trait::async_trait;
use cerebrain_core::config::RandomnessConfig;
use cerebrain_core::{BrainError, BrainResult};
use rand::Rng;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

/// One source of floats in `[0, 1)`.
#[async_trait]
pub trait RandomnessProvider: Send + Sync {
    fn name(&self) -> &str;
    async fn fetch(&self) -> Result<f64>;
}

/// What the inspiration engine consumes. Never fails.
#[async_trait]
pub trait RandomnessSource: Send + Sync {
    async fn next_float(&self) -> f64;
}

// ============================================================================
// Remote providers
// ============================================================================

const ANU_URL: &str = "https://qrng.anu.edu.au/API/jsonI.php?length=1&type=uint16";
const RANDOM_ORG_URL: &str =
    "https://www.random.org/integers/?num=1&min=0&max=9999&col=1&base=10&format=plain";

/// ANU quantum random numbers (uint16 / 65536).
pub struct AnuQuantumProvider {
    client: reqwest::Client,
    url: String,
}

impl AnuQuantumProvider {
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder().timeout(timeout).build()?,
            url: ANU_URL.to_string(),
        })
    }
}

#[async_trait]
impl RandomnessProvider for AnuQuantumProvider {
    fn name(&self) -> &str {
        "anu_quantum"
    }

    async fn fetch(&self) -> Result<f64> {
        let body: serde_json::Value = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let n = body
            .get("data")
            .and_then(|d| d.get(0))
            .and_then(|v| v.as_u64())
            .context("ANU response missing data[0]")?;
        Ok(n.min(65535) as f64 / 65536.0)
    }
}

/// random.org integers in 0..=9999, divided by 10000.
pub struct RandomOrgProvider {
    client: reqwest::Client,
    url: String,
}

impl RandomOrgProvider {
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder().timeout(timeout).build()?,
            url: RANDOM_ORG_URL.to_string(),
        })
    }
}

#[async_trait]
impl RandomnessProvider for RandomOrgProvider {
    fn name(&self) -> &str {
        "random_org"
    }

    async fn fetch(&self) -> Result<f64> {
        let text = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let n: u64 = text
            .trim()
            .parse()
            .with_context(|| format!("random.org returned non-integer: {:?}", text.trim()))?;
        Ok(n.min(9999) as f64 / 10000.0)
    }
}

// ============================================================================
// Local providers
// ============================================================================

/// Thread-local CSPRNG from `rand`. The default local fallback.
#[derive(Debug, Default)]
pub struct ThreadRngProvider;

#[async_trait]
impl RandomnessProvider for ThreadRngProvider {
    fn name(&self) -> &str {
        "system"
    }

    async fn fetch(&self) -> Result<f64> {
        Ok(rand::thread_rng().gen::<f64>())
    }
}

/// Last resort: splitmix64 over a counter seeded from the clock and pid.
/// Deterministic for a given seed, which the tests rely on.
#[derive(Debug)]
pub struct ProcessEntropy {
    state: AtomicU64,
}

impl ProcessEntropy {
    pub fn seeded(seed: u64) -> Self {
        Self {
            state: AtomicU64::new(seed),
        }
    }

    pub fn from_process() -> Self {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64;
        Self::seeded(nanos ^ ((std::process::id() as u64) << 32))
    }

    pub fn next_float(&self) -> f64 {
        let mut z = self
            .state
            .fetch_add(0x9E37_79B9_7F4A_7C15, Ordering::Relaxed)
            .wrapping_add(0x9E37_79B9_7F4A_7C15);
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^= z >> 31;
        (z >> 11) as f64 / (1u64 << 53) as f64
    }
}

// ============================================================================
// RandomnessChain
// ============================================================================

struct ProviderSlot {
    provider: Box<dyn RandomnessProvider>,
    active: AtomicBool,
}

pub struct RandomnessChain {
    remotes: Vec<ProviderSlot>,
    fallback: Box<dyn RandomnessProvider>,
    last_resort: ProcessEntropy,
    timeout: Duration,
}

impl RandomnessChain {
    pub fn new(
        remotes: Vec<Box<dyn RandomnessProvider>>,
        fallback: Box<dyn RandomnessProvider>,
        timeout: Duration,
    ) -> Self {
        Self {
            remotes: remotes
                .into_iter()
                .map(|provider| ProviderSlot {
                    provider,
                    active: AtomicBool::new(true),
                })
                .collect(),
            fallback,
            last_resort: ProcessEntropy::from_process(),
            timeout,
        }
    }

    /// No network: thread RNG, then process entropy.
    pub fn local_only() -> Self {
        Self::new(vec![], Box::new(ThreadRngProvider), Duration::from_millis(500))
    }

    /// Build remote providers by name. Unknown names are skipped with a warning.
    pub fn from_config(cfg: &RandomnessConfig) -> Self {
        let timeout = Duration::from_millis(cfg.timeout_ms.max(1));
        let mut remotes: Vec<Box<dyn RandomnessProvider>> = Vec::new();
        for name in &cfg.providers {
            let built: Result<Box<dyn RandomnessProvider>> = match name.as_str() {
                "anu_quantum" => AnuQuantumProvider::new(timeout)
                    .map(|p| Box::new(p) as Box<dyn RandomnessProvider>),
                "random_org" => RandomOrgProvider::new(timeout)
                    .map(|p| Box::new(p) as Box<dyn RandomnessProvider>),
                other => {
                    tracing::warn!("Unknown randomness provider '{}', skipping", other);
                    continue;
                }
            };
            match built {
                Ok(p) => remotes.push(p),
                Err(e) => tracing::warn!("Randomness provider '{}' unavailable: {}", name, e),
            }
        }
        Self::new(remotes, Box::new(ThreadRngProvider), timeout)
    }

    pub fn with_last_resort(mut self, entropy: ProcessEntropy) -> Self {
        self.last_resort = entropy;
        self
    }

    /// Re-enable every remote provider.
    pub fn reset(&self) {
        for slot in &self.remotes {
            slot.active.store(true, Ordering::Release);
        }
    }

    pub fn active_providers(&self) -> Vec<&str> {
        self.remotes
            .iter()
            .filter(|s| s.active.load(Ordering::Acquire))
            .map(|s| s.provider.name())
            .collect()
    }

    async fn fetch_bounded(&self, provider: &dyn RandomnessProvider) -> Result<f64> {
        let value = tokio::time::timeout(self.timeout, provider.fetch())
            .await
            .map_err(|_| anyhow::anyhow!("timed out after {:?}", self.timeout))??;
        if !(0.0..1.0).contains(&value) {
            anyhow::bail!("value {} outside [0, 1)", value);
        }
        Ok(value)
    }

    /// Remote providers then the local fallback. `RandomnessUnavailable`
    /// only when every one of them failed.
    pub async fn draw(&self) -> BrainResult<f64> {
        for slot in &self.remotes {
            if !slot.active.load(Ordering::Acquire) {
                continue;
            }
            match self.fetch_bounded(slot.provider.as_ref()).await {
                Ok(v) => return Ok(v),
                Err(e) => {
                    tracing::warn!(
                        "Randomness provider '{}' failed, deactivating: {}",
                        slot.provider.name(),
                        e
                    );
                    slot.active.store(false, Ordering::Release);
                }
            }
        }
        match self.fetch_bounded(self.fallback.as_ref()).await {
            Ok(v) => Ok(v),
            Err(e) => {
                tracing::warn!("Local randomness fallback '{}' failed: {}", self.fallback.name(), e);
                Err(BrainError::RandomnessUnavailable)
            }
        }
    }
}

#[async_trait]
impl RandomnessSource for RandomnessChain {
    async fn next_float(&self) -> f64 {
        match self.draw().await {
            Ok(v) => v,
            Err(e) => {
                tracing::debug!("{}; using process entropy", e);
                self.last_resort.next_float()
            }
        }
    }
}
