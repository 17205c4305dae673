//! Process-wide runtime state, made explicit.
//!
//! Everything that used to be ambient (the seeded random source, headless
//! flags, temp-config retention) lives in one `RuntimeContext` constructed
//! at entry and threaded through the engine. Randomness write points: the
//! constructor (optional workflow seed) and the `randomSeed` variation
//! override, via [`RuntimeContext::reseed`]. Read point:
//! [`RuntimeContext::next_u64`]. Provenance id minting never touches this
//! source.

use crate::tracking::ProvenanceTracker;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::sync::{Arc, Mutex};

pub struct RuntimeContext {
    rng: Mutex<StdRng>,
    tracker: Arc<ProvenanceTracker>,
    headless: bool,
    retain_temp_configs: bool,
    output_format: String,
}

impl RuntimeContext {
    /// Context with an entropy-seeded random source.
    pub fn new(tracker: Arc<ProvenanceTracker>) -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
            tracker,
            headless: true,
            retain_temp_configs: false,
            output_format: "arff".to_string(),
        }
    }

    pub fn with_seed(self, seed: Option<i64>) -> Self {
        if let Some(seed) = seed {
            self.reseed(seed);
        }
        self
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn with_retain_temp_configs(mut self, retain: bool) -> Self {
        self.retain_temp_configs = retain;
        self
    }

    pub fn with_output_format(mut self, format: Option<String>) -> Self {
        if let Some(format) = format {
            self.output_format = format;
        }
        self
    }

    /// Reinstall the process-wide seed. Called once at load time and by
    /// every `randomSeed` loop iteration.
    pub fn reseed(&self, seed: i64) {
        let mut rng = self.rng.lock().expect("rng lock");
        *rng = StdRng::seed_from_u64(seed as u64);
    }

    /// Draw from the process-wide source. Single-threaded step execution
    /// means a caller sees a snapshot consistent with declaration order.
    pub fn next_u64(&self) -> u64 {
        self.rng.lock().expect("rng lock").next_u64()
    }

    pub fn tracker(&self) -> &Arc<ProvenanceTracker> {
        &self.tracker
    }

    pub fn headless(&self) -> bool {
        self.headless
    }

    pub fn retain_temp_configs(&self) -> bool {
        self.retain_temp_configs
    }

    pub fn output_format(&self) -> &str {
        &self.output_format
    }
}

impl std::fmt::Debug for RuntimeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeContext")
            .field("headless", &self.headless)
            .field("retain_temp_configs", &self.retain_temp_configs)
            .field("output_format", &self.output_format)
            .finish()
    }
}
