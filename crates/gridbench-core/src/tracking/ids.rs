//! Provenance identifier minting.
//!
//! Ids have the shape `PREFIX_<ms-epoch>_<4-digit-random>`. The random group
//! is drawn from `rand::thread_rng`, never from the process-wide seeded
//! source, so ids stay distinct across replays with identical seeds. A
//! process-local registry of issued ids re-draws on collision, which keeps
//! uniqueness up to 10^4 mints per millisecond per prefix.

use rand::Rng;
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Default)]
pub struct IdMinter {
    issued: Mutex<HashSet<String>>,
}

impl IdMinter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mint(&self, prefix: &str) -> String {
        let mut issued = self.issued.lock().expect("id registry lock");
        loop {
            let ms = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis())
                .unwrap_or(0);
            let suffix: u32 = rand::thread_rng().gen_range(0..10_000);
            let id = format!("{prefix}_{ms}_{suffix:04}");
            if issued.insert(id.clone()) {
                return id;
            }
        }
    }
}
