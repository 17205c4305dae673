//! Nested step/percent/ETA progress reporting.
//!
//! Purely observational: the tracker writes through `tracing` and has no
//! other side effect. Loops create sub-trackers so nested expansions render
//! as nested scopes.

use std::time::{Duration, Instant};
use tracing::info;

#[derive(Debug)]
pub struct ProgressTracker {
    label: String,
    total_steps: usize,
    completed: usize,
    current: Option<String>,
    started: Option<Instant>,
}

impl ProgressTracker {
    pub fn new(label: impl Into<String>, total_steps: usize) -> Self {
        Self {
            label: label.into(),
            total_steps,
            completed: 0,
            current: None,
            started: None,
        }
    }

    pub fn start(&mut self) {
        self.started = Some(Instant::now());
        info!(target: "progress", "[{}] starting ({} steps)", self.label, self.total_steps);
    }

    /// Move on to the next step. The previous step, if still open, is
    /// completed implicitly.
    pub fn increment_step(&mut self, description: Option<&str>) {
        if self.started.is_none() {
            self.start();
        }
        if self.current.is_some() {
            self.complete_current_step(None);
        }
        let desc = description.unwrap_or("").to_string();
        info!(
            target: "progress",
            "[{}] step {}/{}{}{}",
            self.label,
            self.completed + 1,
            self.total_steps,
            if desc.is_empty() { "" } else { ": " },
            desc
        );
        self.current = Some(desc);
    }

    pub fn complete_current_step(&mut self, message: Option<&str>) {
        if self.current.take().is_none() {
            return;
        }
        self.completed += 1;
        let pct = if self.total_steps == 0 {
            100.0
        } else {
            self.completed as f64 * 100.0 / self.total_steps as f64
        };
        match self.eta() {
            Some(eta) => info!(
                target: "progress",
                "[{}] {}/{} ({:.0}%) eta {:.0}s{}{}",
                self.label,
                self.completed,
                self.total_steps,
                pct,
                eta.as_secs_f64(),
                if message.is_some() { " " } else { "" },
                message.unwrap_or("")
            ),
            None => info!(
                target: "progress",
                "[{}] {}/{} ({:.0}%){}{}",
                self.label,
                self.completed,
                self.total_steps,
                pct,
                if message.is_some() { " " } else { "" },
                message.unwrap_or("")
            ),
        }
    }

    pub fn complete(&mut self) {
        if self.current.is_some() {
            self.complete_current_step(None);
        }
        let elapsed = self
            .started
            .map(|s| s.elapsed())
            .unwrap_or(Duration::ZERO);
        info!(
            target: "progress",
            "[{}] done ({}/{} steps in {:.1}s)",
            self.label,
            self.completed,
            self.total_steps,
            elapsed.as_secs_f64()
        );
    }

    /// Child tracker for a nested scope; the parent label is kept as a
    /// prefix so nesting stays visible in flat log output.
    pub fn create_sub_tracker(&self, name: &str, total_steps: usize) -> ProgressTracker {
        ProgressTracker::new(format!("{} > {}", self.label, name), total_steps)
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    /// `elapsed * remaining / completed`; undefined before the first
    /// completed step.
    fn eta(&self) -> Option<Duration> {
        let started = self.started?;
        if self.completed == 0 || self.total_steps <= self.completed {
            return None;
        }
        let remaining = (self.total_steps - self.completed) as f64;
        let per_done = started.elapsed().as_secs_f64() / self.completed as f64;
        Some(Duration::from_secs_f64(per_done * remaining))
    }
}
