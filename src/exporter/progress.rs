//! Progress reporting for long-running stages.
//!
//! Tickets, users and comments can take hours on a large account. These
//! helpers decide when a `[PROGRESS]` line is due and format it.

use std::time::{Duration, Instant};

const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(60);
const MIN_STAGE_DURATION: Duration = Duration::from_secs(30);

/// Progress of one stage.
#[derive(Debug, Clone)]
pub struct ProgressState {
    /// Items processed so far.
    pub items_processed: u64,
    /// Total expected items (if known).
    pub total_expected: Option<u64>,
    /// Plural label of the items ("tickets", "users", ...).
    pub label: &'static str,
    /// Timestamp when the stage started.
    pub start_time: Instant,
    /// Last time progress was reported.
    pub last_update: Instant,
    /// Minimum interval between progress updates.
    pub update_interval: Duration,
    /// Last reported completion percentage (0-100).
    pub last_reported_percentage: f64,
    /// Minimum percentage delta required to emit a new update.
    pub min_percentage_step: f64,
}

impl ProgressState {
    /// Create a state with default cadence.
    pub fn new(total_expected: Option<u64>, label: &'static str) -> Self {
        let now = Instant::now();
        Self {
            items_processed: 0,
            total_expected,
            label,
            start_time: now,
            last_update: now,
            update_interval: DEFAULT_UPDATE_INTERVAL,
            last_reported_percentage: 0.0,
            min_percentage_step: 10.0,
        }
    }

    /// Override the time-based cadence.
    pub fn with_update_interval(mut self, interval: Duration) -> Self {
        self.update_interval = interval;
        self
    }

    /// Count newly processed items.
    pub fn update(&mut self, new_items: u64) {
        self.items_processed = self.items_processed.saturating_add(new_items);
    }

    /// Whether a progress line is due, by percentage jump or elapsed time.
    pub fn should_emit_update(&self) -> bool {
        if self.items_processed == 0 {
            return false;
        }

        let percentage_jump = self
            .percentage()
            .map(|pct| pct - self.last_reported_percentage >= self.min_percentage_step)
            .unwrap_or(false);
        if percentage_jump {
            return true;
        }

        self.start_time.elapsed() >= MIN_STAGE_DURATION
            && self.last_update.elapsed() >= self.update_interval
    }

    /// Call after emitting a progress line.
    pub fn mark_emitted(&mut self) {
        self.last_update = Instant::now();
        if let Some(pct) = self.percentage() {
            self.last_reported_percentage = pct;
        }
    }

    /// Completion percentage (0-100) when the total is known.
    pub fn percentage(&self) -> Option<f64> {
        self.total_expected.map(|total| {
            if total == 0 {
                100.0
            } else {
                (self.items_processed as f64 / total as f64 * 100.0).min(100.0)
            }
        })
    }

    /// Items per second since the stage started.
    pub fn rate(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.items_processed as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Human-readable progress string for logging.
    pub fn format_progress(&self) -> String {
        let mut parts = vec![format!(
            "[PROGRESS] Processed {} {}",
            self.items_processed, self.label
        )];

        if let Some(total) = self.total_expected {
            parts.push(format!("of {total}"));
        }
        if let Some(pct) = self.percentage() {
            parts.push(format!("- {pct:.1}% complete"));
        }

        let rate = self.rate();
        if rate > 0.0 {
            parts.push(format!("at {rate:.1} {}/sec", self.label));
            if let Some(total) = self.total_expected {
                let remaining = total.saturating_sub(self.items_processed);
                if remaining > 0 {
                    let eta = Duration::from_secs_f64(remaining as f64 / rate);
                    parts.push(format!("- ~{} remaining", format_duration(eta)));
                }
            }
        }

        parts.join(" ")
    }
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else {
        format!("{:.1}h", secs as f64 / 3600.0)
    }
}
