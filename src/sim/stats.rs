//! Execution statistics.

use super::sync::SemaphoreStats;
use crate::thread::ThreadId;
use std::fmt;

/// Counters for one thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThreadStats {
    /// Instructions that reached execution
    pub executed: u64,
    /// MOP triggers expanded
    pub mop_runs: u64,
    /// Replay windows played back
    pub replays: u64,
    /// Instructions captured into replay memory
    pub recorded: u64,
    /// Host-side waits and config writes
    pub host_ops: u64,
    /// Steps spent blocked
    pub stall_steps: u64,
    /// Step on which the thread ran out of work
    pub finished_at: Option<u64>,
}

/// Totals for a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsSummary {
    pub steps: u64,
    pub executed: u64,
    pub stall_steps: u64,
    pub mop_runs: u64,
    pub replays: u64,
    pub sem_posts: u64,
    pub sem_gets: u64,
    /// Longest single semaphore wait
    pub max_sem_stall: u64,
    /// Per-thread instructions executed
    pub per_thread: Vec<(ThreadId, u64)>,
}

impl StatsSummary {
    pub fn collect<'a>(
        steps: u64,
        threads: impl Iterator<Item = (ThreadId, &'a ThreadStats)>,
        sems: &[SemaphoreStats],
    ) -> Self {
        let mut summary = StatsSummary {
            steps,
            ..Default::default()
        };
        for (id, t) in threads {
            summary.executed += t.executed;
            summary.stall_steps += t.stall_steps;
            summary.mop_runs += t.mop_runs;
            summary.replays += t.replays;
            summary.per_thread.push((id, t.executed));
        }
        for s in sems {
            summary.sem_posts += s.posts;
            summary.sem_gets += s.gets;
            summary.max_sem_stall = summary.max_sem_stall.max(s.max_stall);
        }
        summary
    }

    /// Fraction of thread-steps lost to blocking.
    pub fn stall_ratio(&self) -> f64 {
        let busy = self.executed + self.stall_steps;
        if busy == 0 {
            0.0
        } else {
            self.stall_steps as f64 / busy as f64
        }
    }
}

impl fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} steps, {} instructions, {} stalled thread-steps ({:.1}%)",
            self.steps,
            self.executed,
            self.stall_steps,
            self.stall_ratio() * 100.0
        )?;
        writeln!(
            f,
            "  {} MOP runs, {} replays, {} posts / {} gets, longest wait {}",
            self.mop_runs, self.replays, self.sem_posts, self.sem_gets, self.max_sem_stall
        )?;
        for (id, n) in &self.per_thread {
            writeln!(f, "  {:>6}: {}", id.as_str(), n)?;
        }
        Ok(())
    }
}
