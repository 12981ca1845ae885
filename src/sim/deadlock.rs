//! Deadlock detection for Tensix thread hand-offs.
//!
//! When every unfinished thread is blocked the simulator builds a
//! wait-for graph:
//!
//! - **Wait edges**: what each blocked thread is waiting on
//! - **Signalers**: which threads still have an instruction in their
//!   remaining stream that would satisfy that wait
//! - **Cycle detection**: a circular wait means no thread can ever move
//!
//! A blocked thread whose wait has no signaler at all is a plain stall
//! (for example pack waiting for a tile math never produces), which the
//! caller reports separately.
//!
//! # Usage
//!
//! ```ignore
//! use tensix_llk::sim::deadlock::{DeadlockDetector, WaitTarget};
//!
//! let mut detector = DeadlockDetector::new();
//! detector.start_wait(ThreadId::Math, WaitTarget::SemaphoreUp(2));
//! detector.record_signaler(ThreadId::Pack, WaitTarget::SemaphoreUp(2));
//! detector.start_wait(ThreadId::Pack, WaitTarget::SemaphoreUp(3));
//! detector.record_signaler(ThreadId::Math, WaitTarget::SemaphoreUp(3));
//!
//! if let Some(cycle) = detector.detect_deadlock() {
//!     println!("{}", cycle);
//! }
//! ```

use crate::dest::DestClient;
use crate::thread::ThreadId;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// What a blocked thread is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WaitTarget {
    /// A semaphore to drop below max (or to zero for host waits).
    SemaphoreDown(u8),
    /// A semaphore to become non-zero.
    SemaphoreUp(u8),
    /// The dvalid chain to hand this client its bank.
    DestValid(DestClient),
}

impl fmt::Display for WaitTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitTarget::SemaphoreDown(s) => write!(f, "sem{} to drop", s),
            WaitTarget::SemaphoreUp(s) => write!(f, "sem{} to rise", s),
            WaitTarget::DestValid(c) => write!(f, "dvalid for {}", c),
        }
    }
}

/// A detected deadlock cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadlockCycle {
    /// Threads involved in the cycle (in dependency order)
    pub threads: Vec<ThreadId>,
    /// What each thread waits for
    pub waits: Vec<WaitTarget>,
}

impl DeadlockCycle {
    pub fn involves(&self, thread: ThreadId) -> bool {
        self.threads.contains(&thread)
    }
}

impl fmt::Display for DeadlockCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (thread, wait)) in self.threads.iter().zip(self.waits.iter()).enumerate() {
            if i > 0 {
                write!(f, " -> ")?;
            }
            write!(f, "{} waits for {}", thread, wait)?;
        }
        if let Some(first) = self.threads.first() {
            write!(f, " -> {}", first)?;
        }
        Ok(())
    }
}

/// Wait-for graph over threads.
#[derive(Debug, Default)]
pub struct DeadlockDetector {
    /// What each thread is currently blocked on
    waiting_for: HashMap<ThreadId, WaitTarget>,

    /// Threads able to satisfy each wait
    signalers: HashMap<WaitTarget, HashSet<ThreadId>>,

    detected_deadlocks: Vec<DeadlockCycle>,

    enabled: bool,
}

impl DeadlockDetector {
    pub fn new() -> Self {
        Self {
            enabled: true,
            ..Default::default()
        }
    }

    /// Create a disabled detector (for fast simulation).
    pub fn disabled() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Record that a thread is blocked.
    pub fn start_wait(&mut self, thread: ThreadId, target: WaitTarget) {
        if !self.enabled {
            return;
        }
        self.waiting_for.insert(thread, target);
    }

    /// Record that a thread made progress.
    pub fn end_wait(&mut self, thread: ThreadId) {
        if !self.enabled {
            return;
        }
        self.waiting_for.remove(&thread);
    }

    /// Record that `thread` could still satisfy `target`.
    pub fn record_signaler(&mut self, thread: ThreadId, target: WaitTarget) {
        if !self.enabled {
            return;
        }
        self.signalers.entry(target).or_default().insert(thread);
    }

    /// Forget every signaler, ahead of a fresh scan.
    pub fn clear_signalers(&mut self) {
        self.signalers.clear();
    }

    /// Find a circular wait in the current graph.
    pub fn detect_deadlock(&mut self) -> Option<&DeadlockCycle> {
        if !self.enabled || self.waiting_for.is_empty() {
            return None;
        }

        self.detected_deadlocks.clear();

        let mut starts: Vec<ThreadId> = self.waiting_for.keys().copied().collect();
        starts.sort();
        for start in starts {
            if let Some(cycle) = self.find_cycle_from(start) {
                self.detected_deadlocks.push(cycle);
                return self.detected_deadlocks.last();
            }
        }

        None
    }

    fn find_cycle_from(&self, start: ThreadId) -> Option<DeadlockCycle> {
        let mut visited = HashSet::new();
        visited.insert(start);
        let mut path_threads = Vec::new();
        let mut path_waits = Vec::new();

        self.dfs_cycle(start, start, &mut visited, &mut path_threads, &mut path_waits)
    }

    fn dfs_cycle(
        &self,
        current: ThreadId,
        start: ThreadId,
        visited: &mut HashSet<ThreadId>,
        path_threads: &mut Vec<ThreadId>,
        path_waits: &mut Vec<WaitTarget>,
    ) -> Option<DeadlockCycle> {
        let target = self.waiting_for.get(&current)?;

        path_threads.push(current);
        path_waits.push(*target);

        if let Some(signalers) = self.signalers.get(target) {
            let mut ordered: Vec<ThreadId> = signalers.iter().copied().collect();
            ordered.sort();
            for signaler in ordered {
                // A thread that would unblock itself is stalled, not deadlocked.
                if signaler == current {
                    continue;
                }
                if signaler == start && path_threads.len() > 1 {
                    return Some(DeadlockCycle {
                        threads: path_threads.clone(),
                        waits: path_waits.clone(),
                    });
                }

                if !visited.contains(&signaler) && self.waiting_for.contains_key(&signaler) {
                    visited.insert(signaler);
                    if let Some(cycle) =
                        self.dfs_cycle(signaler, start, visited, path_threads, path_waits)
                    {
                        return Some(cycle);
                    }
                    visited.remove(&signaler);
                }
            }
        }

        path_threads.pop();
        path_waits.pop();

        None
    }

    pub fn waiting_count(&self) -> usize {
        self.waiting_for.len()
    }

    pub fn waiting_for(&self, thread: ThreadId) -> Option<WaitTarget> {
        self.waiting_for.get(&thread).copied()
    }

    pub fn signalers(&self, target: WaitTarget) -> Option<&HashSet<ThreadId>> {
        self.signalers.get(&target)
    }

    pub fn detected_deadlocks(&self) -> &[DeadlockCycle] {
        &self.detected_deadlocks
    }

    /// Clear all tracking state (but keep enabled status).
    pub fn reset(&mut self) {
        self.waiting_for.clear();
        self.signalers.clear();
        self.detected_deadlocks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_deadlock_without_signaler_wait() {
        let mut detector = DeadlockDetector::new();
        detector.start_wait(ThreadId::Pack, WaitTarget::SemaphoreUp(1));
        detector.record_signaler(ThreadId::Math, WaitTarget::SemaphoreUp(1));
        // Math is not blocked, so it can still post.
        assert!(detector.detect_deadlock().is_none());
    }

    #[test]
    fn test_two_thread_cycle() {
        let mut detector = DeadlockDetector::new();
        detector.start_wait(ThreadId::Math, WaitTarget::SemaphoreDown(1));
        detector.record_signaler(ThreadId::Pack, WaitTarget::SemaphoreDown(1));
        detector.start_wait(ThreadId::Pack, WaitTarget::SemaphoreUp(4));
        detector.record_signaler(ThreadId::Math, WaitTarget::SemaphoreUp(4));

        let cycle = detector.detect_deadlock().cloned().unwrap();
        assert_eq!(cycle.threads, vec![ThreadId::Math, ThreadId::Pack]);
        assert_eq!(
            cycle.to_string(),
            "math waits for sem1 to drop -> pack waits for sem4 to rise -> math"
        );
    }

    #[test]
    fn test_three_stage_dvalid_cycle() {
        let mut detector = DeadlockDetector::new();
        let m = WaitTarget::DestValid(DestClient::Math);
        let s = WaitTarget::DestValid(DestClient::Sfpu);
        let p = WaitTarget::DestValid(DestClient::Pack);
        detector.start_wait(ThreadId::Math, m);
        detector.start_wait(ThreadId::Sfpu, s);
        detector.start_wait(ThreadId::Pack, p);
        detector.record_signaler(ThreadId::Pack, m);
        detector.record_signaler(ThreadId::Math, s);
        detector.record_signaler(ThreadId::Sfpu, p);

        let cycle = detector.detect_deadlock().cloned().unwrap();
        assert_eq!(cycle.threads.len(), 3);
        assert!(cycle.involves(ThreadId::Sfpu));
    }

    #[test]
    fn test_self_signal_is_not_a_cycle() {
        let mut detector = DeadlockDetector::new();
        detector.start_wait(ThreadId::Pack, WaitTarget::SemaphoreUp(1));
        detector.record_signaler(ThreadId::Pack, WaitTarget::SemaphoreUp(1));
        assert!(detector.detect_deadlock().is_none());
    }

    #[test]
    fn test_self_signal_does_not_hide_cycle() {
        let mut detector = DeadlockDetector::new();
        detector.start_wait(ThreadId::Math, WaitTarget::SemaphoreDown(1));
        detector.record_signaler(ThreadId::Math, WaitTarget::SemaphoreDown(1));
        detector.record_signaler(ThreadId::Pack, WaitTarget::SemaphoreDown(1));
        detector.start_wait(ThreadId::Pack, WaitTarget::SemaphoreUp(4));
        detector.record_signaler(ThreadId::Math, WaitTarget::SemaphoreUp(4));

        let cycle = detector.detect_deadlock().cloned().unwrap();
        assert_eq!(cycle.threads, vec![ThreadId::Math, ThreadId::Pack]);
    }

    #[test]
    fn test_disabled_detector() {
        let mut detector = DeadlockDetector::disabled();
        assert!(!detector.is_enabled());
        detector.start_wait(ThreadId::Math, WaitTarget::SemaphoreUp(1));
        assert_eq!(detector.waiting_count(), 0);
        assert!(detector.detect_deadlock().is_none());
    }

    #[test]
    fn test_reset() {
        let mut detector = DeadlockDetector::new();
        detector.start_wait(ThreadId::Math, WaitTarget::SemaphoreUp(1));
        detector.record_signaler(ThreadId::Pack, WaitTarget::SemaphoreUp(1));
        detector.end_wait(ThreadId::Math);
        assert_eq!(detector.waiting_for(ThreadId::Math), None);
        detector.reset();
        assert!(detector.signalers(WaitTarget::SemaphoreUp(1)).is_none());
    }
}
