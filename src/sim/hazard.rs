//! Dest hand-off hazard detection.
//!
//! Tracks the hand-off state of each Dest section to catch the two ways a
//! broken protocol corrupts data:
//! - **ReadBeforeSignal**: pack reads a section the producer has not released
//! - **OverwriteBeforeDrain**: a producer writes a section pack has not drained
//!
//! ```text
//! Free --write--> Writing --release--> Released --drain--> Free
//! ```

use crate::thread::ThreadId;
use std::fmt;

/// Kind of hand-off violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HazardKind {
    ReadBeforeSignal,
    OverwriteBeforeDrain,
}

/// One detected violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DestHazard {
    pub kind: HazardKind,
    pub thread: ThreadId,
    /// Dest section (bank) involved.
    pub section: u8,
    /// Dest row accessed.
    pub row: u32,
    /// Scheduler step.
    pub step: u64,
}

impl fmt::Display for DestHazard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self.kind {
            HazardKind::ReadBeforeSignal => "read before signal",
            HazardKind::OverwriteBeforeDrain => "overwrite before drain",
        };
        write!(
            f,
            "step {}: {} {} on section {} (row {})",
            self.step, self.thread, what, self.section, self.row
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum SectionState {
    #[default]
    Free,
    Writing,
    Released,
}

/// Section state machine for Dest.
#[derive(Debug, Clone)]
pub struct HazardTracker {
    enabled: bool,
    full: bool,
    half_rows: u32,
    sections: [SectionState; 2],
    hazards: Vec<DestHazard>,
}

impl HazardTracker {
    pub fn new(half_rows: u32, enabled: bool) -> Self {
        Self {
            enabled,
            full: false,
            half_rows,
            sections: [SectionState::Free; 2],
            hazards: Vec::new(),
        }
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Switch buffering mode; forgets section state.
    pub fn set_full_mode(&mut self, full: bool) {
        self.full = full;
        self.sections = [SectionState::Free; 2];
    }

    pub fn section_of(&self, row: u32) -> u8 {
        if self.full {
            0
        } else {
            ((row / self.half_rows) & 1) as u8
        }
    }

    /// A producer wrote `row`.
    pub fn on_write(&mut self, thread: ThreadId, row: u32, step: u64) {
        if !self.enabled {
            return;
        }
        let section = self.section_of(row);
        if self.sections[section as usize] == SectionState::Released {
            self.report(HazardKind::OverwriteBeforeDrain, thread, section, row, step);
        }
        self.sections[section as usize] = SectionState::Writing;
    }

    /// Pack read `row`.
    pub fn on_read(&mut self, thread: ThreadId, row: u32, step: u64) {
        if !self.enabled {
            return;
        }
        let section = self.section_of(row);
        if self.sections[section as usize] != SectionState::Released {
            self.report(HazardKind::ReadBeforeSignal, thread, section, row, step);
        }
    }

    /// The last producer released the section holding `row`.
    pub fn on_release(&mut self, row: u32) {
        if self.enabled {
            let section = self.section_of(row);
            self.sections[section as usize] = SectionState::Released;
        }
    }

    /// Pack handed the section holding `row` back.
    pub fn on_drain(&mut self, row: u32) {
        if self.enabled {
            let section = self.section_of(row);
            self.sections[section as usize] = SectionState::Free;
        }
    }

    fn report(&mut self, kind: HazardKind, thread: ThreadId, section: u8, row: u32, step: u64) {
        let hazard = DestHazard {
            kind,
            thread,
            section,
            row,
            step,
        };
        log::warn!("Dest hazard: {}", hazard);
        self.hazards.push(hazard);
    }

    pub fn hazards(&self) -> &[DestHazard] {
        &self.hazards
    }
}
