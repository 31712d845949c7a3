//! # Batch Scope
//!
//! Suppresses settle passes during multi-step structural operations.
//!
//! ## Design
//!
//! - `begin` / `end` nest; only closing the outermost scope releases work
//! - While open, every settle request is recorded instead of executed
//! - Closing yields at most one `PendingSettle`, using the strongest
//!   renumber mode requested inside the scope
//!
//! Deleting a page with n shots therefore costs one redistribution pass, not n.

use tracing::debug;

/// How a settle pass renumbers after redistribution
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RenumberMode {
    /// Schedule on the coalescing scheduler
    Coalesced,
    /// Renumber before returning
    Immediate,
}

/// Work released when the outermost batch closes
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSettle {
    pub mode: RenumberMode,
    pub suppressed: usize,
    pub description: Option<String>,
}

#[derive(Debug, Default)]
pub struct BatchScope {
    depth: usize,
    mode: Option<RenumberMode>,
    suppressed: usize,
    description: Option<String>,
}

impl BatchScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self) {
        self.depth += 1;
    }

    /// Close one level. Returns the deferred settle when the outermost scope
    /// closes and something was suppressed inside it.
    pub fn end(&mut self) -> Option<PendingSettle> {
        if self.depth == 0 {
            debug!("end_batch without matching begin_batch");
            return None;
        }
        self.depth -= 1;
        if self.depth > 0 {
            return None;
        }

        let description = self.description.take();
        let suppressed = std::mem::take(&mut self.suppressed);
        self.mode.take().map(|mode| PendingSettle {
            mode,
            suppressed,
            description,
        })
    }

    pub fn is_open(&self) -> bool {
        self.depth > 0
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Record a settle request made while the scope is open
    pub fn defer(&mut self, mode: RenumberMode) {
        self.suppressed += 1;
        self.mode = Some(self.mode.map_or(mode, |m| m.max(mode)));
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        if self.is_open() {
            self.description = Some(description.into());
        }
    }
}
