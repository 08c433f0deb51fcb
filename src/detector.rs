//! Secret-pattern detection.
//!
//! A bounded rolling buffer over calculator keystrokes. The detector sees
//! every key the calculator receives, irrespective of calculator state
//! resets, and fires when the recent input ends with one of the two
//! configured trigger strings. It is purely local state: no I/O, O(1) per
//! keystroke, deterministic.
//!
//! Triggers are deliberately plausible button sequences — the defaults
//! look like slightly odd arithmetic, not like a password prompt.

use crate::catalog::PartitionKind;

/// Rolling-buffer capacity in characters. Long enough for any sensible
/// trigger, short enough that the buffer never grows with input.
const BUFFER_CAPACITY: usize = 10;

/// Default trigger for the real vault. Documented, not secret — users are
/// expected to change it.
pub const DEFAULT_REAL_PATTERN: &str = "123+=";

/// Default trigger for the decoy vault.
pub const DEFAULT_DECOY_PATTERN: &str = "456+=";

/// Which vault a trigger selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultSelection {
    Real,
    Decoy,
}

impl From<VaultSelection> for PartitionKind {
    fn from(selection: VaultSelection) -> Self {
        match selection {
            VaultSelection::Real => PartitionKind::Real,
            VaultSelection::Decoy => PartitionKind::Decoy,
        }
    }
}

/// The two trigger strings, as read from the external configuration store.
/// Treated as opaque: no normalisation, matching is exact and
/// case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerPatterns {
    pub real: String,
    pub decoy: String,
}

impl Default for TriggerPatterns {
    fn default() -> Self {
        Self {
            real: DEFAULT_REAL_PATTERN.to_string(),
            decoy: DEFAULT_DECOY_PATTERN.to_string(),
        }
    }
}

/// Suffix matcher over recent keystrokes.
#[derive(Debug, Clone)]
pub struct PatternDetector {
    patterns: TriggerPatterns,
    buffer: String,
}

impl PatternDetector {
    pub fn new(patterns: TriggerPatterns) -> Self {
        Self {
            patterns,
            buffer: String::with_capacity(BUFFER_CAPACITY * 2),
        }
    }

    /// Feed one keystroke. Returns a selection when the buffer now ends
    /// with a trigger; the buffer is cleared on a hit so a trigger fires
    /// exactly once. The real pattern is checked first, so identical
    /// configured patterns resolve to the real vault.
    pub fn observe(&mut self, keystroke: &str) -> Option<VaultSelection> {
        self.buffer.push_str(keystroke);
        self.trim_to_capacity();

        let selection = if self.buffer.ends_with(&self.patterns.real) {
            Some(VaultSelection::Real)
        } else if self.buffer.ends_with(&self.patterns.decoy) {
            Some(VaultSelection::Decoy)
        } else {
            None
        };

        if selection.is_some() {
            self.buffer.clear();
        }
        selection
    }

    /// Keep only the last [`BUFFER_CAPACITY`] characters. Char-based, not
    /// byte-based: keys like "⌫" are multi-byte.
    fn trim_to_capacity(&mut self) {
        let excess = self.buffer.chars().count().saturating_sub(BUFFER_CAPACITY);
        if excess > 0 {
            let cut = self
                .buffer
                .char_indices()
                .nth(excess)
                .map(|(i, _)| i)
                .unwrap_or(0);
            self.buffer.drain(..cut);
        }
    }

    #[cfg(test)]
    fn buffer(&self) -> &str {
        &self.buffer
    }
}
