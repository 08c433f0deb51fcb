//! The calculator disguise.
//!
//! Ordinary floating-point evaluation carrying no invariant beyond "what a
//! basic calculator does" — it is the cover story, not a hardened surface.
//! Every keystroke is run through the secret-pattern detector first; on a
//! trigger the calculator resets to its idle state, so to an onlooker a
//! trigger is indistinguishable from pressing clear.

use crate::detector::{PatternDetector, TriggerPatterns, VaultSelection};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl Op {
    fn from_key(key: &str) -> Option<Self> {
        match key {
            "+" => Some(Self::Add),
            "-" => Some(Self::Sub),
            "×" => Some(Self::Mul),
            "÷" => Some(Self::Div),
            "%" => Some(Self::Rem),
            _ => None,
        }
    }

    fn apply(self, lhs: f64, rhs: f64) -> f64 {
        match self {
            Self::Add => lhs + rhs,
            Self::Sub => lhs - rhs,
            Self::Mul => lhs * rhs,
            // Division by zero displays 0, matching a forgiving pocket
            // calculator rather than surfacing an error state.
            Self::Div => {
                if rhs != 0.0 {
                    lhs / rhs
                } else {
                    0.0
                }
            }
            Self::Rem => lhs % rhs,
        }
    }
}

/// Calculator engine: display state plus the embedded detector.
#[derive(Debug, Clone)]
pub struct Calculator {
    display: String,
    current: String,
    operator: Option<Op>,
    previous: Option<f64>,
    detector: PatternDetector,
}

impl Calculator {
    pub fn new(patterns: TriggerPatterns) -> Self {
        Self {
            display: "0".to_string(),
            current: String::new(),
            operator: None,
            previous: None,
            detector: PatternDetector::new(patterns),
        }
    }

    /// Current display contents.
    pub fn display(&self) -> &str {
        &self.display
    }

    /// Handle one button press.
    ///
    /// Returns a vault selection when the press completed a trigger; the
    /// calculator is then already back in its idle state and the keystroke
    /// is not evaluated further. Otherwise the keystroke gets its normal
    /// calculator meaning.
    pub fn press(&mut self, key: &str) -> Option<VaultSelection> {
        if let Some(selection) = self.detector.observe(key) {
            self.reset();
            return Some(selection);
        }

        if let Some(op) = Op::from_key(key) {
            if !self.current.is_empty() {
                self.previous = self.current.parse().ok();
                self.operator = Some(op);
                self.current.clear();
            }
            return None;
        }

        match key {
            "C" => self.reset(),
            "⌫" => {
                if !self.current.is_empty() {
                    self.current.pop();
                    self.display = if self.current.is_empty() {
                        "0".to_string()
                    } else {
                        self.current.clone()
                    };
                }
            }
            "=" => {
                if let (Some(previous), Some(op)) = (self.previous, self.operator) {
                    if !self.current.is_empty() {
                        let current: f64 = self.current.parse().unwrap_or(0.0);
                        self.display = format_result(op.apply(previous, current));
                        self.current = self.display.clone();
                        self.operator = None;
                        self.previous = None;
                    }
                }
            }
            "." => {
                if !self.current.contains('.') {
                    self.current = if self.current.is_empty() {
                        "0.".to_string()
                    } else {
                        format!("{}.", self.current)
                    };
                    self.display = self.current.clone();
                }
            }
            digit => {
                if self.display == "0" && self.current.is_empty() {
                    self.current = digit.to_string();
                } else {
                    self.current.push_str(digit);
                }
                self.display = self.current.clone();
            }
        }
        None
    }

    /// Back to the idle state: display "0", no pending operation.
    fn reset(&mut self) {
        self.display = "0".to_string();
        self.current.clear();
        self.operator = None;
        self.previous = None;
    }
}

/// Render a result with at most ten fractional digits, trailing zeros
/// trimmed, integers without a decimal point.
fn format_result(value: f64) -> String {
    let fixed = format!("{:.10}", value);
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    if trimmed.is_empty() || trimmed == "-" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}
