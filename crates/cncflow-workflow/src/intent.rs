//! Run intent owned by the job-control session
//!
//! Only operator actions and observed snapshot transitions mutate it.

use serde::{Deserialize, Serialize};

/// Staged line for a start-from-line run
///
/// `value` stays within `[1, line_total]` for the program it was staged
/// against. Out-of-range writes are rejected rather than clamped, except
/// where a caller explicitly asks for clamping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartFromLine {
    /// Prompt is showing
    pub prompt_open: bool,
    /// Staged 1-based line number
    pub value: u64,
}

impl Default for StartFromLine {
    fn default() -> Self {
        Self {
            prompt_open: false,
            value: 1,
        }
    }
}

impl StartFromLine {
    /// Stage `value` if it lies within `[1, line_total]`
    ///
    /// Returns false and leaves the staged value untouched otherwise.
    pub fn set(&mut self, value: u64, line_total: u64) -> bool {
        if value == 0 || value > line_total {
            tracing::debug!(
                "Rejected start line {} (program has {} lines)",
                value,
                line_total
            );
            return false;
        }
        self.value = value;
        true
    }

    /// Stage a line typed by the operator
    ///
    /// The raw number must satisfy `0 < n <= line_total`; fractions round up.
    pub fn set_from_input(&mut self, input: &str, line_total: u64) -> bool {
        let Ok(raw) = input.trim().parse::<f64>() else {
            return false;
        };
        if !raw.is_finite() || raw <= 0.0 || raw > line_total as f64 {
            return false;
        }
        self.set(raw.ceil() as u64, line_total)
    }

    /// Stage `value` forced into `[1, line_total]`
    pub fn stage_clamped(&mut self, value: u64, line_total: u64) {
        self.value = clamp_line(value, line_total);
    }

    /// Open the prompt, pre-filled with the last acknowledged line if any
    pub fn open(&mut self, received: u64, line_total: u64) {
        self.prompt_open = true;
        if received != 0 {
            self.stage_clamped(received, line_total);
        }
    }

    /// Close the prompt, keeping the staged value
    pub fn close(&mut self) {
        self.prompt_open = false;
    }

    /// Close the prompt and go back to line 1
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Body text of the start-from-line prompt
    pub fn prompt_text(&self, line_total: u64) -> String {
        format!(
            "Start from line will take into account all movements prior to this line.\n\
             For this file, the maximum line number is: {}\n\
             The last job was stopped on line number: {}",
            line_total, self.value
        )
    }
}

/// Clamp a line number into `[1, line_total]`
///
/// An empty program still yields line 1.
pub fn clamp_line(value: u64, line_total: u64) -> u64 {
    value.clamp(1, line_total.max(1))
}

/// Operator intent for the current program
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunIntent {
    /// A run, resume or test was issued for this program
    pub run_has_started: bool,
    /// The current run is a check-mode run
    pub test_started: bool,
    /// Start-from-line staging
    pub start_from_line: StartFromLine,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_rejects_out_of_range() {
        let mut line = StartFromLine::default();
        assert!(!line.set(0, 500));
        assert!(!line.set(501, 500));
        assert_eq!(line.value, 1);
        assert!(line.set(500, 500));
        assert_eq!(line.value, 500);
    }

    #[test]
    fn test_input_rounds_up() {
        let mut line = StartFromLine::default();
        assert!(line.set_from_input("41.2", 500));
        assert_eq!(line.value, 42);
        assert!(line.set_from_input("0.3", 500));
        assert_eq!(line.value, 1);
        assert!(line.set_from_input(" 499.5 ", 500));
        assert_eq!(line.value, 500);
    }

    #[test]
    fn test_input_rejects_garbage() {
        let mut line = StartFromLine::default();
        line.set(7, 10);
        for input in ["", "abc", "-3", "0", "10.5", "NaN", "inf"] {
            assert!(!line.set_from_input(input, 10), "{input}");
        }
        assert_eq!(line.value, 7);
    }

    #[test]
    fn test_open_prefills_received() {
        let mut line = StartFromLine::default();
        line.set(12, 100);

        line.open(0, 100);
        assert!(line.prompt_open);
        assert_eq!(line.value, 12);

        line.close();
        line.open(57, 100);
        assert_eq!(line.value, 57);
    }

    #[test]
    fn test_clamp_line() {
        assert_eq!(clamp_line(0, 10), 1);
        assert_eq!(clamp_line(11, 10), 10);
        assert_eq!(clamp_line(5, 0), 1);
    }

    #[test]
    fn test_prompt_text() {
        let line = StartFromLine {
            prompt_open: true,
            value: 57,
        };
        let text = line.prompt_text(500);
        assert!(text.contains("maximum line number is: 500"));
        assert!(text.contains("stopped on line number: 57"));
    }
}
