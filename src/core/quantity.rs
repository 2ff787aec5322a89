//! Bounded non-negative integer stepper bound to one counted line.

use crate::types::Quantity;

/// Result of a stepper or commit action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    /// The confirmed value changed and should be pushed to the store.
    Changed(Quantity),
    /// The confirmed value is unchanged.
    Unchanged,
    /// The pending entry was invalid or empty; the last confirmed value stands.
    Reverted(Quantity),
}

/// Editing buffer over a confirmed quantity.
///
/// Only ASCII digits ever enter the buffer, and the confirmed value is a
/// [`Quantity`], so a negative or fractional count cannot be produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantityEditor {
    confirmed: Quantity,
    buffer: String,
}

impl QuantityEditor {
    /// Starts editing from `confirmed`.
    pub fn new(confirmed: Quantity) -> Self {
        Self {
            confirmed,
            buffer: confirmed.to_string(),
        }
    }

    /// Last confirmed value.
    pub fn confirmed(&self) -> Quantity {
        self.confirmed
    }

    /// Text currently shown in the entry field.
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Adds one and confirms.
    pub fn increment(&mut self) -> EditOutcome {
        match self.confirmed.checked_add(1) {
            Some(next) => self.confirm(next),
            None => self.revert(),
        }
    }

    /// Subtracts one, floored at zero, and confirms.
    pub fn decrement(&mut self) -> EditOutcome {
        let next = self.confirmed.saturating_sub(1);
        self.confirm(next)
    }

    /// Appends typed text, discarding every non-digit character.
    pub fn type_text(&mut self, text: &str) {
        self.buffer.extend(text.chars().filter(char::is_ascii_digit));
    }

    /// Replaces the entry text, discarding every non-digit character.
    pub fn set_text(&mut self, text: &str) {
        self.buffer.clear();
        self.type_text(text);
    }

    /// Removes the last typed digit.
    pub fn backspace(&mut self) {
        self.buffer.pop();
    }

    /// Commits the entry text (focus loss or explicit confirmation).
    pub fn commit(&mut self) -> EditOutcome {
        match self.buffer.parse::<Quantity>() {
            Ok(value) => self.confirm(value),
            Err(_) => self.revert(),
        }
    }

    /// Commits a numeric value from a non-text source, flooring it and
    /// clamping it at zero.
    pub fn commit_number(&mut self, value: f64) -> EditOutcome {
        if !value.is_finite() {
            return self.revert();
        }
        let floored = value.floor();
        if floored <= 0.0 {
            return self.confirm(0);
        }
        if floored >= Quantity::MAX as f64 {
            return self.revert();
        }
        self.confirm(floored as Quantity)
    }

    fn confirm(&mut self, value: Quantity) -> EditOutcome {
        self.buffer = value.to_string();
        if value == self.confirmed {
            return EditOutcome::Unchanged;
        }
        self.confirmed = value;
        EditOutcome::Changed(value)
    }

    fn revert(&mut self) -> EditOutcome {
        self.buffer = self.confirmed.to_string();
        EditOutcome::Reverted(self.confirmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_letters_never_reach_the_buffer() {
        let mut ed = QuantityEditor::new(0);
        ed.set_text("1a2-b.3");
        assert_eq!(ed.buffer(), "123");
        assert_eq!(ed.commit(), EditOutcome::Changed(123));
    }

    #[test]
    fn empty_commit_reverts() {
        let mut ed = QuantityEditor::new(9);
        ed.set_text("");
        assert_eq!(ed.commit(), EditOutcome::Reverted(9));
        assert_eq!(ed.buffer(), "9");
    }
}
