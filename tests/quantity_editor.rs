use proptest::prelude::*;

use stockcount::core::quantity::{EditOutcome, QuantityEditor};

#[test]
fn decrement_at_zero_stays_zero() {
    let mut ed = QuantityEditor::new(1);
    assert_eq!(ed.decrement(), EditOutcome::Changed(0));
    assert_eq!(ed.decrement(), EditOutcome::Unchanged);
    assert_eq!(ed.confirmed(), 0);
    assert_eq!(ed.buffer(), "0");
}

#[test]
fn increment_saturates_by_reverting_at_max() {
    let mut ed = QuantityEditor::new(u64::MAX);
    assert_eq!(ed.increment(), EditOutcome::Reverted(u64::MAX));
    assert_eq!(ed.confirmed(), u64::MAX);
}

#[test]
fn backspace_to_empty_then_commit_reverts() {
    let mut ed = QuantityEditor::new(42);
    ed.backspace();
    ed.backspace();
    assert_eq!(ed.buffer(), "");
    assert_eq!(ed.commit(), EditOutcome::Reverted(42));
    assert_eq!(ed.buffer(), "42");
}

#[test]
fn numeric_commit_floors_and_clamps() {
    let mut ed = QuantityEditor::new(5);
    assert_eq!(ed.commit_number(3.9), EditOutcome::Changed(3));
    assert_eq!(ed.commit_number(-2.5), EditOutcome::Changed(0));
    assert_eq!(ed.commit_number(f64::NAN), EditOutcome::Reverted(0));
    assert_eq!(ed.commit_number(f64::INFINITY), EditOutcome::Reverted(0));
}

#[test]
fn overflowing_text_reverts() {
    let mut ed = QuantityEditor::new(7);
    ed.set_text("99999999999999999999999");
    assert_eq!(ed.commit(), EditOutcome::Reverted(7));
}

proptest! {
    #[test]
    fn any_text_yields_digits_only(text in ".{0,40}") {
        let mut ed = QuantityEditor::new(0);
        ed.set_text(&text);
        prop_assert!(ed.buffer().chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn steps_never_go_negative(start in 0u64..20, steps in prop::collection::vec(any::<bool>(), 0..60)) {
        let mut ed = QuantityEditor::new(start);
        let mut model = start;
        for up in steps {
            if up {
                ed.increment();
                model += 1;
            } else {
                ed.decrement();
                model = model.saturating_sub(1);
            }
            prop_assert_eq!(ed.confirmed(), model);
            prop_assert_eq!(ed.buffer(), model.to_string());
        }
    }
}
