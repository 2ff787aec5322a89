//! Comment targeting and local validation.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::types::ItemId;

use super::machine::ValidationError;

/// Which lines a comment is attached to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnotationTarget {
    /// The lines currently selected in the comparison view.
    Selection,
    /// An explicit set of lines.
    Items(BTreeSet<ItemId>),
    /// Every mismatched line, resolved by the service.
    AllMismatched,
}

/// Targets after the selection has been resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolvedTarget {
    Items(Vec<ItemId>),
    AllMismatched,
}

/// A validated annotation, ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub comment: String,
    pub target: ResolvedTarget,
}

impl Annotation {
    /// Number of explicit targets, or `None` for the all-mismatched form.
    pub fn explicit_len(&self) -> Option<usize> {
        match &self.target {
            ResolvedTarget::Items(ids) => Some(ids.len()),
            ResolvedTarget::AllMismatched => None,
        }
    }
}

/// Validates `comment` and resolves `target` against `selection`.
pub fn prepare(
    comment: &str,
    target: AnnotationTarget,
    selection: &BTreeSet<ItemId>,
) -> Result<Annotation, ValidationError> {
    let comment = comment.trim();
    if comment.is_empty() {
        return Err(ValidationError::EmptyComment);
    }

    let target = match target {
        AnnotationTarget::AllMismatched => ResolvedTarget::AllMismatched,
        AnnotationTarget::Selection => explicit(selection.iter().copied().collect())?,
        AnnotationTarget::Items(ids) => explicit(ids.into_iter().collect())?,
    };

    Ok(Annotation {
        comment: comment.to_string(),
        target,
    })
}

fn explicit(ids: Vec<ItemId>) -> Result<ResolvedTarget, ValidationError> {
    if ids.is_empty() {
        return Err(ValidationError::NoTargets);
    }
    Ok(ResolvedTarget::Items(ids))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_comment_is_empty() {
        let sel = BTreeSet::from([1]);
        assert_eq!(
            prepare("  \t", AnnotationTarget::Selection, &sel),
            Err(ValidationError::EmptyComment)
        );
        assert_eq!(
            prepare("", AnnotationTarget::AllMismatched, &sel),
            Err(ValidationError::EmptyComment)
        );
    }

    #[test]
    fn selection_resolves_to_sorted_ids() {
        let sel = BTreeSet::from([9, 2]);
        let a = prepare(" damaged ", AnnotationTarget::Selection, &sel).expect("valid");
        assert_eq!(a.comment, "damaged");
        assert_eq!(a.target, ResolvedTarget::Items(vec![2, 9]));
    }

    #[test]
    fn empty_selection_is_rejected() {
        assert_eq!(
            prepare("x", AnnotationTarget::Selection, &BTreeSet::new()),
            Err(ValidationError::NoTargets)
        );
    }
}
