//! The submission workflow state machine and the authorization predicates
//! layered on top of it.
//!
//! States: `draft` → `staged` → `approved` | `rejected`. The last two are
//! terminal. Visibility and mutation rights derive from status, ownership
//! and role, and every route goes through the same two predicates.

use crate::catalog::models::{Postcard, PostcardStatus};
use crate::users::Principal;

/// How a freshly created postcard enters the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateAction {
    Draft,
    Submit,
}

impl CreateAction {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(CreateAction::Draft),
            "submit" => Some(CreateAction::Submit),
            _ => None,
        }
    }

    pub fn initial_status(&self) -> PostcardStatus {
        match self {
            CreateAction::Draft => PostcardStatus::Draft,
            CreateAction::Submit => PostcardStatus::Staged,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewAction {
    Approve,
    Reject,
}

impl ReviewAction {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "approve" => Some(ReviewAction::Approve),
            "reject" => Some(ReviewAction::Reject),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum WorkflowError {
    #[error("only draft postcards can be submitted for review")]
    NotSubmittable(PostcardStatus),

    #[error("only staged postcards can be reviewed")]
    NotReviewable(PostcardStatus),
}

/// draft → staged. Fails for any other current status, including staged
/// itself (re-submission is rejected).
pub fn submit(current: PostcardStatus) -> Result<PostcardStatus, WorkflowError> {
    match current {
        PostcardStatus::Draft => Ok(PostcardStatus::Staged),
        other => Err(WorkflowError::NotSubmittable(other)),
    }
}

/// staged → approved | rejected, admin-only (enforced by the caller's
/// route gate; this function only checks the machine).
pub fn review(
    current: PostcardStatus,
    action: ReviewAction,
) -> Result<PostcardStatus, WorkflowError> {
    match current {
        PostcardStatus::Staged => Ok(match action {
            ReviewAction::Approve => PostcardStatus::Approved,
            ReviewAction::Reject => PostcardStatus::Rejected,
        }),
        other => Err(WorkflowError::NotReviewable(other)),
    }
}

/// Read guard: approved postcards are public; everything else is visible
/// only to the owner and admins. A failed check renders as not-found.
pub fn can_view(principal: Option<&Principal>, postcard: &Postcard) -> bool {
    if postcard.status == PostcardStatus::Approved {
        return true;
    }
    match principal {
        Some(p) => p.id == postcard.user_id || p.is_admin(),
        None => false,
    }
}

/// Write guard for edit/delete/submit: owner or admin.
pub fn can_mutate(principal: &Principal, postcard: &Postcard) -> bool {
    principal.id == postcard.user_id || principal.is_admin()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::Role;

    fn postcard(owner: &str, status: PostcardStatus) -> Postcard {
        Postcard {
            id: "p-1".into(),
            title: "Boardwalk at dusk".into(),
            description: None,
            era: None,
            manufacturer: None,
            kind: None,
            is_posted: false,
            is_written: false,
            front_image_url: None,
            back_image_url: None,
            user_id: owner.into(),
            status,
            review_notes: None,
            created_at: String::new(),
        }
    }

    fn principal(id: &str, role: Role) -> Principal {
        Principal {
            id: id.into(),
            username: id.into(),
            email: format!("{}@example.com", id),
            role,
        }
    }

    #[test]
    fn create_action_parses_form_values() {
        assert_eq!(CreateAction::parse("draft"), Some(CreateAction::Draft));
        assert_eq!(CreateAction::parse("submit"), Some(CreateAction::Submit));
        assert_eq!(CreateAction::parse("publish"), None);
    }

    #[test]
    fn create_action_maps_to_initial_status() {
        assert_eq!(CreateAction::Draft.initial_status(), PostcardStatus::Draft);
        assert_eq!(CreateAction::Submit.initial_status(), PostcardStatus::Staged);
    }

    #[test]
    fn submit_moves_draft_to_staged() {
        assert_eq!(submit(PostcardStatus::Draft), Ok(PostcardStatus::Staged));
    }

    #[test]
    fn submit_fails_for_every_other_status() {
        for status in [
            PostcardStatus::Staged,
            PostcardStatus::Approved,
            PostcardStatus::Rejected,
        ] {
            assert_eq!(submit(status), Err(WorkflowError::NotSubmittable(status)));
        }
    }

    #[test]
    fn review_resolves_staged_postcards() {
        assert_eq!(
            review(PostcardStatus::Staged, ReviewAction::Approve),
            Ok(PostcardStatus::Approved)
        );
        assert_eq!(
            review(PostcardStatus::Staged, ReviewAction::Reject),
            Ok(PostcardStatus::Rejected)
        );
    }

    #[test]
    fn terminal_states_cannot_be_reviewed_again() {
        for status in [PostcardStatus::Approved, PostcardStatus::Rejected] {
            for action in [ReviewAction::Approve, ReviewAction::Reject] {
                assert_eq!(review(status, action), Err(WorkflowError::NotReviewable(status)));
            }
        }
    }

    #[test]
    fn draft_cannot_be_reviewed() {
        assert_eq!(
            review(PostcardStatus::Draft, ReviewAction::Approve),
            Err(WorkflowError::NotReviewable(PostcardStatus::Draft))
        );
    }

    #[test]
    fn approved_postcards_are_visible_to_everyone() {
        let card = postcard("owner", PostcardStatus::Approved);
        assert!(can_view(None, &card));
        assert!(can_view(Some(&principal("stranger", Role::User)), &card));
        assert!(can_view(Some(&principal("owner", Role::User)), &card));
    }

    #[test]
    fn non_approved_postcards_are_hidden_from_strangers_and_anonymous() {
        for status in [
            PostcardStatus::Draft,
            PostcardStatus::Staged,
            PostcardStatus::Rejected,
        ] {
            let card = postcard("owner", status);
            assert!(!can_view(None, &card));
            assert!(!can_view(Some(&principal("stranger", Role::User)), &card));
        }
    }

    #[test]
    fn owner_and_admin_see_non_approved_postcards() {
        for status in [
            PostcardStatus::Draft,
            PostcardStatus::Staged,
            PostcardStatus::Rejected,
        ] {
            let card = postcard("owner", status);
            assert!(can_view(Some(&principal("owner", Role::User)), &card));
            assert!(can_view(Some(&principal("mod", Role::Admin)), &card));
        }
    }

    #[test]
    fn only_owner_or_admin_can_mutate() {
        let card = postcard("owner", PostcardStatus::Draft);
        assert!(can_mutate(&principal("owner", Role::User), &card));
        assert!(can_mutate(&principal("mod", Role::Admin), &card));
        assert!(!can_mutate(&principal("stranger", Role::User), &card));
    }
}
