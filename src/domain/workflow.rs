//! Approval state machine.
//!
//! The workflow is a fixed table of edges keyed by (from-status, action).
//! Each edge names who may drive it: the sheet's own tutor, the lecturer of
//! the sheet's course, or an admin. An edge missing from the table — or an
//! edge whose actor list does not mention the caller's role — is an invalid
//! transition; an edge that mentions the role but whose ownership
//! relationship fails is an authorization failure, decided by the caller.

use crate::domain::models::{ApprovalAction, Role, TimesheetStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorRule {
    /// The tutor the timesheet belongs to.
    OwningTutor,
    /// The lecturer owning the timesheet's course.
    CourseLecturer,
    Admin,
}

impl ActorRule {
    pub fn role(&self) -> Role {
        match self {
            ActorRule::OwningTutor => Role::Tutor,
            ActorRule::CourseLecturer => Role::Lecturer,
            ActorRule::Admin => Role::Admin,
        }
    }

    fn permits(&self, ctx: &ActionContext) -> bool {
        match self {
            ActorRule::OwningTutor => {
                ctx.actor_role == Role::Tutor && ctx.actor_id == ctx.tutor_id
            }
            ActorRule::CourseLecturer => {
                ctx.actor_role == Role::Lecturer && ctx.actor_id == ctx.course_lecturer_id
            }
            ActorRule::Admin => ctx.actor_role == Role::Admin,
        }
    }
}

/// Who is acting, against which sheet.
#[derive(Debug, Clone, Copy)]
pub struct ActionContext {
    pub actor_id: i64,
    pub actor_role: Role,
    pub tutor_id: i64,
    pub course_lecturer_id: i64,
}

#[derive(Debug)]
pub struct TransitionRule {
    pub from: TimesheetStatus,
    pub action: ApprovalAction,
    pub to: TimesheetStatus,
    pub actors: &'static [ActorRule],
    pub requires_comment: bool,
}

impl TransitionRule {
    /// The caller's role appears on this edge, ignoring ownership.
    pub fn role_listed(&self, role: Role) -> bool {
        self.actors.iter().any(|rule| rule.role() == role)
    }

    /// Role and ownership both satisfied.
    pub fn permits(&self, ctx: &ActionContext) -> bool {
        self.actors.iter().any(|rule| rule.permits(ctx))
    }
}

use ActorRule::{Admin, CourseLecturer, OwningTutor};
use ApprovalAction::{
    HrConfirm, LecturerConfirm, Reject, RequestModification, SubmitForApproval, TutorConfirm,
};
use TimesheetStatus::{
    Draft, FinalConfirmed, LecturerConfirmed, ModificationRequested, PendingTutorConfirmation,
    Rejected, TutorConfirmed,
};

pub const TRANSITIONS: &[TransitionRule] = &[
    TransitionRule {
        from: Draft,
        action: SubmitForApproval,
        to: PendingTutorConfirmation,
        actors: &[CourseLecturer, Admin],
        requires_comment: false,
    },
    TransitionRule {
        from: ModificationRequested,
        action: SubmitForApproval,
        to: PendingTutorConfirmation,
        actors: &[OwningTutor, CourseLecturer, Admin],
        requires_comment: false,
    },
    TransitionRule {
        from: PendingTutorConfirmation,
        action: TutorConfirm,
        to: TutorConfirmed,
        actors: &[OwningTutor],
        requires_comment: false,
    },
    TransitionRule {
        from: PendingTutorConfirmation,
        action: Reject,
        to: Rejected,
        actors: &[OwningTutor, CourseLecturer, Admin],
        requires_comment: true,
    },
    TransitionRule {
        from: PendingTutorConfirmation,
        action: RequestModification,
        to: ModificationRequested,
        actors: &[CourseLecturer, Admin],
        requires_comment: true,
    },
    TransitionRule {
        from: TutorConfirmed,
        action: LecturerConfirm,
        to: LecturerConfirmed,
        actors: &[CourseLecturer, Admin],
        requires_comment: false,
    },
    TransitionRule {
        from: TutorConfirmed,
        action: Reject,
        to: Rejected,
        actors: &[CourseLecturer, Admin],
        requires_comment: true,
    },
    TransitionRule {
        from: TutorConfirmed,
        action: RequestModification,
        to: ModificationRequested,
        actors: &[CourseLecturer, Admin],
        requires_comment: true,
    },
    TransitionRule {
        from: LecturerConfirmed,
        action: HrConfirm,
        to: FinalConfirmed,
        actors: &[Admin],
        requires_comment: false,
    },
    TransitionRule {
        from: LecturerConfirmed,
        action: Reject,
        to: Rejected,
        actors: &[Admin],
        requires_comment: true,
    },
    TransitionRule {
        from: LecturerConfirmed,
        action: RequestModification,
        to: ModificationRequested,
        actors: &[Admin],
        requires_comment: true,
    },
];

pub fn find_transition(
    from: TimesheetStatus,
    action: ApprovalAction,
) -> Option<&'static TransitionRule> {
    TRANSITIONS
        .iter()
        .find(|rule| rule.from == from && rule.action == action)
}

/// Actions this actor could drive from `from`, used as recovery hints on
/// invalid-transition failures.
pub fn allowed_actions(from: TimesheetStatus, ctx: &ActionContext) -> Vec<ApprovalAction> {
    TRANSITIONS
        .iter()
        .filter(|rule| rule.from == from && rule.permits(ctx))
        .map(|rule| rule.action)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(actor_id: i64, actor_role: Role) -> ActionContext {
        ActionContext {
            actor_id,
            actor_role,
            tutor_id: 2,
            course_lecturer_id: 3,
        }
    }

    #[test]
    fn terminal_states_have_no_outgoing_edges() {
        for status in [FinalConfirmed, Rejected] {
            assert!(TRANSITIONS.iter().all(|rule| rule.from != status));
        }
    }

    #[test]
    fn draft_submit_is_lecturer_or_admin_only() {
        let rule = find_transition(Draft, SubmitForApproval).unwrap();
        assert_eq!(rule.to, PendingTutorConfirmation);
        assert!(!rule.role_listed(Role::Tutor));
        assert!(rule.permits(&ctx(3, Role::Lecturer)));
        assert!(!rule.permits(&ctx(99, Role::Lecturer)));
        assert!(rule.permits(&ctx(1, Role::Admin)));
    }

    #[test]
    fn resubmit_after_modification_includes_the_owning_tutor() {
        let rule = find_transition(ModificationRequested, SubmitForApproval).unwrap();
        assert!(rule.permits(&ctx(2, Role::Tutor)));
        assert!(!rule.permits(&ctx(7, Role::Tutor)));
    }

    #[test]
    fn only_the_owning_tutor_confirms() {
        let rule = find_transition(PendingTutorConfirmation, TutorConfirm).unwrap();
        assert!(rule.permits(&ctx(2, Role::Tutor)));
        assert!(!rule.permits(&ctx(5, Role::Tutor)));
        assert!(!rule.role_listed(Role::Lecturer));
        assert!(!rule.role_listed(Role::Admin));
    }

    #[test]
    fn tutor_may_reject_pending_but_not_confirmed_sheets() {
        assert!(find_transition(PendingTutorConfirmation, Reject)
            .unwrap()
            .role_listed(Role::Tutor));
        assert!(!find_transition(TutorConfirmed, Reject)
            .unwrap()
            .role_listed(Role::Tutor));
    }

    #[test]
    fn rejection_and_modification_requests_require_comments() {
        for rule in TRANSITIONS {
            let expected = matches!(rule.action, Reject | RequestModification);
            assert_eq!(rule.requires_comment, expected, "{:?}", rule);
        }
    }

    #[test]
    fn hr_confirmation_is_admin_only() {
        let rule = find_transition(LecturerConfirmed, HrConfirm).unwrap();
        assert_eq!(rule.to, FinalConfirmed);
        assert_eq!(rule.actors, &[Admin]);
    }

    #[test]
    fn unknown_edges_are_absent() {
        assert!(find_transition(Draft, TutorConfirm).is_none());
        assert!(find_transition(TutorConfirmed, HrConfirm).is_none());
        assert!(find_transition(FinalConfirmed, Reject).is_none());
        assert!(find_transition(Rejected, SubmitForApproval).is_none());
    }

    #[test]
    fn allowed_actions_reflect_the_actor() {
        assert_eq!(
            allowed_actions(PendingTutorConfirmation, &ctx(2, Role::Tutor)),
            vec![TutorConfirm, Reject]
        );
        assert_eq!(
            allowed_actions(PendingTutorConfirmation, &ctx(3, Role::Lecturer)),
            vec![Reject, RequestModification]
        );
        assert_eq!(
            allowed_actions(LecturerConfirmed, &ctx(1, Role::Admin)),
            vec![HrConfirm, Reject, RequestModification]
        );
        assert!(allowed_actions(FinalConfirmed, &ctx(1, Role::Admin)).is_empty());
    }
}
