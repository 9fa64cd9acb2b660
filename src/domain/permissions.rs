//! Role-relational authorization decisions.
//!
//! Every decision sees the actor, the target timesheet, and the timesheet's
//! course, and answers allow/deny with a reason. Status gating (editability,
//! draft-only deletion) lives with the domain model; this module answers
//! only the who-may-touch-what question.

use thiserror::Error;

use crate::domain::models::{Course, Role, Timesheet, TimesheetStatus};

#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub id: i64,
    pub role: Role,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct PermissionDenied(pub &'static str);

/// Tutors never create; lecturers create for their own courses; admins
/// create anywhere.
pub fn can_create(actor: &Actor, course: &Course) -> Result<(), PermissionDenied> {
    match actor.role {
        Role::Admin => Ok(()),
        Role::Lecturer if course.lecturer_id == actor.id => Ok(()),
        Role::Lecturer => Err(PermissionDenied(
            "lecturers may only create timesheets for their own courses",
        )),
        Role::Tutor => Err(PermissionDenied("tutors may not create timesheets")),
    }
}

pub fn can_edit(
    actor: &Actor,
    timesheet: &Timesheet,
    course: &Course,
) -> Result<(), PermissionDenied> {
    match actor.role {
        Role::Admin => Ok(()),
        Role::Lecturer if course.lecturer_id == actor.id => Ok(()),
        Role::Tutor
            if timesheet.tutor_id == actor.id
                && timesheet.status == TimesheetStatus::ModificationRequested =>
        {
            Ok(())
        }
        Role::Tutor if timesheet.tutor_id == actor.id => Err(PermissionDenied(
            "tutors may only edit timesheets sent back for modification",
        )),
        _ => Err(PermissionDenied("not permitted to edit this timesheet")),
    }
}

pub fn can_delete(
    actor: &Actor,
    _timesheet: &Timesheet,
    course: &Course,
) -> Result<(), PermissionDenied> {
    match actor.role {
        Role::Admin => Ok(()),
        Role::Lecturer if course.lecturer_id == actor.id => Ok(()),
        _ => Err(PermissionDenied("not permitted to delete this timesheet")),
    }
}

pub fn can_view(
    actor: &Actor,
    timesheet: &Timesheet,
    course: &Course,
) -> Result<(), PermissionDenied> {
    match actor.role {
        Role::Admin => Ok(()),
        Role::Lecturer if course.lecturer_id == actor.id => Ok(()),
        Role::Tutor if timesheet.tutor_id == actor.id => Ok(()),
        _ => Err(PermissionDenied("not permitted to view this timesheet")),
    }
}

/// Tutors see only their own dashboard; a course filter is a lecturer or
/// admin capability. Lecturer ownership of the filtered course is verified
/// against persistence by the dashboard service.
pub fn can_filter_dashboard_by_course(role: Role) -> Result<(), PermissionDenied> {
    match role {
        Role::Tutor => Err(PermissionDenied(
            "tutors may not filter the dashboard by course",
        )),
        Role::Lecturer | Role::Admin => Ok(()),
    }
}
