//! Static role -> permission allow-lists.
//!
//! Permissions are `resource:action` strings. `super_admin` is granted every
//! permission, including ones not listed anywhere; any role string not in the
//! table is granted nothing.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;

use crate::model::role::Role;

pub const EMPLOYEE_CREATE: &str = "employee:create";
pub const EMPLOYEE_READ: &str = "employee:read";
pub const EMPLOYEE_UPDATE: &str = "employee:update";
pub const EMPLOYEE_DELETE: &str = "employee:delete";
pub const EMPLOYEE_READ_OWN: &str = "employee:read_own";

pub const ORG_MANAGE: &str = "organization:manage";
pub const ORG_READ: &str = "organization:read";

pub const LEAVE_APPLY: &str = "leave:apply";
pub const LEAVE_READ_OWN: &str = "leave:read_own";
pub const LEAVE_READ_TEAM: &str = "leave:read_team";
pub const LEAVE_READ_ALL: &str = "leave:read_all";
pub const LEAVE_APPROVE_MANAGER: &str = "leave:approve_manager";
pub const LEAVE_APPROVE_HR: &str = "leave:approve_hr";

pub const ATTENDANCE_MARK: &str = "attendance:mark";
pub const ATTENDANCE_READ_ALL: &str = "attendance:read_all";

pub const PAYROLL_CREATE: &str = "payroll:create";
pub const PAYROLL_UPDATE: &str = "payroll:update";
pub const PAYROLL_READ_ALL: &str = "payroll:read_all";
pub const PAYROLL_READ_OWN: &str = "payroll:read_own";

pub const DOCUMENT_UPLOAD: &str = "document:upload";
pub const DOCUMENT_READ: &str = "document:read";
pub const DOCUMENT_READ_RESTRICTED: &str = "document:read_restricted";

pub const COURSE_MANAGE: &str = "course:manage";
pub const COURSE_READ: &str = "course:read";
pub const COURSE_ENROLL: &str = "course:enroll";

pub const AUDIT_READ: &str = "audit:read";

pub const REPORT_PAYROLL: &str = "report:payroll";
pub const REPORT_ATTENDANCE: &str = "report:attendance";

const EMPLOYEE_PERMISSIONS: &[&str] = &[
    EMPLOYEE_READ_OWN,
    ORG_READ,
    LEAVE_APPLY,
    LEAVE_READ_OWN,
    ATTENDANCE_MARK,
    PAYROLL_READ_OWN,
    DOCUMENT_UPLOAD,
    DOCUMENT_READ,
    COURSE_READ,
    COURSE_ENROLL,
];

const MANAGER_PERMISSIONS: &[&str] = &[
    EMPLOYEE_READ,
    EMPLOYEE_READ_OWN,
    ORG_READ,
    LEAVE_APPLY,
    LEAVE_READ_OWN,
    LEAVE_READ_TEAM,
    LEAVE_APPROVE_MANAGER,
    ATTENDANCE_MARK,
    PAYROLL_READ_OWN,
    DOCUMENT_UPLOAD,
    DOCUMENT_READ,
    COURSE_READ,
    COURSE_ENROLL,
    REPORT_ATTENDANCE,
];

const HR_PERMISSIONS: &[&str] = &[
    EMPLOYEE_CREATE,
    EMPLOYEE_READ,
    EMPLOYEE_UPDATE,
    EMPLOYEE_READ_OWN,
    ORG_MANAGE,
    ORG_READ,
    LEAVE_APPLY,
    LEAVE_READ_OWN,
    LEAVE_READ_TEAM,
    LEAVE_READ_ALL,
    LEAVE_APPROVE_HR,
    ATTENDANCE_MARK,
    ATTENDANCE_READ_ALL,
    PAYROLL_CREATE,
    PAYROLL_UPDATE,
    PAYROLL_READ_ALL,
    PAYROLL_READ_OWN,
    DOCUMENT_UPLOAD,
    DOCUMENT_READ,
    DOCUMENT_READ_RESTRICTED,
    COURSE_MANAGE,
    COURSE_READ,
    COURSE_ENROLL,
    REPORT_PAYROLL,
    REPORT_ATTENDANCE,
];

const ADMIN_PERMISSIONS: &[&str] = &[
    EMPLOYEE_CREATE,
    EMPLOYEE_READ,
    EMPLOYEE_UPDATE,
    EMPLOYEE_DELETE,
    EMPLOYEE_READ_OWN,
    ORG_MANAGE,
    ORG_READ,
    LEAVE_APPLY,
    LEAVE_READ_OWN,
    LEAVE_READ_TEAM,
    LEAVE_READ_ALL,
    LEAVE_APPROVE_MANAGER,
    LEAVE_APPROVE_HR,
    ATTENDANCE_MARK,
    ATTENDANCE_READ_ALL,
    PAYROLL_CREATE,
    PAYROLL_UPDATE,
    PAYROLL_READ_ALL,
    PAYROLL_READ_OWN,
    DOCUMENT_UPLOAD,
    DOCUMENT_READ,
    DOCUMENT_READ_RESTRICTED,
    COURSE_MANAGE,
    COURSE_READ,
    COURSE_ENROLL,
    AUDIT_READ,
    REPORT_PAYROLL,
    REPORT_ATTENDANCE,
];

static ALLOW_LISTS: Lazy<HashMap<Role, HashSet<&'static str>>> = Lazy::new(|| {
    HashMap::from([
        (Role::Admin, ADMIN_PERMISSIONS.iter().copied().collect()),
        (Role::Hr, HR_PERMISSIONS.iter().copied().collect()),
        (Role::Manager, MANAGER_PERMISSIONS.iter().copied().collect()),
        (Role::Employee, EMPLOYEE_PERMISSIONS.iter().copied().collect()),
    ])
});

/// Allow-list for `role`, sorted; `super_admin` has no list since it is granted everything.
pub fn permissions_for(role: Role) -> Vec<&'static str> {
    let mut list: Vec<_> = ALLOW_LISTS
        .get(&role)
        .map(|set| set.iter().copied().collect())
        .unwrap_or_default();
    list.sort_unstable();
    list
}

pub fn role_has_permission(role: Role, permission: &str) -> bool {
    if role == Role::SuperAdmin {
        return true;
    }
    ALLOW_LISTS
        .get(&role)
        .is_some_and(|set| set.contains(permission))
}

/// Pure and total: unknown roles are denied everything.
pub fn check_permission(role: &str, permission: &str) -> bool {
    match Role::parse(role) {
        Some(role) => role_has_permission(role, permission),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    const ALL_PERMISSIONS: &[&str] = &[
        EMPLOYEE_CREATE,
        EMPLOYEE_READ,
        EMPLOYEE_UPDATE,
        EMPLOYEE_DELETE,
        EMPLOYEE_READ_OWN,
        ORG_MANAGE,
        ORG_READ,
        LEAVE_APPLY,
        LEAVE_READ_OWN,
        LEAVE_READ_TEAM,
        LEAVE_READ_ALL,
        LEAVE_APPROVE_MANAGER,
        LEAVE_APPROVE_HR,
        ATTENDANCE_MARK,
        ATTENDANCE_READ_ALL,
        PAYROLL_CREATE,
        PAYROLL_UPDATE,
        PAYROLL_READ_ALL,
        PAYROLL_READ_OWN,
        DOCUMENT_UPLOAD,
        DOCUMENT_READ,
        DOCUMENT_READ_RESTRICTED,
        COURSE_MANAGE,
        COURSE_READ,
        COURSE_ENROLL,
        AUDIT_READ,
        REPORT_PAYROLL,
        REPORT_ATTENDANCE,
    ];

    fn table(role: Role) -> &'static [&'static str] {
        match role {
            Role::SuperAdmin => ALL_PERMISSIONS,
            Role::Admin => ADMIN_PERMISSIONS,
            Role::Hr => HR_PERMISSIONS,
            Role::Manager => MANAGER_PERMISSIONS,
            Role::Employee => EMPLOYEE_PERMISSIONS,
        }
    }

    #[test]
    fn check_matches_allow_lists_exactly() {
        for role in Role::iter() {
            for permission in ALL_PERMISSIONS {
                assert_eq!(
                    check_permission(role.as_str(), permission),
                    table(role).contains(permission),
                    "{role} / {permission}"
                );
            }
        }
    }

    #[test]
    fn super_admin_is_granted_anything() {
        assert!(check_permission("super_admin", "employee:delete"));
        assert!(check_permission("super_admin", "made:up"));
        assert!(check_permission("super_admin", ""));
    }

    #[test]
    fn unknown_roles_are_denied() {
        assert!(!check_permission("intern", EMPLOYEE_READ_OWN));
        assert!(!check_permission("", LEAVE_APPLY));
        assert!(!check_permission("Admin", EMPLOYEE_READ));
    }

    #[test]
    fn unknown_permissions_are_denied_to_regular_roles() {
        for role in Role::iter().filter(|r| *r != Role::SuperAdmin) {
            assert!(!check_permission(role.as_str(), "payroll:delete"));
        }
    }

    #[test]
    fn lists_have_no_unknown_permissions() {
        for role in Role::iter() {
            for permission in table(role) {
                assert!(ALL_PERMISSIONS.contains(permission), "{permission}");
            }
        }
    }

    #[test]
    fn only_admin_reads_the_audit_trail() {
        assert!(check_permission("admin", AUDIT_READ));
        assert!(!check_permission("hr", AUDIT_READ));
        assert!(!check_permission("manager", AUDIT_READ));
    }

    #[test]
    fn permissions_for_is_sorted() {
        let list = permissions_for(Role::Employee);
        let mut sorted = list.clone();
        sorted.sort_unstable();
        assert_eq!(list, sorted);
        assert_eq!(list.len(), EMPLOYEE_PERMISSIONS.len());
        assert!(permissions_for(Role::SuperAdmin).is_empty());
    }
}
