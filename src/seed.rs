//! Fixed development fixture: two departments, three designations and four
//! employees, each with a login for one role. Running it wipes the database
//! first, so it is for local development only.

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::MySqlPool;
use tracing::info;

use crate::auth::password::hash_password;
use crate::model::employee::LeaveBalance;
use crate::model::role::Role;
use crate::utils::validation::validate_employee_code;

pub struct SeedDepartment {
    pub name: &'static str,
    pub code: &'static str,
}

pub struct SeedDesignation {
    pub title: &'static str,
    pub level: u32,
    /// Index into `SeedPlan::departments`
    pub department: usize,
}

pub struct SeedEmployee {
    pub code: &'static str,
    pub first_name: &'static str,
    pub last_name: &'static str,
    pub email: &'static str,
    pub department: usize,
    pub designation: usize,
    /// Index into `SeedPlan::employees`
    pub manager: Option<usize>,
    pub hire_date: (i32, u32, u32),
    pub ctc: i64,
}

pub struct SeedUser {
    pub username: &'static str,
    pub password: &'static str,
    pub role: Role,
    pub employee: usize,
}

pub struct SeedPlan {
    pub departments: &'static [SeedDepartment],
    pub designations: &'static [SeedDesignation],
    pub employees: &'static [SeedEmployee],
    pub users: &'static [SeedUser],
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub departments: usize,
    pub designations: usize,
    pub employees: usize,
    pub users: usize,
}

pub const PLAN: SeedPlan = SeedPlan {
    departments: &[
        SeedDepartment {
            name: "Human Resources",
            code: "HR",
        },
        SeedDepartment {
            name: "Engineering",
            code: "ENG",
        },
    ],
    designations: &[
        SeedDesignation {
            title: "HR Manager",
            level: 3,
            department: 0,
        },
        SeedDesignation {
            title: "Engineering Manager",
            level: 3,
            department: 1,
        },
        SeedDesignation {
            title: "Software Engineer",
            level: 1,
            department: 1,
        },
    ],
    employees: &[
        SeedEmployee {
            code: "EMP-001",
            first_name: "Arjun",
            last_name: "Mehta",
            email: "admin@hrms.local",
            department: 0,
            designation: 0,
            manager: None,
            hire_date: (2020, 1, 6),
            ctc: 2_400_000,
        },
        SeedEmployee {
            code: "EMP-002",
            first_name: "Kavya",
            last_name: "Iyer",
            email: "hr@hrms.local",
            department: 0,
            designation: 0,
            manager: Some(0),
            hire_date: (2021, 4, 1),
            ctc: 1_500_000,
        },
        SeedEmployee {
            code: "EMP-003",
            first_name: "Rohan",
            last_name: "Das",
            email: "manager@hrms.local",
            department: 1,
            designation: 1,
            manager: Some(0),
            hire_date: (2021, 7, 12),
            ctc: 2_000_000,
        },
        SeedEmployee {
            code: "EMP-004",
            first_name: "Esha",
            last_name: "Verma",
            email: "employee@hrms.local",
            department: 1,
            designation: 2,
            manager: Some(2),
            hire_date: (2023, 2, 1),
            ctc: 900_000,
        },
    ],
    users: &[
        SeedUser {
            username: "admin",
            password: "Admin@123",
            role: Role::Admin,
            employee: 0,
        },
        SeedUser {
            username: "hr",
            password: "Hr@12345",
            role: Role::Hr,
            employee: 1,
        },
        SeedUser {
            username: "manager",
            password: "Manager@123",
            role: Role::Manager,
            employee: 2,
        },
        SeedUser {
            username: "employee",
            password: "Employee@123",
            role: Role::Employee,
            employee: 3,
        },
    ],
};

/// Tables in delete order: children before the rows they reference.
const CLEAR_ORDER: [&str; 12] = [
    "audit_logs",
    "course_enrollments",
    "courses",
    "documents",
    "payroll",
    "attendance",
    "leave_requests",
    "refresh_tokens",
    "users",
    "employees",
    "designations",
    "departments",
];

impl SeedPlan {
    /// Index references and field formats hold before anything touches the database.
    pub fn check(&self) -> Result<()> {
        for d in self.designations {
            if d.department >= self.departments.len() {
                return Err(anyhow!("designation {} has no department", d.title));
            }
        }
        for (i, e) in self.employees.iter().enumerate() {
            validate_employee_code(e.code).map_err(|_| anyhow!("bad employee code {}", e.code))?;
            if e.department >= self.departments.len() || e.designation >= self.designations.len() {
                return Err(anyhow!("employee {} has a dangling reference", e.code));
            }
            // managers are inserted first so the foreign key resolves
            if e.manager.is_some_and(|m| m >= i) {
                return Err(anyhow!("manager of {} must come earlier in the plan", e.code));
            }
            hire_date(e)?;
        }
        for u in self.users {
            if u.employee >= self.employees.len() {
                return Err(anyhow!("user {} has no employee", u.username));
            }
        }
        Ok(())
    }
}

fn hire_date(e: &SeedEmployee) -> Result<NaiveDate> {
    let (y, m, d) = e.hire_date;
    NaiveDate::from_ymd_opt(y, m, d).ok_or_else(|| anyhow!("invalid hire date for {}", e.code))
}

/// Clears every table, then inserts `plan`, all in one transaction.
pub async fn run(pool: &MySqlPool, plan: &SeedPlan) -> Result<SeedReport> {
    plan.check()?;

    // hash before the transaction; argon2 is slow on purpose
    let mut hashes = Vec::with_capacity(plan.users.len());
    for u in plan.users {
        let hash = hash_password(u.password).map_err(|e| anyhow!("hashing {}: {e}", u.username))?;
        hashes.push(hash);
    }

    let mut tx = pool.begin().await?;

    for table in CLEAR_ORDER {
        sqlx::query(&format!("DELETE FROM {table}"))
            .execute(&mut *tx)
            .await
            .with_context(|| format!("clearing {table}"))?;
    }

    let mut department_ids = Vec::with_capacity(plan.departments.len());
    for d in plan.departments {
        let id = sqlx::query("INSERT INTO departments (name, code) VALUES (?, ?)")
            .bind(d.name)
            .bind(d.code)
            .execute(&mut *tx)
            .await?
            .last_insert_id();
        department_ids.push(id);
    }

    let mut designation_ids = Vec::with_capacity(plan.designations.len());
    for d in plan.designations {
        let id = sqlx::query("INSERT INTO designations (title, level, department_id) VALUES (?, ?, ?)")
            .bind(d.title)
            .bind(d.level)
            .bind(department_ids[d.department])
            .execute(&mut *tx)
            .await?
            .last_insert_id();
        designation_ids.push(id);
    }

    let balance = LeaveBalance::default_allocation();
    let mut employee_ids: Vec<u64> = Vec::with_capacity(plan.employees.len());
    for e in plan.employees {
        let id = sqlx::query(
            r#"
            INSERT INTO employees
            (employee_code, first_name, last_name, email, department_id, designation_id, manager_id,
             hire_date, status, ctc, casual_leave, sick_leave, earned_leave, maternity_leave, paternity_leave)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, 'active', ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(e.code)
        .bind(e.first_name)
        .bind(e.last_name)
        .bind(e.email)
        .bind(department_ids[e.department])
        .bind(designation_ids[e.designation])
        .bind(e.manager.map(|m| employee_ids[m]))
        .bind(hire_date(e)?)
        .bind(Decimal::from(e.ctc))
        .bind(balance.casual)
        .bind(balance.sick)
        .bind(balance.earned)
        .bind(balance.maternity)
        .bind(balance.paternity)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("inserting employee {}", e.code))?
        .last_insert_id();
        employee_ids.push(id);
    }

    for (u, hash) in plan.users.iter().zip(&hashes) {
        sqlx::query("INSERT INTO users (username, password, role, employee_id) VALUES (?, ?, ?, ?)")
            .bind(u.username)
            .bind(hash)
            .bind(u.role.as_str())
            .bind(employee_ids[u.employee])
            .execute(&mut *tx)
            .await
            .with_context(|| format!("inserting user {}", u.username))?;
    }

    tx.commit().await?;

    let report = SeedReport {
        departments: department_ids.len(),
        designations: designation_ids.len(),
        employees: employee_ids.len(),
        users: plan.users.len(),
    };
    info!(?report, "Seed complete");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn plan_is_fixed_and_consistent() {
        PLAN.check().unwrap();
        assert_eq!(PLAN.departments.len(), 2);
        assert_eq!(PLAN.designations.len(), 3);
        assert_eq!(PLAN.employees.len(), 4);
        assert_eq!(PLAN.users.len(), 4);
    }

    #[test]
    fn one_account_per_role_and_employee() {
        let roles: HashSet<_> = PLAN.users.iter().map(|u| u.role).collect();
        assert_eq!(
            roles,
            HashSet::from([Role::Admin, Role::Hr, Role::Manager, Role::Employee])
        );
        let employees: HashSet<_> = PLAN.users.iter().map(|u| u.employee).collect();
        assert_eq!(employees.len(), PLAN.users.len());
    }

    #[test]
    fn employee_reports_to_manager_account() {
        let employee = PLAN.users.iter().find(|u| u.role == Role::Employee).unwrap();
        let manager = PLAN.users.iter().find(|u| u.role == Role::Manager).unwrap();
        assert_eq!(PLAN.employees[employee.employee].manager, Some(manager.employee));
    }

    #[test]
    fn forward_manager_reference_is_rejected() {
        let bad = SeedPlan {
            departments: PLAN.departments,
            designations: PLAN.designations,
            employees: &[SeedEmployee {
                code: "EMP-009",
                first_name: "A",
                last_name: "B",
                email: "a@b.c",
                department: 0,
                designation: 0,
                manager: Some(0),
                hire_date: (2024, 1, 1),
                ctc: 0,
            }],
            users: &[],
        };
        assert!(bad.check().is_err());
    }

    const INIT_SCHEMA: &str = include_str!("../migrations/20260101000000_init.sql");

    fn migrated_tables() -> HashSet<&'static str> {
        INIT_SCHEMA
            .lines()
            .filter_map(|line| line.trim().strip_prefix("CREATE TABLE IF NOT EXISTS "))
            .filter_map(|rest| rest.split_whitespace().next())
            .map(|name| name.trim_end_matches('('))
            .collect()
    }

    #[test]
    fn clear_order_covers_every_migrated_table() {
        let cleared: HashSet<&str> = CLEAR_ORDER.into_iter().collect();
        assert_eq!(cleared, migrated_tables());
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs a MySQL server in DATABASE_URL"]
    async fn running_twice_leaves_one_fixture(pool: MySqlPool) {
        run(&pool, &PLAN).await.unwrap();
        let report = run(&pool, &PLAN).await.unwrap();
        assert_eq!(report.users, 4);

        for table in ["users", "employees"] {
            let count = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {table}"))
                .fetch_one(&pool)
                .await
                .unwrap();
            assert_eq!(count, 4, "{table}");
        }
    }

    #[test]
    fn every_table_is_cleared_once() {
        let unique: HashSet<_> = CLEAR_ORDER.iter().collect();
        assert_eq!(unique.len(), CLEAR_ORDER.len());
        let pos = |t: &str| CLEAR_ORDER.iter().position(|x| *x == t).unwrap();
        assert!(pos("users") < pos("employees"));
        assert!(pos("employees") < pos("departments"));
    }
}
