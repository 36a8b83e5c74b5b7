use anyhow::Context;
use tracing::info;

use hrms::config::Config;
use hrms::db::{init_db, run_migrations};
use hrms::seed::{PLAN, run};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let config = Config::from_env().context("loading config")?;
    let pool = init_db(&config.database_url).await?;
    run_migrations(&pool).await?;

    let report = run(&pool, &PLAN).await?;
    info!(
        departments = report.departments,
        designations = report.designations,
        employees = report.employees,
        users = report.users,
        "Database seeded"
    );
    for user in PLAN.users {
        info!(username = user.username, role = %user.role, "Login available");
    }
    Ok(())
}
