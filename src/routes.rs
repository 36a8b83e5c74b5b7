use crate::{
    api::{
        attendance, audit_log, course, department, designation, document, employee, leave_request, payroll, report,
        utility,
    },
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfig, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;

// Per-route limiter settings; a zero rate is treated as one request per minute.
fn limiter_config(requests_per_min: u32) -> GovernorConfig<PeerIpKeyExtractor, NoOpMiddleware> {
    let requests_per_min = requests_per_min.max(1);
    let per_ms = (60_000 / requests_per_min as u64).max(1);
    GovernorConfigBuilder::default()
        .milliseconds_per_request(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .unwrap_or_else(|| {
            tracing::warn!(requests_per_min, "Invalid rate limit, using governor defaults");
            Default::default()
        })
}

fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    Governor::new(&limiter_config(requests_per_min))
}

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    let login_limiter = Arc::new(build_limiter(config.rate_login_per_min));
    let register_limiter = Arc::new(build_limiter(config.rate_register_per_min));
    let refresh_limiter = Arc::new(build_limiter(config.rate_refresh_per_min));
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));

    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/register")
                    .wrap(register_limiter)
                    .route(web::post().to(handlers::register)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(refresh_limiter)
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(login_limiter)
                    .route(web::post().to(handlers::logout)),
            )
            // bearer token checked by the AuthUser extractor
            .service(
                web::resource("/permissions")
                    .wrap(protected_limiter.clone())
                    .route(web::get().to(utility::my_permissions)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(protected_limiter) // rate limiting
            .service(
                web::scope("/employees")
                    .service(
                        web::resource("")
                            .route(web::post().to(employee::create_employee))
                            .route(web::get().to(employee::list_employees)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(employee::get_employee))
                            .route(web::put().to(employee::update_employee))
                            .route(web::delete().to(employee::delete_employee)),
                    )
                    .service(
                        web::resource("/{id}/leave-balance").route(web::get().to(employee::get_leave_balance)),
                    ),
            )
            .service(
                web::scope("/departments")
                    .service(
                        web::resource("")
                            .route(web::post().to(department::create_department))
                            .route(web::get().to(department::list_departments)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::put().to(department::update_department))
                            .route(web::delete().to(department::delete_department)),
                    ),
            )
            .service(
                web::scope("/designations")
                    .service(
                        web::resource("")
                            .route(web::post().to(designation::create_designation))
                            .route(web::get().to(designation::list_designations)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::put().to(designation::update_designation))
                            .route(web::delete().to(designation::delete_designation)),
                    ),
            )
            .service(
                web::scope("/leave")
                    .service(
                        web::resource("")
                            .route(web::get().to(leave_request::list_leaves))
                            .route(web::post().to(leave_request::create_leave)),
                    )
                    .service(web::resource("/{id}").route(web::get().to(leave_request::get_leave)))
                    .service(
                        web::resource("/{id}/manager-approve")
                            .route(web::put().to(leave_request::manager_approve_leave)),
                    )
                    .service(web::resource("/{id}/approve").route(web::put().to(leave_request::approve_leave)))
                    .service(web::resource("/{id}/reject").route(web::put().to(leave_request::reject_leave)))
                    .service(web::resource("/{id}/cancel").route(web::put().to(leave_request::cancel_leave))),
            )
            .service(
                web::scope("/attendance").service(
                    web::resource("")
                        .route(web::post().to(attendance::check_in))
                        .route(web::put().to(attendance::check_out))
                        .route(web::get().to(attendance::list_attendance)),
                ),
            )
            .service(
                web::scope("/payroll")
                    .service(
                        web::resource("")
                            .route(web::post().to(payroll::create_payroll))
                            .route(web::get().to(payroll::list_payrolls)),
                    )
                    // before /{id} so "summary" is not taken for an id
                    .service(web::resource("/summary").route(web::get().to(payroll::payroll_summary)))
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(payroll::get_payroll))
                            .route(web::put().to(payroll::update_payroll)),
                    ),
            )
            .service(
                web::scope("/documents")
                    .app_data(web::PayloadConfig::new(document::MAX_UPLOAD_BYTES))
                    .service(
                        web::resource("")
                            .route(web::post().to(document::upload_document))
                            .route(web::get().to(document::list_documents)),
                    )
                    .service(web::resource("/{id}").route(web::get().to(document::get_document)))
                    .service(web::resource("/{id}/download").route(web::get().to(document::download_document)))
                    .service(web::resource("/{id}/versions").route(web::post().to(document::upload_version))),
            )
            .service(
                web::scope("/courses")
                    .service(
                        web::resource("")
                            .route(web::post().to(course::create_course))
                            .route(web::get().to(course::list_courses)),
                    )
                    .service(web::resource("/{id}/enroll").route(web::post().to(course::enroll))),
            )
            .service(web::resource("/audit-logs").route(web::get().to(audit_log::list_audit_logs)))
            .service(
                web::scope("/reports")
                    .service(web::resource("/payslip/{id}").route(web::get().to(report::payslip_pdf)))
                    .service(web::resource("/attendance.xlsx").route(web::get().to(report::attendance_xlsx)))
                    .service(web::resource("/payroll.xlsx").route(web::get().to(report::payroll_xlsx))),
            )
            .service(
                web::scope("/utils")
                    .service(web::resource("/working-days").route(web::get().to(utility::working_days)))
                    .service(web::resource("/financial-year").route(web::get().to(utility::financial_year))),
            ),
    );
}

// LOGIN
//  ├─ access_token (15 min)
//  └─ refresh_token (7 days)

// API REQUEST
//  └─ Authorization: Bearer access_token

// ACCESS EXPIRED
//  └─ POST /auth/refresh with refresh_token
//       └─ returns a new access/refresh pair, old refresh token revoked

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn limiter_replenishes_one_request_per_interval() {
        let cfg = limiter_config(60);
        assert_eq!(cfg.burst_size(), 60);
        assert_eq!(cfg.period(), Duration::from_secs(1));
    }

    #[test]
    fn zero_rate_allows_one_request_per_minute() {
        let cfg = limiter_config(0);
        assert_eq!(cfg.burst_size(), 1);
        assert_eq!(cfg.period(), Duration::from_secs(60));
    }
}
