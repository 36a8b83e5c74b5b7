use crate::{
    auth::{
        jwt::{TokenSubject, generate_access_token, generate_refresh_token, verify_token},
        password::{hash_password, verify_password},
    },
    config::Config,
    db::is_constraint_violation,
    model::{
        role::Role,
        user::{LoginReqDto, TokenType, User, UserReq},
    },
    utils::username_cache::UsernameCache,
};
use actix_web::{HttpRequest, HttpResponse, Responder, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, error, info, instrument};

/// true  => username AVAILABLE
/// false => username TAKEN
pub async fn is_username_available(username: &str, cache: &UsernameCache, pool: &MySqlPool) -> bool {
    let username = username.to_lowercase();

    // Moka cache — fast positive
    if cache.is_taken(&username).await {
        return false;
    }

    // Database fallback
    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(username) = ? LIMIT 1)",
    )
    .bind(&username)
    .fetch_one(pool)
    .await
    .unwrap_or(true); // fail-safe

    if exists {
        cache.mark_taken(&username).await;
        return false;
    }

    true
}

/// Inserts a new employee-role user linked to `employee_id`.
async fn insert_user(
    username: &str,
    password: &str,
    employee_id: u64,
    pool: &MySqlPool,
    cache: &UsernameCache,
) -> Result<(), HttpResponse> {
    let hashed = hash_password(password).map_err(|e| {
        error!(error = %e, "Password hashing failed");
        HttpResponse::InternalServerError().json(json!({ "error": "Failed to register user" }))
    })?;

    let result = sqlx::query(
        r#"INSERT INTO users (username, password, role, employee_id) VALUES (?, ?, ?, ?)"#,
    )
    .bind(username)
    .bind(hashed)
    .bind(Role::Employee.as_str())
    .bind(employee_id)
    .execute(pool)
    .await;

    match result {
        Ok(_) => {
            cache.mark_taken(username).await;
            Ok(())
        }
        Err(e) if is_constraint_violation(&e) => Err(HttpResponse::Conflict().json(json!({
            "error": "Username already exists"
        }))),
        Err(e) => {
            error!(error = %e, "Failed to insert user");
            Err(HttpResponse::InternalServerError().json(json!({
                "error": "Failed to register user"
            })))
        }
    }
}

/// User registration handler
#[instrument(name = "auth_register", skip(user, pool, cache), fields(username = %user.username))]
pub async fn register(
    user: web::Json<UserReq>,
    pool: web::Data<MySqlPool>,
    cache: web::Data<UsernameCache>,
) -> impl Responder {
    let username = user.username.trim();
    let password = &user.password;

    if username.is_empty() || password.is_empty() {
        return HttpResponse::BadRequest().json(json!({
            "error": "Username and password must not be empty"
        }));
    }

    if password.len() < 8 {
        return HttpResponse::BadRequest().json(json!({
            "error": "Password must be at least 8 characters"
        }));
    }

    if !is_username_available(username, &cache, pool.get_ref()).await {
        return HttpResponse::Conflict().json(json!({
            "error": "Username already taken"
        }));
    }

    // the employee record must exist and not already have an account
    let employee_id = match sqlx::query_scalar::<_, u64>(
        r#"
        SELECT e.id
        FROM employees e
        LEFT JOIN users u ON u.employee_id = e.id
        WHERE e.employee_code = ? AND LOWER(e.email) = LOWER(?) AND u.id IS NULL
        "#,
    )
    .bind(user.employee_code.trim())
    .bind(user.email.trim())
    .fetch_optional(pool.get_ref())
    .await
    {
        Ok(Some(id)) => id,
        Ok(None) => {
            info!("Registration refused: no matching unlinked employee");
            return HttpResponse::BadRequest().json(json!({
                "error": "No matching employee record without an account"
            }));
        }
        Err(e) => {
            error!(error = %e, "Employee lookup failed during registration");
            return HttpResponse::InternalServerError().finish();
        }
    };

    match insert_user(username, password, employee_id, pool.get_ref(), &cache).await {
        Ok(_) => HttpResponse::Created().json(json!({
            "message": "User registered successfully"
        })),
        Err(err_resp) => err_resp,
    }
}

#[derive(Serialize, Deserialize)]
struct LoginResponse {
    access_token: String,
    refresh_token: String,
}

async fn store_refresh_token<'c, E>(executor: E, user_id: u64, jti: &str, exp: usize) -> Result<(), sqlx::Error>
where
    E: sqlx::Executor<'c, Database = sqlx::MySql>,
{
    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(user_id)
    .bind(jti)
    .bind(exp as i64)
    .execute(executor)
    .await
    .map(|_| ())
}

#[instrument(
    name = "auth_login",
    skip(pool, config, user),
    fields(username = %user.username)
)]
pub async fn login(
    user: web::Json<LoginReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> impl Responder {
    info!("Login request received");

    if user.username.trim().is_empty() || user.password.is_empty() {
        info!("Validation failed: empty username or password");
        return HttpResponse::BadRequest().body("Username or password required");
    }

    debug!("Fetching user from database");

    let db_user = match sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, password, role, employee_id, is_active
        FROM users
        WHERE username = ?
        "#,
    )
    .bind(user.username.trim())
    .fetch_optional(pool.get_ref())
    .await
    {
        Ok(Some(user)) => {
            debug!(user_id = user.id, "User found");
            user
        }
        Ok(None) => {
            info!("Invalid credentials: user not found");
            return HttpResponse::Unauthorized().body("Invalid credentials");
        }
        Err(e) => {
            error!(error = %e, "Database error while fetching user");
            return HttpResponse::InternalServerError().finish();
        }
    };

    if let Err(e) = verify_password(&user.password, &db_user.password) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return HttpResponse::Unauthorized().body("Invalid credentials");
    }

    if !db_user.is_active {
        info!(user_id = db_user.id, "Login refused: account disabled");
        return HttpResponse::Forbidden().body("Account disabled");
    }

    let subject = TokenSubject {
        user_id: db_user.id,
        username: db_user.username.clone(),
        role: db_user.role.clone(),
        employee_id: db_user.employee_id,
    };

    let tokens = generate_access_token(&subject, &config.jwt_secret, config.access_token_ttl)
        .and_then(|access| {
            generate_refresh_token(&subject, &config.jwt_secret, config.refresh_token_ttl)
                .map(|(refresh, claims)| (access, refresh, claims))
        });
    let (access_token, refresh_token, refresh_claims) = match tokens {
        Ok(t) => t,
        Err(e) => {
            error!(error = %e, "Failed to sign tokens");
            return HttpResponse::InternalServerError().finish();
        }
    };

    debug!(user_id = db_user.id, jti = %refresh_claims.jti, "Storing refresh token");

    if let Err(e) = store_refresh_token(
        pool.get_ref(),
        db_user.id,
        &refresh_claims.jti,
        refresh_claims.exp,
    )
    .await
    {
        error!(error = %e, "Failed to store refresh token");
        return HttpResponse::InternalServerError().finish();
    }

    // non-fatal
    if let Err(e) = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = ?")
        .bind(db_user.id)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, "Failed to update last_login_at");
    }

    info!(user_id = db_user.id, role = %db_user.role, "Login successful");

    HttpResponse::Ok().json(LoginResponse {
        access_token,
        refresh_token,
    })
}

fn bearer(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

#[derive(sqlx::FromRow)]
struct RefreshRecord {
    id: u64,
    user_id: u64,
    revoked: bool,
    is_active: bool,
}

/// Rotates a refresh token: the presented one is revoked and a new pair issued.
pub async fn refresh_token(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> impl Responder {
    let Some(token) = bearer(&req) else {
        return HttpResponse::Unauthorized().body("No token");
    };

    let claims = match verify_token(token, &config.jwt_secret) {
        Ok(c) => c,
        Err(_) => return HttpResponse::Unauthorized().finish(),
    };

    if claims.token_type != TokenType::Refresh {
        return HttpResponse::Unauthorized().finish();
    }

    let mut tx = match pool.begin().await {
        Ok(tx) => tx,
        Err(e) => {
            error!(error = %e, "Failed to open transaction");
            return HttpResponse::InternalServerError().finish();
        }
    };

    let record = sqlx::query_as::<_, RefreshRecord>(
        r#"
        SELECT rt.id, rt.user_id, rt.revoked, u.is_active
        FROM refresh_tokens rt
        JOIN users u ON u.id = rt.user_id
        WHERE rt.jti = ?
        FOR UPDATE
        "#,
    )
    .bind(&claims.jti)
    .fetch_optional(&mut *tx)
    .await;

    let record = match record {
        Ok(Some(r)) if !r.revoked && r.is_active => r,
        Ok(_) => return HttpResponse::Unauthorized().finish(),
        Err(e) => {
            error!(error = %e, "Failed to look up refresh token");
            return HttpResponse::InternalServerError().finish();
        }
    };

    if let Err(e) = sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE id = ?")
        .bind(record.id)
        .execute(&mut *tx)
        .await
    {
        error!(error = %e, "Failed to revoke refresh token");
        return HttpResponse::InternalServerError().finish();
    }

    let subject = TokenSubject {
        user_id: claims.user_id,
        username: claims.sub.clone(),
        role: claims.role.clone(),
        employee_id: claims.employee_id,
    };

    let issued = generate_refresh_token(&subject, &config.jwt_secret, config.refresh_token_ttl)
        .and_then(|(refresh, new_claims)| {
            generate_access_token(&subject, &config.jwt_secret, config.access_token_ttl)
                .map(|access| (access, refresh, new_claims))
        });
    let (access_token, new_refresh_token, new_claims) = match issued {
        Ok(t) => t,
        Err(e) => {
            error!(error = %e, "Failed to sign tokens");
            return HttpResponse::InternalServerError().finish();
        }
    };

    if let Err(e) = store_refresh_token(&mut *tx, record.user_id, &new_claims.jti, new_claims.exp).await {
        error!(error = %e, "Failed to store rotated refresh token");
        return HttpResponse::InternalServerError().finish();
    }

    if let Err(e) = tx.commit().await {
        error!(error = %e, "Failed to commit refresh rotation");
        return HttpResponse::InternalServerError().finish();
    }

    HttpResponse::Ok().json(LoginResponse {
        access_token,
        refresh_token: new_refresh_token,
    })
}

/// Revokes the presented refresh token. Always answers 204, even for unknown tokens.
pub async fn logout(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> impl Responder {
    let Some(token) = bearer(&req) else {
        return HttpResponse::NoContent().finish();
    };

    let claims = match verify_token(token, &config.jwt_secret) {
        Ok(c) => c,
        Err(_) => return HttpResponse::NoContent().finish(),
    };

    // only refresh tokens can logout
    if claims.token_type != TokenType::Refresh {
        return HttpResponse::NoContent().finish();
    }

    if let Err(e) = sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE jti = ?")
        .bind(&claims.jti)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, "Failed to revoke refresh token on logout");
    }

    HttpResponse::NoContent().finish()
}
