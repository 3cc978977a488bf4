//! User account administration.
//!
//! Accounts live in the `users` table. Every route resolves the caller
//! first, then checks the caller's role and, for writes, the caller's
//! standing over the target account before storage is touched.
//!
//! | Route                     | Minimum role | Extra rule                            |
//! |---------------------------|--------------|---------------------------------------|
//! | `GET /api/session`        | member       |                                       |
//! | `GET /api/users`          | manager      | managers see only their department    |
//! | `GET /api/users/{id}`     | member       | members may only read themselves      |
//! | `POST /api/users`         | manager      | must be able to manage the new role   |
//! | `PUT /api/users/{id}`     | manager      | current and new role; not own role    |
//! | `DELETE /api/users/{id}`  | manager      | not own account                       |
//!
//! A manager with a department only sees accounts in that department, by
//! id as well as in the list. Accounts outside it answer 404. Such a
//! manager also cannot place an account in any other department.

use libsql::{Connection, Row, Value, params};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::module::Module;
use crate::permission::{Role, has_required_role};
use crate::principal::Principal;
use crate::response::{self, HttpResponse};
use crate::router::{Context, Router};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    role TEXT NOT NULL,
    department TEXT
)";

const COLUMNS: &str = "id, name, email, role, department";

/// A stored user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub department: Option<String>,
}

/// Request body for creating a user.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub department: Option<String>,
}

/// Request body for updating a user. Absent fields are left unchanged;
/// an empty `department` clears it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub department: Option<String>,
}

/// Create the `users` table if it does not exist.
pub async fn migrate(conn: &Connection) -> Result<()> {
    conn.execute(SCHEMA, ()).await?;
    Ok(())
}

fn optional_text(value: Option<String>) -> Value {
    value.map_or(Value::Null, Value::Text)
}

fn clean_department(department: Option<String>) -> Option<String> {
    department
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
}

/// Map a UNIQUE violation on `users.email` to `Conflict`.
///
/// `email_taken` runs before every write, but two writers can both pass it;
/// the constraint then decides.
fn write_error(err: libsql::Error, email: &str) -> Error {
    if err.to_string().contains("UNIQUE constraint failed: users.email") {
        Error::Conflict(format!("Email already in use: {email}"))
    } else {
        Error::Database(err)
    }
}

fn from_row(row: &Row) -> Result<User> {
    let role: String = row.get(3)?;
    let role = Role::parse(&role)
        .ok_or_else(|| Error::Internal(format!("Stored user has unknown role: {role}")))?;
    let department = match row.get_value(4)? {
        Value::Text(s) => Some(s),
        _ => None,
    };
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        role,
        department,
    })
}

fn validate(name: &str, email: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::BadRequest("Name is required".into()));
    }
    if !email.contains('@') {
        return Err(Error::BadRequest("A valid email is required".into()));
    }
    Ok(())
}

async fn email_taken(conn: &Connection, email: &str, except_id: Option<&str>) -> Result<bool> {
    let mut rows = conn
        .query("SELECT id FROM users WHERE email = ?1", params![email.to_string()])
        .await?;
    while let Some(row) = rows.next().await? {
        let id: String = row.get(0)?;
        if Some(id.as_str()) != except_id {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Insert a new user.
pub async fn create(conn: &Connection, new: NewUser) -> Result<User> {
    let name = new.name.trim().to_string();
    let email = new.email.trim().to_ascii_lowercase();
    validate(&name, &email)?;
    if email_taken(conn, &email, None).await? {
        return Err(Error::Conflict(format!("Email already in use: {email}")));
    }

    let user = User {
        id: uuid::Uuid::new_v4().to_string(),
        name,
        email,
        role: new.role,
        department: clean_department(new.department),
    };
    conn.execute(
        "INSERT INTO users (id, name, email, role, department) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            user.id.clone(),
            user.name.clone(),
            user.email.clone(),
            user.role.as_str().to_string(),
            optional_text(user.department.clone())
        ],
    )
    .await
    .map_err(|e| write_error(e, &user.email))?;

    Ok(user)
}

/// Look up a user by id.
pub async fn find(conn: &Connection, id: &str) -> Result<Option<User>> {
    let mut rows = conn
        .query(
            &format!("SELECT {COLUMNS} FROM users WHERE id = ?1"),
            params![id.to_string()],
        )
        .await?;
    match rows.next().await? {
        Some(row) => Ok(Some(from_row(&row)?)),
        None => Ok(None),
    }
}

/// List users ordered by name, optionally restricted to one department.
pub async fn list(conn: &Connection, department: Option<&str>) -> Result<Vec<User>> {
    let mut rows = match department {
        Some(department) => {
            conn.query(
                &format!("SELECT {COLUMNS} FROM users WHERE department = ?1 ORDER BY name"),
                params![department.to_string()],
            )
            .await?
        }
        None => {
            conn.query(&format!("SELECT {COLUMNS} FROM users ORDER BY name"), ())
                .await?
        }
    };

    let mut users = Vec::new();
    while let Some(row) = rows.next().await? {
        users.push(from_row(&row)?);
    }
    Ok(users)
}

/// Apply `changes` to an existing user.
pub async fn update(conn: &Connection, id: &str, changes: UserUpdate) -> Result<User> {
    let mut user = find(conn, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("User {id}")))?;

    if let Some(name) = changes.name {
        user.name = name.trim().to_string();
    }
    if let Some(email) = changes.email {
        user.email = email.trim().to_ascii_lowercase();
    }
    if let Some(role) = changes.role {
        user.role = role;
    }
    if let Some(department) = changes.department {
        user.department = clean_department(Some(department));
    }
    validate(&user.name, &user.email)?;
    if email_taken(conn, &user.email, Some(id)).await? {
        return Err(Error::Conflict(format!("Email already in use: {}", user.email)));
    }

    conn.execute(
        "UPDATE users SET name = ?2, email = ?3, role = ?4, department = ?5 WHERE id = ?1",
        params![
            user.id.clone(),
            user.name.clone(),
            user.email.clone(),
            user.role.as_str().to_string(),
            optional_text(user.department.clone())
        ],
    )
    .await
    .map_err(|e| write_error(e, &user.email))?;

    Ok(user)
}

/// Delete a user. Returns whether a row was removed.
pub async fn delete(conn: &Connection, id: &str) -> Result<bool> {
    let removed = conn
        .execute("DELETE FROM users WHERE id = ?1", params![id.to_string()])
        .await?;
    Ok(removed > 0)
}

/// Routes for account administration.
pub struct UsersModule;

impl Module for UsersModule {
    fn name(&self) -> &'static str {
        "users"
    }

    fn routes(&self, router: &mut Router) {
        router.get("/api/session", current_session);
        router.get("/api/users", list_users);
        router.post("/api/users", create_user);
        router.get("/api/users/{id}", get_user);
        router.put("/api/users/{id}", update_user);
        router.delete("/api/users/{id}", delete_user);
    }
}

/// The department a principal is confined to; `None` means every account.
fn scope_of(me: &Principal) -> Option<&str> {
    match me.role {
        Role::Admin => None,
        _ => me.department.as_deref(),
    }
}

fn within_scope(me: &Principal, user: &User) -> bool {
    match scope_of(me) {
        None => true,
        Some(department) => user.department.as_deref() == Some(department),
    }
}

/// Find `id`, treating accounts outside the caller's scope as missing.
async fn find_in_scope(conn: &Connection, me: &Principal, id: &str) -> Result<User> {
    find(conn, id)
        .await?
        .filter(|user| user.id == me.id || within_scope(me, user))
        .ok_or_else(|| Error::NotFound(format!("User {id}")))
}

/// Refuse a department assignment outside the caller's scope.
fn check_department(ctx: &Context, me: &Principal, requested: Option<&str>) -> Result<()> {
    let Some(own) = scope_of(me) else {
        return Ok(());
    };
    if requested.map(str::trim) == Some(own) {
        return Ok(());
    }
    warn!(
        "{} ({}) tried to assign department {:?} on {} {}",
        me.id,
        me.role,
        requested,
        ctx.method,
        ctx.uri.path()
    );
    Err(Error::Forbidden {
        required: Role::Admin,
    })
}

async fn current_session(ctx: Context) -> Result<HttpResponse> {
    let me = ctx.require_role(Role::Member).await?;
    response::ok(&me)
}

async fn list_users(ctx: Context) -> Result<HttpResponse> {
    let me = ctx.require_role(Role::Manager).await?;
    let conn = crate::db::connection(ctx.require_db()?)?;

    let users = list(&conn, scope_of(&me)).await?;
    response::ok(&users)
}

async fn get_user(ctx: Context) -> Result<HttpResponse> {
    let me = ctx.require_role(Role::Member).await?;
    let id = ctx.require_param("id")?;
    if me.id != id && !has_required_role(Some(&me), Role::Manager) {
        return Err(Error::Forbidden {
            required: Role::Manager,
        });
    }

    let conn = crate::db::connection(ctx.require_db()?)?;
    let user = find_in_scope(&conn, &me, id).await?;
    response::ok(&user)
}

async fn create_user(ctx: Context) -> Result<HttpResponse> {
    let me = ctx.require_role(Role::Manager).await?;
    let mut input: NewUser = ctx.json()?;
    ctx.require_manage(&me, input.role)?;
    input.department = clean_department(input.department);
    if input.department.is_none() {
        input.department = scope_of(&me).map(str::to_string);
    }
    check_department(&ctx, &me, input.department.as_deref())?;

    let conn = crate::db::connection(ctx.require_db()?)?;
    let user = create(&conn, input).await?;
    info!("{} created {} account {}", me.id, user.role, user.id);
    response::created(&user)
}

async fn update_user(ctx: Context) -> Result<HttpResponse> {
    let me = ctx.require_role(Role::Manager).await?;
    let id = ctx.require_param("id")?;
    let changes: UserUpdate = ctx.json()?;

    let conn = crate::db::connection(ctx.require_db()?)?;
    let existing = find_in_scope(&conn, &me, id).await?;
    ctx.require_manage(&me, existing.role)?;

    if let Some(role) = changes.role {
        if me.id == existing.id && role != existing.role {
            return Err(Error::BadRequest("Cannot change your own role".into()));
        }
        ctx.require_manage(&me, role)?;
    }
    if let Some(department) = changes.department.as_deref() {
        check_department(&ctx, &me, Some(department))?;
    }

    let user = update(&conn, id, changes).await?;
    response::ok(&user)
}

async fn delete_user(ctx: Context) -> Result<HttpResponse> {
    let me = ctx.require_role(Role::Manager).await?;
    let id = ctx.require_param("id")?;
    if me.id == id {
        return Err(Error::BadRequest("Cannot delete your own account".into()));
    }

    let conn = crate::db::connection(ctx.require_db()?)?;
    let existing = find_in_scope(&conn, &me, id).await?;
    ctx.require_manage(&me, existing.role)?;

    delete(&conn, id).await?;
    info!("{} deleted {} account {}", me.id, existing.role, existing.id);
    Ok(response::no_content())
}
