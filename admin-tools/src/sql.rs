//! SQL query constants with database-specific placeholders.
//!
//! SQLite uses `?` placeholders, PostgreSQL uses `$1, $2, ...` numbered placeholders.
//! Booleans are stored as `BIGINT` 0/1 so the same Rust types bind on both backends.

// =============================================================================
// Users
// =============================================================================

const USER_COLUMNS: &str = "id, username, password_hash, email, first_name, last_name, \
     is_active, is_staff, is_superuser, must_change_password, date_joined, last_login";

#[cfg(feature = "sqlite")]
pub const INSERT_USER: &str = r#"
    INSERT INTO users
        (username, password_hash, email, first_name, last_name,
         is_active, is_staff, is_superuser, must_change_password, date_joined)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
    RETURNING id
"#;

#[cfg(feature = "postgres")]
pub const INSERT_USER: &str = r#"
    INSERT INTO users
        (username, password_hash, email, first_name, last_name,
         is_active, is_staff, is_superuser, must_change_password, date_joined)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
    RETURNING id
"#;

#[cfg(feature = "sqlite")]
pub fn select_user_by_id() -> String {
    format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?")
}

#[cfg(feature = "postgres")]
pub fn select_user_by_id() -> String {
    format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1")
}

#[cfg(feature = "sqlite")]
pub fn select_user_by_username() -> String {
    format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?")
}

#[cfg(feature = "postgres")]
pub fn select_user_by_username() -> String {
    format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1")
}

pub fn select_all_users() -> String {
    format!("SELECT {USER_COLUMNS} FROM users ORDER BY username")
}

pub fn select_superusers() -> String {
    format!("SELECT {USER_COLUMNS} FROM users WHERE is_superuser = 1 ORDER BY username")
}

#[cfg(feature = "sqlite")]
pub const UPDATE_USER_PASSWORD: &str =
    "UPDATE users SET password_hash = ?, must_change_password = ? WHERE id = ?";

#[cfg(feature = "postgres")]
pub const UPDATE_USER_PASSWORD: &str =
    "UPDATE users SET password_hash = $1, must_change_password = $2 WHERE id = $3";

#[cfg(feature = "sqlite")]
pub const UPDATE_USER_FLAGS: &str = r#"
    UPDATE users
    SET is_active = ?, is_staff = ?, is_superuser = ?, must_change_password = ?
    WHERE id = ?
"#;

#[cfg(feature = "postgres")]
pub const UPDATE_USER_FLAGS: &str = r#"
    UPDATE users
    SET is_active = $1, is_staff = $2, is_superuser = $3, must_change_password = $4
    WHERE id = $5
"#;

#[cfg(feature = "sqlite")]
pub const UPDATE_USER_LAST_LOGIN: &str = "UPDATE users SET last_login = ? WHERE id = ?";

#[cfg(feature = "postgres")]
pub const UPDATE_USER_LAST_LOGIN: &str = "UPDATE users SET last_login = $1 WHERE id = $2";

// =============================================================================
// Groups
// =============================================================================

#[cfg(feature = "sqlite")]
pub const SELECT_GROUP_ID: &str = "SELECT id FROM auth_groups WHERE name = ?";

#[cfg(feature = "postgres")]
pub const SELECT_GROUP_ID: &str = "SELECT id FROM auth_groups WHERE name = $1";

#[cfg(feature = "sqlite")]
pub const INSERT_GROUP: &str =
    "INSERT INTO auth_groups (name) VALUES (?) ON CONFLICT(name) DO NOTHING";

#[cfg(feature = "postgres")]
pub const INSERT_GROUP: &str =
    "INSERT INTO auth_groups (name) VALUES ($1) ON CONFLICT(name) DO NOTHING";

#[cfg(feature = "sqlite")]
pub const SELECT_USER_GROUP_NAMES: &str = r#"
    SELECT g.name FROM auth_groups g
    JOIN user_groups ug ON ug.group_id = g.id
    WHERE ug.user_id = ?
    ORDER BY g.name
"#;

#[cfg(feature = "postgres")]
pub const SELECT_USER_GROUP_NAMES: &str = r#"
    SELECT g.name FROM auth_groups g
    JOIN user_groups ug ON ug.group_id = g.id
    WHERE ug.user_id = $1
    ORDER BY g.name
"#;

#[cfg(feature = "sqlite")]
pub const INSERT_USER_GROUP: &str =
    "INSERT INTO user_groups (user_id, group_id) VALUES (?, ?) ON CONFLICT DO NOTHING";

#[cfg(feature = "postgres")]
pub const INSERT_USER_GROUP: &str =
    "INSERT INTO user_groups (user_id, group_id) VALUES ($1, $2) ON CONFLICT DO NOTHING";

#[cfg(feature = "sqlite")]
pub const DELETE_USER_GROUP: &str = "DELETE FROM user_groups WHERE user_id = ? AND group_id = ?";

#[cfg(feature = "postgres")]
pub const DELETE_USER_GROUP: &str =
    "DELETE FROM user_groups WHERE user_id = $1 AND group_id = $2";

#[cfg(feature = "sqlite")]
pub const SELECT_GROUP_MEMBER_IDS: &str = r#"
    SELECT ug.user_id FROM user_groups ug
    JOIN auth_groups g ON g.id = ug.group_id
    JOIN users u ON u.id = ug.user_id
    WHERE g.name = ?
    ORDER BY u.username
"#;

#[cfg(feature = "postgres")]
pub const SELECT_GROUP_MEMBER_IDS: &str = r#"
    SELECT ug.user_id FROM user_groups ug
    JOIN auth_groups g ON g.id = ug.group_id
    JOIN users u ON u.id = ug.user_id
    WHERE g.name = $1
    ORDER BY u.username
"#;

// =============================================================================
// Sessions
// =============================================================================

#[cfg(feature = "sqlite")]
pub const UPSERT_SESSION: &str = r#"
    INSERT INTO sessions (session_key, session_data, expire_date)
    VALUES (?, ?, ?)
    ON CONFLICT(session_key) DO UPDATE SET
        session_data = excluded.session_data,
        expire_date = excluded.expire_date
"#;

#[cfg(feature = "postgres")]
pub const UPSERT_SESSION: &str = r#"
    INSERT INTO sessions (session_key, session_data, expire_date)
    VALUES ($1, $2, $3)
    ON CONFLICT(session_key) DO UPDATE SET
        session_data = excluded.session_data,
        expire_date = excluded.expire_date
"#;

#[cfg(feature = "sqlite")]
pub const SELECT_SESSION: &str = r#"
    SELECT session_key, session_data, expire_date FROM sessions
    WHERE session_key = ? AND expire_date >= ?
"#;

#[cfg(feature = "postgres")]
pub const SELECT_SESSION: &str = r#"
    SELECT session_key, session_data, expire_date FROM sessions
    WHERE session_key = $1 AND expire_date >= $2
"#;

#[cfg(feature = "sqlite")]
pub const SELECT_ACTIVE_SESSIONS: &str = r#"
    SELECT session_key, session_data, expire_date FROM sessions
    WHERE expire_date >= ?
"#;

#[cfg(feature = "postgres")]
pub const SELECT_ACTIVE_SESSIONS: &str = r#"
    SELECT session_key, session_data, expire_date FROM sessions
    WHERE expire_date >= $1
"#;

#[cfg(feature = "sqlite")]
pub const DELETE_SESSION: &str = "DELETE FROM sessions WHERE session_key = ?";

#[cfg(feature = "postgres")]
pub const DELETE_SESSION: &str = "DELETE FROM sessions WHERE session_key = $1";

#[cfg(feature = "sqlite")]
pub const DELETE_EXPIRED_SESSIONS: &str = "DELETE FROM sessions WHERE expire_date < ?";

#[cfg(feature = "postgres")]
pub const DELETE_EXPIRED_SESSIONS: &str = "DELETE FROM sessions WHERE expire_date < $1";
