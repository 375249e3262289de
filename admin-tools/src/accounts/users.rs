//! User accounts and tool groups.
//!
//! Handles password hashing (argon2), credential checks, the pending-reset
//! flag, and group membership used by the tool permission checks.

use crate::db::{DbPool, DbRow, from_db_timestamp, to_db_timestamp};
use crate::sql;
use anyhow::{Context, Result, anyhow, bail};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Utc};
use sqlx::Row;

/// User account record
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    /// Pending-reset flag: the user must change their password before doing anything else.
    pub must_change_password: bool,
    pub date_joined: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
    /// Names of the groups this user belongs to
    pub groups: Vec<String>,
}

impl User {
    /// First and last name joined with a space, trimmed.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    /// Full name if set, otherwise the username.
    pub fn display_name(&self) -> String {
        let full = self.full_name();
        if full.is_empty() {
            self.username.clone()
        } else {
            full
        }
    }

    pub fn in_group(&self, name: &str) -> bool {
        self.groups.iter().any(|g| g == name)
    }

    /// Whether the user may open the admin site.
    pub fn can_access_admin(&self) -> bool {
        self.is_active && (self.is_staff || self.is_superuser)
    }
}

/// Fields for a new account.
///
/// New accounts start with the pending-reset flag set.
#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub password: &'a str,
    pub email: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub must_change_password: bool,
}

impl<'a> NewUser<'a> {
    pub fn new(username: &'a str, password: &'a str) -> Self {
        Self {
            username,
            password,
            email: "",
            first_name: "",
            last_name: "",
            is_staff: false,
            is_superuser: false,
            must_change_password: true,
        }
    }
}

/// Account flags editable from the admin site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserFlags {
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub must_change_password: bool,
}

/// One edit submitted from the admin site.
#[derive(Debug, Clone)]
pub struct UserEdit<'a> {
    pub flags: UserFlags,
    /// Desired membership per group name.
    pub groups: Vec<(&'a str, bool)>,
    /// New password, if it is being reset.
    pub new_password: Option<&'a str>,
}

/// Database-backed storage for users and groups.
pub struct UserStore {
    pool: DbPool,
}

impl UserStore {
    /// Create a new UserStore using the given database pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Hash a password using Argon2id.
    pub fn hash_password(password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| anyhow!("Failed to hash password: {e}"))?;
        Ok(hash.to_string())
    }

    /// Verify a password against a stored hash.
    pub fn verify_password(password: &str, hash: &str) -> bool {
        let parsed_hash = match PasswordHash::new(hash) {
            Ok(h) => h,
            Err(_) => return false,
        };
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    }

    /// Create a new user and return the stored record.
    pub async fn create_user(&self, new: &NewUser<'_>) -> Result<User> {
        let username = new.username.trim();
        if username.is_empty() {
            bail!("Username must not be empty");
        }
        if self.get_user_by_username(username).await?.is_some() {
            bail!("A user with that username already exists: {username}");
        }

        let password_hash = Self::hash_password(new.password)?;
        let now = to_db_timestamp(Utc::now());

        let id: i64 = sqlx::query_scalar(sql::INSERT_USER)
            .bind(username)
            .bind(&password_hash)
            .bind(new.email.trim())
            .bind(new.first_name.trim())
            .bind(new.last_name.trim())
            .bind(1_i64)
            .bind(i64::from(new.is_staff || new.is_superuser))
            .bind(i64::from(new.is_superuser))
            .bind(i64::from(new.must_change_password))
            .bind(&now)
            .fetch_one(&self.pool)
            .await
            .context("Failed to create user")?;

        self.get_user(id)
            .await?
            .ok_or_else(|| anyhow!("User {id} vanished after insert"))
    }

    /// Get a user by id.
    pub async fn get_user(&self, id: i64) -> Result<Option<User>> {
        let row = sqlx::query(&sql::select_user_by_id())
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to query user")?;

        match row {
            Some(row) => Ok(Some(self.user_from_row(&row).await?)),
            None => Ok(None),
        }
    }

    /// Get a user by username.
    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let row = sqlx::query(&sql::select_user_by_username())
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to query user")?;

        match row {
            Some(row) => Ok(Some(self.user_from_row(&row).await?)),
            None => Ok(None),
        }
    }

    /// List all users ordered by username.
    pub async fn list_users(&self) -> Result<Vec<User>> {
        let rows = sqlx::query(&sql::select_all_users())
            .fetch_all(&self.pool)
            .await
            .context("Failed to list users")?;
        self.users_from_rows(rows).await
    }

    /// List all superusers ordered by username.
    pub async fn list_superusers(&self) -> Result<Vec<User>> {
        let rows = sqlx::query(&sql::select_superusers())
            .fetch_all(&self.pool)
            .await
            .context("Failed to list superusers")?;
        self.users_from_rows(rows).await
    }

    /// Check credentials. Returns the user only if the password matches and
    /// the account is active.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<Option<User>> {
        let user = match self.get_user_by_username(username).await? {
            Some(u) => u,
            None => {
                // Keep the response time close to the found-user path
                let _ = Self::hash_password(password);
                return Ok(None);
            }
        };

        if !user.is_active || !Self::verify_password(password, &user.password_hash) {
            return Ok(None);
        }

        Ok(Some(user))
    }

    /// Replace a user's password and set the pending-reset flag to `must_change`.
    ///
    /// Returns the updated record (with the new hash).
    pub async fn set_password(&self, id: i64, new_password: &str, must_change: bool) -> Result<User> {
        let password_hash = Self::hash_password(new_password)?;

        let result = sqlx::query(sql::UPDATE_USER_PASSWORD)
            .bind(&password_hash)
            .bind(i64::from(must_change))
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to update password")?;

        if result.rows_affected() == 0 {
            bail!("User not found: {id}");
        }

        self.get_user(id)
            .await?
            .ok_or_else(|| anyhow!("User not found: {id}"))
    }

    /// Apply an admin-site edit: flags, group membership and an optional
    /// password reset, all in one transaction.
    pub async fn apply_edit(&self, id: i64, edit: &UserEdit<'_>) -> Result<()> {
        let password_hash = edit.new_password.map(Self::hash_password).transpose()?;
        let mut tx = self.pool.begin().await.context("Failed to start transaction")?;

        let result = sqlx::query(sql::UPDATE_USER_FLAGS)
            .bind(i64::from(edit.flags.is_active))
            .bind(i64::from(edit.flags.is_staff || edit.flags.is_superuser))
            .bind(i64::from(edit.flags.is_superuser))
            .bind(i64::from(edit.flags.must_change_password))
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to update user flags")?;

        if result.rows_affected() == 0 {
            bail!("User not found: {id}");
        }

        for &(group, member) in &edit.groups {
            let group_id: Option<i64> = sqlx::query_scalar(sql::SELECT_GROUP_ID)
                .bind(group)
                .fetch_optional(&mut *tx)
                .await
                .context("Failed to query group")?;
            let Some(group_id) = group_id else {
                bail!("Group not found: {group}");
            };

            let query = if member {
                sql::INSERT_USER_GROUP
            } else {
                sql::DELETE_USER_GROUP
            };
            sqlx::query(query)
                .bind(id)
                .bind(group_id)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("Failed to update membership of {group}"))?;
        }

        if let Some(password_hash) = &password_hash {
            sqlx::query(sql::UPDATE_USER_PASSWORD)
                .bind(password_hash)
                .bind(i64::from(edit.flags.must_change_password))
                .bind(id)
                .execute(&mut *tx)
                .await
                .context("Failed to update password")?;
        }

        tx.commit().await.context("Failed to commit user edit")?;
        Ok(())
    }

    /// Record a successful login.
    pub async fn record_login(&self, id: i64) -> Result<()> {
        sqlx::query(sql::UPDATE_USER_LAST_LOGIN)
            .bind(to_db_timestamp(Utc::now()))
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to update last login")?;
        Ok(())
    }

    /// Look up a group id by name.
    pub async fn group_id(&self, name: &str) -> Result<Option<i64>> {
        sqlx::query_scalar(sql::SELECT_GROUP_ID)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to query group")
    }

    /// Create a group if it does not exist and return its id.
    pub async fn ensure_group(&self, name: &str) -> Result<i64> {
        sqlx::query(sql::INSERT_GROUP)
            .bind(name)
            .execute(&self.pool)
            .await
            .context("Failed to create group")?;

        self.group_id(name)
            .await?
            .ok_or_else(|| anyhow!("Group {name} missing after insert"))
    }

    /// Add a user to a group. Returns false if the group does not exist.
    pub async fn add_to_group(&self, user_id: i64, group: &str) -> Result<bool> {
        let Some(group_id) = self.group_id(group).await? else {
            return Ok(false);
        };

        sqlx::query(sql::INSERT_USER_GROUP)
            .bind(user_id)
            .bind(group_id)
            .execute(&self.pool)
            .await
            .context("Failed to add user to group")?;
        Ok(true)
    }

    /// Remove a user from a group. Returns false if the group does not exist.
    pub async fn remove_from_group(&self, user_id: i64, group: &str) -> Result<bool> {
        let Some(group_id) = self.group_id(group).await? else {
            return Ok(false);
        };

        sqlx::query(sql::DELETE_USER_GROUP)
            .bind(user_id)
            .bind(group_id)
            .execute(&self.pool)
            .await
            .context("Failed to remove user from group")?;
        Ok(true)
    }

    /// Members of a group, ordered by username.
    pub async fn group_members(&self, group: &str) -> Result<Vec<User>> {
        let ids: Vec<i64> = sqlx::query_scalar(sql::SELECT_GROUP_MEMBER_IDS)
            .bind(group)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list group members")?;

        let mut members = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(user) = self.get_user(id).await? {
                members.push(user);
            }
        }
        Ok(members)
    }

    async fn group_names(&self, user_id: i64) -> Result<Vec<String>> {
        sqlx::query_scalar(sql::SELECT_USER_GROUP_NAMES)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to load user groups")
    }

    async fn users_from_rows(&self, rows: Vec<DbRow>) -> Result<Vec<User>> {
        let mut users = Vec::with_capacity(rows.len());
        for row in &rows {
            users.push(self.user_from_row(row).await?);
        }
        Ok(users)
    }

    async fn user_from_row(&self, row: &DbRow) -> Result<User> {
        let id: i64 = row.try_get("id")?;
        let last_login: Option<String> = row.try_get("last_login")?;
        let date_joined: String = row.try_get("date_joined")?;

        Ok(User {
            id,
            username: row.try_get("username")?,
            password_hash: row.try_get("password_hash")?,
            email: row.try_get("email")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            is_active: row.try_get::<i64, _>("is_active")? != 0,
            is_staff: row.try_get::<i64, _>("is_staff")? != 0,
            is_superuser: row.try_get::<i64, _>("is_superuser")? != 0,
            must_change_password: row.try_get::<i64, _>("must_change_password")? != 0,
            date_joined: from_db_timestamp(&date_joined)?,
            last_login: last_login.as_deref().map(from_db_timestamp).transpose()?,
            groups: self.group_names(id).await?,
        })
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::db::Database;
    use tempfile::TempDir;

    async fn store() -> (TempDir, UserStore) {
        let temp = TempDir::new().unwrap();
        let db = Database::new(&DatabaseConfig::default(), temp.path())
            .await
            .unwrap();
        (temp, UserStore::new(db.pool()))
    }

    #[test]
    fn test_password_hashing() {
        let password = "test_password_123";
        let hash = UserStore::hash_password(password).unwrap();

        assert_ne!(hash, password);
        assert!(UserStore::verify_password(password, &hash));
        assert!(!UserStore::verify_password("wrong_password", &hash));
        assert!(!UserStore::verify_password(password, "not-a-phc-string"));
    }

    #[tokio::test]
    async fn test_new_user_must_change_password() {
        let (_temp, store) = store().await;
        let user = store
            .create_user(&NewUser::new("alice", "s3cret-pass"))
            .await
            .unwrap();

        assert!(user.must_change_password);
        assert!(user.is_active);
        assert!(!user.is_staff);
        assert!(user.groups.is_empty());
        assert!(user.last_login.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username_rejected() {
        let (_temp, store) = store().await;
        store.create_user(&NewUser::new("bob", "pw-one-1")).await.unwrap();
        assert!(store.create_user(&NewUser::new("bob", "pw-two-2")).await.is_err());
    }

    #[tokio::test]
    async fn test_superuser_is_staff() {
        let (_temp, store) = store().await;
        let new = NewUser {
            is_superuser: true,
            ..NewUser::new("root", "pw")
        };
        let user = store.create_user(&new).await.unwrap();
        assert!(user.is_superuser);
        assert!(user.is_staff);
        assert!(user.can_access_admin());
    }

    #[tokio::test]
    async fn test_authenticate() {
        let (_temp, store) = store().await;
        let user = store
            .create_user(&NewUser::new("carol", "correct-horse"))
            .await
            .unwrap();

        assert!(store.authenticate("carol", "correct-horse").await.unwrap().is_some());
        assert!(store.authenticate("carol", "wrong").await.unwrap().is_none());
        assert!(store.authenticate("nobody", "correct-horse").await.unwrap().is_none());

        let edit = UserEdit {
            flags: UserFlags {
                is_active: false,
                is_staff: false,
                is_superuser: false,
                must_change_password: true,
            },
            groups: Vec::new(),
            new_password: None,
        };
        store.apply_edit(user.id, &edit).await.unwrap();
        assert!(store.authenticate("carol", "correct-horse").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_edit_leaves_user_untouched() {
        let (_temp, store) = store().await;
        let user = store.create_user(&NewUser::new("hank", "old-password")).await.unwrap();
        store.add_to_group(user.id, "session_viewers").await.unwrap();

        // The unknown group aborts the edit after flags and the first group were written
        let edit = UserEdit {
            flags: UserFlags {
                is_active: false,
                is_staff: true,
                is_superuser: false,
                must_change_password: false,
            },
            groups: vec![("session_viewers", false), ("no_such_group", true)],
            new_password: Some("new-password"),
        };
        assert!(store.apply_edit(user.id, &edit).await.is_err());

        let reloaded = store.get_user(user.id).await.unwrap().unwrap();
        assert!(reloaded.is_active);
        assert!(!reloaded.is_staff);
        assert!(reloaded.must_change_password);
        assert_eq!(reloaded.groups, vec!["session_viewers"]);
        assert_eq!(reloaded.password_hash, user.password_hash);

        let edit = UserEdit {
            groups: vec![("session_viewers", false), ("annotation_users", true)],
            ..edit
        };
        store.apply_edit(user.id, &edit).await.unwrap();
        let reloaded = store.get_user(user.id).await.unwrap().unwrap();
        assert!(!reloaded.is_active);
        assert!(reloaded.is_staff);
        assert_eq!(reloaded.groups, vec!["annotation_users"]);
        assert!(UserStore::verify_password("new-password", &reloaded.password_hash));

        let missing = UserEdit { new_password: None, ..edit };
        assert!(store.apply_edit(9999, &missing).await.is_err());
    }

    #[tokio::test]
    async fn test_set_password_clears_flag() {
        let (_temp, store) = store().await;
        let user = store.create_user(&NewUser::new("dave", "old-password")).await.unwrap();

        let updated = store.set_password(user.id, "new-password", false).await.unwrap();
        assert!(!updated.must_change_password);
        assert_ne!(updated.password_hash, user.password_hash);
        assert!(UserStore::verify_password("new-password", &updated.password_hash));

        assert!(store.set_password(9999, "x", false).await.is_err());
    }

    #[tokio::test]
    async fn test_group_membership() {
        let (_temp, store) = store().await;
        let user = store.create_user(&NewUser::new("erin", "pw")).await.unwrap();

        assert!(store.add_to_group(user.id, "session_viewers").await.unwrap());
        // Adding twice is harmless
        assert!(store.add_to_group(user.id, "session_viewers").await.unwrap());
        assert!(!store.add_to_group(user.id, "no_such_group").await.unwrap());

        let reloaded = store.get_user(user.id).await.unwrap().unwrap();
        assert_eq!(reloaded.groups, vec!["session_viewers"]);
        assert!(reloaded.in_group("session_viewers"));

        let members = store.group_members("session_viewers").await.unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].username, "erin");

        assert!(store.remove_from_group(user.id, "session_viewers").await.unwrap());
        let reloaded = store.get_user(user.id).await.unwrap().unwrap();
        assert!(reloaded.groups.is_empty());
    }

    #[tokio::test]
    async fn test_record_login_and_display_name() {
        let (_temp, store) = store().await;
        let new = NewUser {
            first_name: "Frank",
            last_name: "Ocean",
            ..NewUser::new("frank", "pw")
        };
        let user = store.create_user(&new).await.unwrap();
        assert_eq!(user.display_name(), "Frank Ocean");

        store.record_login(user.id).await.unwrap();
        let reloaded = store.get_user(user.id).await.unwrap().unwrap();
        assert!(reloaded.last_login.is_some());

        let plain = store.create_user(&NewUser::new("gina", "pw")).await.unwrap();
        assert_eq!(plain.display_name(), "gina");
    }
}
