//! Profile repository contract and SQLite implementation.

use crate::model::profile::{AuthProvider, UserProfile};
use crate::repo::{RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};

const PROFILE_SELECT_SQL: &str = "SELECT
    uid,
    name,
    email,
    photo_url,
    provider,
    created_at,
    updated_at
FROM profiles";

/// Repository interface for per-identity profile records.
pub trait ProfileRepository {
    /// Writes the whole record, replacing any existing profile for the uid.
    fn set_profile(&self, profile: &UserProfile) -> RepoResult<()>;
    fn get_profile(&self, uid: &str) -> RepoResult<Option<UserProfile>>;
    /// Updates mutable fields of an existing profile and stamps `updated_at`.
    fn update_profile(&self, profile: &UserProfile) -> RepoResult<()>;
    /// Returns whether a record was removed.
    fn delete_profile(&self, uid: &str) -> RepoResult<bool>;
}

pub struct SqliteProfileRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteProfileRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl ProfileRepository for SqliteProfileRepository<'_> {
    fn set_profile(&self, profile: &UserProfile) -> RepoResult<()> {
        profile.validate()?;

        self.conn.execute(
            "INSERT OR REPLACE INTO profiles (
                uid,
                name,
                email,
                photo_url,
                provider
            ) VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                profile.uid.as_str(),
                profile.name.as_str(),
                profile.email.as_str(),
                profile.photo_url.as_deref(),
                profile.provider.as_str(),
            ],
        )?;
        Ok(())
    }

    fn get_profile(&self, uid: &str) -> RepoResult<Option<UserProfile>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PROFILE_SELECT_SQL} WHERE uid = ?1;"))?;
        let raw = stmt.query_row([uid], raw_profile_row).optional()?;
        raw.map(RawProfileRow::into_profile).transpose()
    }

    fn update_profile(&self, profile: &UserProfile) -> RepoResult<()> {
        profile.validate()?;

        let changed = self.conn.execute(
            "UPDATE profiles
             SET
                name = ?1,
                email = ?2,
                photo_url = ?3,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uid = ?4;",
            params![
                profile.name.as_str(),
                profile.email.as_str(),
                profile.photo_url.as_deref(),
                profile.uid.as_str(),
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::ProfileNotFound(profile.uid.clone()));
        }
        Ok(())
    }

    fn delete_profile(&self, uid: &str) -> RepoResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM profiles WHERE uid = ?1;", [uid])?;
        Ok(changed > 0)
    }
}

struct RawProfileRow {
    uid: String,
    name: String,
    email: String,
    photo_url: Option<String>,
    provider: String,
    created_at: i64,
    updated_at: i64,
}

impl RawProfileRow {
    fn into_profile(self) -> RepoResult<UserProfile> {
        let provider = AuthProvider::parse(&self.provider).ok_or_else(|| {
            RepoError::InvalidData(format!(
                "invalid provider `{}` in profiles.provider",
                self.provider
            ))
        })?;

        let profile = UserProfile {
            uid: self.uid,
            name: self.name,
            email: self.email,
            photo_url: self.photo_url,
            provider,
            created_at: self.created_at,
            updated_at: self.updated_at,
        };
        profile.validate()?;
        Ok(profile)
    }
}

fn raw_profile_row(row: &Row<'_>) -> rusqlite::Result<RawProfileRow> {
    Ok(RawProfileRow {
        uid: row.get("uid")?,
        name: row.get("name")?,
        email: row.get("email")?,
        photo_url: row.get("photo_url")?,
        provider: row.get("provider")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
