use crate::models::{DonationRow, MessageRow, PreferencesRow, UserRow};
use crate::Database;
use anyhow::Result;
use rusqlite::{Connection, Row};
use uuid::Uuid;

use circle_types::models::{Donation, DonationStatus, Message, Preferences, Role, User, Viewer};

const DONATION_COLUMNS: &str = "id, donor_id, donor_name, volunteer_id, title, description, kind, status, location, image_url, created_at";

impl Database {
    // -- Users --

    /// Insert the account together with its first session. Returns false,
    /// writing nothing, when the email is already registered.
    pub fn create_user(&self, user: &User, password_hash: &str, session_id: Uuid) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let taken: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)",
                [&user.email],
                |row| row.get(0),
            )?;
            if taken {
                return Ok(false);
            }

            tx.execute(
                "INSERT INTO users (id, name, email, password, role, avatar_url) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    user.id.to_string(),
                    user.name,
                    user.email,
                    password_hash,
                    user.role.as_str(),
                    user.avatar_url,
                ],
            )?;
            tx.execute(
                "INSERT INTO sessions (id, user_id) VALUES (?1, ?2)",
                (session_id.to_string(), user.id.to_string()),
            )?;

            tx.commit()?;
            Ok(true)
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, email, password, role, avatar_url FROM users WHERE email = ?1",
            )?;
            let row = stmt.query_row([email], user_row).optional()?;
            Ok(row)
        })
    }

    // -- Sessions --

    pub fn create_session(&self, session_id: Uuid, user_id: Uuid) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO sessions (id, user_id) VALUES (?1, ?2)",
                (session_id.to_string(), user_id.to_string()),
            )?;
            Ok(())
        })
    }

    /// The user behind a live session, or `None` once it has been logged out.
    pub fn get_session_user(&self, session_id: Uuid) -> Result<Option<User>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.id, u.name, u.email, u.password, u.role, u.avatar_url
                 FROM sessions s
                 JOIN users u ON s.user_id = u.id
                 WHERE s.id = ?1",
            )?;
            stmt.query_row([session_id.to_string()], user_row)
                .optional()?
                .map(UserRow::into_user)
                .transpose()
        })
    }

    /// Returns false if the session was already gone.
    pub fn delete_session(&self, session_id: Uuid) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute("DELETE FROM sessions WHERE id = ?1", [session_id.to_string()])?;
            Ok(n > 0)
        })
    }

    // -- Donations --

    pub fn insert_donation(&self, d: &Donation) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                &format!(
                    "INSERT INTO donations ({DONATION_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
                ),
                rusqlite::params![
                    d.id.to_string(),
                    d.donor_id.to_string(),
                    d.donor_name,
                    d.volunteer_id.map(|v| v.to_string()),
                    d.title,
                    d.description,
                    d.kind.as_str(),
                    d.status.as_str(),
                    d.location,
                    d.image_url,
                    d.created_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_donation(&self, id: Uuid) -> Result<Option<Donation>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {DONATION_COLUMNS} FROM donations WHERE id = ?1"))?;
            stmt.query_row([id.to_string()], donation_row)
                .optional()?
                .map(DonationRow::into_donation)
                .transpose()
        })
    }

    /// Every record `viewer` may see on a dashboard, newest first.
    pub fn list_donations_for(&self, viewer: &Viewer) -> Result<Vec<Donation>> {
        self.with_conn(|conn| query_donations_for(conn, viewer))
    }

    /// Conditional status write. Only succeeds while the record is still in
    /// `from`; status and volunteer change in one statement. Returns false when
    /// the record moved on (or does not exist).
    pub fn transition_donation(
        &self,
        id: Uuid,
        from: DonationStatus,
        to: DonationStatus,
        volunteer_id: Option<Uuid>,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE donations
                 SET status = ?1, volunteer_id = COALESCE(?2, volunteer_id)
                 WHERE id = ?3 AND status = ?4",
                rusqlite::params![
                    to.as_str(),
                    volunteer_id.map(|v| v.to_string()),
                    id.to_string(),
                    from.as_str(),
                ],
            )?;
            Ok(n == 1)
        })
    }

    // -- Messages --

    pub fn insert_message(&self, m: &Message) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO messages (id, donation_id, sender_id, text, timestamp) VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    m.id.to_string(),
                    m.donation_id.to_string(),
                    m.sender_id.to_string(),
                    m.text,
                    m.timestamp,
                ],
            )?;
            Ok(())
        })
    }

    /// The whole thread, oldest first; equal timestamps keep insertion order.
    pub fn get_messages(&self, donation_id: Uuid) -> Result<Vec<Message>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, donation_id, sender_id, text, timestamp
                 FROM messages
                 WHERE donation_id = ?1
                 ORDER BY timestamp ASC, rowid ASC",
            )?;

            let rows = stmt
                .query_map([donation_id.to_string()], |row| {
                    Ok(MessageRow {
                        id: row.get(0)?,
                        donation_id: row.get(1)?,
                        sender_id: row.get(2)?,
                        text: row.get(3)?,
                        timestamp: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.into_iter().map(MessageRow::into_message).collect()
        })
    }

    // -- Preferences --

    /// Stored preferences, or the defaults for a user who never set any.
    pub fn get_preferences(&self, user_id: Uuid) -> Result<Preferences> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT theme, initial_view FROM preferences WHERE user_id = ?1",
                    [user_id.to_string()],
                    |row| {
                        Ok(PreferencesRow {
                            theme: row.get(0)?,
                            initial_view: row.get(1)?,
                        })
                    },
                )
                .optional()?;

            match row {
                Some(row) => row.into_preferences(),
                None => Ok(Preferences::default()),
            }
        })
    }

    pub fn set_preferences(&self, user_id: Uuid, prefs: &Preferences) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO preferences (user_id, theme, initial_view) VALUES (?1, ?2, ?3)
                 ON CONFLICT(user_id) DO UPDATE SET theme = excluded.theme, initial_view = excluded.initial_view",
                (user_id.to_string(), prefs.theme.as_str(), prefs.initial_view.as_str()),
            )?;
            Ok(())
        })
    }
}

fn user_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        role: row.get(4)?,
        avatar_url: row.get(5)?,
    })
}

fn donation_row(row: &Row<'_>) -> rusqlite::Result<DonationRow> {
    Ok(DonationRow {
        id: row.get(0)?,
        donor_id: row.get(1)?,
        donor_name: row.get(2)?,
        volunteer_id: row.get(3)?,
        title: row.get(4)?,
        description: row.get(5)?,
        kind: row.get(6)?,
        status: row.get(7)?,
        location: row.get(8)?,
        image_url: row.get(9)?,
        created_at: row.get(10)?,
    })
}

fn query_donations_for(conn: &Connection, viewer: &Viewer) -> Result<Vec<Donation>> {
    let filter = match viewer.role {
        Role::Donor => "donor_id = ?1",
        Role::Volunteer => "(status = 'AVAILABLE' OR volunteer_id = ?1)",
    };
    let mut stmt = conn.prepare(&format!(
        "SELECT {DONATION_COLUMNS} FROM donations WHERE {filter} ORDER BY created_at DESC, id ASC"
    ))?;

    let rows = stmt
        .query_map([viewer.id.to_string()], donation_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter().map(DonationRow::into_donation).collect()
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
