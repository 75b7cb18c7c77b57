use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY,
            name        TEXT NOT NULL,
            email       TEXT NOT NULL UNIQUE,
            password    TEXT NOT NULL,
            role        TEXT NOT NULL CHECK (role IN ('DONOR', 'VOLUNTEER')),
            avatar_url  TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS sessions (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL REFERENCES users(id),
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS donations (
            id              TEXT PRIMARY KEY,
            donor_id        TEXT NOT NULL REFERENCES users(id),
            donor_name      TEXT NOT NULL,
            volunteer_id    TEXT REFERENCES users(id),
            title           TEXT NOT NULL,
            description     TEXT NOT NULL,
            kind            TEXT NOT NULL CHECK (kind IN ('FOOD', 'CLOTHES')),
            status          TEXT NOT NULL
                CHECK (status IN ('AVAILABLE', 'PICKED_UP', 'DELIVERED', 'CANCELLED')),
            location        TEXT NOT NULL,
            image_url       TEXT NOT NULL,
            created_at      INTEGER NOT NULL,
            -- a volunteer is bound exactly while picked up or delivered
            CHECK ((volunteer_id IS NOT NULL) = (status IN ('PICKED_UP', 'DELIVERED')))
        );

        CREATE INDEX IF NOT EXISTS idx_donations_donor
            ON donations(donor_id, created_at);

        CREATE INDEX IF NOT EXISTS idx_donations_status
            ON donations(status, created_at);

        CREATE INDEX IF NOT EXISTS idx_donations_volunteer
            ON donations(volunteer_id, created_at);

        CREATE TABLE IF NOT EXISTS messages (
            id              TEXT PRIMARY KEY,
            donation_id     TEXT NOT NULL REFERENCES donations(id),
            sender_id       TEXT NOT NULL REFERENCES users(id),
            text            TEXT NOT NULL,
            timestamp       INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_donation
            ON messages(donation_id, timestamp);

        CREATE TABLE IF NOT EXISTS preferences (
            user_id         TEXT PRIMARY KEY REFERENCES users(id),
            theme           TEXT NOT NULL,
            initial_view    TEXT NOT NULL
        );
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
