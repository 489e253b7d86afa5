use rusqlite::Connection;
use tracing::info;

use crate::error::StoreResult;

pub fn run(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS rooms (
            code        TEXT PRIMARY KEY,
            doc         TEXT NOT NULL,
            version     INTEGER NOT NULL DEFAULT 1,
            updated_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Per-room notification endpoints (the pushTokens sub-collection).
        CREATE TABLE IF NOT EXISTS push_tokens (
            room_code     TEXT NOT NULL,
            token         TEXT NOT NULL,
            created_at    TEXT NOT NULL DEFAULT (datetime('now')),
            last_seen_at  TEXT NOT NULL DEFAULT (datetime('now')),
            user_agent    TEXT NOT NULL DEFAULT '',
            PRIMARY KEY (room_code, token)
        );

        CREATE INDEX IF NOT EXISTS idx_push_tokens_room
            ON push_tokens(room_code);
        ",
    )?;

    info!("Room store migrations complete");
    Ok(())
}
