use rusqlite::{Connection, OptionalExtension};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::debug;

use duo_types::events::{RoomChange, RoomSnapshot};
use duo_types::models::{RoomDoc, RoomPatch};
use duo_types::mutations;

use crate::error::{StoreError, StoreResult};
use crate::{RoomStore, rules};

impl RoomStore {
    // -- Documents --

    pub fn get(&self, code: &str) -> StoreResult<Option<RoomDoc>> {
        let conn = self.lock()?;
        Ok(read_room(&conn, code)?.map(|(doc, _)| doc))
    }

    /// Create a room that must not exist yet. The caller owns seeding the
    /// membership map; collisions surface as `AlreadyExists` so room-code
    /// generation can retry with a fresh code.
    pub fn create(&self, code: &str, doc: &RoomDoc) -> StoreResult<()> {
        let conn = self.lock()?;
        if read_room(&conn, code)?.is_some() {
            return Err(StoreError::AlreadyExists);
        }
        write_room(&conn, code, doc, 1)?;
        debug!(code, "room created");
        self.publish_commit(code, 1, None, Some(doc.clone()));
        Ok(())
    }

    /// Create-or-replace — the recreation path after a concurrent delete.
    pub fn set(&self, code: &str, who: &str, doc: &RoomDoc) -> StoreResult<()> {
        let conn = self.lock()?;
        let existing = read_room(&conn, code)?;
        let version = match &existing {
            Some((current, version)) => {
                if !rules::can_write(code, current, who) {
                    return Err(StoreError::PermissionDenied);
                }
                version + 1
            }
            None => 1,
        };
        write_room(&conn, code, doc, version)?;
        self.publish_commit(code, version, existing.map(|(d, _)| d), Some(doc.clone()));
        Ok(())
    }

    /// Merge a scalar patch over the stored document. `NotFound` when the
    /// document is gone — the caller decides whether to recreate.
    pub fn update(&self, code: &str, who: &str, patch: &RoomPatch, now_ms: i64) -> StoreResult<RoomDoc> {
        let conn = self.lock()?;
        let Some((current, version)) = read_room(&conn, code)? else {
            return Err(StoreError::NotFound);
        };
        if !rules::can_write(code, &current, who) {
            return Err(StoreError::PermissionDenied);
        }
        let mut next = current.clone();
        patch.apply(&mut next, now_ms);
        write_room(&conn, code, &next, version + 1)?;
        self.publish_commit(code, version + 1, Some(current), Some(next.clone()));
        Ok(next)
    }

    /// Transactional read-modify-write for composite fields. `f` sees the
    /// freshly read base document — never the caller's possibly stale local
    /// copy — and its result is committed atomically under the writer lock,
    /// so concurrent composite mutations serialize instead of overwriting
    /// each other.
    pub fn transact<F>(&self, code: &str, who: &str, now_ms: i64, f: F) -> StoreResult<RoomDoc>
    where
        F: FnOnce(RoomDoc) -> RoomDoc,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let Some((base, version)) = read_room(&tx, code)? else {
            return Err(StoreError::NotFound);
        };
        if !rules::can_write(code, &base, who) {
            return Err(StoreError::PermissionDenied);
        }
        let mut next = f(base.clone());
        next.updated_at = now_ms;
        write_room(&tx, code, &next, version + 1)?;
        tx.commit()?;
        self.publish_commit(code, version + 1, Some(base), Some(next.clone()));
        Ok(next)
    }

    /// Register `who` in the room's membership map. Distinguishes a bad
    /// code (`NotFound`) from a full room (`PermissionDenied`).
    pub fn join(&self, code: &str, who: &str, now_ms: i64) -> StoreResult<RoomDoc> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let Some((base, version)) = read_room(&tx, code)? else {
            return Err(StoreError::NotFound);
        };
        if !rules::can_join(&base, who) {
            return Err(StoreError::PermissionDenied);
        }
        if base.is_member(who) {
            return Ok(base);
        }
        let mut next = mutations::register_member(base.clone(), who);
        next.updated_at = now_ms;
        write_room(&tx, code, &next, version + 1)?;
        tx.commit()?;
        debug!(code, who, "participant joined");
        self.publish_commit(code, version + 1, Some(base), Some(next.clone()));
        Ok(next)
    }

    /// Administrative removal. The application itself never deletes rooms;
    /// this exists so the recreate-after-delete path is testable and so an
    /// operator can retire a room.
    pub fn delete(&self, code: &str) -> StoreResult<()> {
        let conn = self.lock()?;
        let Some((before, version)) = read_room(&conn, code)? else {
            return Err(StoreError::NotFound);
        };
        conn.execute("DELETE FROM rooms WHERE code = ?1", [code])?;
        conn.execute("DELETE FROM push_tokens WHERE room_code = ?1", [code])?;
        self.publish_commit(code, version + 1, Some(before), None);
        Ok(())
    }

    /// Open a live feed for the room. The initial snapshot and the receiver
    /// are taken under the same lock, so no commit can fall between them.
    pub fn subscribe(
        &self,
        code: &str,
        who: &str,
    ) -> StoreResult<(RoomSnapshot, broadcast::Receiver<RoomSnapshot>)> {
        let conn = self.lock()?;
        let existing = read_room(&conn, code)?;
        if !rules::can_read(code, existing.as_ref().map(|(doc, _)| doc), who) {
            return Err(StoreError::PermissionDenied);
        }
        let rx = self.hub().watch(code);
        let (doc, version) = match existing {
            Some((doc, version)) => (Some(doc), version),
            None => (None, 0),
        };
        Ok((RoomSnapshot { code: code.to_string(), version, doc }, rx))
    }

    /// Global before/after feed, for the notification watcher.
    pub fn changes(&self) -> broadcast::Receiver<RoomChange> {
        self.hub().changes()
    }

    pub fn list_codes(&self) -> StoreResult<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT code FROM rooms ORDER BY code")?;
        let codes = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(codes)
    }

    // -- Dispatcher idempotency stamps (trusted, no membership check) --

    pub fn stamp_daily_notify(&self, code: &str, date_key: &str) -> StoreResult<()> {
        self.stamp(code, |doc| doc.last_daily_notify = Some(date_key.to_string()))
    }

    pub fn stamp_j14_notify(&self, code: &str, target_key: &str) -> StoreResult<()> {
        self.stamp(code, |doc| doc.last_j14_notify = Some(target_key.to_string()))
    }

    fn stamp<F>(&self, code: &str, apply: F) -> StoreResult<()>
    where
        F: FnOnce(&mut RoomDoc),
    {
        let conn = self.lock()?;
        let Some((current, version)) = read_room(&conn, code)? else {
            return Err(StoreError::NotFound);
        };
        let mut next = current.clone();
        apply(&mut next);
        write_room(&conn, code, &next, version + 1)?;
        self.publish_commit(code, version + 1, Some(current), Some(next));
        Ok(())
    }

    // -- Push tokens --

    pub fn register_push_token(
        &self,
        code: &str,
        token: &str,
        user_agent: &str,
    ) -> StoreResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO push_tokens (room_code, token, user_agent)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (room_code, token)
             DO UPDATE SET last_seen_at = datetime('now'), user_agent = excluded.user_agent",
            rusqlite::params![code, token, user_agent],
        )?;
        Ok(())
    }

    pub fn push_tokens(&self, code: &str) -> StoreResult<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT token FROM push_tokens WHERE room_code = ?1 ORDER BY created_at")?;
        let tokens = stmt
            .query_map([code], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tokens)
    }

    /// Drop endpoints the messaging provider reported as permanently dead.
    pub fn remove_push_tokens(&self, code: &str, tokens: &[String]) -> StoreResult<()> {
        if tokens.is_empty() {
            return Ok(());
        }
        let conn = self.lock()?;
        for token in tokens {
            conn.execute(
                "DELETE FROM push_tokens WHERE room_code = ?1 AND token = ?2",
                rusqlite::params![code, token],
            )?;
        }
        Ok(())
    }

    fn publish_commit(
        &self,
        code: &str,
        version: u64,
        before: Option<RoomDoc>,
        after: Option<RoomDoc>,
    ) {
        self.hub().publish(
            RoomSnapshot { code: code.to_string(), version, doc: after.clone() },
            RoomChange { code: code.to_string(), before, after },
        );
    }
}

fn read_room(conn: &Connection, code: &str) -> StoreResult<Option<(RoomDoc, u64)>> {
    let row = conn
        .query_row("SELECT doc, version FROM rooms WHERE code = ?1", [code], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, u64>(1)?))
        })
        .optional()?;
    match row {
        Some((raw, version)) => {
            // Stored docs may predate current fields or carry legacy
            // shapes; from_value folds all of that into the canonical form.
            let value: Value = serde_json::from_str(&raw)?;
            Ok(Some((RoomDoc::from_value(&value), version)))
        }
        None => Ok(None),
    }
}

fn write_room(conn: &Connection, code: &str, doc: &RoomDoc, version: u64) -> StoreResult<()> {
    let raw = serde_json::to_string(doc)?;
    conn.execute(
        "INSERT INTO rooms (code, doc, version, updated_at)
         VALUES (?1, ?2, ?3, datetime('now'))
         ON CONFLICT (code)
         DO UPDATE SET doc = excluded.doc, version = excluded.version,
                       updated_at = excluded.updated_at",
        rusqlite::params![code, raw, version],
    )?;
    Ok(())
}
