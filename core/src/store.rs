//! SQLite persistence layer.
//!
//! RULE: Only store.rs talks to the database.
//! The orchestrator hands its events over; nothing else executes SQL.

use rusqlite::{Connection, OptionalExtension, params};
use crate::{
    error::SimResult,
    event::EventLogEntry,
    types::{Ascension, CharacterClass, Floor},
};

pub struct SimStore {
    conn: Connection,
}

impl SimStore {
    /// Open (or create) the generation database at `path`.
    pub fn open(path: &str) -> SimResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> SimResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> SimResult<()> {
        self.conn.execute_batch(include_str!("../../migrations/001_foundation.sql"))?;
        Ok(())
    }

    // ── Run ────────────────────────────────────────────────────

    pub fn insert_run(
        &self,
        run_id: &str,
        seed: i64,
        character: CharacterClass,
        ascension: Ascension,
        version: &str,
        started_at: &str,
    ) -> SimResult<()> {
        self.conn.execute(
            "INSERT INTO run (run_id, seed, character, ascension, version, started_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![run_id, seed, character.name(), ascension as i64, version, started_at],
        )?;
        Ok(())
    }

    // ── Event log ──────────────────────────────────────────────

    pub fn append_event(&self, entry: &EventLogEntry) -> SimResult<()> {
        self.conn.execute(
            "INSERT INTO event_log (run_id, floor, source, event_type, payload)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.run_id,
                entry.floor as i64,
                entry.source,
                entry.event_type,
                entry.payload,
            ],
        )?;
        Ok(())
    }

    pub fn events_for_floor(&self, run_id: &str, floor: Floor) -> SimResult<Vec<EventLogEntry>> {
        self.query_events(
            "SELECT id, run_id, floor, source, event_type, payload
             FROM event_log WHERE run_id = ?1 AND floor = ?2
             ORDER BY id ASC",
            params![run_id, floor as i64],
        )
    }

    pub fn events_for_run(&self, run_id: &str) -> SimResult<Vec<EventLogEntry>> {
        self.query_events(
            "SELECT id, run_id, floor, source, event_type, payload
             FROM event_log WHERE run_id = ?1
             ORDER BY id ASC",
            params![run_id],
        )
    }

    fn query_events(&self, sql: &str, args: impl rusqlite::Params) -> SimResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(sql)?;
        let entries = stmt.query_map(args, |row| {
            Ok(EventLogEntry {
                id:         Some(row.get(0)?),
                run_id:     row.get(1)?,
                floor:      row.get::<_, i64>(2)? as Floor,
                source:     row.get(3)?,
                event_type: row.get(4)?,
                payload:    row.get(5)?,
            })
        })?.collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    // ── Snapshot ───────────────────────────────────────────────

    pub fn save_snapshot(&self, run_id: &str, floor: Floor, state_json: &str) -> SimResult<()> {
        self.conn.execute(
            "INSERT INTO snapshot (run_id, floor, state_json) VALUES (?1, ?2, ?3)",
            params![run_id, floor as i64, state_json],
        )?;
        Ok(())
    }

    /// Newest snapshot taken at or before `floor`.
    pub fn latest_snapshot_before(
        &self, run_id: &str, floor: Floor
    ) -> SimResult<Option<(Floor, String)>> {
        let mut stmt = self.conn.prepare(
            "SELECT floor, state_json FROM snapshot
             WHERE run_id = ?1 AND floor <= ?2
             ORDER BY floor DESC, id DESC LIMIT 1"
        )?;
        let result = stmt.query_row(params![run_id, floor as i64], |row| {
            Ok((row.get::<_, i64>(0)? as Floor, row.get::<_, String>(1)?))
        }).optional()?;
        Ok(result)
    }
}
