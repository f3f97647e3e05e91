use rusqlite::Connection;

use crate::error::Result;

/// Initialise the full turn-resolution schema in `conn`.
///
/// Safe to call on every startup — every statement is `IF NOT EXISTS`. This
/// is the source of truth the DESIGN NOTES call out: a host that instead
/// runs a migration file must produce an identical shape.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS actors (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            external_id   TEXT    NOT NULL UNIQUE,
            display_name  TEXT    NOT NULL,
            created_at    TEXT    NOT NULL
        );

        CREATE TABLE IF NOT EXISTS campaigns (
            id                         INTEGER PRIMARY KEY AUTOINCREMENT,
            namespace                  TEXT    NOT NULL,
            name_normalized            TEXT    NOT NULL,
            summary                    TEXT    NOT NULL DEFAULT '',
            state_json                 TEXT    NOT NULL DEFAULT '{}',
            characters_json            TEXT    NOT NULL DEFAULT '{}',
            last_narration             TEXT    NOT NULL DEFAULT '',
            memory_visible_max_turn_id INTEGER,
            row_version                INTEGER NOT NULL DEFAULT 1,
            created_at                 TEXT    NOT NULL,
            updated_at                 TEXT    NOT NULL,
            UNIQUE(namespace, name_normalized)
        );

        CREATE TABLE IF NOT EXISTS sessions (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            campaign_id INTEGER NOT NULL REFERENCES campaigns(id),
            surface_key TEXT    NOT NULL UNIQUE,
            created_at  TEXT    NOT NULL
        );

        CREATE TABLE IF NOT EXISTS players (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            campaign_id     INTEGER NOT NULL REFERENCES campaigns(id),
            actor_id        INTEGER NOT NULL REFERENCES actors(id),
            level           INTEGER NOT NULL DEFAULT 1,
            xp              INTEGER NOT NULL DEFAULT 0,
            attributes_json TEXT    NOT NULL DEFAULT '{}',
            state_json      TEXT    NOT NULL DEFAULT '{}',
            created_at      TEXT    NOT NULL,
            updated_at      TEXT    NOT NULL,
            UNIQUE(campaign_id, actor_id)
        );

        CREATE TABLE IF NOT EXISTS turns (
            id                        INTEGER PRIMARY KEY AUTOINCREMENT,
            campaign_id               INTEGER NOT NULL REFERENCES campaigns(id),
            kind                      TEXT    NOT NULL,
            content                   TEXT    NOT NULL,
            external_message_id      TEXT,
            external_user_message_id TEXT,
            created_at                TEXT    NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_turns_campaign_turn
            ON turns(campaign_id, id DESC);
        CREATE INDEX IF NOT EXISTS idx_turns_external_message
            ON turns(campaign_id, external_message_id);

        CREATE TABLE IF NOT EXISTS snapshots (
            id                 INTEGER PRIMARY KEY AUTOINCREMENT,
            campaign_id        INTEGER NOT NULL REFERENCES campaigns(id),
            turn_id            INTEGER NOT NULL UNIQUE REFERENCES turns(id),
            campaign_state_json TEXT   NOT NULL,
            characters_json    TEXT    NOT NULL,
            summary            TEXT    NOT NULL,
            last_narration     TEXT    NOT NULL,
            players_json       TEXT    NOT NULL,
            created_at         TEXT    NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_snapshots_campaign_turn
            ON snapshots(campaign_id, turn_id DESC);

        CREATE TABLE IF NOT EXISTS timers (
            id                INTEGER PRIMARY KEY AUTOINCREMENT,
            campaign_id       INTEGER NOT NULL REFERENCES campaigns(id),
            status            TEXT    NOT NULL
                CHECK (status IN
                    ('scheduled_unbound','scheduled_bound','cancelled','expired','consumed')),
            event_text        TEXT    NOT NULL,
            interruptible     INTEGER NOT NULL DEFAULT 0,
            interrupt_action  TEXT,
            due_at            TEXT    NOT NULL,
            message_id        TEXT,
            channel_id        TEXT,
            thread_id         TEXT,
            created_at        TEXT    NOT NULL,
            updated_at        TEXT    NOT NULL
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_timers_one_active_per_campaign
            ON timers(campaign_id)
            WHERE status IN ('scheduled_unbound','scheduled_bound');
        CREATE INDEX IF NOT EXISTS idx_timers_campaign_status_due
            ON timers(campaign_id, status, due_at);

        CREATE TABLE IF NOT EXISTS inflight_turns (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            campaign_id  INTEGER NOT NULL REFERENCES campaigns(id),
            actor_id     INTEGER NOT NULL REFERENCES actors(id),
            claim_token  TEXT    NOT NULL,
            claimed_at   TEXT    NOT NULL,
            heartbeat_at TEXT    NOT NULL,
            expires_at   TEXT    NOT NULL,
            UNIQUE(campaign_id, actor_id)
        );
        CREATE INDEX IF NOT EXISTS idx_inflight_expires
            ON inflight_turns(expires_at);

        CREATE TABLE IF NOT EXISTS embeddings (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            campaign_id INTEGER NOT NULL REFERENCES campaigns(id),
            turn_id     INTEGER NOT NULL UNIQUE REFERENCES turns(id),
            vector_blob BLOB    NOT NULL,
            created_at  TEXT    NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_embeddings_campaign
            ON embeddings(campaign_id);

        CREATE TABLE IF NOT EXISTS media_refs (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            campaign_id   INTEGER NOT NULL REFERENCES campaigns(id),
            room_key      TEXT,
            player_id     INTEGER REFERENCES players(id),
            media_uri     TEXT    NOT NULL,
            created_at    TEXT    NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_media_refs_campaign
            ON media_refs(campaign_id);

        CREATE TABLE IF NOT EXISTS outbox_events (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            campaign_id     INTEGER NOT NULL REFERENCES campaigns(id),
            session_scope   TEXT    NOT NULL,
            event_type      TEXT    NOT NULL,
            idempotency_key TEXT    NOT NULL,
            payload_json    TEXT    NOT NULL,
            status          TEXT    NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending','sent','failed')),
            attempts        INTEGER NOT NULL DEFAULT 0,
            next_attempt_at TEXT,
            created_at      TEXT    NOT NULL,
            updated_at      TEXT    NOT NULL,
            UNIQUE(campaign_id, session_scope, event_type, idempotency_key)
        );
        CREATE INDEX IF NOT EXISTS idx_outbox_status_next_attempt
            ON outbox_events(status, next_attempt_at, created_at);
        ",
    )?;
    Ok(())
}
