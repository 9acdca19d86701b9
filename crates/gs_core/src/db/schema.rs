//! Embedded schema for the engine's SQLite tables.
//!
//! Tables owned by external services (contracts, rosters, playoff brackets,
//! draft classes) are not created here; those services manage their own
//! storage and are reached through the `services` traits.

/// DDL executed at every connection open. All statements are idempotent.
pub const DDL: &str = r#"
CREATE TABLE IF NOT EXISTS dynasties (
    dynasty_id      TEXT PRIMARY KEY,
    dynasty_name    TEXT NOT NULL,
    owner_name      TEXT,
    team_id         INTEGER,
    created_at      TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    last_played     TEXT,
    total_seasons   INTEGER NOT NULL DEFAULT 0,
    is_active       INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS dynasty_state (
    id                      INTEGER PRIMARY KEY AUTOINCREMENT,
    dynasty_id              TEXT NOT NULL REFERENCES dynasties(dynasty_id) ON DELETE CASCADE,
    season                  INTEGER NOT NULL,
    current_date            TEXT NOT NULL,
    current_phase           TEXT NOT NULL,
    current_week            INTEGER,
    last_simulated_game_id  TEXT,
    current_draft_pick      INTEGER NOT NULL DEFAULT 0,
    draft_in_progress       INTEGER NOT NULL DEFAULT 0,
    updated_at              TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    UNIQUE (dynasty_id, season)
);

CREATE TABLE IF NOT EXISTS events (
    event_id    TEXT PRIMARY KEY,
    event_type  TEXT NOT NULL,
    timestamp   INTEGER NOT NULL,
    game_id     TEXT NOT NULL,
    dynasty_id  TEXT NOT NULL REFERENCES dynasties(dynasty_id) ON DELETE CASCADE,
    data        TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_events_game_id ON events(game_id);
CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp);
CREATE INDEX IF NOT EXISTS idx_events_event_type ON events(event_type);
CREATE INDEX IF NOT EXISTS idx_events_dynasty_timestamp ON events(dynasty_id, timestamp);
CREATE INDEX IF NOT EXISTS idx_events_dynasty_type ON events(dynasty_id, event_type);
CREATE UNIQUE INDEX IF NOT EXISTS idx_events_dynasty_game ON events(dynasty_id, game_id);

CREATE TABLE IF NOT EXISTS games (
    game_id       TEXT PRIMARY KEY,
    dynasty_id    TEXT NOT NULL REFERENCES dynasties(dynasty_id) ON DELETE CASCADE,
    season        INTEGER NOT NULL,
    week          INTEGER NOT NULL,
    season_type   TEXT NOT NULL,
    game_type     TEXT NOT NULL,
    home_team_id  INTEGER NOT NULL,
    away_team_id  INTEGER NOT NULL,
    home_score    INTEGER NOT NULL,
    away_score    INTEGER NOT NULL,
    overtime      INTEGER NOT NULL DEFAULT 0,
    game_date     INTEGER NOT NULL,
    created_at    TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE INDEX IF NOT EXISTS idx_games_dynasty_date ON games(dynasty_id, game_date);

CREATE TABLE IF NOT EXISTS player_game_stats (
    id                     INTEGER PRIMARY KEY AUTOINCREMENT,
    dynasty_id             TEXT NOT NULL REFERENCES dynasties(dynasty_id) ON DELETE CASCADE,
    game_id                TEXT NOT NULL,
    player_id              INTEGER NOT NULL,
    team_id                INTEGER NOT NULL,
    position               TEXT NOT NULL,
    pass_attempts          INTEGER NOT NULL DEFAULT 0,
    pass_completions       INTEGER NOT NULL DEFAULT 0,
    pass_yards             INTEGER NOT NULL DEFAULT 0,
    pass_tds               INTEGER NOT NULL DEFAULT 0,
    interceptions_thrown   INTEGER NOT NULL DEFAULT 0,
    rush_attempts          INTEGER NOT NULL DEFAULT 0,
    rush_yards             INTEGER NOT NULL DEFAULT 0,
    rush_tds               INTEGER NOT NULL DEFAULT 0,
    receptions             INTEGER NOT NULL DEFAULT 0,
    receiving_yards        INTEGER NOT NULL DEFAULT 0,
    receiving_tds          INTEGER NOT NULL DEFAULT 0,
    tackles                INTEGER NOT NULL DEFAULT 0,
    sacks                  INTEGER NOT NULL DEFAULT 0,
    interceptions          INTEGER NOT NULL DEFAULT 0,
    fumbles                INTEGER NOT NULL DEFAULT 0,
    field_goals_made       INTEGER NOT NULL DEFAULT 0,
    field_goals_attempted  INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_player_stats_game ON player_game_stats(game_id);

CREATE TABLE IF NOT EXISTS standings (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    dynasty_id        TEXT NOT NULL REFERENCES dynasties(dynasty_id) ON DELETE CASCADE,
    team_id           INTEGER NOT NULL,
    season            INTEGER NOT NULL,
    season_type       TEXT NOT NULL,
    wins              INTEGER NOT NULL DEFAULT 0,
    losses            INTEGER NOT NULL DEFAULT 0,
    ties              INTEGER NOT NULL DEFAULT 0,
    division_wins     INTEGER NOT NULL DEFAULT 0,
    division_losses   INTEGER NOT NULL DEFAULT 0,
    conference_wins   INTEGER NOT NULL DEFAULT 0,
    conference_losses INTEGER NOT NULL DEFAULT 0,
    home_wins         INTEGER NOT NULL DEFAULT 0,
    home_losses       INTEGER NOT NULL DEFAULT 0,
    away_wins         INTEGER NOT NULL DEFAULT 0,
    away_losses       INTEGER NOT NULL DEFAULT 0,
    points_for        INTEGER NOT NULL DEFAULT 0,
    points_against    INTEGER NOT NULL DEFAULT 0,
    UNIQUE (dynasty_id, team_id, season, season_type)
);

CREATE INDEX IF NOT EXISTS idx_standings_dynasty_season ON standings(dynasty_id, season);
"#;
