pub const SCHEMA: &str = r#"
-- Owners (created on first magic-link login)
CREATE TABLE IF NOT EXISTS owners (
    id TEXT PRIMARY KEY,
    email TEXT NOT NULL UNIQUE,
    created_at TEXT DEFAULT (datetime('now'))
);

-- One-time login links
CREATE TABLE IF NOT EXISTS magic_links (
    id TEXT PRIMARY KEY,
    owner_id TEXT NOT NULL REFERENCES owners(id) ON DELETE CASCADE,
    token_hash TEXT NOT NULL,
    token_lookup TEXT NOT NULL,
    created_at TEXT DEFAULT (datetime('now')),
    expires_at TEXT NOT NULL,
    consumed_at TEXT
);

-- Browser and CLI sessions
CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    owner_id TEXT NOT NULL REFERENCES owners(id) ON DELETE CASCADE,
    token_hash TEXT NOT NULL,
    token_lookup TEXT NOT NULL,
    created_at TEXT DEFAULT (datetime('now')),
    expires_at TEXT NOT NULL,
    last_used_at TEXT
);

-- Tracked waitlists
CREATE TABLE IF NOT EXISTS projects (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    slug TEXT NOT NULL UNIQUE,
    owner_id TEXT NOT NULL REFERENCES owners(id) ON DELETE CASCADE,
    created_at TEXT DEFAULT (datetime('now'))
);

-- Slugs that can never be handed out again
CREATE TABLE IF NOT EXISTS burned_slugs (
    slug TEXT PRIMARY KEY
);

-- Visitor signups; source is locked at insert
CREATE TABLE IF NOT EXISTS signups (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    email TEXT NOT NULL,
    source TEXT NOT NULL DEFAULT 'direct',
    ip_address TEXT,
    created_at TEXT DEFAULT (datetime('now')),

    UNIQUE(project_id, email)
);

-- Rate-limit ledger for submit_signup
CREATE TABLE IF NOT EXISTS signup_attempts (
    project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    ip_address TEXT NOT NULL,
    attempt_count INTEGER NOT NULL DEFAULT 1,
    last_attempt_at TEXT NOT NULL,
    PRIMARY KEY (project_id, ip_address)
);

-- Create indexes
CREATE INDEX IF NOT EXISTS idx_projects_owner ON projects(owner_id);
CREATE INDEX IF NOT EXISTS idx_signups_project ON signups(project_id);
CREATE UNIQUE INDEX IF NOT EXISTS idx_magic_links_lookup ON magic_links(token_lookup);
CREATE UNIQUE INDEX IF NOT EXISTS idx_sessions_lookup ON sessions(token_lookup);
CREATE INDEX IF NOT EXISTS idx_sessions_owner ON sessions(owner_id);
"#;
