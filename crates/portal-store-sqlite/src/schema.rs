//! SQL schema for the portal SQLite store.
//!
//! Executed once at connection startup. Column names match the hosted
//! backend's so rows look the same whichever gateway produced them.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- ── Auth ────────────────────────────────────────────────────────────────────

CREATE TABLE IF NOT EXISTS identities (
    id            TEXT PRIMARY KEY,
    email         TEXT NOT NULL UNIQUE,   -- stored lowercase
    password_hash TEXT NOT NULL,          -- argon2 PHC string
    metadata      TEXT NOT NULL DEFAULT '{}',
    created_at    TEXT NOT NULL
);

-- At most one row: the session this database's client is signed in with.
CREATE TABLE IF NOT EXISTS sessions (
    access_token TEXT PRIMARY KEY,
    user_id      TEXT NOT NULL REFERENCES identities(id) ON DELETE CASCADE,
    email        TEXT NOT NULL,
    created_at   TEXT NOT NULL,
    expires_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS blobs (
    path         TEXT PRIMARY KEY,
    content_type TEXT NOT NULL,
    bytes        BLOB NOT NULL,
    created_at   TEXT NOT NULL
);

-- ── Portal tables ───────────────────────────────────────────────────────────

CREATE TABLE IF NOT EXISTS branches (
    id             TEXT PRIMARY KEY,
    name           TEXT NOT NULL,
    address        TEXT NOT NULL,
    postal_code    TEXT NOT NULL,
    city           TEXT NOT NULL,
    province       TEXT NOT NULL,
    contact_person TEXT NOT NULL,
    email          TEXT NOT NULL,
    phone          TEXT,
    website        TEXT,
    created_at     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS users (
    id             TEXT PRIMARY KEY,
    name           TEXT NOT NULL,
    email          TEXT NOT NULL UNIQUE,
    role           TEXT NOT NULL
                   CHECK (role IN ('admin', 'manager', 'delegate', 'employee', 'collaborator')),
    type           TEXT NOT NULL,
    avatar         TEXT,
    branch_id      TEXT REFERENCES branches(id) ON DELETE SET NULL,
    position       TEXT,
    extension      TEXT,
    social_contact TEXT,
    created_at     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS companies (
    id               TEXT PRIMARY KEY,
    name             TEXT NOT NULL,
    logo             TEXT,
    website          TEXT,
    agent_access_url TEXT,
    contact_email    TEXT,
    classification   TEXT,
    created_at       TEXT NOT NULL,
    last_updated     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS company_specifications (
    id         TEXT PRIMARY KEY,
    category   TEXT NOT NULL,
    content    TEXT NOT NULL,
    company_id TEXT NOT NULL REFERENCES companies(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS product_categories (
    id        TEXT PRIMARY KEY,
    name      TEXT NOT NULL,
    parent_id TEXT REFERENCES product_categories(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS products (
    id             TEXT PRIMARY KEY,
    name           TEXT NOT NULL,
    category_id    TEXT NOT NULL,
    subcategory_id TEXT,
    company_id     TEXT NOT NULL,
    description    TEXT,
    status         TEXT NOT NULL DEFAULT 'draft'
                   CHECK (status IN ('draft', 'published')),
    tags           TEXT DEFAULT '[]',   -- JSON array
    created_at     TEXT NOT NULL,
    updated_at     TEXT NOT NULL,
    author         TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS documents (
    id                     TEXT PRIMARY KEY,
    title                  TEXT NOT NULL,
    description            TEXT,
    category_id            TEXT NOT NULL,
    company_id             TEXT,
    product_category_id    TEXT,
    product_subcategory_id TEXT,
    product_id             TEXT,
    tags                   TEXT DEFAULT '[]',
    file_url               TEXT NOT NULL,
    file_type              TEXT NOT NULL,
    file_size              INTEGER NOT NULL,
    uploaded_by            TEXT NOT NULL,
    uploaded_at            TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS news (
    id           TEXT PRIMARY KEY,
    title        TEXT NOT NULL,
    content      TEXT NOT NULL,
    excerpt      TEXT,
    featured     INTEGER NOT NULL DEFAULT 0,
    cover_image  TEXT,
    category     TEXT NOT NULL,
    company_id   TEXT,
    tags         TEXT DEFAULT '[]',
    author       TEXT NOT NULL,
    published_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS calendar_events (
    id          TEXT PRIMARY KEY,
    title       TEXT NOT NULL,
    description TEXT,
    location    TEXT,
    start_date  TEXT NOT NULL,
    end_date    TEXT NOT NULL,
    category    TEXT NOT NULL,
    user_id     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS notifications (
    id         TEXT PRIMARY KEY,
    type       TEXT NOT NULL,
    title      TEXT NOT NULL,
    message    TEXT NOT NULL,
    read       INTEGER NOT NULL DEFAULT 0,
    link       TEXT,
    user_id    TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS specifications_company_idx ON company_specifications(company_id);
CREATE INDEX IF NOT EXISTS events_user_idx            ON calendar_events(user_id, start_date);
CREATE INDEX IF NOT EXISTS documents_uploaded_idx     ON documents(uploaded_at);
CREATE INDEX IF NOT EXISTS news_published_idx         ON news(published_at);

PRAGMA user_version = 1;
";
