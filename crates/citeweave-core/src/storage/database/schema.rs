use rusqlite::Connection;

use crate::error::Result;

pub const SCHEMA_VERSION: u32 = 2;

pub fn apply_pragmas(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        ",
    )?;
    Ok(())
}

/// List-valued columns (`authors`, `cites`, `referenced_by`, `aka`,
/// `affiliations`, `label`) hold comma-joined ids.
pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version    INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS publications (
            eid             INTEGER PRIMARY KEY,
            title           TEXT NOT NULL DEFAULT '',
            source          TEXT NOT NULL DEFAULT '',
            issn            TEXT NOT NULL DEFAULT '',
            volume          TEXT NOT NULL DEFAULT '',
            issue           TEXT NOT NULL DEFAULT '',
            date            TEXT,
            doi             TEXT NOT NULL DEFAULT '',
            abstract        TEXT NOT NULL DEFAULT '',
            citedby         INTEGER NOT NULL DEFAULT 0,
            affiliations    TEXT NOT NULL DEFAULT '',
            type            TEXT NOT NULL DEFAULT '',
            author_count    INTEGER NOT NULL DEFAULT 0,
            authors         TEXT NOT NULL DEFAULT '',
            author_keywords TEXT NOT NULL DEFAULT '',
            source_id       TEXT NOT NULL DEFAULT '',
            url             TEXT NOT NULL DEFAULT '',
            label           TEXT NOT NULL DEFAULT 'OTHER',
            cites           TEXT NOT NULL DEFAULT ''
        );

        CREATE TABLE IF NOT EXISTS pending_records (
            id             INTEGER PRIMARY KEY,
            title          TEXT,
            url            TEXT NOT NULL DEFAULT '',
            reference_type TEXT NOT NULL DEFAULT '',
            authors        TEXT NOT NULL DEFAULT '',
            citedby        INTEGER NOT NULL DEFAULT 0,
            date           TEXT,
            doi            TEXT NOT NULL DEFAULT '',
            source         TEXT NOT NULL DEFAULT '',
            referenced_by  TEXT NOT NULL DEFAULT ''
        );

        CREATE TABLE IF NOT EXISTS authors (
            id           INTEGER PRIMARY KEY,
            name         TEXT NOT NULL DEFAULT '',
            surname      TEXT NOT NULL DEFAULT '',
            given_name   TEXT NOT NULL DEFAULT '',
            initials     TEXT NOT NULL DEFAULT '',
            affiliations TEXT NOT NULL DEFAULT '',
            url          TEXT NOT NULL DEFAULT '',
            aka          TEXT NOT NULL DEFAULT ''
        );

        CREATE TABLE IF NOT EXISTS affiliations (
            id      INTEGER PRIMARY KEY,
            name    TEXT NOT NULL DEFAULT '',
            city    TEXT NOT NULL DEFAULT '',
            country TEXT NOT NULL DEFAULT '',
            url     TEXT NOT NULL DEFAULT ''
        );
        ",
    )?;
    Ok(())
}

pub fn create_indexes(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE INDEX IF NOT EXISTS idx_publications_doi ON publications(doi);
        CREATE INDEX IF NOT EXISTS idx_pending_doi      ON pending_records(doi);
        ",
    )?;
    Ok(())
}
