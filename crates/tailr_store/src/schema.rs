//! Relational schema setup.
//!
//! Six tables: `user`, `token` and `repo` belong to the account contract;
//! `hmap`, `cset` and `blob` are the revision store. `cset` and `blob` share
//! the `(repo_id, hkey_id, time)` primary key and join on it; `time` is
//! stored as epoch seconds so one binding works on both backends.

use sqlx::AnyConnection;

use crate::StoreResult;

const MYSQL_DDL: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS user (
        id INTEGER PRIMARY KEY AUTO_INCREMENT,
        name VARCHAR(255) NOT NULL UNIQUE,
        confirmed TINYINT NOT NULL DEFAULT 0,
        github_id INTEGER NULL,
        homepage_url VARCHAR(255) NULL,
        avatar_url VARCHAR(255) NULL,
        email VARCHAR(255) NULL
    )",
    "CREATE TABLE IF NOT EXISTS token (
        id INTEGER PRIMARY KEY AUTO_INCREMENT,
        `value` VARCHAR(255) NOT NULL UNIQUE,
        user_id INTEGER NOT NULL,
        seen TINYINT NOT NULL DEFAULT 0,
        descr VARCHAR(255) NOT NULL DEFAULT ''
    )",
    "CREATE TABLE IF NOT EXISTS repo (
        id INTEGER PRIMARY KEY AUTO_INCREMENT,
        user_id INTEGER NOT NULL,
        name VARCHAR(255) NOT NULL,
        descr VARCHAR(255) NOT NULL DEFAULT '',
        UNIQUE (user_id, name)
    )",
    "CREATE TABLE IF NOT EXISTS hmap (
        sha BINARY(20) PRIMARY KEY,
        val VARCHAR(2048) NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS cset (
        repo_id INTEGER NOT NULL,
        hkey_id BINARY(20) NOT NULL,
        time BIGINT NOT NULL,
        type TINYINT UNSIGNED NOT NULL,
        len MEDIUMINT UNSIGNED NOT NULL,
        PRIMARY KEY (repo_id, hkey_id, time)
    )",
    "CREATE TABLE IF NOT EXISTS `blob` (
        repo_id INTEGER NOT NULL,
        hkey_id BINARY(20) NOT NULL,
        time BIGINT NOT NULL,
        data MEDIUMBLOB NOT NULL,
        PRIMARY KEY (repo_id, hkey_id, time)
    )",
];

const SQLITE_DDL: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS user (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        confirmed INTEGER NOT NULL DEFAULT 0,
        github_id INTEGER NULL,
        homepage_url TEXT NULL,
        avatar_url TEXT NULL,
        email TEXT NULL
    )",
    "CREATE TABLE IF NOT EXISTS token (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        `value` TEXT NOT NULL UNIQUE,
        user_id INTEGER NOT NULL,
        seen INTEGER NOT NULL DEFAULT 0,
        descr TEXT NOT NULL DEFAULT ''
    )",
    "CREATE TABLE IF NOT EXISTS repo (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        name TEXT NOT NULL,
        descr TEXT NOT NULL DEFAULT '',
        UNIQUE (user_id, name)
    )",
    "CREATE TABLE IF NOT EXISTS hmap (
        sha BLOB PRIMARY KEY,
        val TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS cset (
        repo_id INTEGER NOT NULL,
        hkey_id BLOB NOT NULL,
        time INTEGER NOT NULL,
        type INTEGER NOT NULL,
        len INTEGER NOT NULL,
        PRIMARY KEY (repo_id, hkey_id, time)
    )",
    "CREATE TABLE IF NOT EXISTS `blob` (
        repo_id INTEGER NOT NULL,
        hkey_id BLOB NOT NULL,
        time INTEGER NOT NULL,
        data BLOB NOT NULL,
        PRIMARY KEY (repo_id, hkey_id, time)
    )",
];

/// Creates all tables if absent, with DDL picked per backend.
pub async fn create_tables(conn: &mut AnyConnection) -> StoreResult<()> {
    let ddl = if conn.backend_name().eq_ignore_ascii_case("sqlite") {
        SQLITE_DDL
    } else {
        MYSQL_DDL
    };
    for statement in ddl {
        sqlx::query(statement).execute(&mut *conn).await?;
    }
    Ok(())
}
