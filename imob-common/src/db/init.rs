//! Database initialization
//!
//! Creates the database on first run and brings the schema up idempotently.
//! Every `create_*_table` statement uses `CREATE TABLE IF NOT EXISTS`, so
//! init is safe to call on every startup.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection pool and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // Link tables reference catalogs and properties by FK
    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

    // WAL allows concurrent readers while an update transaction is open
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;

    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    // Catalog tables first, then the property table, then link/ledger tables
    create_status_imovel_table(&pool).await?;
    create_tipos_imovel_table(&pool).await?;
    create_finalidades_table(&pool).await?;
    create_amenidades_table(&pool).await?;
    create_proximidades_table(&pool).await?;
    create_proprietarios_table(&pool).await?;
    create_users_table(&pool).await?;

    create_imoveis_table(&pool).await?;

    create_imovel_amenidades_table(&pool).await?;
    create_imovel_proximidades_table(&pool).await?;
    create_imovel_imagens_table(&pool).await?;
    create_imovel_documentos_table(&pool).await?;
    create_imovel_status_table(&pool).await?;
    create_audit_logs_table(&pool).await?;

    Ok(pool)
}

async fn create_status_imovel_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS status_imovel (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            nome TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_tipos_imovel_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tipos_imovel (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            nome TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_finalidades_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS finalidades (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            nome TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_amenidades_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS amenidades (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            nome TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_proximidades_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS proximidades (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            nome TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_proprietarios_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS proprietarios (
            uuid TEXT PRIMARY KEY,
            nome TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_users_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            uuid TEXT PRIMARY KEY,
            username TEXT NOT NULL,
            nome TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_imoveis_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS imoveis (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            codigo TEXT,
            titulo TEXT,
            descricao TEXT,
            endereco TEXT,
            numero TEXT,
            complemento TEXT,
            bairro TEXT,
            cidade TEXT,
            estado TEXT,
            cep TEXT,
            latitude REAL,
            longitude REAL,
            preco REAL,
            preco_condominio REAL,
            preco_iptu REAL,
            taxa_extra REAL,
            area_total REAL,
            area_construida REAL,
            quartos INTEGER,
            banheiros INTEGER,
            suites INTEGER,
            varanda INTEGER,
            vagas_garagem INTEGER,
            andar INTEGER,
            total_andares INTEGER,
            mobiliado INTEGER,
            aceita_permuta INTEGER,
            aceita_financiamento INTEGER,
            destaque INTEGER,
            destaque_nacional INTEGER,
            tipo_fk INTEGER REFERENCES tipos_imovel(id),
            finalidade_fk INTEGER REFERENCES finalidades(id),
            status_fk INTEGER REFERENCES status_imovel(id),
            proprietario_uuid TEXT REFERENCES proprietarios(uuid),
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_by TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_imovel_amenidades_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS imovel_amenidades (
            imovel_fk INTEGER NOT NULL REFERENCES imoveis(id) ON DELETE CASCADE,
            amenidade_fk INTEGER NOT NULL REFERENCES amenidades(id),
            PRIMARY KEY (imovel_fk, amenidade_fk)
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_imovel_proximidades_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS imovel_proximidades (
            imovel_fk INTEGER NOT NULL REFERENCES imoveis(id) ON DELETE CASCADE,
            proximidade_fk INTEGER NOT NULL REFERENCES proximidades(id),
            distancia_metros INTEGER,
            tempo_caminhada INTEGER,
            observacoes TEXT,
            PRIMARY KEY (imovel_fk, proximidade_fk)
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

// Binary content lives in external storage; these tables only anchor counts
// and ordering for the listing.
async fn create_imovel_imagens_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS imovel_imagens (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            imovel_fk INTEGER NOT NULL REFERENCES imoveis(id) ON DELETE CASCADE,
            ordem INTEGER,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_imovel_documentos_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS imovel_documentos (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            imovel_fk INTEGER NOT NULL REFERENCES imoveis(id) ON DELETE CASCADE,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_imovel_status_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS imovel_status (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            imovel_fk INTEGER NOT NULL REFERENCES imoveis(id) ON DELETE CASCADE,
            status_fk INTEGER NOT NULL REFERENCES status_imovel(id),
            created_by TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_audit_logs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS audit_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT,
            action TEXT NOT NULL,
            resource TEXT NOT NULL,
            resource_id INTEGER,
            details TEXT,
            ip_address TEXT,
            user_agent TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}
