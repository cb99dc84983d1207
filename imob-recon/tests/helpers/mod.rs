//! Shared fixtures for the integration suites: temp database setup, catalog
//! seeding and a scriptable geocoding stub.
#![allow(dead_code)] // each test binary uses a different subset

use imob_common::db::init_database;
use imob_recon::geocoding::{
    Coordinates, GeocodeError, GeocodeProvider, GeocodingResolver, PostalAddress,
};
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// Surface engine logs in tests when RUST_LOG is set.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Fresh database in a temp directory. The directory guard must stay alive
/// for the duration of the test.
pub async fn test_db() -> (TempDir, SqlitePool) {
    init_test_logging();
    let dir = tempfile::tempdir().expect("create temp dir");
    let pool = init_database(&dir.path().join("test.db"))
        .await
        .expect("init database");
    (dir, pool)
}

/// Seed the catalogs and one property, returning the property id.
pub async fn seed_property(pool: &SqlitePool) -> i64 {
    for (table, ids) in [
        ("status_imovel", vec![1i64, 2, 3, 4, 5]),
        ("tipos_imovel", vec![1, 2]),
        ("finalidades", vec![1, 2]),
        ("amenidades", vec![1, 2, 3]),
        ("proximidades", vec![1, 2, 3, 4, 7, 9]),
    ] {
        for id in ids {
            sqlx::query(&format!(
                "INSERT INTO {} (id, nome) VALUES (?, ?)",
                table
            ))
            .bind(id)
            .bind(format!("{}-{}", table, id))
            .execute(pool)
            .await
            .unwrap();
        }
    }

    sqlx::query("INSERT INTO proprietarios (uuid, nome) VALUES (?, ?)")
        .bind(OWNER_UUID)
        .bind("Maria Souza")
        .execute(pool)
        .await
        .unwrap();

    sqlx::query("INSERT INTO users (uuid, username, nome) VALUES (?, ?, ?)")
        .bind(ACTOR_UUID)
        .bind("jsilva")
        .bind("João Silva")
        .execute(pool)
        .await
        .unwrap();

    sqlx::query(
        r#"
        INSERT INTO imoveis (
            codigo, titulo, descricao,
            endereco, numero, complemento, bairro, cidade, estado, cep,
            latitude, longitude,
            preco, preco_condominio,
            quartos, banheiros,
            mobiliado, aceita_financiamento, destaque, destaque_nacional,
            tipo_fk, finalidade_fk, status_fk
        ) VALUES (
            'IMB-0001', 'Apartamento no centro', 'Dois quartos',
            'Rua das Flores', '120', NULL, 'Centro', 'Recife', 'PE', '50000-000',
            -8.05, -34.9,
            250000.0, 850.0,
            2, 1,
            0, 1, 0, 0,
            1, 1, 3
        )
        "#,
    )
    .execute(pool)
    .await
    .unwrap();

    let id: i64 = sqlx::query_scalar("SELECT id FROM imoveis WHERE codigo = 'IMB-0001'")
        .fetch_one(pool)
        .await
        .unwrap();

    sqlx::query("INSERT INTO imovel_amenidades (imovel_fk, amenidade_fk) VALUES (?, 1), (?, 3)")
        .bind(id)
        .bind(id)
        .execute(pool)
        .await
        .unwrap();

    id
}

pub const ACTOR_UUID: &str = "11111111-2222-4333-8444-555555555555";
pub const OWNER_UUID: &str = "aaaaaaaa-bbbb-4ccc-8ddd-eeeeeeeeeeee";

/// Geocoding stub: fixed answer, counts free-text lookups.
pub struct StubGeocoder {
    coords: Option<Coordinates>,
    pub calls: Arc<AtomicUsize>,
}

impl StubGeocoder {
    pub fn hitting(lat: f64, lon: f64) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                coords: Some(Coordinates { lat, lon }),
                calls: calls.clone(),
            },
            calls,
        )
    }

    pub fn missing() -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                coords: None,
                calls: calls.clone(),
            },
            calls,
        )
    }
}

#[async_trait::async_trait]
impl GeocodeProvider for StubGeocoder {
    async fn geocode(
        &self,
        _address: &str,
        _city: &str,
        _state: &str,
    ) -> Result<Option<Coordinates>, GeocodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.coords)
    }

    async fn lookup_postal_code(
        &self,
        _code: &str,
    ) -> Result<Option<PostalAddress>, GeocodeError> {
        Ok(None)
    }
}

pub fn resolver_hitting(lat: f64, lon: f64) -> (GeocodingResolver, Arc<AtomicUsize>) {
    let (stub, calls) = StubGeocoder::hitting(lat, lon);
    (GeocodingResolver::new(Box::new(stub)), calls)
}

pub fn resolver_missing() -> (GeocodingResolver, Arc<AtomicUsize>) {
    let (stub, calls) = StubGeocoder::missing();
    (GeocodingResolver::new(Box::new(stub)), calls)
}

/// All audit rows for a property, details decoded.
pub async fn audit_details(pool: &SqlitePool, imovel_id: i64) -> Vec<serde_json::Value> {
    let rows: Vec<String> = sqlx::query_scalar(
        "SELECT details FROM audit_logs WHERE resource_id = ? ORDER BY id",
    )
    .bind(imovel_id)
    .fetch_all(pool)
    .await
    .unwrap();
    rows.iter()
        .map(|raw| serde_json::from_str(raw).unwrap())
        .collect()
}

pub async fn history_rows(pool: &SqlitePool, imovel_id: i64) -> Vec<(i64, Option<String>)> {
    sqlx::query_as(
        "SELECT status_fk, created_by FROM imovel_status WHERE imovel_fk = ? ORDER BY id",
    )
    .bind(imovel_id)
    .fetch_all(pool)
    .await
    .unwrap()
}

pub async fn stored_amenities(pool: &SqlitePool, imovel_id: i64) -> Vec<i64> {
    sqlx::query_scalar(
        "SELECT amenidade_fk FROM imovel_amenidades WHERE imovel_fk = ? ORDER BY amenidade_fk",
    )
    .bind(imovel_id)
    .fetch_all(pool)
    .await
    .unwrap()
}
