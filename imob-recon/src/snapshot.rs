//! Property snapshot loading
//!
//! The snapshot is the full stored state of a property read once at the
//! start of a reconciliation: the core row, the relation sets and the
//! media counts. It serves both as the merge base for the core write and
//! as the "before" side of the audit diff.

use crate::error::{UpdateError, UpdateResult};
use imob_common::db::{PropertyRow, ProximityLink};
use sqlx::SqlitePool;

/// Stored state of one property at reconciliation start
#[derive(Debug, Clone)]
pub struct PropertySnapshot {
    pub row: PropertyRow,
    /// Sorted amenity id set
    pub amenidades: Vec<i64>,
    /// Proximity links sorted by referenced id
    pub proximidades: Vec<ProximityLink>,
    pub imagens_count: i64,
    pub documentos_count: i64,
}

impl PropertySnapshot {
    /// Sorted proximity id set (the diff compares proximities by id only)
    pub fn proximidade_ids(&self) -> Vec<i64> {
        self.proximidades.iter().map(|p| p.proximidade_fk).collect()
    }

    pub fn has_coordinates(&self) -> bool {
        self.row.latitude.is_some() && self.row.longitude.is_some()
    }
}

/// Read the full snapshot for a property, or NotFound.
pub async fn load_snapshot(pool: &SqlitePool, imovel_id: i64) -> UpdateResult<PropertySnapshot> {
    let row: Option<PropertyRow> = sqlx::query_as(
        r#"
        SELECT id, codigo, titulo, descricao,
               endereco, numero, complemento, bairro, cidade, estado, cep,
               latitude, longitude,
               preco, preco_condominio, preco_iptu, taxa_extra,
               area_total, area_construida,
               quartos, banheiros, suites, varanda, vagas_garagem,
               andar, total_andares,
               mobiliado, aceita_permuta, aceita_financiamento,
               destaque, destaque_nacional,
               tipo_fk, finalidade_fk, status_fk, proprietario_uuid,
               updated_by
        FROM imoveis
        WHERE id = ?
        "#,
    )
    .bind(imovel_id)
    .fetch_optional(pool)
    .await?;

    let row = row.ok_or_else(|| UpdateError::NotFound(format!("property {}", imovel_id)))?;

    let mut amenidades: Vec<i64> = sqlx::query_scalar(
        "SELECT amenidade_fk FROM imovel_amenidades WHERE imovel_fk = ?",
    )
    .bind(imovel_id)
    .fetch_all(pool)
    .await?;
    amenidades.sort_unstable();

    let proximidades: Vec<ProximityLink> = sqlx::query_as(
        r#"
        SELECT proximidade_fk, distancia_metros, tempo_caminhada, observacoes
        FROM imovel_proximidades
        WHERE imovel_fk = ?
        ORDER BY proximidade_fk
        "#,
    )
    .bind(imovel_id)
    .fetch_all(pool)
    .await?;

    let imagens_count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM imovel_imagens WHERE imovel_fk = ?")
            .bind(imovel_id)
            .fetch_one(pool)
            .await?;

    let documentos_count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM imovel_documentos WHERE imovel_fk = ?")
            .bind(imovel_id)
            .fetch_one(pool)
            .await?;

    Ok(PropertySnapshot {
        row,
        amenidades,
        proximidades,
        imagens_count,
        documentos_count,
    })
}
