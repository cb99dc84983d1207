//! Database row models

use serde::{Deserialize, Serialize};

/// One row of the `imoveis` table. Field names mirror the column names; the
/// payload vocabulary and audit keys are defined in the same terms.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PropertyRow {
    pub id: i64,
    pub codigo: Option<String>,
    pub titulo: Option<String>,
    pub descricao: Option<String>,
    pub endereco: Option<String>,
    pub numero: Option<String>,
    pub complemento: Option<String>,
    pub bairro: Option<String>,
    pub cidade: Option<String>,
    pub estado: Option<String>,
    pub cep: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub preco: Option<f64>,
    pub preco_condominio: Option<f64>,
    pub preco_iptu: Option<f64>,
    pub taxa_extra: Option<f64>,
    pub area_total: Option<f64>,
    pub area_construida: Option<f64>,
    pub quartos: Option<i64>,
    pub banheiros: Option<i64>,
    pub suites: Option<i64>,
    pub varanda: Option<i64>,
    pub vagas_garagem: Option<i64>,
    pub andar: Option<i64>,
    pub total_andares: Option<i64>,
    pub mobiliado: Option<bool>,
    pub aceita_permuta: Option<bool>,
    pub aceita_financiamento: Option<bool>,
    pub destaque: Option<bool>,
    pub destaque_nacional: Option<bool>,
    pub tipo_fk: Option<i64>,
    pub finalidade_fk: Option<i64>,
    pub status_fk: Option<i64>,
    pub proprietario_uuid: Option<String>,
    pub updated_by: Option<String>,
}

/// One `imovel_proximidades` link with its per-relation attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProximityLink {
    pub proximidade_fk: i64,
    pub distancia_metros: Option<i64>,
    pub tempo_caminhada: Option<i64>,
    pub observacoes: Option<String>,
}

/// Append-only `imovel_status` ledger row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct StatusHistoryRow {
    pub id: i64,
    pub imovel_fk: i64,
    pub status_fk: i64,
    pub created_by: Option<String>,
    pub created_at: String,
}

/// One `audit_logs` row; `details` is the serialized change payload
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AuditLogRow {
    pub id: i64,
    pub user_id: Option<String>,
    pub action: String,
    pub resource: String,
    pub resource_id: Option<i64>,
    pub details: Option<String>,
    pub created_at: String,
}
