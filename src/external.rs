use crate::config_store::{ConfigStore, DbConnectionConfig};
use crate::error::{ColetaError, ColetaResult};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use sqlx::postgres::PgConnectOptions;
use sqlx::{Connection, FromRow, PgConnection};
use std::sync::Arc;
use std::time::Duration;

/// Factor converting one counted base unit into sellable units, inferred from
/// the sale-unit code. The stock database has no multiplier column.
pub fn multiplier_for_unit(unidade_venda: &str) -> i64 {
    match unidade_venda {
        "CX" => 30, // caixa
        "FD" => 10, // fardo
        _ => 1,
    }
}

/// One lot of a product as the stock database reports it, with the balance
/// summed across storage locations. Never persisted locally.
#[derive(Debug, Clone, Serialize)]
pub struct ExternalLot {
    pub lote: String,
    pub data_fabricacao: String,
    pub data_validade: String,
    pub saldo: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductLots {
    pub codigo_produto: String,
    pub codigo_barras: String,
    pub nome_produto: String,
    pub fabricante: Option<String>,
    pub unidade_venda: String,
    pub multiplicador_sugerido: i64,
    pub lotes: Vec<ExternalLot>,
}

/// Read-only view of the external stock database. The count-update service
/// depends on this seam, so tests can script lot and balance data.
#[async_trait]
pub trait LotSource: Send + Sync {
    /// All lots matching a barcode, or `None` when the barcode is unknown.
    async fn lots_for_barcode(&self, barcode: &str) -> ColetaResult<Option<ProductLots>>;

    /// Current summed balance for the exact lot tuple. Pre-write guard only.
    async fn lot_balance(
        &self,
        barcode: &str,
        lote: &str,
        data_fabricacao: &str,
        data_validade: &str,
    ) -> ColetaResult<Option<i64>>;
}

#[derive(FromRow)]
struct LotRow {
    codigo_produto: String,
    lote: String,
    data_fabricacao: Option<NaiveDate>,
    data_validade: Option<NaiveDate>,
    saldo: Option<i64>,
    nome_produto: String,
    fantasia: Option<String>,
    unidade_venda: Option<String>,
    codigo_barras: String,
}

fn iso_or_empty(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

// Zero-balance lots are deliberately kept: the warehouse counts physical stock
// the system believes is gone.
const LOTS_FOR_BARCODE_SQL: &str = r#"
    SELECT lt.cod_produt AS codigo_produto,
           COALESCE(lt.cod_lote, '*') AS lote,
           lt.dat_fabric AS data_fabricacao,
           lt.dat_vencim AS data_validade,
           CAST(SUM(lt.qtd_saldo) AS BIGINT) AS saldo,
           p.descricao AS nome_produto,
           f.fantasia AS fantasia,
           p.unidade_venda AS unidade_venda,
           p.cod_ean AS codigo_barras
    FROM prxes pr
    LEFT JOIN prlot lt ON lt.cod_estabe = pr.cod_estabe AND lt.cod_produt = pr.cod_produt
    LEFT JOIN produ p ON p.codigo = pr.cod_produt
    LEFT JOIN fabri f ON f.codigo = p.cod_fabricante
    WHERE lt.cod_estabe = 0
      AND p.tipo = '00'
      AND p.cod_ean = $1
    GROUP BY lt.cod_produt, lt.cod_lote, lt.dat_fabric, lt.dat_vencim,
             p.descricao, f.fantasia, p.unidade_venda, p.cod_ean
    ORDER BY lt.cod_lote, lt.dat_fabric
"#;

const LOT_BALANCE_SQL: &str = r#"
    SELECT CAST(SUM(lt.qtd_saldo) AS BIGINT)
    FROM prlot lt
    JOIN produ p ON p.codigo = lt.cod_produt
    WHERE lt.cod_estabe = 0
      AND p.tipo = '00'
      AND p.cod_ean = $1
      AND COALESCE(lt.cod_lote, '*') = $2
      AND COALESCE(TO_CHAR(lt.dat_fabric, 'YYYY-MM-DD'), '') = $3
      AND COALESCE(TO_CHAR(lt.dat_vencim, 'YYYY-MM-DD'), '') = $4
"#;

/// `LotSource` backed by the ERP Postgres database. Credentials are re-read
/// from the config store and a fresh connection is opened per operation; the
/// scanner workload is far too light to justify a pool.
pub struct PgLotSource {
    config: Arc<ConfigStore>,
}

impl PgLotSource {
    pub fn new(config: Arc<ConfigStore>) -> Self {
        Self { config }
    }

    async fn connect(&self) -> ColetaResult<PgConnection> {
        let config = self.config.load().ok_or_else(|| {
            ColetaError::Config(
                "As configurações do banco de dados de estoque não foram encontradas. \
                 Configure-as antes de iniciar a contagem."
                    .to_string(),
            )
        })?;

        if !config.is_complete() {
            return Err(ColetaError::Config(
                "Algumas configurações do banco de dados de estoque estão faltando ou vazias."
                    .to_string(),
            ));
        }

        PgConnection::connect_with(&pg_options(&config))
            .await
            .map_err(|e| {
                ColetaError::Connectivity(format!(
                    "Não foi possível conectar ao banco de dados de estoque: {}",
                    e
                ))
            })
    }
}

pub fn pg_options(config: &DbConnectionConfig) -> PgConnectOptions {
    let (host, port) = match config.server.split_once(':') {
        Some((host, port)) => (host, port.parse().unwrap_or(5432)),
        None => (config.server.as_str(), 5432),
    };

    PgConnectOptions::new()
        .host(host)
        .port(port)
        .database(&config.database)
        .username(&config.username)
        .password(&config.password)
}

/// Connects with the supplied credentials and disconnects, bounded by a short
/// timeout. Used by the settings form before anything is persisted.
pub async fn test_connection(config: &DbConnectionConfig) -> ColetaResult<()> {
    let options = pg_options(config);
    let connect = PgConnection::connect_with(&options);
    let conn = tokio::time::timeout(Duration::from_secs(5), connect)
        .await
        .map_err(|_| {
            ColetaError::Connectivity(
                "Tempo esgotado ao testar a conexão com o banco de dados de estoque.".to_string(),
            )
        })?
        .map_err(|e| {
            ColetaError::Connectivity(format!(
                "Falha ao testar conexão com o banco de dados de estoque: {}",
                e
            ))
        })?;

    let _ = conn.close().await;
    Ok(())
}

#[async_trait]
impl LotSource for PgLotSource {
    async fn lots_for_barcode(&self, barcode: &str) -> ColetaResult<Option<ProductLots>> {
        let mut conn = self.connect().await?;

        let rows: Vec<LotRow> = sqlx::query_as(LOTS_FOR_BARCODE_SQL)
            .bind(barcode)
            .fetch_all(&mut conn)
            .await?;

        let Some(first) = rows.first() else {
            return Ok(None);
        };

        let unidade_venda = first.unidade_venda.clone().unwrap_or_default();
        let product = ProductLots {
            codigo_produto: first.codigo_produto.clone(),
            codigo_barras: first.codigo_barras.clone(),
            nome_produto: first.nome_produto.clone(),
            fabricante: first.fantasia.clone(),
            multiplicador_sugerido: multiplier_for_unit(&unidade_venda),
            unidade_venda,
            lotes: rows
                .iter()
                .map(|row| ExternalLot {
                    lote: row.lote.clone(),
                    data_fabricacao: iso_or_empty(row.data_fabricacao),
                    data_validade: iso_or_empty(row.data_validade),
                    saldo: row.saldo.unwrap_or(0),
                })
                .collect(),
        };

        Ok(Some(product))
    }

    async fn lot_balance(
        &self,
        barcode: &str,
        lote: &str,
        data_fabricacao: &str,
        data_validade: &str,
    ) -> ColetaResult<Option<i64>> {
        let mut conn = self.connect().await?;

        let saldo: Option<Option<i64>> = sqlx::query_scalar(LOT_BALANCE_SQL)
            .bind(barcode)
            .bind(lote)
            .bind(data_fabricacao)
            .bind(data_validade)
            .fetch_optional(&mut conn)
            .await?;

        // SUM over an empty set yields a NULL row; both shapes mean "no lot".
        Ok(saldo.flatten())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiplier_follows_sale_unit_table() {
        assert_eq!(multiplier_for_unit("CX"), 30);
        assert_eq!(multiplier_for_unit("FD"), 10);
        assert_eq!(multiplier_for_unit("UN"), 1);
        assert_eq!(multiplier_for_unit(""), 1);
    }

    #[test]
    fn pg_options_splits_host_and_port() {
        let mut config = DbConnectionConfig {
            server: "estoque-db:5433".to_string(),
            database: "erp".to_string(),
            username: "leitor".to_string(),
            password: "x".to_string(),
            driver: "postgres".to_string(),
        };
        let opts = pg_options(&config);
        assert_eq!(opts.get_host(), "estoque-db");
        assert_eq!(opts.get_port(), 5433);

        config.server = "estoque-db".to_string();
        let opts = pg_options(&config);
        assert_eq!(opts.get_port(), 5432);
    }

    #[test]
    fn iso_or_empty_handles_missing_dates() {
        assert_eq!(iso_or_empty(None), "");
        assert_eq!(
            iso_or_empty(NaiveDate::from_ymd_opt(2024, 1, 31)),
            "2024-01-31"
        );
    }
}
