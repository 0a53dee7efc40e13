use crate::error::ColetaResult;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, Pool, Sqlite};

pub type DbPool = Pool<Sqlite>;

pub async fn init_pool(database_path: &str) -> ColetaResult<DbPool> {
    let opts = SqliteConnectOptions::new()
        .filename(database_path)
        .create_if_missing(true);

    Ok(SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(opts)
        .await?)
}

/// Creates the count table on first run. Column names match the legacy
/// `ColetaEstoque` schema so existing count databases keep working.
pub async fn init_database(pool: &DbPool) -> ColetaResult<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ColetaEstoque (
            Id INTEGER PRIMARY KEY AUTOINCREMENT,
            CodigoProduto TEXT NOT NULL,
            CodigoBarras TEXT NOT NULL,
            NomeProduto TEXT NOT NULL,
            Lote TEXT NOT NULL,
            DataFabricacao TEXT NOT NULL,
            DataValidade TEXT NOT NULL,
            QuantidadeBase INTEGER NOT NULL DEFAULT 1,
            MultiplicadorUsado INTEGER NOT NULL DEFAULT 1,
            DataHoraColeta TEXT DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// One accumulated count row. `quantidade_total` is derived in the SELECT,
/// never stored.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CountedItem {
    pub id: i64,
    pub codigo_produto: String,
    pub codigo_barras: String,
    pub nome_produto: String,
    pub lote: String,
    pub data_fabricacao: String,
    pub data_validade: String,
    pub quantidade_base: i64,
    pub multiplicador_usado: i64,
    pub quantidade_total: i64,
    pub data_hora_coleta: String,
}

const SELECT_COUNTED: &str = r#"
    SELECT Id AS id,
           CodigoProduto AS codigo_produto,
           CodigoBarras AS codigo_barras,
           NomeProduto AS nome_produto,
           Lote AS lote,
           DataFabricacao AS data_fabricacao,
           DataValidade AS data_validade,
           QuantidadeBase AS quantidade_base,
           MultiplicadorUsado AS multiplicador_usado,
           QuantidadeBase * MultiplicadorUsado AS quantidade_total,
           DataHoraColeta AS data_hora_coleta
    FROM ColetaEstoque
"#;

/// Full list in the grouping order the operator UI expects.
pub async fn list_counted(pool: &DbPool) -> ColetaResult<Vec<CountedItem>> {
    let sql = format!(
        "{SELECT_COUNTED} ORDER BY CodigoProduto ASC, Lote ASC, DataFabricacao ASC, DataValidade ASC"
    );
    Ok(sqlx::query_as(&sql).fetch_all(pool).await?)
}

/// Full list in insertion order, used by the export file. Ordered by Id:
/// DataHoraColeta is refreshed on every edit and cannot express it.
pub async fn list_in_insertion_order(pool: &DbPool) -> ColetaResult<Vec<CountedItem>> {
    let sql = format!("{SELECT_COUNTED} ORDER BY Id ASC");
    Ok(sqlx::query_as(&sql).fetch_all(pool).await?)
}

pub async fn get_counted_by_id(pool: &DbPool, id: i64) -> ColetaResult<Option<CountedItem>> {
    let sql = format!("{SELECT_COUNTED} WHERE Id = ?");
    Ok(sqlx::query_as(&sql).bind(id).fetch_optional(pool).await?)
}

#[cfg(test)]
pub async fn init_test_pool() -> DbPool {
    let opts = SqliteConnectOptions::new().in_memory(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(opts)
        .await
        .expect("Failed to open in-memory SQLite");
    init_database(&pool).await.expect("Failed to create schema");
    pool
}
