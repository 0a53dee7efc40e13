use crate::commands::SimpleResponse;
use crate::db::{self, CountedItem, DbPool};
use crate::error::{ColetaError, ColetaResult};
use crate::external::LotSource;
use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

fn default_one() -> i64 {
    1
}

#[derive(Debug, Deserialize)]
pub struct SearchProductRequest {
    pub barcode: String,
}

/// Scan payload: product header plus the lot the operator selected.
#[derive(Debug, Deserialize)]
pub struct AddToCountRequest {
    pub codigo_produto: String,
    pub codigo_barras: String,
    pub nome_produto: String,
    pub lote: String,
    #[serde(default)]
    pub data_fabricacao: String,
    #[serde(default)]
    pub data_validade: String,
    #[serde(default = "default_one")]
    pub multiplicador_sugerido: i64,
    /// Base units to add; one scan event adds one unless the operator typed an
    /// explicit amount.
    #[serde(default = "default_one")]
    pub quantidade: i64,
}

#[derive(Debug, Deserialize)]
pub struct RepeatLastLotRequest {
    pub id: i64,
    #[serde(default = "default_one")]
    pub quantidade: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCountedRequest {
    pub id: i64,
    pub quantidade_base: i64,
    pub multiplicador_usado: i64,
    pub lote: String,
    #[serde(default)]
    pub data_fabricacao: String,
    #[serde(default)]
    pub data_validade: String,
}

#[derive(Debug, Deserialize)]
pub struct ItemIdRequest {
    pub id: i64,
}

#[derive(Debug, Serialize)]
pub struct CountListResponse {
    pub success: bool,
    pub message: String,
    pub counted_products: Vec<CountedItem>,
}

pub async fn search_product(
    State(state): State<AppState>,
    Json(payload): Json<SearchProductRequest>,
) -> ColetaResult<Json<Value>> {
    let barcode = payload.barcode.trim();
    if barcode.is_empty() {
        return Err(ColetaError::Validation(
            "Código de barras não fornecido.".to_string(),
        ));
    }

    match state.lots.lots_for_barcode(barcode).await? {
        Some(product) => {
            tracing::info!(
                "Barcode {} matched product {} with {} lot(s)",
                barcode,
                product.codigo_produto,
                product.lotes.len()
            );
            Ok(Json(json!({ "success": true, "product": product })))
        }
        None => Ok(Json(json!({
            "success": false,
            "message": "Produto não encontrado com este código de barras.",
        }))),
    }
}

pub async fn add_to_count(
    State(state): State<AppState>,
    Json(payload): Json<AddToCountRequest>,
) -> ColetaResult<Json<CountListResponse>> {
    let response = add_to_count_internal(&state.pool, state.lots.as_ref(), payload).await?;
    Ok(Json(response))
}

pub async fn add_to_count_internal(
    pool: &DbPool,
    lots: &dyn LotSource,
    req: AddToCountRequest,
) -> ColetaResult<CountListResponse> {
    if req.codigo_produto.trim().is_empty()
        || req.codigo_barras.trim().is_empty()
        || req.nome_produto.trim().is_empty()
        || req.lote.trim().is_empty()
    {
        return Err(ColetaError::Validation(
            "Todos os campos do produto são obrigatórios para a contagem.".to_string(),
        ));
    }
    if req.quantidade <= 0 {
        return Err(ColetaError::Validation(
            "A quantidade a adicionar deve ser um número positivo.".to_string(),
        ));
    }
    if req.multiplicador_sugerido <= 0 {
        return Err(ColetaError::Validation(
            "O multiplicador deve ser um número positivo.".to_string(),
        ));
    }

    let existing: Option<(i64, i64, i64)> = sqlx::query_as(
        r#"
        SELECT Id, QuantidadeBase, MultiplicadorUsado FROM ColetaEstoque
        WHERE CodigoProduto = ? AND Lote = ? AND DataFabricacao = ? AND DataValidade = ?
        "#,
    )
    .bind(&req.codigo_produto)
    .bind(&req.lote)
    .bind(&req.data_fabricacao)
    .bind(&req.data_validade)
    .fetch_optional(pool)
    .await?;

    // Balance guard runs before any local write; a failure here leaves the
    // count untouched.
    let current_base = existing.map(|(_, base, _)| base).unwrap_or(0);
    let saldo = lots
        .lot_balance(
            &req.codigo_barras,
            &req.lote,
            &req.data_fabricacao,
            &req.data_validade,
        )
        .await?
        .unwrap_or(0);

    if current_base + req.quantidade > saldo {
        return Err(ColetaError::Validation(format!(
            "Contagem excede o saldo do lote {}: saldo no estoque {}, contagem resultante {}.",
            req.lote,
            saldo,
            current_base + req.quantidade
        )));
    }

    let mut tx = pool.begin().await?;

    let message = match existing {
        Some((id, base, multiplicador)) => {
            let new_base = base + req.quantidade;
            sqlx::query(
                "UPDATE ColetaEstoque SET QuantidadeBase = ?, DataHoraColeta = CURRENT_TIMESTAMP WHERE Id = ?",
            )
            .bind(new_base)
            .bind(id)
            .execute(&mut *tx)
            .await?;

            format!(
                "Quantidade de {} (Lote: {}) atualizada para {}.",
                req.nome_produto,
                req.lote,
                new_base * multiplicador
            )
        }
        None => {
            sqlx::query(
                r#"
                INSERT INTO ColetaEstoque
                    (CodigoProduto, CodigoBarras, NomeProduto, Lote,
                     DataFabricacao, DataValidade, QuantidadeBase, MultiplicadorUsado)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&req.codigo_produto)
            .bind(&req.codigo_barras)
            .bind(&req.nome_produto)
            .bind(&req.lote)
            .bind(&req.data_fabricacao)
            .bind(&req.data_validade)
            .bind(req.quantidade)
            .bind(req.multiplicador_sugerido)
            .execute(&mut *tx)
            .await?;

            format!(
                "Produto {} (Lote: {}) adicionado à coleta.",
                req.nome_produto, req.lote
            )
        }
    };

    tx.commit().await?;

    Ok(CountListResponse {
        success: true,
        message,
        counted_products: db::list_counted(pool).await?,
    })
}

/// Repeat-scan convenience: the operator keeps scanning the same product and
/// the UI only remembers which row was touched last. Re-resolves the stored
/// tuple and runs the normal add flow against it.
pub async fn add_to_last_counted_lot(
    State(state): State<AppState>,
    Json(payload): Json<RepeatLastLotRequest>,
) -> ColetaResult<Json<CountListResponse>> {
    let response =
        add_to_last_counted_lot_internal(&state.pool, state.lots.as_ref(), payload).await?;
    Ok(Json(response))
}

pub async fn add_to_last_counted_lot_internal(
    pool: &DbPool,
    lots: &dyn LotSource,
    req: RepeatLastLotRequest,
) -> ColetaResult<CountListResponse> {
    let item = db::get_counted_by_id(pool, req.id)
        .await?
        .ok_or_else(|| ColetaError::Validation("Item contado não encontrado.".to_string()))?;

    add_to_count_internal(
        pool,
        lots,
        AddToCountRequest {
            codigo_produto: item.codigo_produto,
            codigo_barras: item.codigo_barras,
            nome_produto: item.nome_produto,
            lote: item.lote,
            data_fabricacao: item.data_fabricacao,
            data_validade: item.data_validade,
            multiplicador_sugerido: item.multiplicador_usado,
            quantidade: req.quantidade,
        },
    )
    .await
}

pub async fn get_counted_products(State(state): State<AppState>) -> ColetaResult<Json<Value>> {
    let counted_products = db::list_counted(&state.pool).await?;
    Ok(Json(json!({ "counted_products": counted_products })))
}

pub async fn update_counted_product(
    State(state): State<AppState>,
    Json(payload): Json<UpdateCountedRequest>,
) -> ColetaResult<Json<SimpleResponse>> {
    let response = update_counted_product_internal(&state.pool, payload).await?;
    Ok(Json(response))
}

/// Direct edit of an accumulated row. No balance re-check: the operator is
/// correcting what was physically counted.
pub async fn update_counted_product_internal(
    pool: &DbPool,
    req: UpdateCountedRequest,
) -> ColetaResult<SimpleResponse> {
    if req.lote.trim().is_empty() {
        return Err(ColetaError::Validation(
            "O lote é obrigatório para atualização.".to_string(),
        ));
    }
    if req.quantidade_base <= 0 || req.multiplicador_usado <= 0 {
        return Err(ColetaError::Validation(
            "Quantidade base e multiplicador devem ser números positivos.".to_string(),
        ));
    }

    let result = sqlx::query(
        r#"
        UPDATE ColetaEstoque SET
            QuantidadeBase = ?,
            MultiplicadorUsado = ?,
            Lote = ?,
            DataFabricacao = ?,
            DataValidade = ?,
            DataHoraColeta = CURRENT_TIMESTAMP
        WHERE Id = ?
        "#,
    )
    .bind(req.quantidade_base)
    .bind(req.multiplicador_usado)
    .bind(&req.lote)
    .bind(&req.data_fabricacao)
    .bind(&req.data_validade)
    .bind(req.id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ColetaError::Validation(
            "Item contado não encontrado.".to_string(),
        ));
    }

    Ok(SimpleResponse::ok("Produto contado atualizado com sucesso!"))
}

pub async fn delete_counted_product(
    State(state): State<AppState>,
    Json(payload): Json<ItemIdRequest>,
) -> ColetaResult<Json<SimpleResponse>> {
    let response = delete_counted_product_internal(&state.pool, payload.id).await?;
    Ok(Json(response))
}

pub async fn delete_counted_product_internal(
    pool: &DbPool,
    id: i64,
) -> ColetaResult<SimpleResponse> {
    let result = sqlx::query("DELETE FROM ColetaEstoque WHERE Id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ColetaError::Validation(
            "Item contado não encontrado.".to_string(),
        ));
    }

    Ok(SimpleResponse::ok("Produto contado removido com sucesso!"))
}

pub async fn clear_counted_products(
    State(state): State<AppState>,
) -> ColetaResult<Json<SimpleResponse>> {
    let response = clear_counted_products_internal(&state.pool).await?;
    Ok(Json(response))
}

pub async fn clear_counted_products_internal(pool: &DbPool) -> ColetaResult<SimpleResponse> {
    sqlx::query("DELETE FROM ColetaEstoque")
        .execute(pool)
        .await?;

    tracing::info!("Count list cleared");
    Ok(SimpleResponse::ok(
        "Lista de produtos contados limpa com sucesso!",
    ))
}
