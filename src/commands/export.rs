use crate::db::{self, CountedItem};
use crate::error::{ColetaError, ColetaResult};
use crate::state::AppState;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use chrono::{Local, NaiveDate};

const BLANK_DATE: &str = "          "; // 10 spaces

/// `DD/MM/YYYY`, or ten spaces when the stored value is empty or unparseable.
fn legacy_date(iso: &str) -> String {
    match NaiveDate::parse_from_str(iso, "%Y-%m-%d") {
        Ok(date) => date.format("%d/%m/%Y").to_string(),
        Err(_) => BLANK_DATE.to_string(),
    }
}

/// One fixed-width line of the legacy import format: product code (14),
/// total quantity (6), lot (19), expiry date (10), a separating space and
/// manufacture date (10). All left-justified and hard-truncated.
pub fn format_export_line(item: &CountedItem) -> String {
    let total = item.quantidade_base * item.multiplicador_usado;
    format!(
        "{:<14.14}{:<6.6}{:<19.19}{} {}\n",
        item.codigo_produto,
        total.to_string(),
        item.lote,
        legacy_date(&item.data_validade),
        legacy_date(&item.data_fabricacao),
    )
}

pub fn render_export(items: &[CountedItem]) -> String {
    items.iter().map(format_export_line).collect()
}

/// The legacy importer reads ISO-8859-1. Unmappable characters degrade to `?`
/// rather than aborting the export.
pub fn encode_latin1(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| if (c as u32) <= 0xFF { c as u8 } else { b'?' })
        .collect()
}

pub async fn generate_import_file(State(state): State<AppState>) -> ColetaResult<Response> {
    let items = db::list_in_insertion_order(&state.pool).await?;

    if items.is_empty() {
        return Err(ColetaError::Validation(
            "Nenhum produto contado para gerar o arquivo.".to_string(),
        ));
    }

    let body = encode_latin1(&render_export(&items));
    let filename = format!("COLETA_{}.txt", Local::now().format("%Y%m%d_%H%M%S"));
    tracing::info!("Generated import file {} with {} row(s)", filename, items.len());

    let headers = [
        (
            header::CONTENT_TYPE,
            "text/plain; charset=ISO-8859-1".to_string(),
        ),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        ),
    ];

    Ok((headers, body).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(
        codigo_produto: &str,
        lote: &str,
        base: i64,
        multiplicador: i64,
        data_fabricacao: &str,
        data_validade: &str,
    ) -> CountedItem {
        CountedItem {
            id: 1,
            codigo_produto: codigo_produto.to_string(),
            codigo_barras: "7891000100103".to_string(),
            nome_produto: "Produto Teste".to_string(),
            lote: lote.to_string(),
            data_fabricacao: data_fabricacao.to_string(),
            data_validade: data_validade.to_string(),
            quantidade_base: base,
            multiplicador_usado: multiplicador,
            quantidade_total: base * multiplicador,
            data_hora_coleta: "2024-01-01 12:00:00".to_string(),
        }
    }

    #[test]
    fn line_has_exact_field_widths() {
        let line = format_export_line(&item("123", "L1", 2, 10, "2024-01-01", "2025-01-01"));

        // 14 + 6 + 19 + 10 + 1 + 10 + newline
        assert_eq!(line.len(), 61);
        assert_eq!(&line[0..14], format!("{:<14}", "123"));
        assert_eq!(&line[14..20], format!("{:<6}", "20"));
        assert_eq!(&line[20..39], format!("{:<19}", "L1"));
        assert_eq!(&line[39..49], "01/01/2025");
        assert_eq!(&line[49..50], " ");
        assert_eq!(&line[50..60], "01/01/2024");
        assert!(line.ends_with('\n'));
    }

    #[test]
    fn overlong_fields_are_truncated() {
        let line = format_export_line(&item(
            "12345678901234567890",
            "LOTE-MUITO-COMPRIDO-DEMAIS",
            1234567,
            1,
            "2024-01-01",
            "2025-01-01",
        ));

        assert_eq!(line.len(), 61);
        assert_eq!(&line[0..14], "12345678901234");
        assert_eq!(&line[14..20], "123456");
        assert_eq!(&line[20..39], "LOTE-MUITO-COMPRIDO");
    }

    #[test]
    fn missing_or_bad_dates_become_ten_spaces() {
        let line = format_export_line(&item("1", "*", 1, 1, "", "31/12/2025"));
        assert_eq!(&line[39..49], BLANK_DATE);
        assert_eq!(&line[50..60], BLANK_DATE);
    }

    #[test]
    fn latin1_encodes_accented_text_byte_per_char() {
        let bytes = encode_latin1("AÇÚCAR CRISTAL");
        assert_eq!(bytes.len(), 14);
        assert_eq!(bytes[1], 0xC7); // Ç
        assert_eq!(bytes[2], 0xDA); // Ú
    }

    #[test]
    fn latin1_replaces_unmappable_chars() {
        assert_eq!(encode_latin1("a→b"), vec![b'a', b'?', b'b']);
    }

    #[test]
    fn render_keeps_one_line_per_item() {
        let items = vec![
            item("1", "A", 1, 1, "2024-01-01", "2025-01-01"),
            item("2", "B", 3, 10, "", ""),
        ];
        let out = render_export(&items);
        assert_eq!(out.lines().count(), 2);
        assert!(out.lines().all(|l| l.len() == 60));
    }
}
