//! Two-column import of article codes.

use async_trait::async_trait;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use super::{strip_outer_quotes, ImportError, ImportProtocol, RowOutcome, Tally};

/// Loads `artigos` from a `numero,nome` CSV. The article number is the
/// dedup key; rows whose number already exists are skipped. Names may
/// contain commas, so each row splits only at its first comma.
pub struct ArtigoImport;

#[async_trait]
impl ImportProtocol for ArtigoImport {
    type Header = ();

    fn name(&self) -> &'static str {
        "artigos"
    }

    fn parse_header(&self, lines: &[String]) -> Result<(), ImportError> {
        if lines.is_empty() {
            return Err(ImportError::Invalid(
                "O arquivo CSV está vazio ou não contém dados.".to_string(),
            ));
        }
        let header_line = lines[0].to_lowercase().replace('"', "");
        let header_line = header_line.trim();
        let headers: Vec<&str> = header_line.split(',').map(str::trim).collect();
        if headers.len() < 2 || headers[0] != "numero" || headers[1] != "nome" {
            return Err(ImportError::Invalid(format!(
                "Formato de CSV inválido. O cabeçalho deve ser \"numero,nome\", \
                 mas foi encontrado: \"{header_line}\"."
            )));
        }
        if lines.len() == 1 {
            return Err(ImportError::Invalid(
                "O arquivo CSV não contém dados para importar (apenas cabeçalho).".to_string(),
            ));
        }
        Ok(())
    }

    async fn reconcile_row(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        _header: &(),
        _line_number: usize,
        line: &str,
    ) -> Result<RowOutcome, ImportError> {
        // Split at the first comma only: everything after it is the name.
        let Some(comma) = line.find(',') else {
            return Ok(RowOutcome::Blank);
        };
        let numero = strip_outer_quotes(&line[..comma]).trim();
        let nome = strip_outer_quotes(&line[comma + 1..]).trim();
        if numero.is_empty() || nome.is_empty() {
            return Ok(RowOutcome::Blank);
        }

        let existing: Option<String> = sqlx::query_scalar("SELECT id FROM artigos WHERE numero = $1")
            .bind(numero)
            .fetch_optional(&mut **tx)
            .await?;
        if existing.is_some() {
            return Ok(RowOutcome::Skipped(numero.to_string()));
        }

        sqlx::query(
            "INSERT INTO artigos (id, numero, nome, created_at, updated_at) \
             VALUES ($1, $2, $3, NOW(), NOW())",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(numero)
        .bind(nome)
        .execute(&mut **tx)
        .await?;
        Ok(RowOutcome::Inserted)
    }

    fn summary(&self, tally: &Tally) -> String {
        format!(
            "{} códigos importados com sucesso. {} ignorados por já existirem (número duplicado).",
            tally.imported, tally.skipped
        )
    }
}
