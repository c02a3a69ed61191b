//! Export/Import de patterns aprendidos.
//!
//! Permite compartilhar patterns entre instalações do Presage.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::patterns::PatternStore;
use crate::types::records::LearningPattern;
use crate::PresageResult;

/// Versão atual do formato de exportação.
pub const EXPORT_VERSION: &str = "1.0";

/// Arquivo de exportação.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternExport {
    /// Versão do formato de exportação.
    pub version: String,
    /// Data/hora da exportação.
    pub exported_at: DateTime<Utc>,
    /// Patterns exportados.
    pub patterns: Vec<LearningPattern>,
}

/// Resultado de uma importação.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImportResult {
    /// Patterns importados (tipos novos).
    pub imported: usize,
    /// Patterns ignorados (existente igual ou mais recente).
    pub skipped: usize,
    /// Patterns mesclados (atualizados).
    pub merged: usize,
}

impl PatternStore {
    /// Exporta todos os patterns para um arquivo JSON.
    pub async fn export(&self, path: &Path) -> PresageResult<usize> {
        let export = PatternExport {
            version: EXPORT_VERSION.to_string(),
            exported_at: Utc::now(),
            patterns: self.all_patterns().await?,
        };

        let json = serde_json::to_string_pretty(&export)?;
        std::fs::write(path, json)?;

        tracing::info!(
            path = %path.display(),
            patterns = export.patterns.len(),
            "Patterns exported"
        );

        Ok(export.patterns.len())
    }

    /// Importa patterns de um arquivo JSON.
    ///
    /// Tipos desconhecidos são inseridos como estão. Um tipo existente só é
    /// mesclado quando o importado tem mais uso ou `last_used` mais novo; a
    /// mescla mantém o maior uso e a maior confiança.
    pub async fn import(&self, path: &Path) -> PresageResult<ImportResult> {
        let json = std::fs::read_to_string(path)?;
        let export: PatternExport = serde_json::from_str(&json)?;

        if export.version != EXPORT_VERSION {
            tracing::warn!(
                version = %export.version,
                expected = EXPORT_VERSION,
                "Importing patterns from a different export version"
            );
        }

        let repo = self.repository();
        let mut result = ImportResult::default();

        for pattern in export.patterns {
            match repo.find_pattern(&pattern.pattern_type).await? {
                None => {
                    repo.upsert_pattern(&pattern).await?;
                    result.imported += 1;
                }
                Some(existing) => match merge_imported(&existing, pattern) {
                    Some(merged) => {
                        repo.upsert_pattern(&merged).await?;
                        result.merged += 1;
                    }
                    None => result.skipped += 1,
                },
            }
        }

        tracing::info!(
            path = %path.display(),
            imported = result.imported,
            skipped = result.skipped,
            merged = result.merged,
            "Patterns imported"
        );

        Ok(result)
    }
}

fn merge_imported(existing: &LearningPattern, imported: LearningPattern) -> Option<LearningPattern> {
    let newer = imported.last_used > existing.last_used;
    if imported.usage_count <= existing.usage_count && !newer {
        return None;
    }

    Some(LearningPattern {
        id: existing.id.clone(),
        pattern_type: existing.pattern_type.clone(),
        pattern_data: if newer {
            imported.pattern_data
        } else {
            existing.pattern_data.clone()
        },
        confidence_score: existing.confidence_score.max(imported.confidence_score),
        usage_count: existing.usage_count.max(imported.usage_count),
        last_used: existing.last_used.max(imported.last_used),
        created_at: existing.created_at.min(imported.created_at),
    })
}

/// Formata patterns para exibição.
pub fn format_patterns(patterns: &[LearningPattern]) -> String {
    if patterns.is_empty() {
        return "Nenhum pattern encontrado.\n".to_string();
    }

    let mut output = String::new();
    for (i, pattern) in patterns.iter().enumerate() {
        output.push_str(&format!(
            "{}. **{}**\n   - Confidence: {:.0}%\n   - Usage: {}\n   - Last used: {}\n   - Data: {}\n",
            i + 1,
            pattern.pattern_type,
            pattern.confidence_score * 100.0,
            pattern.usage_count,
            pattern.last_used.format("%Y-%m-%d %H:%M:%S"),
            pattern.pattern_data
        ));
    }
    output
}
