use crate::error::{AppError, AppResult, FileError};
use crate::models::scope::ScopeCatalog;
use std::path::Path;
use tokio::fs;

/// 从 TOML 文件加载全部研究范围
pub async fn load_scope_catalog(path: &Path) -> AppResult<ScopeCatalog> {
    if !path.exists() {
        return Err(FileError::NotFound {
            path: path.display().to_string(),
        }
        .into());
    }

    let content = fs::read_to_string(path)
        .await
        .map_err(|e| AppError::file_read_failed(path.display().to_string(), e))?;

    let catalog = parse_scope_catalog(&content, &path.display().to_string())?;
    tracing::info!("成功加载 {} 个研究范围: {}", catalog.len(), path.display());

    Ok(catalog)
}

/// 解析 TOML 文本；`origin` 只用于错误信息
pub fn parse_scope_catalog(content: &str, origin: &str) -> AppResult<ScopeCatalog> {
    toml::from_str(content).map_err(|source| {
        FileError::TomlParseFailed {
            path: origin.to_string(),
            source,
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[Alzheimer_SingleCell]
query = '(Alzheimer AND ("single cell" OR "single-cell")) AND ("RNA-seq")'
mindate = "2024/06/01"
maxdate = "2025/06/01"
research_goal = "Alzheimer's disease and single-cell RNA sequencing"
identify_original_instructions = "Data deposited only in dbGaP counts as accessible."

[Parkinson_Spatial]
query = "Parkinson AND spatial transcriptomics"
"#;

    #[test]
    fn test_parse_scope_catalog() {
        let catalog = parse_scope_catalog(SAMPLE, "inline").unwrap();
        assert_eq!(catalog.names(), vec!["Alzheimer_SingleCell", "Parkinson_Spatial"]);

        let alz = catalog.get("Alzheimer_SingleCell").unwrap();
        assert_eq!(alz.mindate.as_deref(), Some("2024/06/01"));
        assert_eq!(alz.descriptor(), "Alzheimer's disease and single-cell RNA sequencing");
        assert_eq!(alz.relevant_instructions(), "N/A");
        assert!(alz.original_instructions().contains("dbGaP"));

        let pd = catalog.get("Parkinson_Spatial").unwrap();
        assert_eq!(pd.descriptor(), "Parkinson AND spatial transcriptomics");
        assert!(pd.search_query().date_params().is_empty());
    }

    #[test]
    fn test_unknown_scope_is_config_error() {
        let catalog = parse_scope_catalog(SAMPLE, "inline").unwrap();
        let err = catalog.get("Huntington").unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_invalid_toml_is_file_error() {
        let err = parse_scope_catalog("[broken", "scope.toml").unwrap_err();
        assert!(matches!(err, AppError::File(FileError::TomlParseFailed { .. })));
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let err = load_scope_catalog(Path::new("/definitely/not/here.toml"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::File(FileError::NotFound { .. })));
    }
}
