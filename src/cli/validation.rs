use std::path::PathBuf;

use crate::cli::errors::{CliError, CliResult};

/// Longest query accepted from the command line
const MAX_QUERY_LENGTH: usize = 2000;

/// Validates query text
pub fn validate_query(query: &str) -> CliResult<()> {
    if query.trim().is_empty() {
        return Err(CliError::validation("query", "Query cannot be empty"));
    }

    if query.chars().count() > MAX_QUERY_LENGTH {
        return Err(CliError::validation(
            "query",
            format!("Query cannot exceed {MAX_QUERY_LENGTH} characters"),
        ));
    }
    Ok(())
}

pub fn validate_top_k(top_k: Option<usize>) -> CliResult<()> {
    if top_k == Some(0) {
        return Err(CliError::validation("top_k", "must be at least 1"));
    }
    Ok(())
}

/// Validates similarity threshold range
pub fn validate_min_similarity(min_similarity: Option<f32>) -> CliResult<()> {
    match min_similarity {
        Some(s) if !(-1.0..=1.0).contains(&s) => Err(CliError::validation(
            "min_similarity",
            "must be between -1.0 and 1.0",
        )),
        _ => Ok(()),
    }
}

pub fn validate_inputs(inputs: &[PathBuf]) -> CliResult<()> {
    if inputs.is_empty() {
        return Err(CliError::validation("input", "At least one input is required"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_query() {
        assert!(validate_query("ownership").is_ok());
        assert!(validate_query("   ").is_err());
        assert!(validate_query(&"x".repeat(MAX_QUERY_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_validate_top_k() {
        assert!(validate_top_k(None).is_ok());
        assert!(validate_top_k(Some(5)).is_ok());
        assert!(validate_top_k(Some(0)).is_err());
    }

    #[test]
    fn test_validate_min_similarity() {
        assert!(validate_min_similarity(None).is_ok());
        assert!(validate_min_similarity(Some(-1.0)).is_ok());
        assert!(validate_min_similarity(Some(0.3)).is_ok());
        assert!(validate_min_similarity(Some(1.5)).is_err());
        assert!(validate_min_similarity(Some(f32::NAN)).is_err());
    }

    #[test]
    fn test_validate_inputs() {
        assert!(validate_inputs(&[]).is_err());
        assert!(validate_inputs(&[PathBuf::from("docs")]).is_ok());
    }
}
