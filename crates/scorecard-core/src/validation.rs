//! Input validation for the scorecard service
//!
//! Validation runs before any mutating or expensive call so failures are
//! cheap and side-effect free.

use uuid::Uuid;

use crate::{Result, ScorecardError};

/// Maximum length for dashboard names
pub const MAX_DASHBOARD_NAME_LEN: usize = 255;

/// Maximum length for project codes
pub const MAX_PROJECT_CODE_LEN: usize = 100;

/// Parse a dashboard id.
///
/// The id must be a well-formed UUID string. Malformed tokens are rejected
/// before any lookup happens.
pub fn parse_dashboard_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| {
        ScorecardError::InvalidIdentifier(format!("Invalid dashboard ID format: {}", raw))
    })
}

/// Validate a dashboard name
///
/// Requirements:
/// - Not empty
/// - <= 255 characters
pub fn validate_dashboard_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(ScorecardError::ValidationError(
            "Dashboard name cannot be empty".to_string(),
        ));
    }

    let len = name.chars().count();
    if len > MAX_DASHBOARD_NAME_LEN {
        return Err(ScorecardError::ValidationError(format!(
            "Dashboard name too long: {} > {} characters",
            len, MAX_DASHBOARD_NAME_LEN
        )));
    }

    Ok(())
}

/// Validate a project code supplied by a client.
pub fn validate_project_code(project_code: &str) -> Result<()> {
    if project_code.trim().is_empty() {
        return Err(ScorecardError::ValidationError(
            "project_code cannot be empty".to_string(),
        ));
    }

    if project_code.len() > MAX_PROJECT_CODE_LEN {
        return Err(ScorecardError::ValidationError(format!(
            "project_code too long: {} > {} characters",
            project_code.len(),
            MAX_PROJECT_CODE_LEN
        )));
    }

    if project_code.contains('\0') {
        return Err(ScorecardError::ValidationError(
            "project_code contains null byte".to_string(),
        ));
    }

    Ok(())
}

/// Validate a file path from a `file://` store URI
pub fn validate_file_uri_path(path: &str) -> Result<()> {
    if path.contains("..") {
        return Err(ScorecardError::ValidationError(
            "Path contains traversal pattern (..)".to_string(),
        ));
    }

    if path.contains('\0') {
        return Err(ScorecardError::ValidationError(
            "Path contains null byte".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dashboard_id() {
        let id = Uuid::new_v4();
        assert_eq!(parse_dashboard_id(&id.to_string()).unwrap(), id);
        assert_eq!(
            parse_dashboard_id(&id.hyphenated().to_string().to_uppercase()).unwrap(),
            id
        );
    }

    #[test]
    fn test_parse_dashboard_id_malformed() {
        for raw in ["", "not-a-uuid", "1234", "zzzzzzzz-zzzz-zzzz-zzzz-zzzzzzzzzzzz"] {
            match parse_dashboard_id(raw) {
                Err(ScorecardError::InvalidIdentifier(msg)) => {
                    assert!(msg.contains("Invalid dashboard ID format"))
                }
                other => panic!("expected InvalidIdentifier for {:?}, got {:?}", raw, other),
            }
        }
    }

    #[test]
    fn test_dashboard_names() {
        assert!(validate_dashboard_name("Sales overview").is_ok());
        assert!(validate_dashboard_name(&"a".repeat(255)).is_ok());
        assert!(validate_dashboard_name("").is_err());
        assert!(validate_dashboard_name(&"a".repeat(256)).is_err());
    }

    #[test]
    fn test_project_codes() {
        assert!(validate_project_code("DEFAULT").is_ok());
        assert!(validate_project_code("   ").is_err());
        assert!(validate_project_code(&"p".repeat(101)).is_err());
        assert!(validate_project_code("bad\0code").is_err());
    }

    #[test]
    fn test_file_uri_paths() {
        assert!(validate_file_uri_path("/var/lib/scorecard.db").is_ok());
        assert!(validate_file_uri_path("../etc/passwd").is_err());
        assert!(validate_file_uri_path("store\0.db").is_err());
    }
}
