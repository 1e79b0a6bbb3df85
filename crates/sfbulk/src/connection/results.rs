//! Result payloads returned by the sObject Collections API.
//!
//! Insert and update return save results, upsert returns upsert results.
//! Both are folded into [`RecordResult`].

use serde::Deserialize;

use super::{FieldError, RecordResult};

/// Error entry inside a result.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    #[serde(default)]
    pub status_code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub fields: Vec<String>,
}

/// Result of an insert or update.
#[derive(Debug, Clone, Deserialize)]
pub struct SaveResult {
    #[serde(default)]
    pub id: Option<String>,
    pub success: bool,
    #[serde(default)]
    pub errors: Vec<ApiError>,
}

/// Result of an upsert.
#[derive(Debug, Clone, Deserialize)]
pub struct UpsertResult {
    #[serde(default)]
    pub id: Option<String>,
    pub success: bool,
    #[serde(default)]
    pub created: bool,
    #[serde(default)]
    pub errors: Vec<ApiError>,
}

impl From<ApiError> for FieldError {
    fn from(error: ApiError) -> Self {
        FieldError {
            code: error.status_code.unwrap_or_default(),
            message: error.message.unwrap_or_default(),
            fields: error.fields,
        }
    }
}

impl From<SaveResult> for RecordResult {
    fn from(result: SaveResult) -> Self {
        RecordResult {
            success: result.success,
            errors: result.errors.into_iter().map(FieldError::from).collect(),
        }
    }
}

impl From<UpsertResult> for RecordResult {
    fn from(result: UpsertResult) -> Self {
        RecordResult {
            success: result.success,
            errors: result.errors.into_iter().map(FieldError::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_results_convert() {
        let body = r#"[
            {"id": "001A", "success": true, "errors": []},
            {"success": false, "errors": [
                {"statusCode": "REQUIRED_FIELD_MISSING", "message": "Required fields are missing: [Name]", "fields": ["Name"]}
            ]}
        ]"#;
        let parsed: Vec<SaveResult> = serde_json::from_str(body).unwrap();
        let results: Vec<RecordResult> = parsed.into_iter().map(RecordResult::from).collect();

        assert_eq!(results[0], RecordResult::ok());
        assert!(!results[1].success);
        assert_eq!(results[1].errors[0].code, "REQUIRED_FIELD_MISSING");
        assert_eq!(results[1].errors[0].fields, vec!["Name".to_string()]);
    }

    #[test]
    fn test_upsert_results_convert() {
        let body = r#"[
            {"id": "001A", "success": true, "created": true, "errors": []},
            {"id": null, "success": false, "created": false, "errors": [
                {"statusCode": "DUPLICATE_VALUE", "message": null}
            ]}
        ]"#;
        let parsed: Vec<UpsertResult> = serde_json::from_str(body).unwrap();
        assert!(parsed[0].created);
        let results: Vec<RecordResult> = parsed.into_iter().map(RecordResult::from).collect();

        assert!(results[0].success);
        assert_eq!(
            results[1].errors,
            vec![FieldError::new("DUPLICATE_VALUE", "", vec![])]
        );
    }
}
