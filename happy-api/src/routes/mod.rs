pub mod admin;
pub mod auth;
pub mod favorites;
pub mod health;
pub mod menu;
pub mod notifications;
pub mod restaurants;
pub mod reviews;

use happy_shared::errors::{AppError, ErrorCode};
use validator::ValidationError;

/// Resolves a `status`/`role`-style query or body value through its `FromStr`.
pub(crate) fn parse_field<T>(field: &str, value: &str) -> Result<T, AppError>
where
    T: std::str::FromStr<Err = String>,
{
    value.parse().map_err(|e: String| {
        AppError::with_details(
            ErrorCode::ValidationError,
            e,
            serde_json::json!({ "field": field }),
        )
    })
}

/// Blank strings from forms count as absent.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Update semantics for a nullable column: absent keeps it, blank clears it.
pub(crate) fn clearable(value: Option<String>) -> Option<Option<String>> {
    value.map(|v| Some(v.trim().to_string()).filter(|v| !v.is_empty()))
}

/// URL check for update fields, where a blank value means "clear".
pub(crate) fn url_or_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() || validator::validate_url(value) {
        return Ok(());
    }
    let mut err = ValidationError::new("url");
    err.message = Some("must be a URL".into());
    Err(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clearable_distinguishes_absent_from_blank() {
        assert_eq!(clearable(None), None);
        assert_eq!(clearable(Some("  ".into())), Some(None));
        assert_eq!(clearable(Some(" 028 3823 ".into())), Some(Some("028 3823".into())));
    }

    #[test]
    fn blank_passes_url_check() {
        assert!(url_or_blank("").is_ok());
        assert!(url_or_blank("https://cdn.example.com/a.png").is_ok());
        assert!(url_or_blank("not a url").is_err());
    }
    use crate::models::ReviewStatus;

    #[test]
    fn parse_field_reports_field_name() {
        let ok: ReviewStatus = parse_field("status", "approved").unwrap();
        assert_eq!(ok, ReviewStatus::Approved);

        let err = parse_field::<ReviewStatus>("status", "archived").unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::ValidationError);
    }

    #[test]
    fn blank_is_absent() {
        assert_eq!(non_blank(Some("  ".into())), None);
        assert_eq!(non_blank(Some("pho".into())), Some("pho".into()));
    }
}
