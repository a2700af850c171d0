use crate::AppError;

pub fn is_valid_email(value: &str) -> bool {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.len() > 320 {
        return false;
    }

    let mut segments = trimmed.split('@');
    let local = segments.next().unwrap_or_default();
    let domain = segments.next().unwrap_or_default();

    if segments.next().is_some() {
        return false;
    }

    if local.is_empty() || domain.is_empty() {
        return false;
    }

    if local
        .bytes()
        .any(|ch| ch <= b' ' || matches!(ch, b'@' | b';' | b',' | b'"'))
    {
        return false;
    }

    if domain
        .bytes()
        .any(|ch| ch <= b' ' || matches!(ch, b'@' | b';' | b',' | b'"'))
    {
        return false;
    }

    domain.contains('.')
}

/// Shared skip/first/keyword normalization for paginated listings.
pub fn normalize_list_params(
    skip: Option<i64>,
    first: Option<i64>,
    query: Option<&str>,
) -> Result<(i64, i64, Option<String>), AppError> {
    let limit = first.unwrap_or(20).clamp(1, 100);
    let offset = skip.unwrap_or(0);

    if offset < 0 {
        return Err(AppError::bad_request("skip must be non-negative"));
    }

    let keyword = query
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| value.to_string());

    Ok((limit, offset, keyword))
}

pub fn display_name_from_parts(name: Option<&str>, email: &str) -> String {
    if let Some(explicit) = name.and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_owned())
        }
    }) {
        return explicit;
    }

    fallback_display_name(email)
}

pub fn fallback_display_name(email: &str) -> String {
    email
        .split('@')
        .next()
        .filter(|part| !part.is_empty())
        .unwrap_or(email)
        .to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validation_rejects_malformed_addresses() {
        assert!(is_valid_email("dev@example.com"));
        assert!(is_valid_email("  padded@example.org  "));
        assert!(!is_valid_email("no-at-sign"));
        assert!(!is_valid_email("two@@example.com"));
        assert!(!is_valid_email("dot-missing@localhost"));
        assert!(!is_valid_email("space in@example.com"));
    }

    #[test]
    fn list_params_clamp_and_trim() {
        let (limit, offset, keyword) =
            normalize_list_params(Some(5), Some(500), Some("  alice  ")).unwrap();
        assert_eq!(limit, 100);
        assert_eq!(offset, 5);
        assert_eq!(keyword.as_deref(), Some("alice"));

        let (limit, offset, keyword) = normalize_list_params(None, None, Some("   ")).unwrap();
        assert_eq!(limit, 20);
        assert_eq!(offset, 0);
        assert!(keyword.is_none());

        assert!(normalize_list_params(Some(-1), None, None).is_err());
    }

    #[test]
    fn display_name_falls_back_to_email_local_part() {
        assert_eq!(display_name_from_parts(Some("Alice"), "a@example.com"), "Alice");
        assert_eq!(display_name_from_parts(Some("  "), "a@example.com"), "a");
        assert_eq!(display_name_from_parts(None, "bob@example.com"), "bob");
    }
}
