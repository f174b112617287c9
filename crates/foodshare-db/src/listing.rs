//! Shared helpers for list endpoints: ordering, search patterns, paging.

/// A whitelisted `ORDER BY` clause.
///
/// Only `&'static str` column expressions from a caller-supplied whitelist
/// ever reach the SQL text, so the clause is safe to splice into a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
    column: &'static str,
    descending: bool,
}

impl OrderBy {
    #[must_use]
    pub const fn asc(column: &'static str) -> Self {
        Self {
            column,
            descending: false,
        }
    }

    #[must_use]
    pub const fn desc(column: &'static str) -> Self {
        Self {
            column,
            descending: true,
        }
    }

    /// Resolve an `ordering` parameter (`field` or `-field`).
    ///
    /// `allowed` maps public field names to column expressions. Unknown or
    /// missing fields fall back to `default`.
    #[must_use]
    pub fn resolve(
        raw: Option<&str>,
        allowed: &[(&str, &'static str)],
        default: OrderBy,
    ) -> Self {
        let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
            return default;
        };
        let (name, descending) = match raw.strip_prefix('-') {
            Some(rest) => (rest, true),
            None => (raw, false),
        };

        allowed
            .iter()
            .find(|(field, _)| *field == name)
            .map_or(default, |&(_, column)| Self { column, descending })
    }

    /// Render as SQL, with `tiebreak` appended for a deterministic order.
    #[must_use]
    pub fn to_sql(self, tiebreak: &'static str) -> String {
        let direction = if self.descending { "DESC" } else { "ASC" };
        format!("{} {direction}, {tiebreak}", self.column)
    }
}

/// Escape `LIKE` wildcards and wrap in `%…%` for a contains-match.
#[must_use]
pub fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// Trim a search term, mapping blank input to `None`.
pub(crate) fn search_pattern(term: Option<&str>) -> Option<String> {
    term.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(like_pattern)
}

/// `LIMIT` / `OFFSET` for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIELDS: &[(&str, &str)] = &[("name", "o.name"), ("created_at", "o.created_at")];

    #[test]
    fn resolve_known_field_ascending_and_descending() {
        let default = OrderBy::asc("o.name");
        assert_eq!(
            OrderBy::resolve(Some("created_at"), FIELDS, default),
            OrderBy::asc("o.created_at")
        );
        assert_eq!(
            OrderBy::resolve(Some("-name"), FIELDS, default),
            OrderBy::desc("o.name")
        );
    }

    #[test]
    fn resolve_unknown_field_uses_default() {
        let default = OrderBy::desc("o.created_at");
        assert_eq!(
            OrderBy::resolve(Some("password; DROP TABLE users"), FIELDS, default),
            default
        );
        assert_eq!(OrderBy::resolve(None, FIELDS, default), default);
        assert_eq!(OrderBy::resolve(Some(" "), FIELDS, default), default);
    }

    #[test]
    fn to_sql_appends_tiebreak() {
        assert_eq!(
            OrderBy::desc("d.created_at").to_sql("d.id DESC"),
            "d.created_at DESC, d.id DESC"
        );
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50%_off\\"), "%50\\%\\_off\\\\%");
        assert_eq!(like_pattern("bread"), "%bread%");
    }

    #[test]
    fn search_pattern_ignores_blank() {
        assert_eq!(search_pattern(Some("   ")), None);
        assert_eq!(search_pattern(None), None);
        assert_eq!(search_pattern(Some(" milk ")), Some("%milk%".to_string()));
    }
}
