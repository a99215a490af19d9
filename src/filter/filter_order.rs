use super::types::{SortDirection, SortKey, SqlParam};

pub struct FilterOrder;

impl FilterOrder {
    /// Parse a `sort` query value: `-price,ratingsAverage` or `-price ratingsAverage`.
    /// A leading `-` sorts descending, everything else ascending.
    pub fn parse_sort_param(s: &str) -> Vec<SortKey> {
        s.split([',', ' '])
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .filter_map(|part| {
                let (field, direction) = match part.strip_prefix('-') {
                    Some(rest) => (rest, SortDirection::Desc),
                    None => (part.trim_start_matches('+'), SortDirection::Asc),
                };
                (!field.is_empty()).then(|| SortKey { field: field.to_string(), direction })
            })
            .collect()
    }

    /// Keys to sort by, falling back to the default order when none were given
    pub fn effective(keys: &[SortKey]) -> Vec<SortKey> {
        if keys.is_empty() {
            SortKey::default_order()
        } else {
            keys.to_vec()
        }
    }

    /// `ORDER BY` over JSONB document fields. Field names travel as bind
    /// parameters; the primary key breaks ties so pages stay stable.
    /// Missing fields rank below every value.
    pub fn generate(keys: &[SortKey], params: &mut Vec<SqlParam>) -> String {
        let mut parts: Vec<String> = keys
            .iter()
            .map(|key| {
                params.push(SqlParam::Text(key.field.clone()));
                let nulls = match key.direction {
                    SortDirection::Asc => "NULLS FIRST",
                    SortDirection::Desc => "NULLS LAST",
                };
                format!("\"doc\" -> ${} {} {}", params.len(), key.direction.to_sql(), nulls)
            })
            .collect();
        parts.push("\"id\" ASC".to_string());
        format!("ORDER BY {}", parts.join(", "))
    }
}
