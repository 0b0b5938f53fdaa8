//! Scope string helpers.
//!
//! Scopes look like `kind:attribute:identifier` (`dashboards:uid:abc`).
//! Wildcards replace any suffix with `*` (`dashboards:*`, `dashboards:uid:*`)
//! or stand alone (`*`).

/// The wildcard scopes that cover every resource under a prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wildcards(Vec<String>);

impl Wildcards {
    /// `"dashboards:uid:"` → `["*", "dashboards:*", "dashboards:uid:*"]`.
    pub fn from_prefix(prefix: &str) -> Self {
        let mut wildcards = vec!["*".to_string()];
        let mut acc = String::new();
        for part in prefix.split(':').filter(|p| !p.is_empty()) {
            acc.push_str(part);
            acc.push(':');
            wildcards.push(format!("{acc}*"));
        }
        Wildcards(wildcards)
    }

    pub fn contains(&self, scope: &str) -> bool {
        self.0.iter().any(|w| w == scope)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

/// Extract the identifier of an exact scope under `prefix`.
///
/// Returns `None` for other categories, wildcards and malformed scopes
/// (empty identifier, embedded `*`, extra `:` segments).
pub fn identifier<'a>(scope: &'a str, prefix: &str) -> Option<&'a str> {
    let id = scope.strip_prefix(prefix)?;
    if id.is_empty() || id.contains('*') || id.contains(':') {
        return None;
    }
    Some(id)
}
