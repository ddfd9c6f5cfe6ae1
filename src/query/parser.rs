//! Splits a raw query string into `keywords[]`, `exclusions[]` (a leading
//! `-`), and an optional `site:` host filter. Each surviving keyword is
//! n-gram tokenized independently by the executor.

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedQuery {
    pub keywords: Vec<String>,
    pub exclusions: Vec<String>,
    pub site: Option<String>,
}

pub fn parse(raw: &str) -> ParsedQuery {
    let mut parsed = ParsedQuery::default();
    for word in raw.split_whitespace() {
        if let Some(site) = word.strip_prefix("site:") {
            parsed.site = Some(site.to_string());
        } else if let Some(excluded) = word.strip_prefix('-') {
            if !excluded.is_empty() {
                parsed.exclusions.push(excluded.to_string());
            }
        } else if !word.is_empty() {
            parsed.keywords.push(word.to_string());
        }
    }
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_keywords_exclusion_and_site_filter() {
        let parsed = parse("A B site:example.com -spam");
        assert_eq!(parsed.keywords, vec!["A".to_string(), "B".to_string()]);
        assert_eq!(parsed.exclusions, vec!["spam".to_string()]);
        assert_eq!(parsed.site, Some("example.com".to_string()));
    }

    #[test]
    fn empty_query_has_no_keywords() {
        let parsed = parse("   ");
        assert!(parsed.keywords.is_empty());
    }
}
