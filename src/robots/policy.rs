//! robots.txt policy gate, with a per-host rule cache so repeated fetches
//! of the same host don't re-download and re-parse robots.txt.

use std::collections::HashMap;

use parking_lot::RwLock;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Directive {
    Allow,
    Disallow,
}

#[derive(Debug, Clone)]
struct Rule {
    directive: Directive,
    match_suffix: bool,
    path_fragments: Vec<String>,
}

impl Rule {
    fn parse(pattern: &str, directive: Directive) -> Self {
        let match_suffix = pattern.ends_with('$');
        let trimmed = pattern.strip_suffix('$').unwrap_or(pattern);
        let path_fragments = trimmed.split('*').map(|s| s.to_string()).collect();
        Rule { directive, match_suffix, path_fragments }
    }

    fn matches(&self, path: &str) -> bool {
        match self.path_fragments.as_slice() {
            [] => false,
            [single] => {
                if self.match_suffix {
                    path == single
                } else {
                    path.starts_with(single.as_str())
                }
            }
            fragments => {
                let mut cursor = 0usize;
                for (i, fragment) in fragments.iter().enumerate() {
                    if fragment.is_empty() {
                        continue;
                    }
                    let is_last = i == fragments.len() - 1;
                    if is_last && self.match_suffix {
                        if !path.ends_with(fragment.as_str()) {
                            return false;
                        }
                        continue;
                    }
                    match path[cursor..].find(fragment.as_str()) {
                        Some(found) => cursor += found + fragment.len(),
                        None => return false,
                    }
                }
                true
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
struct HostRules {
    rules: Vec<Rule>,
}

impl HostRules {
    fn parse(body: &str, user_agent: &str) -> Self {
        let mut rules = Vec::new();
        let mut applies = false;
        for raw_line in body.lines() {
            let line = raw_line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let Some((key, value)) = line.split_once(':') else { continue };
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim();
            match key.as_str() {
                "user-agent" => applies = value == "*" || value.eq_ignore_ascii_case(user_agent),
                "allow" if applies => rules.push(Rule::parse(value, Directive::Allow)),
                "disallow" if applies => rules.push(Rule::parse(value, Directive::Disallow)),
                _ => {}
            }
        }
        HostRules { rules }
    }

    /// Allow outranks Disallow on equal specificity; first match wins.
    fn allow(&self, path: &str) -> bool {
        let mut allow_hit = false;
        let mut disallow_hit = false;
        for rule in &self.rules {
            if rule.matches(path) {
                match rule.directive {
                    Directive::Allow => allow_hit = true,
                    Directive::Disallow => disallow_hit = true,
                }
            }
        }
        if allow_hit {
            true
        } else {
            !disallow_hit
        }
    }
}

/// Per-host cache of parsed robots.txt rules. Unreachable robots.txt is
/// treated as allow-all for that host, recorded by caching an empty ruleset.
pub struct RobotsPolicy {
    user_agent: String,
    hosts: RwLock<HashMap<String, HostRules>>,
}

impl RobotsPolicy {
    pub fn new(user_agent: impl Into<String>) -> Self {
        RobotsPolicy { user_agent: user_agent.into(), hosts: RwLock::new(HashMap::new()) }
    }

    /// Feeds a freshly downloaded robots.txt body into the cache for `host`.
    /// Callers fetch the body themselves with the normal downloader so this
    /// module stays free of network concerns.
    pub fn ingest(&self, host: &str, body: Option<&str>) {
        let rules = match body {
            Some(body) => HostRules::parse(body, &self.user_agent),
            None => HostRules::default(),
        };
        self.hosts.write().insert(host.to_string(), rules);
    }

    pub fn is_cached(&self, host: &str) -> bool {
        self.hosts.read().contains_key(host)
    }

    /// Whether `path` is allowed on `host`. Hosts with no cached ruleset
    /// (robots.txt never fetched, or unreachable) allow everything.
    pub fn allow(&self, host: &str, path: &str) -> bool {
        match self.hosts.read().get(host) {
            Some(rules) => rules.allow(path),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_outranks_disallow_on_overlap() {
        let policy = RobotsPolicy::new("bot");
        policy.ingest("h", Some("User-agent: *\nDisallow: /\nAllow: /any"));
        assert!(policy.allow("h", "/any/x"));
        assert!(!policy.allow("h", "/a"));
    }

    #[test]
    fn unreachable_robots_allows_everything() {
        let policy = RobotsPolicy::new("bot");
        policy.ingest("h", None);
        assert!(policy.allow("h", "/anything"));
    }

    #[test]
    fn unknown_host_allows_everything() {
        let policy = RobotsPolicy::new("bot");
        assert!(policy.allow("never-seen", "/x"));
    }

    #[test]
    fn repeated_calls_are_idempotent() {
        let policy = RobotsPolicy::new("bot");
        policy.ingest("h", Some("User-agent: *\nDisallow: /private"));
        let first = policy.allow("h", "/private/x");
        let second = policy.allow("h", "/private/x");
        assert_eq!(first, second);
        assert!(!first);
    }
}
