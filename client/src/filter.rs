//! Exact-match allow list over (method, path).

use burrow_shared::{Error, Result};

/// One permitted (method, path) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub method: String,
    pub path: String,
}

/// Ordered rule list with "any rule matches" semantics.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    rules: Vec<Rule>,
}

impl AllowList {
    /// Parse whitespace-separated alternating METHOD /path pairs, e.g.
    /// `"POST /slack/events GET /health"`. Methods are upper-cased at
    /// load time; paths are kept byte-exact.
    pub fn parse(raw: &str) -> Result<Self> {
        let fields: Vec<&str> = raw.split_whitespace().collect();
        if fields.is_empty() || fields.len() % 2 != 0 {
            return Err(Error::Config(
                "TUN_ALLOW requires METHOD /path pairs".to_string(),
            ));
        }
        let rules = fields
            .chunks(2)
            .map(|pair| Rule {
                method: pair[0].to_uppercase(),
                path: pair[1].to_string(),
            })
            .collect();
        Ok(Self { rules })
    }

    /// Membership: the method is case-normalized, the path must match
    /// byte for byte: no trailing-slash or case forgiveness, and the
    /// query string counts.
    pub fn allows(&self, method: &str, path: &str) -> bool {
        let method = method.to_uppercase();
        self.rules
            .iter()
            .any(|r| r.method == method && r.path == path)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let cases: &[(&str, bool, usize)] = &[
            ("POST /slack/events", true, 1),
            ("POST /slack/events GET /health", true, 2),
            ("post /slack/events", true, 1),
            ("", false, 0),
            ("   ", false, 0),
            ("POST", false, 0),
            ("POST /a GET", false, 0),
        ];
        for (raw, ok, want_len) in cases {
            let got = AllowList::parse(raw);
            assert_eq!(got.is_ok(), *ok, "parse({raw:?})");
            if let Ok(list) = got {
                assert_eq!(list.len(), *want_len, "parse({raw:?})");
            }
        }
    }

    #[test]
    fn test_method_normalized_at_load_time() {
        let list = AllowList::parse("post /x").unwrap();
        assert!(list.allows("POST", "/x"));
        assert!(list.allows("post", "/x"));
    }

    #[test]
    fn test_allows() {
        let list = AllowList::parse("POST /slack/events GET /health").unwrap();

        let cases: &[(&str, &str, bool)] = &[
            ("POST", "/slack/events", true),
            ("GET", "/health", true),
            ("GET", "/slack/events", false),
            ("POST", "/health", false),
            ("POST", "/other", false),
            ("DELETE", "/slack/events", false),
            // Paths are byte-exact: no trailing-slash or case slack.
            ("POST", "/slack/events/", false),
            ("POST", "/Slack/Events", false),
            ("POST", "/slack/events?x=1", false),
        ];
        for (method, path, want) in cases {
            assert_eq!(list.allows(method, path), *want, "allows({method}, {path})");
        }
    }
}
