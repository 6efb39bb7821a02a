//! Body-content matchers for the Wayback Machine's error signals.
//!
//! Wayback does not formally specify which page bodies accompany blocked,
//! missing, or rate-limited responses, and the exact strings have changed
//! over time. All of the matchers live here as plain substring lists so they
//! can be tuned per session without code changes.

/// Substring matchers applied to non-2xx (and suspicious 2xx) response
/// bodies. Matching is case-insensitive.
#[derive(Debug, Clone)]
pub struct BodyPatterns {
    /// The site asked for its content to be removed from the archive.
    pub blocked_site: Vec<String>,
    /// The site's robots.txt excludes it from playback.
    pub blocked_by_robots: Vec<String>,
    /// The archive holds no captures of the requested URL.
    pub no_memento: Vec<String>,
    /// The archive itself is rate-limiting us, even on an HTTP 200.
    pub rate_limit: Vec<String>,
}

impl Default for BodyPatterns {
    fn default() -> Self {
        Self {
            blocked_site: vec![
                "AdministrativeAccessControlException".to_string(),
                "URL has been excluded".to_string(),
            ],
            blocked_by_robots: vec![
                "RobotAccessControlException".to_string(),
                "robots.txt".to_string(),
            ],
            no_memento: vec![
                "not in archive".to_string(),
                "Wayback Machine has not archived that URL".to_string(),
                "Wayback Machine doesn't have that page archived".to_string(),
            ],
            rate_limit: vec![
                "too many requests".to_string(),
                "Please slow down your request rate".to_string(),
            ],
        }
    }
}

impl BodyPatterns {
    pub fn is_blocked_site(&self, body: &str) -> bool {
        contains_any(body, &self.blocked_site)
    }

    pub fn is_blocked_by_robots(&self, body: &str) -> bool {
        contains_any(body, &self.blocked_by_robots)
    }

    pub fn is_no_memento(&self, body: &str) -> bool {
        contains_any(body, &self.no_memento)
    }

    pub fn is_rate_limit(&self, body: &str) -> bool {
        contains_any(body, &self.rate_limit)
    }
}

fn contains_any(body: &str, patterns: &[String]) -> bool {
    let haystack = body.to_ascii_lowercase();
    patterns
        .iter()
        .any(|pattern| haystack.contains(&pattern.to_ascii_lowercase()))
}
