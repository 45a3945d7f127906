//! Advisory robots.txt policy check.
//!
//! This is a read-only signal for the orchestrator; `fetch_all` does not
//! consult it. Absent or unreachable robots files default to "allowed".

use std::time::Duration;

use super::PageFetcher;

/// Result of a robots.txt check for one domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RobotsPolicy {
    /// Whether a robots.txt was found at all.
    pub exists: bool,
    pub allows_crawling: bool,
}

const ROBOTS_FETCH_TIMEOUT_SECS: u64 = 10;

impl PageFetcher {
    /// Fetches `https://<domain>/robots.txt` and applies a simple
    /// disallow-all detection: `Disallow: /` inside a group whose
    /// `User-agent` matches ours or is the `*` wildcard.
    pub async fn check_policy(&self, domain: &str) -> RobotsPolicy {
        let robots_url = format!("https://{domain}/robots.txt");
        let response = self
            .http
            .get(&robots_url)
            .timeout(Duration::from_secs(ROBOTS_FETCH_TIMEOUT_SECS))
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(domain, error = %e, "robots.txt unreachable; defaulting to allowed");
                return RobotsPolicy {
                    exists: false,
                    allows_crawling: true,
                };
            }
        };

        if !response.status().is_success() {
            return RobotsPolicy {
                exists: false,
                allows_crawling: true,
            };
        }

        match response.text().await {
            Ok(content) => RobotsPolicy {
                exists: true,
                allows_crawling: !disallows_all(&content, &user_agent_token(&self.config.user_agent)),
            },
            Err(e) => {
                tracing::debug!(domain, error = %e, "robots.txt body unreadable; defaulting to allowed");
                RobotsPolicy {
                    exists: false,
                    allows_crawling: true,
                }
            }
        }
    }
}

/// The product token of a `User-Agent` string: everything before the first
/// `/`, lowercased. `"pricegrid/0.1 (…)"` → `"pricegrid"`.
pub(crate) fn user_agent_token(user_agent: &str) -> String {
    user_agent
        .split('/')
        .next()
        .unwrap_or(user_agent)
        .trim()
        .to_ascii_lowercase()
}

/// Detects a blanket `Disallow: /` under a user-agent group matching `token`
/// or the `*` wildcard.
///
/// Consecutive `User-agent` lines form one group header; any rule line ends
/// the header, and the next `User-agent` line starts a fresh group.
pub(crate) fn disallows_all(content: &str, token: &str) -> bool {
    let mut group_matches = false;
    let mut in_group_header = false;

    for raw_line in content.lines() {
        let line = raw_line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }

        if let Some(agent) = strip_directive(line, "user-agent") {
            if !in_group_header {
                group_matches = false;
            }
            in_group_header = true;
            let agent = agent.to_ascii_lowercase();
            if agent == "*" || agent == token {
                group_matches = true;
            }
        } else {
            in_group_header = false;
            if group_matches {
                if let Some(path) = strip_directive(line, "disallow") {
                    if path == "/" {
                        return true;
                    }
                }
            }
        }
    }

    false
}

/// Case-insensitively strips a `directive:` prefix, returning the trimmed value.
fn strip_directive<'a>(line: &'a str, directive: &str) -> Option<&'a str> {
    let (name, value) = line.split_once(':')?;
    if name.trim().eq_ignore_ascii_case(directive) {
        Some(value.trim())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_disallow_all_is_detected() {
        let content = "User-agent: *\nDisallow: /\n";
        assert!(disallows_all(content, "pricegrid"));
    }

    #[test]
    fn matching_agent_disallow_all_is_detected() {
        let content = "User-agent: pricegrid\nDisallow: /\n";
        assert!(disallows_all(content, "pricegrid"));
    }

    #[test]
    fn other_agent_group_does_not_apply() {
        let content = "User-agent: badbot\nDisallow: /\n\nUser-agent: *\nDisallow: /private\n";
        assert!(!disallows_all(content, "pricegrid"));
    }

    #[test]
    fn partial_disallow_is_allowed() {
        let content = "User-agent: *\nDisallow: /checkout\nDisallow: /cart\n";
        assert!(!disallows_all(content, "pricegrid"));
    }

    #[test]
    fn stacked_agent_lines_share_one_group() {
        let content = "User-agent: badbot\nUser-agent: *\nDisallow: /\n";
        assert!(disallows_all(content, "pricegrid"));
    }

    #[test]
    fn rule_line_ends_the_group_header() {
        // The second group is only `badbot`; the earlier wildcard group allows us.
        let content =
            "User-agent: *\nDisallow: /tmp\nUser-agent: badbot\nDisallow: /\n";
        assert!(!disallows_all(content, "pricegrid"));
    }

    #[test]
    fn comments_and_case_are_ignored() {
        let content = "# policy\nUSER-AGENT: *  # everyone\nDISALLOW: /   # full stop\n";
        assert!(disallows_all(content, "pricegrid"));
    }

    #[test]
    fn empty_content_allows() {
        assert!(!disallows_all("", "pricegrid"));
    }

    #[test]
    fn token_extraction() {
        assert_eq!(user_agent_token("pricegrid/0.1 (product-aggregation)"), "pricegrid");
        assert_eq!(user_agent_token("CustomAgent"), "customagent");
    }
}
