//! Robots.txt rule evaluation

use robotstxt::DefaultMatcher;
use std::time::Duration;

/// Parsed robots.txt rules for a single origin
///
/// Wraps the robotstxt matcher and adds crawl-delay extraction, which the
/// matcher does not expose. A permissive instance stands in whenever the
/// real file is missing or unreachable.
#[derive(Debug, Clone)]
pub struct ParsedRobots {
    /// Raw file content; `None` allows everything
    rules: Option<String>,
}

impl ParsedRobots {
    /// Parses raw robots.txt content
    ///
    /// Blank content is treated as permissive.
    pub fn parse(content: &str) -> Self {
        let trimmed = content.trim();
        Self {
            rules: if trimmed.is_empty() {
                None
            } else {
                Some(content.to_string())
            },
        }
    }

    /// Returns rules that allow every URL
    pub fn permissive() -> Self {
        Self { rules: None }
    }

    /// Checks whether a URL may be fetched by the given user agent
    ///
    /// # Arguments
    ///
    /// * `url` - Full URL or path to check
    /// * `user_agent` - The crawler's user agent token
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        match &self.rules {
            None => true,
            Some(content) => {
                let mut matcher = DefaultMatcher::default();
                matcher.one_agent_allowed_by_robots(content, user_agent, url)
            }
        }
    }

    /// Extracts the crawl delay that applies to the given user agent
    ///
    /// Groups follow robots.txt semantics: consecutive `User-agent` lines
    /// share the directives that follow them, and a `User-agent` line after
    /// any other directive starts a new group. A delay in a group naming the
    /// agent wins over one in a wildcard group.
    ///
    /// # Returns
    ///
    /// * `Some(Duration)` - The applicable `Crawl-delay` value
    /// * `None` - No applicable delay was specified
    pub fn crawl_delay(&self, user_agent: &str) -> Option<Duration> {
        let content = self.rules.as_deref()?;
        let agent = user_agent.to_lowercase();

        let mut for_agent: Option<Duration> = None;
        let mut for_wildcard: Option<Duration> = None;
        let mut group_names_agent = false;
        let mut group_is_wildcard = false;
        let mut collecting_agents = false;

        for line in content.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let Some((key, value)) = trimmed.split_once(':') else {
                continue;
            };
            let key = key.trim().to_lowercase();
            let value = value.trim();

            match key.as_str() {
                "user-agent" => {
                    if !collecting_agents {
                        // A new group begins
                        group_names_agent = false;
                        group_is_wildcard = false;
                        collecting_agents = true;
                    }
                    if value == "*" {
                        group_is_wildcard = true;
                    } else if agent.contains(&value.to_lowercase()) {
                        group_names_agent = true;
                    }
                }
                "crawl-delay" => {
                    collecting_agents = false;
                    if let Ok(seconds) = value.parse::<f64>() {
                        if seconds.is_finite() && seconds >= 0.0 {
                            let delay = Duration::from_secs_f64(seconds);
                            if group_names_agent {
                                for_agent = Some(delay);
                            } else if group_is_wildcard {
                                for_wildcard = Some(delay);
                            }
                        }
                    }
                }
                _ => {
                    collecting_agents = false;
                }
            }
        }

        for_agent.or(for_wildcard)
    }
}
