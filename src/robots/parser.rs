//! Robots.txt policy wrapper
//!
//! Thin wrapper over the robotstxt crate that adds an explicit allow-all
//! state for the fail-open path.

use robotstxt::DefaultMatcher;

/// A parsed robots.txt policy for one origin
#[derive(Debug, Clone)]
pub struct ParsedRobots {
    /// Raw robots.txt content (empty string means allow all)
    content: String,
    /// True when the policy was constructed as permissive
    allow_all: bool,
}

impl ParsedRobots {
    /// Creates a policy from raw robots.txt content
    pub fn from_content(content: &str) -> Self {
        Self {
            content: content.to_string(),
            allow_all: false,
        }
    }

    /// Creates a permissive policy that allows every URL
    ///
    /// This is the deliberate fail-open default used when robots.txt cannot
    /// be fetched; callers must not assume denial under network failure.
    pub fn allow_all() -> Self {
        Self {
            content: String::new(),
            allow_all: true,
        }
    }

    /// Checks whether a URL is allowed for the given user agent
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        if self.allow_all || self.content.is_empty() {
            return true;
        }

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, user_agent, url)
    }
}
