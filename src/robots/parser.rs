//! Robots.txt parser implementation
//!
//! Rule matching is delegated to the robotstxt crate. Sitemap and crawl-delay
//! directives, which that crate does not expose, are read line by line here.

use robotstxt::DefaultMatcher;

/// Parsed robots.txt data
#[derive(Debug, Clone)]
pub struct ParsedRobots {
    /// Raw robots.txt content
    content: String,
    /// Absolute sitemap URLs advertised with `Sitemap:` lines
    sitemaps: Vec<String>,
}

impl ParsedRobots {
    /// Creates a new ParsedRobots from raw robots.txt content
    pub fn from_content(content: &str) -> Self {
        let sitemaps = directive_values(content, "sitemap")
            .map(|(_, value)| value.to_string())
            .filter(|value| !value.is_empty())
            .collect();

        Self {
            content: content.to_string(),
            sitemaps,
        }
    }

    /// Creates a permissive ParsedRobots, used when robots.txt is absent
    pub fn allow_all() -> Self {
        Self {
            content: String::new(),
            sitemaps: Vec::new(),
        }
    }

    /// Sitemap URLs listed in the file, in file order
    pub fn sitemaps(&self) -> &[String] {
        &self.sitemaps
    }

    /// Checks if a URL is allowed for the given user agent
    ///
    /// # Arguments
    ///
    /// * `url` - The absolute URL to check
    /// * `user_agent` - The product token of our crawler
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        if self.content.trim().is_empty() {
            return true;
        }

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, user_agent, url)
    }

    /// Gets the crawl delay that applies to `user_agent`, in seconds
    ///
    /// A delay declared for the agent itself wins over one declared for `*`.
    pub fn crawl_delay(&self, user_agent: &str) -> Option<f64> {
        let agent = user_agent.to_lowercase();
        let mut group: Vec<String> = Vec::new();
        let mut group_open = false;
        let mut wildcard_delay = None;
        let mut agent_delay = None;

        for (key, value) in directive_values(&self.content, "") {
            match key.as_str() {
                "user-agent" => {
                    if !group_open {
                        group.clear();
                    }
                    group.push(value.to_lowercase());
                    group_open = true;
                }
                "crawl-delay" => {
                    group_open = false;
                    let Ok(delay) = value.parse::<f64>() else {
                        continue;
                    };
                    if group.iter().any(|ua| ua != "*" && agent.contains(ua.as_str())) {
                        agent_delay = Some(delay);
                    } else if group.iter().any(|ua| ua == "*") {
                        wildcard_delay = Some(delay);
                    }
                }
                _ => group_open = false,
            }
        }

        agent_delay.or(wildcard_delay)
    }
}

/// Iterates `key: value` directives, lowercasing keys and stripping comments.
/// An empty `only` yields every directive.
fn directive_values<'a>(
    content: &'a str,
    only: &'a str,
) -> impl Iterator<Item = (String, &'a str)> + 'a {
    content.lines().filter_map(move |line| {
        let line = line.split('#').next().unwrap_or("").trim();
        let (key, value) = line.split_once(':')?;
        let key = key.trim().to_lowercase();
        if only.is_empty() || key == only {
            Some((key, value.trim()))
        } else {
            None
        }
    })
}
