//! Ordered accumulator of config lines, shared by the global and per-service
//! scopes.

use super::option::StunnelOption;

#[derive(Debug, Clone)]
enum Line {
    /// Produced by `set_option`; replaced when the same key is set again.
    Option { key: String, text: String },
    /// Appended verbatim; never replaced.
    Raw(String),
}

impl Line {
    fn text(&self) -> &str {
        match self {
            Line::Option { text, .. } => text,
            Line::Raw(text) => text,
        }
    }
}

/// Ordered config lines owned by one builder.
///
/// Lines are append-only, except that setting an option removes the previous
/// line for the same key. The new line always goes to the end, so re-setting a
/// key moves it.
#[derive(Debug, Clone, Default)]
pub struct ConfigLines {
    lines: Vec<Line>,
}

impl ConfigLines {
    /// Create an empty line set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `option`, replacing any earlier option line with the same key.
    pub fn set_option(&mut self, option: StunnelOption) {
        self.lines.retain(|line| match line {
            Line::Option { key, .. } => key != option.key(),
            Line::Raw(_) => true,
        });
        self.lines.push(Line::Option {
            key: option.key().to_string(),
            text: option.to_config_line(),
        });
    }

    /// Append a line verbatim.
    pub fn add_raw_line(&mut self, line: impl Into<String>) {
        self.lines.push(Line::Raw(line.into()));
    }

    /// Snapshot of the lines in order.
    pub fn lines(&self) -> Vec<&str> {
        self.lines.iter().map(Line::text).collect()
    }

    /// Number of lines.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether no line has been added.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stunnel::value::OptionValue;

    #[test]
    fn test_set_option_appends_in_order() {
        let mut lines = ConfigLines::new();
        lines.set_option(StunnelOption::new("client", true));
        lines.set_option(StunnelOption::new("accept", "8080"));
        assert_eq!(lines.lines(), vec!["client = yes", "accept = 8080"]);
    }

    #[test]
    fn test_repeated_key_keeps_latest_at_latest_position() {
        let mut lines = ConfigLines::new();
        lines.set_option(StunnelOption::new("a", "1"));
        lines.set_option(StunnelOption::new("b", "2"));
        lines.set_option(StunnelOption::new("a", "3"));
        lines.set_option(StunnelOption::new("c", "4"));
        lines.set_option(StunnelOption::new("b", "5"));

        assert_eq!(lines.lines(), vec!["a = 3", "c = 4", "b = 5"]);
    }

    #[test]
    fn test_key_match_is_exact() {
        let mut lines = ConfigLines::new();
        lines.set_option(StunnelOption::new("sslVersionMax", "TLSv1.3"));
        lines.set_option(StunnelOption::new("sslVersion", "TLSv1.2"));
        assert_eq!(
            lines.lines(),
            vec!["sslVersionMax = TLSv1.3", "sslVersion = TLSv1.2"]
        );
    }

    #[test]
    fn test_raw_lines_are_never_replaced() {
        let mut lines = ConfigLines::new();
        lines.add_raw_line("connect = a:443");
        lines.add_raw_line("connect = b:443");
        lines.set_option(StunnelOption::new("connect", OptionValue::Raw("c:443".into())));

        assert_eq!(
            lines.lines(),
            vec!["connect = a:443", "connect = b:443", "connect = c:443"]
        );
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_empty() {
        let lines = ConfigLines::new();
        assert!(lines.is_empty());
        assert!(lines.lines().is_empty());
    }
}
