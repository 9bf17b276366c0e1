/// A whitespace or comma separated list of service names taken from the
/// realm configuration, such as `"HTTP, host ldap"`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ServiceList {
    raw: String,
}

impl ServiceList {
    pub fn new(raw: &str) -> Self {
        return Self {
            raw: raw.to_string(),
        };
    }

    pub fn is_empty(&self) -> bool {
        return self.raw.trim().is_empty();
    }

    /// Whether `pattern` appears in the list as a whole entry, bounded on
    /// the left by the start of the list, whitespace or a comma, and on the
    /// right by the end of the list, whitespace or a comma.
    pub fn matches(&self, pattern: &str) -> bool {
        return match_config_pattern(&self.raw, pattern);
    }

    /// Whether the service itself or the `*` wildcard is listed.
    pub fn contains_service(&self, service: &str) -> bool {
        return self.matches(service) || self.matches("*");
    }
}

fn is_separator(c: char) -> bool {
    return c.is_whitespace() || c == ',';
}

fn match_config_pattern(list: &str, pattern: &str) -> bool {
    if pattern.is_empty() {
        return false;
    }

    for (pos, _) in list.match_indices(pattern) {
        let left_ok = list[..pos].chars().next_back().map_or(true, is_separator);
        let right_ok = list[pos + pattern.len()..]
            .chars()
            .next()
            .map_or(true, is_separator);

        if left_ok && right_ok {
            return true;
        }
    }

    return false;
}

impl From<&str> for ServiceList {
    fn from(raw: &str) -> Self {
        return Self::new(raw);
    }
}
