use std::collections::HashMap;

// -----------------------------------------------------------------------------
// ----- PrefixMap -------------------------------------------------------------

/// Per-connection CURIE table filled by PREFIX messages.
#[derive(Debug, Default, Clone)]
pub struct PrefixMap {
    by_prefix: HashMap<String, String>,
}

impl PrefixMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, prefix: impl Into<String>, uri: impl Into<String>) {
        self.by_prefix.insert(prefix.into(), uri.into());
    }

    /// Expands `prefix:suffix` when the prefix is known; anything else is
    /// returned as-is.
    pub fn resolve(&self, curie_or_uri: &str) -> String {
        if let Some((prefix, suffix)) = curie_or_uri.split_once(':') {
            if let Some(base) = self.by_prefix.get(prefix) {
                return format!("{base}{suffix}");
            }
        }

        curie_or_uri.to_string()
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_known_prefix() {
        let mut prefixes = PrefixMap::new();
        prefixes.add("wamp", "http://api.wamp.ws/procedure#");
        assert_eq!(
            prefixes.resolve("wamp:authreq"),
            "http://api.wamp.ws/procedure#authreq"
        );
    }

    #[test]
    fn leaves_full_uris_and_bare_names_alone() {
        let prefixes = PrefixMap::new();
        assert_eq!(
            prefixes.resolve("http://api.wamp.ws/procedure#auth"),
            "http://api.wamp.ws/procedure#auth"
        );
        assert_eq!(prefixes.resolve("dbusSend"), "dbusSend");
    }

    #[test]
    fn later_prefix_replaces_earlier() {
        let mut prefixes = PrefixMap::new();
        prefixes.add("p", "http://a/");
        prefixes.add("p", "http://b/");
        assert_eq!(prefixes.resolve("p:x"), "http://b/x");
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
