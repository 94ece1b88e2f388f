//! Upstream hostname allow-list.
//!
//! The sole SSRF guard: every relay request re-validates its target hostname
//! here before any upstream connection is attempted.

/// Set of hostnames the relay is permitted to contact.
///
/// An entry covers itself and its dot-separated subdomains: `example.org`
/// permits `example.org` and `cdn.example.org` but not `evilexample.org`.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    hosts: Vec<String>,
}

impl AllowList {
    /// Build an allow-list from configured entries.
    ///
    /// Entries are lowercased and blank entries dropped.
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let hosts = hosts
            .into_iter()
            .map(|h| h.as_ref().trim().to_ascii_lowercase())
            .filter(|h| !h.is_empty())
            .collect();
        Self { hosts }
    }

    /// Whether the given hostname is covered by the list.
    pub fn permits(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        self.hosts.iter().any(|allowed| {
            host == *allowed
                || host
                    .strip_suffix(allowed.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list() -> AllowList {
        AllowList::new(["vionixtv.lat", "Example.ORG"])
    }

    #[test]
    fn exact_match() {
        assert!(list().permits("vionixtv.lat"));
        assert!(list().permits("example.org"));
    }

    #[test]
    fn case_insensitive() {
        assert!(list().permits("VIONIXTV.LAT"));
    }

    #[test]
    fn subdomains_permitted() {
        assert!(list().permits("cdn.vionixtv.lat"));
        assert!(list().permits("a.b.example.org"));
    }

    #[test]
    fn suffix_without_dot_boundary_rejected() {
        assert!(!list().permits("evilvionixtv.lat"));
        assert!(!list().permits("notexample.org"));
    }

    #[test]
    fn unrelated_hosts_rejected() {
        assert!(!list().permits("example.com"));
        assert!(!list().permits("vionixtv.lat.attacker.net"));
    }

    #[test]
    fn empty_list_rejects_everything() {
        let empty = AllowList::new(Vec::<String>::new());
        assert!(empty.is_empty());
        assert!(!empty.permits("vionixtv.lat"));
    }

    #[test]
    fn blank_entries_dropped() {
        let padded = AllowList::new(["  ", "origin.example", ""]);
        assert!(padded.permits("origin.example"));
        assert!(!padded.permits(""));
    }
}
