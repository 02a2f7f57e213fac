//! Admissibility predicates applied to a candidate URL before any network
//! activity. Filters compose by conjunction: a URL passes iff every filter
//! in the set returns `true`.
//!
//! A tagged variant is used instead of a trait object so that adding a new
//! filter kind never requires an interface hierarchy (see DESIGN NOTES,
//! "Dynamic dispatch of filters").

use reqwest::Url;
use std::sync::Arc;

/// A single admissibility predicate.
#[derive(Clone)]
pub enum Filter {
    /// Passes iff the candidate's host (including any port segment) equals
    /// the given host exactly.
    HostMatch(String),
    /// Passes iff the given closure returns `true`.
    Func(Arc<dyn Fn(&Url) -> bool + Send + Sync>),
}

impl Filter {
    /// A filter that matches the host (and port) of `seed`.
    pub fn same_host_as(seed: &Url) -> Self {
        Filter::HostMatch(host_with_port(seed))
    }

    /// Wrap an arbitrary closure as a `Filter`.
    pub fn func<F>(f: F) -> Self
    where
        F: Fn(&Url) -> bool + Send + Sync + 'static,
    {
        Filter::Func(Arc::new(f))
    }

    /// Whether `u` is admissible under this single filter.
    pub fn valid(&self, u: &Url) -> bool {
        match self {
            Filter::HostMatch(host) => &host_with_port(u) == host,
            Filter::Func(f) => f(u),
        }
    }
}

impl std::fmt::Debug for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Filter::HostMatch(h) => f.debug_tuple("HostMatch").field(h).finish(),
            Filter::Func(_) => f.write_str("Func(..)"),
        }
    }
}

fn host_with_port(u: &Url) -> String {
    match (u.host_str(), u.port()) {
        (Some(h), Some(p)) => format!("{h}:{p}"),
        (Some(h), None) => h.to_string(),
        (None, _) => String::new(),
    }
}

/// A set of filters. A URL is admissible iff every filter in the set
/// returns `true`; any `false` short-circuits the rest.
#[derive(Clone, Default, Debug)]
pub struct FilterSet {
    filters: Vec<Filter>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self { filters: Vec::new() }
    }

    pub fn push(&mut self, filter: Filter) {
        self.filters.push(filter);
    }

    /// `true` iff `u` passes every filter (vacuously `true` for an empty set).
    pub fn valid(&self, u: &Url) -> bool {
        self.filters.iter().all(|f| f.valid(u))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn host_match_accepts_identical_host_and_port() {
        let seed = url("http://example.com:8080/a");
        let f = Filter::same_host_as(&seed);
        assert!(f.valid(&url("http://example.com:8080/b")));
        assert!(!f.valid(&url("http://example.com/b")));
        assert!(!f.valid(&url("http://other.com:8080/b")));
    }

    #[test]
    fn seed_always_valid_against_its_own_filter() {
        let seed = url("https://url.com/");
        let f = Filter::same_host_as(&seed);
        assert!(f.valid(&seed));
    }

    #[test]
    fn composition_is_conjunctive_and_short_circuits() {
        let mut set = FilterSet::new();
        set.push(Filter::same_host_as(&url("http://a.com/")));
        set.push(Filter::func(|u| u.path() != "/forbidden"));

        assert!(set.valid(&url("http://a.com/ok")));
        assert!(!set.valid(&url("http://a.com/forbidden")));
        assert!(!set.valid(&url("http://b.com/ok")));
    }

    #[test]
    fn empty_filter_set_is_vacuously_valid() {
        let set = FilterSet::new();
        assert!(set.valid(&url("http://anything.example/")));
    }
}
