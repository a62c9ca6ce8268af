//! Runtime knobs for a profiling session.

/// Controls how a session reacts to growth
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionConfig {
    /// Drop new samples while the trie holds at least this many nodes.
    /// `None` lets the trie grow without bound.
    pub max_live_nodes: Option<usize>,
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style helper to cap trie growth
    #[must_use]
    pub fn with_max_live_nodes(mut self, max_live_nodes: usize) -> Self {
        self.max_live_nodes = Some(max_live_nodes);
        self
    }

    /// Whether a trie of `live_nodes` nodes has reached the budget
    pub fn at_budget(&self, live_nodes: usize) -> bool {
        self.max_live_nodes.is_some_and(|max| live_nodes >= max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbounded_by_default() {
        let config = SessionConfig::default();
        assert!(!config.at_budget(usize::MAX));
    }

    #[test]
    fn test_budget_is_inclusive() {
        let config = SessionConfig::new().with_max_live_nodes(4);
        assert!(!config.at_budget(3));
        assert!(config.at_budget(4));
    }
}
