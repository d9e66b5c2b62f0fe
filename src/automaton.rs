use std::collections::BTreeSet;

use crate::Map;

/// Type that is used for identifying states. Valid states of an [`AutomatonSpec`] are
/// `0..state_count`.
pub type StateId = usize;

/// Describes the shape of a DFA: its alphabet, how many states it has and which of them are
/// initial, dead or final. The transitions are stored separately in a [`TransitionTable`].
///
/// Nothing about the description is validated, for example the initial state may well lie
/// outside of `0..state_count`. Drawing such a description simply references a state that was
/// never declared.
///
/// # Example
///
/// We want to describe a DFA with two states 0 and 1 over the alphabet `["0", "1"]` where 0 is
/// initial and 1 is final. This can be done as follows
/// ```
/// use dfa_tikz::prelude::*;
///
/// let spec = AutomatonSpec::new(["0", "1"], 2, 0).with_final_states([1]);
/// assert!(spec.is_final(1));
/// assert_eq!(spec.states().count(), 2);
/// ```
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct AutomatonSpec {
    alphabet: Vec<String>,
    state_count: usize,
    initial: StateId,
    dead: Option<StateId>,
    finals: BTreeSet<StateId>,
}

impl AutomatonSpec {
    /// Creates a new description with the given alphabet, `state_count` states and `initial` as
    /// the initial state. There is no dead state and no state is final.
    pub fn new<I, S>(alphabet: I, state_count: usize, initial: StateId) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            alphabet: alphabet.into_iter().map(Into::into).collect(),
            state_count,
            initial,
            dead: None,
            finals: BTreeSet::new(),
        }
    }

    /// Designates `dead` as the dead state, or removes the designation if `None` is given.
    pub fn with_dead_state(mut self, dead: impl Into<Option<StateId>>) -> Self {
        self.dead = dead.into();
        self
    }

    /// Marks all of the given states as final, in addition to those that already are.
    pub fn with_final_states<I: IntoIterator<Item = StateId>>(mut self, finals: I) -> Self {
        self.finals.extend(finals);
        self
    }

    /// The symbols of the alphabet, in the order in which they were given.
    pub fn alphabet(&self) -> &[String] {
        &self.alphabet
    }

    /// The number of states.
    pub fn state_count(&self) -> usize {
        self.state_count
    }

    /// Iterates over all valid state ids in increasing order.
    pub fn states(&self) -> std::ops::Range<StateId> {
        0..self.state_count
    }

    /// Returns true if `state` is one of `0..state_count`.
    pub fn contains_state(&self, state: StateId) -> bool {
        state < self.state_count
    }

    /// The initial state.
    pub fn initial(&self) -> StateId {
        self.initial
    }

    /// The dead state, if one was designated.
    pub fn dead(&self) -> Option<StateId> {
        self.dead
    }

    /// Returns true if `state` is the dead state.
    pub fn is_dead(&self, state: StateId) -> bool {
        self.dead == Some(state)
    }

    /// Returns true if `state` is final.
    pub fn is_final(&self, state: StateId) -> bool {
        self.finals.contains(&state)
    }

    /// Iterates over the final states in increasing order.
    pub fn final_states(&self) -> impl Iterator<Item = StateId> + '_ {
        self.finals.iter().copied()
    }
}

/// Partial mapping from pairs of a state and a symbol to the target of the transition.
///
/// Targets are kept as text, since the form allows entering arbitrary targets. A pair that has
/// no entry is undefined, which is not an error, the table is allowed to be partial.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct TransitionTable {
    targets: Map<(StateId, String), String>,
}

impl TransitionTable {
    /// Creates an empty table in which every transition is undefined.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts all of the given `(source, symbol, target)` triples, see [`Self::insert`].
    pub fn with_transitions<I, S, T>(mut self, transitions: I) -> Self
    where
        I: IntoIterator<Item = (StateId, S, T)>,
        S: Into<String>,
        T: ToString,
    {
        for (source, symbol, target) in transitions {
            self.insert(source, symbol, target);
        }
        self
    }

    /// Sets the target of the transition from `source` on `symbol`. Surrounding whitespace of the
    /// target is removed, and if nothing remains the transition becomes undefined. Returns the
    /// previously stored target, if there was one.
    pub fn insert(
        &mut self,
        source: StateId,
        symbol: impl Into<String>,
        target: impl ToString,
    ) -> Option<String> {
        let key = (source, symbol.into());
        let target = target.to_string();
        let target = target.trim();
        if target.is_empty() {
            self.targets.remove(&key)
        } else {
            self.targets.insert(key, target.to_string())
        }
    }

    /// Returns the target of the transition from `source` on `symbol`, or `None` if it is
    /// undefined.
    pub fn target(&self, source: StateId, symbol: &str) -> Option<&str> {
        self.targets
            .get(&(source, symbol.to_string()))
            .map(String::as_str)
    }

    /// The number of defined transitions.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Returns true if no transition is defined.
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_accessors() {
        let spec = AutomatonSpec::new(["a", "b"], 3, 0)
            .with_dead_state(2)
            .with_final_states([1, 2]);
        assert_eq!(spec.alphabet(), &["a".to_string(), "b".to_string()]);
        assert_eq!(spec.states().collect::<Vec<_>>(), vec![0, 1, 2]);
        assert!(spec.is_dead(2));
        assert!(!spec.is_dead(1));
        assert_eq!(spec.final_states().collect::<Vec<_>>(), vec![1, 2]);
        assert!(spec.contains_state(2));
        assert!(!spec.contains_state(3));

        let spec = spec.with_dead_state(None);
        assert_eq!(spec.dead(), None);
    }

    #[test]
    fn empty_targets_are_undefined() {
        let mut table = TransitionTable::new().with_transitions([
            (0, "a", "1"),
            (0, "b", ""),
            (1, "a", "  "),
        ]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.target(0, "a"), Some("1"));
        assert_eq!(table.target(0, "b"), None);
        assert_eq!(table.target(1, "a"), None);

        assert_eq!(table.insert(0, "a", " "), Some("1".to_string()));
        assert!(table.is_empty());
    }

    #[test]
    fn integer_and_text_targets() {
        let table = TransitionTable::new()
            .with_transitions([(0, "a", 4)])
            .with_transitions([(0, "b", " q7 ")]);
        assert_eq!(table.target(0, "a"), Some("4"));
        assert_eq!(table.target(0, "b"), Some("q7"));
    }
}
