use itertools::Itertools;
use thiserror::Error;
use tracing::trace;

use crate::{
    automaton::{AutomatonSpec, StateId, TransitionTable},
    Map,
};

/// Errors that occur when the submitted fields do not describe a DFA.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum FormError {
    /// A required field was not submitted.
    #[error("missing form field `{field}`")]
    MissingField {
        /// name of the field
        field: &'static str,
    },
    /// A field that should hold a state could not be parsed.
    #[error("form field `{field}` must be a non-negative integer, got `{value}`")]
    InvalidInteger {
        /// name of the field
        field: &'static str,
        /// the offending value
        value: String,
    },
    /// More states were requested than the limits allow.
    #[error("at most {limit} states are supported, got {requested}")]
    TooManyStates {
        /// the submitted number of states
        requested: usize,
        /// the configured maximum
        limit: usize,
    },
}

/// Bounds on what a submission may ask for.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct FormLimits {
    /// The largest number of states that is accepted.
    pub max_states: usize,
}

impl Default for FormLimits {
    fn default() -> Self {
        Self { max_states: 256 }
    }
}

/// The decoded content of a submitted DFA form.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Submission {
    /// Alphabet, states and the initial, dead and final states.
    pub spec: AutomatonSpec,
    /// All transitions that were filled in.
    pub transitions: TransitionTable,
}

/// Returns the value of the first of `names` that is present.
fn field<'a>(fields: &'a Map<String, String>, names: &[&str]) -> Option<&'a str> {
    names
        .iter()
        .find_map(|name| fields.get(*name))
        .map(String::as_str)
}

fn required<'a>(
    fields: &'a Map<String, String>,
    names: &[&'static str],
) -> Result<&'a str, FormError> {
    field(fields, names).ok_or(FormError::MissingField { field: names[0] })
}

fn integer(field: &'static str, value: &str) -> Result<StateId, FormError> {
    value
        .trim()
        .parse()
        .map_err(|_| FormError::InvalidInteger {
            field,
            value: value.to_string(),
        })
}

/// Decodes the fields of a submitted DFA form.
///
/// The alphabet is read from `alphabet` (or `alph`) and split at whitespace, repeated symbols are
/// dropped. The number of states is read from `states` (or `nodes`). `initial` is required,
/// `dead` may be empty and `final` is a whitespace separated list that defaults to the empty
/// one. The target of the transition from state `q` on symbol `s` is taken from the field
/// `transition_q_s`, a missing or empty field leaves the transition undefined.
pub fn decode(fields: &Map<String, String>, limits: FormLimits) -> Result<Submission, FormError> {
    let alphabet = required(fields, &["alphabet", "alph"])?
        .split_whitespace()
        .unique()
        .collect_vec();

    let state_count = integer("states", required(fields, &["states", "nodes"])?)?;
    if state_count > limits.max_states {
        return Err(FormError::TooManyStates {
            requested: state_count,
            limit: limits.max_states,
        });
    }

    let initial = integer("initial", required(fields, &["initial"])?)?;
    let dead = match field(fields, &["dead"]).map(str::trim) {
        None | Some("") => None,
        Some(dead) => Some(integer("dead", dead)?),
    };
    let finals: Vec<StateId> = field(fields, &["final"])
        .unwrap_or_default()
        .split_whitespace()
        .map(|state| integer("final", state))
        .collect::<Result<_, _>>()?;

    let mut transitions = TransitionTable::new();
    for (state, symbol) in (0..state_count).cartesian_product(alphabet.iter()) {
        if let Some(target) = fields.get(&format!("transition_{state}_{symbol}")) {
            transitions.insert(state, *symbol, target);
        }
    }
    trace!(
        "decoded {} states over {:?} with {} transitions",
        state_count,
        alphabet,
        transitions.len()
    );

    Ok(Submission {
        spec: AutomatonSpec::new(alphabet, state_count, initial)
            .with_dead_state(dead)
            .with_final_states(finals),
        transitions,
    })
}
