//! Library for drawing deterministic finite automata (DFA) that were entered through a web form.
//!
//! A DFA is described by an [`AutomatonSpec`], which fixes the alphabet, the number of states and
//! which of them are initial, dead or final, together with a [`TransitionTable`] that maps pairs of
//! a state and a symbol to a target. Neither is validated: the table may be partial and the initial
//! state may lie outside of the declared range. The description is turned into a graphviz document
//! by [`dot::build`] (see the [`dot::Dottable`] trait for the layout of that document), which is
//! then handed to an external converter like `dot2tex` through a [`render::Converter`]. The
//! converter produces the typeset TikZ source that is shown to the user.
//!
//! The [`server`] module wires these pieces into an axum router, and [`form`] decodes the submitted
//! form fields. Everything is request-scoped, the only long-lived object is the [`server::Service`]
//! that is constructed once at startup.
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// The prelude is supposed to make using this package easier. Including everything, i.e.
/// `use dfa_tikz::prelude::*;` should be enough to use the package.
pub mod prelude {
    pub use super::{
        automaton::{AutomatonSpec, StateId, TransitionTable},
        dot::{build, DfaDiagram, DotStateAttribute, DotTransitionAttribute, Dottable, GraphText},
        form::{FormError, FormLimits},
        render::{Converter, RenderError, RenderedText},
        server::Service,
    };
}

/// Defines the description of a DFA as it is entered by the user.
pub mod automaton;
pub use automaton::{AutomatonSpec, TransitionTable};

/// Produces the graphviz representation of a DFA.
pub mod dot;

/// Invocation of the external converter that turns DOT into TikZ.
pub mod render;

/// Decoding of submitted form fields.
pub mod form;

/// Command line configuration of the service.
pub mod config;

/// The HTTP surface.
pub mod server;

/// Type alias for maps, we use this to hide which type of `HashMap` we are actually using.
pub type Map<K, V> = fxhash::FxHashMap<K, V>;
