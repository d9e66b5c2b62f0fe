use std::fmt::Display;

use itertools::Itertools;
use serde::Serialize;

use crate::automaton::{AutomatonSpec, StateId, TransitionTable};

const INDENT: &str = "    ";

/// Turns `name` into a DOT identifier. Numerals are used as they are, everything else is
/// quoted.
fn dot_ident(name: &str) -> String {
    if !name.is_empty() && name.chars().all(|c| c.is_ascii_digit()) {
        name.to_string()
    } else {
        format!("\"{}\"", escape_dot_string(name))
    }
}

fn escape_dot_string(raw: &str) -> String {
    raw.chars()
        .fold(String::with_capacity(raw.len()), |mut out, chr| {
            if matches!(chr, '"' | '\\') {
                out.push('\\');
            }
            out.push(chr);
            out
        })
}

/// A graphviz document. It is produced in one go by [`Dottable::dot_representation`] and is not
/// modified afterwards.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize)]
#[serde(transparent)]
pub struct GraphText(String);

impl GraphText {
    /// The document as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes `self` and returns the underlying string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for GraphText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for GraphText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A node statement, consisting of the identifier of the node and its attributes.
pub type DotNode = (String, Vec<DotStateAttribute>);
/// An edge statement, consisting of the identifiers of source and target and the attributes.
pub type DotEdge = (String, String, Vec<DotTransitionAttribute>);

/// Objects that can be drawn as a directed graph in the DOT format. The document consists of
/// a header, the node declarations, additional styling of nodes and finally the edges. Each of
/// these sections is separated by an empty line.
pub trait Dottable {
    /// Compute the graphviz representation, for more information on the DOT format,
    /// see the [graphviz documentation](https://graphviz.org/doc/info/lang.html).
    fn dot_representation(&self) -> GraphText {
        let header = std::iter::once(format!(
            "digraph {} {{",
            self.dot_name().unwrap_or_else(|| "A".to_string())
        ))
        .chain(
            self.dot_header_statements()
                .into_iter()
                .map(|stmt| format!("{INDENT}{stmt};")),
        );

        let node_statement = |(ident, attributes): DotNode| {
            format!(
                "{INDENT}{} [{}];",
                dot_ident(&ident),
                attributes.iter().map(|attr| attr.to_string()).join(", ")
            )
        };
        let nodes = self.dot_nodes().into_iter().map(node_statement);
        let styles = self.dot_node_styles().into_iter().map(node_statement);

        let edges = self
            .dot_edges()
            .into_iter()
            .map(|(source, target, attributes)| {
                format!(
                    "{INDENT}{} -> {} [{}];",
                    dot_ident(&source),
                    dot_ident(&target),
                    attributes.iter().map(|attr| attr.to_string()).join(", ")
                )
            });

        let separator = || std::iter::once(String::new());
        let document = header
            .chain(separator())
            .chain(nodes)
            .chain(separator())
            .chain(styles)
            .chain(separator())
            .chain(edges)
            .chain(std::iter::once("}".to_string()))
            .join("\n");
        tracing::trace!("produced DOT representation\n{}", document);
        GraphText(document)
    }

    /// The name of the graph, `A` is used if `None` is returned.
    fn dot_name(&self) -> Option<String>;

    /// Statements that are placed right after the opening of the graph, for example
    /// `rankdir=LR`. The terminating `;` is added automatically.
    fn dot_header_statements(&self) -> impl IntoIterator<Item = String> {
        []
    }

    /// Declarations of all nodes, in the order in which they should appear.
    fn dot_nodes(&self) -> impl IntoIterator<Item = DotNode>;

    /// Styling that is applied to already declared nodes.
    fn dot_node_styles(&self) -> impl IntoIterator<Item = DotNode> {
        []
    }

    /// All edges, in the order in which they should appear.
    fn dot_edges(&self) -> impl IntoIterator<Item = DotEdge>;
}

/// A DFA description that is ready to be drawn, it simply borrows the [`AutomatonSpec`] and
/// the [`TransitionTable`].
#[derive(Debug, Clone, Copy)]
pub struct DfaDiagram<'a> {
    spec: &'a AutomatonSpec,
    transitions: &'a TransitionTable,
}

impl<'a> DfaDiagram<'a> {
    /// Creates a diagram for the given description and transitions.
    pub fn new(spec: &'a AutomatonSpec, transitions: &'a TransitionTable) -> Self {
        Self { spec, transitions }
    }

    fn state_attributes(&self, state: StateId) -> Vec<DotStateAttribute> {
        // the dead state only changes the label, the shape is decided by finality alone
        let label = if self.spec.is_dead(state) {
            "d".to_string()
        } else {
            state.to_string()
        };
        let mut attributes = vec![DotStateAttribute::Label(label)];
        if self.spec.is_final(state) {
            attributes.push(DotStateAttribute::Shape("doublecircle".into()));
        }
        attributes
    }
}

impl Dottable for DfaDiagram<'_> {
    fn dot_name(&self) -> Option<String> {
        Some("DFA".into())
    }

    fn dot_header_statements(&self) -> impl IntoIterator<Item = String> {
        ["rankdir=LR".to_string(), "node [shape = circle]".to_string()]
    }

    fn dot_nodes(&self) -> impl IntoIterator<Item = DotNode> {
        let outside = self
            .spec
            .dead()
            .filter(|dead| !self.spec.contains_state(*dead));

        self.spec
            .states()
            .chain(outside)
            .map(move |q| (q.to_string(), self.state_attributes(q)))
    }

    fn dot_node_styles(&self) -> impl IntoIterator<Item = DotNode> {
        [(
            self.spec.initial().to_string(),
            vec![
                DotStateAttribute::Style("filled".into()),
                DotStateAttribute::FillColor("lightgray".into()),
            ],
        )]
    }

    fn dot_edges(&self) -> impl IntoIterator<Item = DotEdge> {
        self.spec.states().flat_map(move |q| {
            self.spec.alphabet().iter().filter_map(move |symbol| {
                self.transitions.target(q, symbol).map(|target| {
                    (
                        q.to_string(),
                        target.to_string(),
                        vec![DotTransitionAttribute::Label(symbol.clone())],
                    )
                })
            })
        })
    }
}

/// Builds the graphviz document for the DFA given by `spec` and `transitions`. This cannot
/// fail, a description that references states outside of its range simply produces a document
/// that mentions nodes which were never declared.
pub fn build(spec: &AutomatonSpec, transitions: &TransitionTable) -> GraphText {
    DfaDiagram::new(spec, transitions).dot_representation()
}

/// Enum that abstracts attributes of nodes in the DOT format.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum DotStateAttribute {
    /// The label of a node
    Label(String),
    /// The shape of a node
    Shape(String),
    /// The style of a node, e.g. `filled`
    Style(String),
    /// The color with which a filled node is filled
    FillColor(String),
}

impl Display for DotStateAttribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DotStateAttribute::Label(s) => write!(f, "label=\"{}\"", escape_dot_string(s)),
            DotStateAttribute::Shape(s) => write!(f, "shape={s}"),
            DotStateAttribute::Style(s) => write!(f, "style={s}"),
            DotStateAttribute::FillColor(c) => write!(f, "fillcolor={c}"),
        }
    }
}

/// Enum that abstracts attributes of edges in the DOT format.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum DotTransitionAttribute {
    /// The label of an edge
    Label(String),
}

impl Display for DotTransitionAttribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DotTransitionAttribute::Label(lbl) => write!(f, "label=\"{}\"", escape_dot_string(lbl)),
        }
    }
}
