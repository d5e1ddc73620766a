//! Graph - named nodes, data edges and a sequential interpreter

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Target name that ends a run
pub const END: &str = "__end__";

/// Default bound on executed nodes per run
pub const DEFAULT_MAX_STEPS: u32 = 50;

/// Graph construction and execution contract violations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("Graph '{graph}' has no start node")]
    MissingStart { graph: String },

    #[error("Graph '{graph}': start node '{node}' is not registered")]
    UnknownStart { graph: String, node: String },

    #[error("Graph '{graph}': node '{node}' registered twice")]
    DuplicateNode { graph: String, node: String },

    #[error("Graph '{graph}': node '{node}' already has an outgoing edge")]
    DuplicateEdge { graph: String, node: String },

    #[error("Graph '{graph}': edge from '{from}' to unknown node '{to}'")]
    UnknownNode { graph: String, from: String, to: String },

    #[error("Graph '{graph}': edge leaves unregistered node '{node}'")]
    UnknownSource { graph: String, node: String },

    #[error("Graph '{graph}': node '{node}' has no outgoing edge")]
    NoOutgoingEdge { graph: String, node: String },

    #[error("Graph '{graph}': router at '{from}' chose undeclared target '{to}'")]
    InvalidRoute { graph: String, from: String, to: String },

    #[error("Graph '{graph}' exceeded {limit} steps")]
    StepLimit { graph: String, limit: u32 },
}

/// State threaded through a graph
///
/// Nodes return partial updates; the engine folds each into a fresh copy
/// of the state before choosing the next node.
pub trait GraphState: Clone + Send + Sync + 'static {
    type Update: Send + 'static;

    fn apply(&self, update: Self::Update) -> Self;

    /// Update recorded when a node dies instead of returning
    fn failure(node: &str, message: &str) -> Self::Update;
}

/// One named step of a graph
#[async_trait]
pub trait Node<S: GraphState>: Send + Sync {
    /// Compute this node's update; every sub-task is joined before returning
    async fn run(&self, state: &S) -> S::Update;
}

/// Picks the next node from the current state
pub type Router<S> = Arc<dyn Fn(&S) -> String + Send + Sync>;

/// Outgoing edge of a node
pub enum Edge<S> {
    Always(String),
    Conditional { targets: Vec<String>, router: Router<S> },
}

impl<S> Edge<S> {
    fn targets(&self) -> Vec<&str> {
        match self {
            Edge::Always(to) => vec![to.as_str()],
            Edge::Conditional { targets, .. } => targets.iter().map(String::as_str).collect(),
        }
    }
}

/// Builder that validates the shape before producing a [`Graph`]
pub struct GraphBuilder<S: GraphState> {
    name: String,
    nodes: BTreeMap<String, Arc<dyn Node<S>>>,
    edges: BTreeMap<String, Edge<S>>,
    start: Option<String>,
    max_steps: u32,
    errors: Vec<GraphError>,
}

impl<S: GraphState> GraphBuilder<S> {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        debug!(%name, "GraphBuilder::new: called");
        Self {
            name,
            nodes: BTreeMap::new(),
            edges: BTreeMap::new(),
            start: None,
            max_steps: DEFAULT_MAX_STEPS,
            errors: Vec::new(),
        }
    }

    pub fn node(mut self, name: impl Into<String>, node: impl Node<S> + 'static) -> Self {
        let name = name.into();
        if self.nodes.insert(name.clone(), Arc::new(node)).is_some() {
            self.errors.push(GraphError::DuplicateNode {
                graph: self.name.clone(),
                node: name,
            });
        }
        self
    }

    fn set_edge(mut self, from: String, edge: Edge<S>) -> Self {
        if self.edges.insert(from.clone(), edge).is_some() {
            self.errors.push(GraphError::DuplicateEdge {
                graph: self.name.clone(),
                node: from,
            });
        }
        self
    }

    /// Unconditional edge
    pub fn edge(self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.set_edge(from.into(), Edge::Always(to.into()))
    }

    /// Predicate edge choosing among the declared `targets`
    pub fn conditional_edge<F>(self, from: impl Into<String>, targets: &[&str], router: F) -> Self
    where
        F: Fn(&S) -> String + Send + Sync + 'static,
    {
        let targets = targets.iter().map(|t| t.to_string()).collect();
        self.set_edge(from.into(), Edge::Conditional {
            targets,
            router: Arc::new(router),
        })
    }

    pub fn start(mut self, name: impl Into<String>) -> Self {
        self.start = Some(name.into());
        self
    }

    pub fn max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    /// Check the shape and produce the runnable graph
    pub fn build(mut self) -> Result<Graph<S>, GraphError> {
        debug!(name = %self.name, nodes = self.nodes.len(), "GraphBuilder::build: called");
        if !self.errors.is_empty() {
            return Err(self.errors.remove(0));
        }
        let start = self.start.clone().ok_or_else(|| GraphError::MissingStart {
            graph: self.name.clone(),
        })?;
        if !self.nodes.contains_key(&start) {
            return Err(GraphError::UnknownStart {
                graph: self.name.clone(),
                node: start,
            });
        }

        for (from, edge) in &self.edges {
            if !self.nodes.contains_key(from) {
                return Err(GraphError::UnknownSource {
                    graph: self.name.clone(),
                    node: from.clone(),
                });
            }
            if let Some(to) = edge.targets().into_iter().find(|t| *t != END && !self.nodes.contains_key(*t)) {
                return Err(GraphError::UnknownNode {
                    graph: self.name.clone(),
                    from: from.clone(),
                    to: to.to_string(),
                });
            }
        }
        if let Some(node) = self.nodes.keys().find(|n| !self.edges.contains_key(*n)) {
            return Err(GraphError::NoOutgoingEdge {
                graph: self.name.clone(),
                node: node.clone(),
            });
        }

        Ok(Graph {
            name: self.name,
            nodes: self.nodes,
            edges: self.edges,
            start,
            max_steps: self.max_steps,
        })
    }
}

/// Result of a completed run
#[derive(Debug, Clone)]
pub struct GraphRun<S> {
    pub state: S,
    /// Node names in execution order
    pub path: Vec<String>,
}

impl<S> GraphRun<S> {
    pub fn steps(&self) -> usize {
        self.path.len()
    }

    /// How many times `node` executed
    pub fn visits(&self, node: &str) -> usize {
        self.path.iter().filter(|n| *n == node).count()
    }
}

/// Validated, runnable graph
pub struct Graph<S: GraphState> {
    name: String,
    nodes: BTreeMap<String, Arc<dyn Node<S>>>,
    edges: BTreeMap<String, Edge<S>>,
    start: String,
    max_steps: u32,
}

impl<S: GraphState> Graph<S> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Most nodes a single run may execute
    pub fn step_limit(&self) -> u32 {
        self.max_steps
    }

    pub fn has_node(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Execute nodes one at a time from the start node until END
    ///
    /// A node that panics contributes its failure update and the run goes on
    /// along its outgoing edge.
    pub async fn run(&self, initial: S) -> Result<GraphRun<S>, GraphError> {
        debug!(graph = %self.name, start = %self.start, "Graph::run: called");
        let mut state = initial;
        let mut path = Vec::new();
        let mut current = self.start.clone();

        while current != END {
            if path.len() as u32 >= self.max_steps {
                warn!("Graph {} hit its step limit ({})", self.name, self.max_steps);
                return Err(GraphError::StepLimit {
                    graph: self.name.clone(),
                    limit: self.max_steps,
                });
            }
            let (node, edge) = match (self.nodes.get(&current), self.edges.get(&current)) {
                (Some(node), Some(edge)) => (node, edge),
                _ => {
                    return Err(GraphError::NoOutgoingEdge {
                        graph: self.name.clone(),
                        node: current,
                    });
                }
            };

            info!("Graph {}: entering node {}", self.name, current);
            let update = match AssertUnwindSafe(node.run(&state)).catch_unwind().await {
                Ok(update) => update,
                Err(_) => {
                    warn!("Node {} panicked", current);
                    S::failure(&current, "node panicked")
                }
            };
            state = state.apply(update);
            path.push(current.clone());

            current = match edge {
                Edge::Always(to) => to.clone(),
                Edge::Conditional { targets, router } => {
                    let to = router(&state);
                    debug!(from = %current, %to, "Graph::run: conditional branch");
                    if !targets.contains(&to) {
                        return Err(GraphError::InvalidRoute {
                            graph: self.name.clone(),
                            from: current,
                            to,
                        });
                    }
                    to
                }
            };
        }

        info!("Graph {} finished after {} steps", self.name, path.len());
        Ok(GraphRun { state, path })
    }
}
