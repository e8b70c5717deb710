//! Arena-backed scope tree for `sleep_ms` declarations.
//!
//! Scopes (global / server / route) form a tree with a two-phase lifecycle:
//! a mutable build phase where directives are declared, then a merge pass
//! that copies the nearest ancestor's spec into every scope that left it
//! unset and freezes the result. The frozen snapshot is immutable and shared
//! read-only by every in-flight request for the life of the configuration
//! generation.

use std::sync::Arc;

use tracing::info;

use crate::delay::{DelaySpec, ParseDelayError, RawDelay};

/// Index of a scope node in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

/// Configuration-load failure. Fatal: the process must not start or reload
/// with an invalid directive.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("sleep_ms directive is duplicate in scope '{scope}'")]
    Duplicate { scope: String },
    #[error("invalid sleep_ms value '{value}' in scope '{scope}': {source}")]
    InvalidValue {
        scope: String,
        value: String,
        #[source]
        source: ParseDelayError,
    },
}

/// Per-scope directive state during the build phase.
#[derive(Debug, Default)]
struct ScopeConfig {
    spec: Option<Arc<DelaySpec>>,
    declared: bool,
}

#[derive(Debug)]
struct Node {
    parent: Option<ScopeId>,
    name: String,
    config: ScopeConfig,
}

/// Mutable build phase of the scope tree. Nodes are created as the config
/// walk enters each scope; `declare` populates a scope at most once.
#[derive(Debug)]
pub struct ScopeTreeBuilder {
    nodes: Vec<Node>,
}

impl ScopeTreeBuilder {
    /// Create a tree holding only the root (global) scope.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                parent: None,
                name: "global".to_string(),
                config: ScopeConfig::default(),
            }],
        }
    }

    pub fn root(&self) -> ScopeId {
        ScopeId(0)
    }

    /// Enter a child scope under `parent`.
    pub fn child(&mut self, parent: ScopeId, name: &str) -> ScopeId {
        let id = ScopeId(self.nodes.len());
        self.nodes.push(Node {
            parent: Some(parent),
            name: format!("{}/{}", self.nodes[parent.0].name, name),
            config: ScopeConfig::default(),
        });
        id
    }

    /// Declare the `sleep_ms` directive in `scope`. At most one declaration
    /// per scope; the raw value is parsed (and any expression compiled) here.
    pub fn declare(&mut self, scope: ScopeId, raw: &RawDelay) -> Result<(), ConfigError> {
        let node = &mut self.nodes[scope.0];
        if node.config.declared {
            return Err(ConfigError::Duplicate {
                scope: node.name.clone(),
            });
        }

        let spec = DelaySpec::parse(raw).map_err(|source| ConfigError::InvalidValue {
            scope: node.name.clone(),
            value: raw.to_string(),
            source,
        })?;
        info!(scope = %node.name, "sleep_ms set to {spec}");

        node.config.spec = Some(Arc::new(spec));
        node.config.declared = true;
        Ok(())
    }

    /// Merge pass: every scope that left its spec unset inherits the nearest
    /// ancestor's by reference. Consumes the builder and produces the frozen
    /// snapshot; no declaration can happen after this point.
    pub fn freeze(self) -> FrozenScopes {
        let mut frozen: Vec<FrozenScope> = Vec::with_capacity(self.nodes.len());
        // Parents are always pushed before their children, so one in-order
        // pass sees every ancestor already merged.
        for node in self.nodes {
            let spec = match node.config.spec {
                Some(spec) => Some(spec),
                None => node
                    .parent
                    .and_then(|parent| frozen[parent.0].spec.clone()),
            };
            frozen.push(FrozenScope {
                name: node.name,
                spec,
            });
        }
        FrozenScopes {
            nodes: frozen.into(),
        }
    }
}

impl Default for ScopeTreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
struct FrozenScope {
    name: String,
    spec: Option<Arc<DelaySpec>>,
}

/// Immutable scope snapshot, cheaply cloneable and shared across all
/// request-handling tasks without locking.
#[derive(Debug, Clone)]
pub struct FrozenScopes {
    nodes: Arc<[FrozenScope]>,
}

impl FrozenScopes {
    /// Effective delay spec for a scope: its own declaration or the nearest
    /// ancestor's, `None` when nothing applies anywhere up the chain.
    pub fn spec(&self, scope: ScopeId) -> Option<&Arc<DelaySpec>> {
        self.nodes[scope.0].spec.as_ref()
    }

    pub fn name(&self, scope: ScopeId) -> &str {
        &self.nodes[scope.0].name
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All scopes with their effective specs, in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (ScopeId, &str, Option<&Arc<DelaySpec>>)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (ScopeId(i), node.name.as_str(), node.spec.as_ref()))
    }
}
