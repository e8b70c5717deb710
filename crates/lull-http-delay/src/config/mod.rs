//! Configuration types for the lull delay layer.
//!
//! The file declares a hierarchical scope grammar: a global `sleep_ms`,
//! servers, and routes, each level optionally declaring its own directive.
//! Loading is two-phase: parse + validate, then `compile` builds the scope
//! tree, runs the merge pass, and returns the frozen snapshot plus the scope
//! router. Any directive error is fatal to the load; there is no partial
//! application.

pub mod scope;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::delay::RawDelay;
use crate::routing::{ScopeRouter, ScopeRouterBuilder};
use scope::{FrozenScopes, ScopeTreeBuilder};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Optional, informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Global-scope directive, inherited by every server and route that does
    /// not declare its own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sleep_ms: Option<RawDelay>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub servers: Vec<ServerConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub name: String,

    /// Host to match (exact, or `*.` wildcard). Omitted = catch-all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sleep_ms: Option<RawDelay>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<RouteConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    #[serde(default)]
    pub path: PathMatch,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sleep_ms: Option<RawDelay>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(untagged)]
pub enum PathMatch {
    #[default]
    Any,
    Exact {
        exact: String,
    },
    Prefix {
        prefix: String,
    },
    Regex {
        regex: String,
    },
}

impl PathMatch {
    /// Short form used for scope names and operator-facing reports.
    pub fn label(&self) -> String {
        match self {
            PathMatch::Any => "*".to_string(),
            PathMatch::Exact { exact } => exact.clone(),
            PathMatch::Prefix { prefix } => format!("{prefix}*"),
            PathMatch::Regex { regex } => format!("~{regex}"),
        }
    }
}

/// Output of a successful configuration load: the frozen scope snapshot and
/// the per-request scope lookup. Immutable for the life of the generation.
pub struct CompiledConfig {
    pub scopes: FrozenScopes,
    pub router: ScopeRouter,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration structure. Directive values themselves are
    /// validated during `compile`.
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        let mut seen = std::collections::HashSet::new();
        for server in &self.servers {
            if server.name.is_empty() {
                anyhow::bail!("server name must not be empty");
            }
            if !seen.insert(server.name.as_str()) {
                anyhow::bail!("duplicate server name '{}'", server.name);
            }
        }
        Ok(())
    }

    /// Build the scope tree (declare phase), run the merge pass, and compile
    /// the scope router. Fatal on any directive or route error.
    pub fn compile(&self) -> Result<CompiledConfig, anyhow::Error> {
        let mut tree = ScopeTreeBuilder::new();
        let global = tree.root();
        if let Some(raw) = &self.sleep_ms {
            tree.declare(global, raw)?;
        }

        let mut router = ScopeRouterBuilder::new(global);
        for server in &self.servers {
            let server_scope = tree.child(global, &server.name);
            if let Some(raw) = &server.sleep_ms {
                tree.declare(server_scope, raw)?;
            }
            let server_idx = router.server(&server.name, server.host.as_deref(), server_scope);

            for route in &server.routes {
                let route_scope = tree.child(server_scope, &route.path.label());
                if let Some(raw) = &route.sleep_ms {
                    tree.declare(route_scope, raw)?;
                }
                router.route(server_idx, &route.path, route_scope)?;
            }
        }

        Ok(CompiledConfig {
            scopes: tree.freeze(),
            router: router.build(),
        })
    }
}
