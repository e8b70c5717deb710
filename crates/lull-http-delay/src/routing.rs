//! Scope lookup: maps an incoming request to the configuration scope whose
//! `sleep_ms` applies.
//!
//! The host pipeline owns real routing; this router only selects the owning
//! scope with the same first-match-wins rules the scope grammar implies:
//! server by host (exact or `*.` wildcard, no host = catch-all), then the
//! first route whose path matches. No match falls back to the server scope,
//! then the global scope.

use regex::Regex;

use crate::config::PathMatch;
use crate::config::scope::ScopeId;
use crate::template::RequestData;

pub struct ScopeRouter {
    global: ScopeId,
    servers: Vec<CompiledServer>,
}

struct CompiledServer {
    name: String,
    host: Option<CompiledHost>,
    scope: ScopeId,
    routes: Vec<CompiledRoute>,
}

struct CompiledRoute {
    path: CompiledPath,
    scope: ScopeId,
}

enum CompiledHost {
    Exact(String),
    Wildcard(String),
}

enum CompiledPath {
    Any,
    Exact(String),
    Prefix(String),
    Regex(Regex),
}

/// Builds a [`ScopeRouter`] alongside the scope tree during config compile.
pub struct ScopeRouterBuilder {
    global: ScopeId,
    servers: Vec<CompiledServer>,
}

impl ScopeRouterBuilder {
    pub fn new(global: ScopeId) -> Self {
        Self {
            global,
            servers: Vec::new(),
        }
    }

    /// Register a server scope. Returns an index for attaching routes.
    pub fn server(&mut self, name: &str, host: Option<&str>, scope: ScopeId) -> usize {
        let host = host.map(|h| {
            if h.starts_with("*.") {
                CompiledHost::Wildcard(h.to_string())
            } else {
                CompiledHost::Exact(h.to_string())
            }
        });
        self.servers.push(CompiledServer {
            name: name.to_string(),
            host,
            scope,
            routes: Vec::new(),
        });
        self.servers.len() - 1
    }

    /// Register a route scope under a server.
    pub fn route(
        &mut self,
        server: usize,
        path: &PathMatch,
        scope: ScopeId,
    ) -> Result<(), anyhow::Error> {
        let server_name = self.servers[server].name.clone();
        let path = match path {
            PathMatch::Any => CompiledPath::Any,
            PathMatch::Exact { exact } => CompiledPath::Exact(exact.clone()),
            PathMatch::Prefix { prefix } => CompiledPath::Prefix(prefix.clone()),
            PathMatch::Regex { regex } => {
                let compiled = Regex::new(regex).map_err(|e| {
                    anyhow::anyhow!("invalid path regex in server '{server_name}': {e}")
                })?;
                CompiledPath::Regex(compiled)
            }
        };
        self.servers[server].routes.push(CompiledRoute { path, scope });
        Ok(())
    }

    pub fn build(self) -> ScopeRouter {
        ScopeRouter {
            global: self.global,
            servers: self.servers,
        }
    }
}

impl ScopeRouter {
    /// Select the owning scope for one request. First-match-wins at both
    /// levels; always succeeds because the global scope is the final
    /// fallback.
    pub fn route(&self, request_data: &RequestData) -> ScopeId {
        let req_host = request_data.headers.get("host").map(String::as_str);

        for server in &self.servers {
            if !matches_host(req_host, server.host.as_ref()) {
                continue;
            }
            for route in &server.routes {
                if matches_path(&request_data.path, &route.path) {
                    return route.scope;
                }
            }
            return server.scope;
        }
        self.global
    }

    pub fn global(&self) -> ScopeId {
        self.global
    }
}

fn matches_host(req_host: Option<&str>, server_host: Option<&CompiledHost>) -> bool {
    match server_host {
        // No host constraint: catch-all server.
        None => true,
        Some(CompiledHost::Exact(pattern)) => req_host == Some(pattern.as_str()),
        Some(CompiledHost::Wildcard(pattern)) => match (req_host, pattern.strip_prefix("*.")) {
            (Some(host), Some(suffix)) => host.ends_with(suffix),
            _ => false,
        },
    }
}

fn matches_path(path: &str, matcher: &CompiledPath) -> bool {
    match matcher {
        CompiledPath::Any => true,
        CompiledPath::Exact(exact) => path == exact,
        CompiledPath::Prefix(prefix) => path.starts_with(prefix),
        CompiledPath::Regex(regex) => regex.is_match(path),
    }
}
