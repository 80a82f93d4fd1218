//! Configuration scopes and the resolved route table.
//!
//! Scopes form a tree: the server root plus nested locations, each carrying
//! an optional [`SizeConfig`] and an optional [`Strategy`]. Finalising the
//! tree applies the merge law top-down, so every route in the resulting
//! [`RouteTable`] holds an already resolved value and request handling never
//! walks the tree.

use crate::plan::Strategy;
use crate::size_config::SizeConfig;
use std::fmt;

/// Settings declared directly on one scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScopeSettings {
    pub size: SizeConfig,
    pub strategy: Option<Strategy>,
}

impl ScopeSettings {
    pub fn new(size: impl Into<SizeConfig>, strategy: Option<Strategy>) -> Self {
        Self {
            size: size.into(),
            strategy,
        }
    }

    /// A scope that declares nothing and inherits everything.
    pub fn inherit() -> Self {
        Self::default()
    }
}

/// Index of a scope within its [`ScopeTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(usize);

impl ScopeId {
    pub const ROOT: ScopeId = ScopeId(0);
}

#[derive(Debug, Clone)]
struct ScopeNode {
    prefix: String,
    settings: ScopeSettings,
    parent: Option<ScopeId>,
}

/// Tree of declared scopes.
///
/// Children are always created after their parent, so node order is a valid
/// top-down traversal order.
#[derive(Debug, Clone)]
pub struct ScopeTree {
    nodes: Vec<ScopeNode>,
}

impl ScopeTree {
    /// Create a tree whose root scope matches every path.
    pub fn new(root: ScopeSettings) -> Self {
        Self {
            nodes: vec![ScopeNode {
                prefix: "/".to_string(),
                settings: root,
                parent: None,
            }],
        }
    }

    pub fn root(&self) -> ScopeId {
        ScopeId::ROOT
    }

    /// Nest a scope for `prefix` under `parent`.
    ///
    /// # Panics
    ///
    /// Panics if `parent` does not belong to this tree.
    pub fn add_child(
        &mut self,
        parent: ScopeId,
        prefix: impl Into<String>,
        settings: ScopeSettings,
    ) -> ScopeId {
        assert!(parent.0 < self.nodes.len(), "unknown parent scope");
        let id = ScopeId(self.nodes.len());
        self.nodes.push(ScopeNode {
            prefix: prefix.into(),
            settings,
            parent: Some(parent),
        });
        id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn settings(&self, id: ScopeId) -> Option<&ScopeSettings> {
        self.nodes.get(id.0).map(|node| &node.settings)
    }

    /// Resolve every scope against its ancestors and build the route table.
    pub fn finalize(&self) -> RouteTable {
        let mut resolved: Vec<(SizeConfig, Option<Strategy>)> = Vec::with_capacity(self.nodes.len());

        for node in &self.nodes {
            let (size, strategy) = match node.parent {
                Some(parent) => {
                    let (parent_size, parent_strategy) = resolved[parent.0];
                    (
                        node.settings.size.merge(&parent_size),
                        node.settings.strategy.or(parent_strategy),
                    )
                }
                None => (node.settings.size, node.settings.strategy),
            };
            resolved.push((size, strategy));
        }

        let mut routes: Vec<ResolvedScope> = self
            .nodes
            .iter()
            .zip(resolved)
            .map(|(node, (size, strategy))| ResolvedScope {
                prefix: node.prefix.clone(),
                size,
                strategy: strategy.unwrap_or_default(),
            })
            .collect();

        // Longest prefix first; among equal prefixes the later declaration wins.
        routes.reverse();
        routes.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));

        tracing::debug!(routes = routes.len(), "Scope tree finalised");

        RouteTable { routes }
    }
}

impl Default for ScopeTree {
    fn default() -> Self {
        Self::new(ScopeSettings::inherit())
    }
}

/// One route after merging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedScope {
    pub prefix: String,
    pub size: SizeConfig,
    pub strategy: Strategy,
}

impl ResolvedScope {
    /// Response length, or `None` when no scope on the path set one.
    pub fn length(&self) -> Option<u64> {
        self.size.length()
    }
}

impl fmt::Display for ResolvedScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.length() {
            Some(length) => write!(f, "{} -> {} bytes ({})", self.prefix, length, self.strategy),
            None => write!(f, "{} -> unset ({})", self.prefix, self.strategy),
        }
    }
}

/// Resolved scopes ordered for longest-prefix lookup.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<ResolvedScope>,
}

impl RouteTable {
    /// Find the scope whose prefix is the longest match for `path`.
    pub fn lookup(&self, path: &str) -> Option<&ResolvedScope> {
        self.routes.iter().find(|route| path.starts_with(&route.prefix))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Routes in lookup order.
    pub fn iter(&self) -> std::slice::Iter<'_, ResolvedScope> {
        self.routes.iter()
    }
}
