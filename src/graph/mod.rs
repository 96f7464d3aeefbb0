//! The resource graph produced by the compiler.
//!
//! A [`ResourceGraph`] maps logical names to [`Resource`] declarations. Each
//! declaration carries a platform type tag, a property bag and the explicit
//! dependency list the provisioning engine must honour (`DependsOn`).
//!
//! # Invariants
//!
//! - **Unique names**: [`ResourceGraph::insert`] refuses a name that is already
//!   declared. Builders only ever append; nothing is renamed or removed. A
//!   shared declaration may be widened in place through [`ResourceGraph::get_mut`].
//! - **Closure**: once compilation finishes, every name in every dependency list
//!   is itself a key ([`ResourceGraph::validate_closure`]).
//! - **Acyclic**: dependency edges, together with the implicit edges of `Ref`
//!   and `Fn::GetAtt`, admit a deployment order ([`ResourceGraph::deployment_order`]).
//!
//! The graph is a `BTreeMap`, so serialization order depends only on names and
//! two compilations of the same project serialize byte-identically.

pub mod dependency_graph;
pub mod intrinsics;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::core::EcsgraphError;
pub use dependency_graph::DependencyGraph;

/// A single resource declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Resource {
    /// Platform type tag, e.g. `AWS::ECS::Service`.
    #[serde(rename = "Type")]
    pub resource_type: String,

    /// Names of resources that must be created first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,

    /// Property bag.
    pub properties: Value,
}

impl Resource {
    /// Declare a resource from any serializable property struct.
    pub fn new(
        resource_type: &str,
        properties: &impl Serialize,
    ) -> Result<Self, EcsgraphError> {
        let properties =
            serde_json::to_value(properties).map_err(|e| EcsgraphError::SerializationError {
                name: resource_type.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            resource_type: resource_type.to_string(),
            depends_on: Vec::new(),
            properties,
        })
    }

    /// Add explicit dependencies, keeping the list sorted and free of duplicates.
    pub fn depending_on<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on.extend(dependencies.into_iter().map(Into::into));
        self.depends_on.sort();
        self.depends_on.dedup();
        self
    }

    /// Look up a top-level property.
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }
}

/// Logical name → resource declaration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceGraph {
    resources: BTreeMap<String, Resource>,
}

impl ResourceGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a new resource.
    ///
    /// # Errors
    ///
    /// [`EcsgraphError::DuplicateResource`] when `name` is already declared.
    pub fn insert(&mut self, name: impl Into<String>, resource: Resource) -> Result<(), EcsgraphError> {
        let name = name.into();
        if self.resources.contains_key(&name) {
            return Err(EcsgraphError::DuplicateResource {
                name,
            });
        }
        tracing::debug!("Declared {} ({})", name, resource.resource_type);
        self.resources.insert(name, resource);
        Ok(())
    }

    /// Declare a resource that several builders may legitimately need.
    ///
    /// An identical existing declaration is reused. Returns `true` when the
    /// resource was newly inserted.
    ///
    /// # Errors
    ///
    /// [`EcsgraphError::DuplicateResource`] when `name` exists with a different
    /// declaration.
    pub fn insert_shared(
        &mut self,
        name: impl Into<String>,
        resource: Resource,
    ) -> Result<bool, EcsgraphError> {
        let name = name.into();
        match self.resources.get(&name) {
            Some(existing) if *existing == resource => {
                tracing::debug!("Reusing shared resource {}", name);
                Ok(false)
            }
            Some(_) => Err(EcsgraphError::DuplicateResource {
                name,
            }),
            None => {
                self.insert(name, resource)?;
                Ok(true)
            }
        }
    }

    /// Look up a resource.
    pub fn get(&self, name: &str) -> Option<&Resource> {
        self.resources.get(name)
    }

    /// Look up a resource for in-place changes.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Resource> {
        self.resources.get_mut(name)
    }

    /// Whether `name` is declared.
    pub fn contains(&self, name: &str) -> bool {
        self.resources.contains_key(name)
    }

    /// Number of resources.
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Whether the graph has no resources.
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Resources in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Resource)> {
        self.resources.iter()
    }

    /// Logical names in name order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().map(String::as_str)
    }

    /// Names of every resource of the given type.
    pub fn names_of_type<'a>(&'a self, resource_type: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.resources
            .iter()
            .filter(move |(_, resource)| resource.resource_type == resource_type)
            .map(|(name, _)| name.as_str())
    }

    /// Check that every dependency names a declared resource.
    ///
    /// # Errors
    ///
    /// [`EcsgraphError::MissingDependency`] for the first dangling edge, in name order.
    pub fn validate_closure(&self) -> Result<(), EcsgraphError> {
        for (name, resource) in &self.resources {
            if let Some(missing) = resource.depends_on.iter().find(|dep| !self.contains(dep)) {
                return Err(EcsgraphError::MissingDependency {
                    resource: name.clone(),
                    dependency: missing.clone(),
                });
            }
        }
        Ok(())
    }

    /// Order in which the provisioning engine can create the resources.
    ///
    /// Explicit `DependsOn` edges and references through `Ref`/`Fn::GetAtt` to
    /// other resources both count as edges.
    ///
    /// # Errors
    ///
    /// [`EcsgraphError::CircularDependency`] when no order exists.
    pub fn deployment_order(&self) -> Result<Vec<String>, EcsgraphError> {
        let mut graph = DependencyGraph::new();
        for (name, resource) in &self.resources {
            graph.ensure_node(name);
            for dependency in &resource.depends_on {
                graph.add_dependency(name, dependency);
            }
            for referenced in intrinsics::referenced_names(&resource.properties) {
                if referenced != *name && self.contains(&referenced) {
                    graph.add_dependency(name, &referenced);
                }
            }
        }
        graph.topological_order()
    }
}

impl<'a> IntoIterator for &'a ResourceGraph {
    type Item = (&'a String, &'a Resource);
    type IntoIter = std::collections::btree_map::Iter<'a, String, Resource>;

    fn into_iter(self) -> Self::IntoIter {
        self.resources.iter()
    }
}
