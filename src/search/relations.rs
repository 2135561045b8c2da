//! Dependency and relationship-path queries over stored edges

use super::SearchEngine;
use crate::error::{GraphStoreError, ValidationError};
use crate::graph::{Direction, EntityRecord};
use crate::types::{DependencyNode, DependencyTree, PathStep, RelationshipPath};
use anyhow::Result;
use std::collections::{HashMap, VecDeque};

/// Upper bound on entities visited while searching for a path
const MAX_VISITED: usize = 10_000;

fn require_id(id: &str, field: &str) -> Result<(), ValidationError> {
    if id.trim().is_empty() {
        return Err(ValidationError::Empty(field.to_string()));
    }
    Ok(())
}

fn describe_step(step: &PathStep) -> String {
    let verb = step.relationship.verb();
    if step.forward {
        format!("{} {} {}", step.from_name, verb, step.to_name)
    } else {
        format!("{} {} {}", step.to_name, verb, step.from_name)
    }
}

impl SearchEngine {
    async fn require_entity(&self, id: &str) -> Result<EntityRecord> {
        self.store
            .get_entity(id)
            .await?
            .ok_or_else(|| GraphStoreError::EntityNotFound(id.to_string()).into())
    }

    /// Direct relationships of an entity as a shallow tree.
    ///
    /// `depth` is validated against the configured maximum but only direct
    /// neighbours are returned; the tree reports the depth it traversed.
    pub async fn find_dependencies(
        &self,
        entity_id: &str,
        depth: usize,
        direction: Direction,
    ) -> Result<DependencyTree> {
        require_id(entity_id, "entity id")?;
        let max_depth = self.config.max_path_depth;
        if depth == 0 || depth > max_depth {
            return Err(ValidationError::ConstraintViolation {
                field: "depth".to_string(),
                constraint: format!("between 1 and {}", max_depth),
                actual: depth.to_string(),
            }
            .into());
        }

        let root = self.require_entity(entity_id).await?;
        if depth > 1 {
            tracing::debug!(
                "Dependencies of {} requested to depth {}, following direct relationships only",
                root.fqn,
                depth
            );
        }

        let dependencies = self
            .store
            .relationships(entity_id, &[], direction)
            .await?
            .into_iter()
            .map(|related| DependencyNode {
                id: related.other_id,
                name: related.other_name,
                entity_type: related.entity.map(|e| e.entity_type),
                relationship: related.relationship.rel_type,
                direction: related.direction,
            })
            .collect();

        Ok(DependencyTree {
            root,
            requested_depth: depth,
            depth: 1,
            direction,
            dependencies,
        })
    }

    /// Shortest path between two entities, walking edges in either direction.
    ///
    /// Annotation nodes are not traversed, so two types sharing an annotation
    /// are not reported as connected through it.
    pub async fn explain_relationship(&self, from_id: &str, to_id: &str) -> Result<RelationshipPath> {
        require_id(from_id, "source entity id")?;
        require_id(to_id, "target entity id")?;
        let from = self.require_entity(from_id).await?;
        let to = self.require_entity(to_id).await?;

        if from.id == to.id {
            return Ok(RelationshipPath {
                from_id: from.id,
                to_id: to.id,
                found: true,
                steps: Vec::new(),
                explanation: format!("{} and {} are the same entity", from.fqn, to.fqn),
            });
        }

        let max_hops = self.config.max_path_depth;
        // node -> step that reached it
        let mut reached: HashMap<String, Option<PathStep>> = HashMap::new();
        reached.insert(from.id.clone(), None);
        let mut queue: VecDeque<(String, String, usize)> = VecDeque::new();
        queue.push_back((from.id.clone(), from.fqn.clone(), 0));
        let mut found = false;

        'search: while let Some((node_id, node_name, hops)) = queue.pop_front() {
            if hops >= max_hops {
                continue;
            }
            for related in self.store.relationships(&node_id, &[], Direction::Both).await? {
                if related.entity.is_none() || reached.contains_key(&related.other_id) {
                    continue;
                }
                let step = PathStep {
                    from_id: node_id.clone(),
                    from_name: node_name.clone(),
                    relationship: related.relationship.rel_type,
                    to_id: related.other_id.clone(),
                    to_name: related.other_name.clone(),
                    forward: related.direction == Direction::Outgoing,
                };
                reached.insert(related.other_id.clone(), Some(step));

                if related.other_id == to.id {
                    found = true;
                    break 'search;
                }
                if reached.len() >= MAX_VISITED {
                    tracing::warn!(
                        "Path search from {} stopped after visiting {} entities",
                        from.fqn,
                        MAX_VISITED
                    );
                    break 'search;
                }
                queue.push_back((related.other_id, related.other_name, hops + 1));
            }
        }

        if !found {
            return Ok(RelationshipPath {
                explanation: format!(
                    "No relationship path found between {} and {} within {} hops",
                    from.fqn, to.fqn, max_hops
                ),
                from_id: from.id,
                to_id: to.id,
                found: false,
                steps: Vec::new(),
            });
        }

        let mut steps = Vec::new();
        let mut cursor = to.id.clone();
        while let Some(Some(step)) = reached.get(&cursor) {
            cursor = step.from_id.clone();
            steps.push(step.clone());
        }
        steps.reverse();

        let explanation = steps
            .iter()
            .map(describe_step)
            .collect::<Vec<_>>()
            .join(", and ");
        tracing::debug!("{} -> {}: {}", from.fqn, to.fqn, explanation);

        Ok(RelationshipPath {
            from_id: from.id,
            to_id: to.id,
            found: true,
            steps,
            explanation,
        })
    }
}
