//! Typed records stored in the graph: repositories, entities and relationships

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Marker type name given to enum constants stored as fields
pub const ENUM_CONSTANT_TYPE: &str = "ENUM_CONSTANT";

/// The durable index manifest for one repository and branch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryRecord {
    pub id: String,
    /// Normalized source URL
    pub url: String,
    pub branch: String,
    pub language: String,
    /// Commit hash of the last successful run, absent for legacy entries
    pub last_commit: Option<String>,
    pub last_indexed_at: Option<DateTime<Utc>>,
}

/// Which table an entity lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    Type,
    Method,
    Field,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Type => "TYPE",
            EntityType::Method => "METHOD",
            EntityType::Field => "FIELD",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "TYPE" => Ok(EntityType::Type),
            "METHOD" => Ok(EntityType::Method),
            "FIELD" => Ok(EntityType::Field),
            other => Err(format!("unknown entity type '{}'", other)),
        }
    }
}

/// Declaration kind of a type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeKind {
    Class,
    Interface,
    Enum,
    Annotation,
}

impl TypeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeKind::Class => "class",
            TypeKind::Interface => "interface",
            TypeKind::Enum => "enum",
            TypeKind::Annotation => "annotation",
        }
    }
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TypeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "class" => Ok(TypeKind::Class),
            "interface" => Ok(TypeKind::Interface),
            "enum" => Ok(TypeKind::Enum),
            "annotation" => Ok(TypeKind::Annotation),
            other => Err(format!("unknown type kind '{}'", other)),
        }
    }
}

/// Directed, typed edge labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipType {
    Declares,
    AnnotatedBy,
    Calls,
    Extends,
    Implements,
}

impl RelationshipType {
    pub const ALL: [RelationshipType; 5] = [
        RelationshipType::Declares,
        RelationshipType::AnnotatedBy,
        RelationshipType::Calls,
        RelationshipType::Extends,
        RelationshipType::Implements,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipType::Declares => "DECLARES",
            RelationshipType::AnnotatedBy => "ANNOTATED_BY",
            RelationshipType::Calls => "CALLS",
            RelationshipType::Extends => "EXTENDS",
            RelationshipType::Implements => "IMPLEMENTS",
        }
    }

    /// Phrase used when explaining a path, read as "source <verb> target"
    pub fn verb(&self) -> &'static str {
        match self {
            RelationshipType::Declares => "declares",
            RelationshipType::AnnotatedBy => "is annotated by",
            RelationshipType::Calls => "calls",
            RelationshipType::Extends => "extends",
            RelationshipType::Implements => "implements",
        }
    }
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationshipType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RelationshipType::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown relationship type '{}'", s))
    }
}

/// Traversal direction relative to a starting entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Incoming,
    Outgoing,
    #[default]
    Both,
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "incoming" | "in" => Ok(Direction::Incoming),
            "outgoing" | "out" => Ok(Direction::Outgoing),
            "both" => Ok(Direction::Both),
            other => Err(format!("unknown direction '{}'", other)),
        }
    }
}

/// A name/type pair from a method or constructor parameter list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub type_name: String,
}

/// A class, interface, enum or annotation declaration and everything it owns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeEntity {
    pub id: String,
    pub repository_id: String,
    pub name: String,
    pub fqn: String,
    /// Path relative to the repository root, forward slashes
    pub file_path: String,
    pub kind: TypeKind,
    /// Textual markers such as "@Service"
    pub annotations: Vec<String>,
    pub superclass: Option<String>,
    pub interfaces: Vec<String>,
    pub description: String,
    pub embedding: Option<Vec<f32>>,
    pub start_line: usize,
    pub end_line: usize,
    pub source: String,
    pub methods: Vec<MethodEntity>,
    pub fields: Vec<FieldEntity>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodEntity {
    pub id: String,
    pub name: String,
    pub signature: String,
    pub annotations: Vec<String>,
    pub parameters: Vec<Parameter>,
    /// None for constructors
    pub return_type: Option<String>,
    pub is_constructor: bool,
    pub start_line: usize,
    pub end_line: usize,
    /// Simple names of invoked methods, unresolved
    pub calls: Vec<String>,
    pub description: String,
    pub embedding: Option<Vec<f32>>,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldEntity {
    pub id: String,
    pub name: String,
    /// Declared type, or [`ENUM_CONSTANT_TYPE`] for enum constants
    pub field_type: String,
    pub annotations: Vec<String>,
    pub start_line: usize,
    pub end_line: usize,
}

impl FieldEntity {
    pub fn is_enum_constant(&self) -> bool {
        self.field_type == ENUM_CONSTANT_TYPE
    }
}

/// Flat, typed view of any entity as returned by lookups and structural queries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: String,
    pub entity_type: EntityType,
    pub repository_id: String,
    pub name: String,
    pub fqn: String,
    pub file_path: String,
    /// Type kind, method signature or field type depending on `entity_type`
    pub detail: Option<String>,
    pub description: Option<String>,
    pub source: Option<String>,
    pub start_line: usize,
    pub end_line: usize,
    /// Declaring type for methods and fields
    pub owner_id: Option<String>,
}

impl EntityRecord {
    /// Text shown to consumers: description when present, else source, else FQN
    pub fn display_content(&self) -> String {
        match (&self.description, &self.source) {
            (Some(d), _) if !d.is_empty() => d.clone(),
            (_, Some(s)) if !s.is_empty() => s.clone(),
            _ => self.fqn.clone(),
        }
    }
}

/// A stored edge. `target_id` may name an annotation node rather than an entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Relationship {
    pub source_id: String,
    pub target_id: String,
    pub rel_type: RelationshipType,
}

/// One edge seen from a starting entity, with the entity on the other end
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedEntity {
    pub relationship: Relationship,
    pub direction: Direction,
    /// Id of the node on the far side of the edge
    pub other_id: String,
    /// Display name of the far side (entity FQN or annotation marker)
    pub other_name: String,
    /// Present when the far side is an entity rather than an annotation
    pub entity: Option<EntityRecord>,
}

/// Entity counts for one repository
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityCounts {
    pub types: usize,
    pub methods: usize,
    pub fields: usize,
    pub relationships: usize,
}

impl EntityCounts {
    pub fn total(&self) -> usize {
        self.types + self.methods + self.fields
    }
}

/// A vector hit hydrated from the graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredEntity {
    pub entity: EntityRecord,
    /// Cosine similarity in [0, 1]
    pub score: f32,
}
