//! Java declaration extraction on top of tree-sitter
//!
//! One file yields at most one top-level declaration. Nested and local
//! classes are part of their owner's source text but are not extracted as
//! separate types.

use crate::error::ParseError;
use crate::graph::model::{
    ENUM_CONSTANT_TYPE, FieldEntity, MethodEntity, Parameter, TypeEntity, TypeKind,
};
use sha2::{Digest, Sha256};
use tree_sitter::{Node, Parser};

/// Node kinds that open a top-level declaration
const DECLARATION_KINDS: &[&str] = &[
    "class_declaration",
    "interface_declaration",
    "enum_declaration",
    "annotation_type_declaration",
    "record_declaration",
];

/// Tree-sitter backed parser for Java source files
pub struct JavaParser {
    parser: Parser,
}

impl JavaParser {
    pub fn new() -> Result<Self, ParseError> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_java::LANGUAGE.into())
            .map_err(|e| ParseError::ParserInit(e.to_string()))?;
        Ok(Self { parser })
    }

    /// Parse one file into its top-level declaration.
    ///
    /// Returns `Ok(None)` for files without a declaration (package-info,
    /// module-info, empty files).
    pub fn parse(
        &mut self,
        relative_path: &str,
        source: &str,
        repository_id: &str,
    ) -> Result<Option<TypeEntity>, ParseError> {
        let tree = self
            .parser
            .parse(source, None)
            .ok_or_else(|| ParseError::ReadFailed {
                file: relative_path.to_string(),
                reason: "parser returned no tree".to_string(),
            })?;
        let root = tree.root_node();

        if root.has_error() {
            return Err(ParseError::Syntax {
                file: relative_path.to_string(),
                line: first_error_line(root).unwrap_or(1),
            });
        }

        let mut cursor = root.walk();
        let mut package = None;
        let mut declaration = None;
        for child in root.named_children(&mut cursor) {
            match child.kind() {
                "package_declaration" => {
                    package = child
                        .named_children(&mut child.walk())
                        .find(|n| matches!(n.kind(), "scoped_identifier" | "identifier"))
                        .map(|n| text(n, source).to_string());
                }
                kind if DECLARATION_KINDS.contains(&kind) => {
                    declaration = Some(child);
                    break;
                }
                _ => {}
            }
        }

        let Some(node) = declaration else {
            tracing::debug!("No declaration in {}, skipping", relative_path);
            return Ok(None);
        };

        let extractor = Extractor {
            source,
            relative_path,
            repository_id,
        };
        extractor.type_entity(node, package.as_deref()).map(Some)
    }
}

fn text<'a>(node: Node<'_>, source: &'a str) -> &'a str {
    &source[node.byte_range()]
}

/// Line of the first error or missing node in document order.
///
/// Walks with a cursor so deeply nested expressions cannot exhaust the stack.
fn first_error_line(node: Node<'_>) -> Option<usize> {
    let mut cursor = node.walk();
    loop {
        let current = cursor.node();
        if current.is_error() || current.is_missing() {
            return Some(current.start_position().row + 1);
        }
        if current.has_error() && cursor.goto_first_child() {
            continue;
        }
        while !cursor.goto_next_sibling() {
            if !cursor.goto_parent() {
                return None;
            }
        }
    }
}

/// Collapse whitespace runs so multi-line type text reads on one line
fn squash(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Stable id derived from where a declaration lives
fn entity_id(repository_id: &str, file: &str, kind: &str, name: &str, line: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(repository_id.as_bytes());
    hasher.update([0]);
    hasher.update(file.as_bytes());
    hasher.update([0]);
    hasher.update(kind.as_bytes());
    hasher.update([0]);
    hasher.update(name.as_bytes());
    hasher.update([0]);
    hasher.update(line.to_le_bytes());
    format!("{:x}", hasher.finalize())[..32].to_string()
}

struct Extractor<'a> {
    source: &'a str,
    relative_path: &'a str,
    repository_id: &'a str,
}

impl<'a> Extractor<'a> {
    fn text(&self, node: Node<'_>) -> &'a str {
        text(node, self.source)
    }

    fn id(&self, kind: &str, name: &str, node: Node<'_>) -> String {
        entity_id(
            self.repository_id,
            self.relative_path,
            kind,
            name,
            node.start_position().row + 1,
        )
    }

    fn name_of(&self, node: Node<'_>) -> Result<String, ParseError> {
        node.child_by_field_name("name")
            .map(|n| self.text(n).to_string())
            .ok_or_else(|| ParseError::MissingName {
                file: self.relative_path.to_string(),
            })
    }

    fn type_entity(&self, node: Node<'_>, package: Option<&str>) -> Result<TypeEntity, ParseError> {
        let name = self.name_of(node)?;
        let fqn = match package {
            Some(pkg) if !pkg.is_empty() => format!("{}.{}", pkg, name),
            _ => name.clone(),
        };

        let kind = match node.kind() {
            "interface_declaration" => TypeKind::Interface,
            "enum_declaration" => TypeKind::Enum,
            "annotation_type_declaration" => TypeKind::Annotation,
            _ => TypeKind::Class,
        };

        let superclass = node
            .child_by_field_name("superclass")
            .and_then(|s| s.named_child(0))
            .map(|t| squash(self.text(t)));

        let mut interfaces = Vec::new();
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if matches!(child.kind(), "super_interfaces" | "extends_interfaces") {
                interfaces.extend(self.type_list(child));
            }
        }

        let mut entity = TypeEntity {
            id: self.id(kind.as_str(), &fqn, node),
            repository_id: self.repository_id.to_string(),
            name,
            fqn,
            file_path: self.relative_path.to_string(),
            kind,
            annotations: self.annotations(node),
            superclass,
            interfaces,
            description: String::new(),
            embedding: None,
            start_line: node.start_position().row + 1,
            end_line: node.end_position().row + 1,
            source: self.text(node).to_string(),
            methods: Vec::new(),
            fields: Vec::new(),
        };

        // Record components are the record's fields
        if node.kind() == "record_declaration"
            && let Some(params) = node.child_by_field_name("parameters")
        {
            for param in self.parameters(params) {
                entity.fields.push(FieldEntity {
                    id: self.id("field", &param.0.name, param.1),
                    name: param.0.name.clone(),
                    field_type: param.0.type_name.clone(),
                    annotations: self.annotations(param.1),
                    start_line: param.1.start_position().row + 1,
                    end_line: param.1.end_position().row + 1,
                });
            }
        }

        if let Some(body) = node.child_by_field_name("body") {
            self.members(body, &mut entity)?;
        }

        Ok(entity)
    }

    /// Types listed under `implements` / `extends` clauses
    fn type_list(&self, clause: Node<'_>) -> Vec<String> {
        let mut out = Vec::new();
        let mut cursor = clause.walk();
        for child in clause.named_children(&mut cursor) {
            if child.kind() == "type_list" {
                let mut inner = child.walk();
                out.extend(
                    child
                        .named_children(&mut inner)
                        .map(|t| squash(self.text(t))),
                );
            }
        }
        out
    }

    /// Annotation markers from a declaration's `modifiers` child
    fn annotations(&self, node: Node<'_>) -> Vec<String> {
        let mut out = Vec::new();
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() != "modifiers" {
                continue;
            }
            let mut inner = child.walk();
            for modifier in child.named_children(&mut inner) {
                if matches!(modifier.kind(), "annotation" | "marker_annotation")
                    && let Some(name) = modifier.child_by_field_name("name")
                {
                    out.push(format!("@{}", self.text(name)));
                }
            }
        }
        out
    }

    fn members(&self, body: Node<'_>, entity: &mut TypeEntity) -> Result<(), ParseError> {
        let mut cursor = body.walk();
        for member in body.named_children(&mut cursor) {
            match member.kind() {
                "method_declaration" => entity.methods.push(self.method(member, false)?),
                "constructor_declaration" | "compact_constructor_declaration" => {
                    entity.methods.push(self.method(member, true)?)
                }
                "annotation_type_element_declaration" => {
                    entity.methods.push(self.method(member, false)?)
                }
                "field_declaration" | "constant_declaration" => {
                    entity.fields.extend(self.fields(member));
                }
                "enum_constant" => {
                    let name = self.name_of(member)?;
                    entity.fields.push(FieldEntity {
                        id: self.id("field", &name, member),
                        name,
                        field_type: ENUM_CONSTANT_TYPE.to_string(),
                        annotations: self.annotations(member),
                        start_line: member.start_position().row + 1,
                        end_line: member.end_position().row + 1,
                    });
                }
                // Members after the constant list of an enum
                "enum_body_declarations" => self.members(member, entity)?,
                _ => {}
            }
        }
        Ok(())
    }

    fn method(&self, node: Node<'_>, is_constructor: bool) -> Result<MethodEntity, ParseError> {
        let name = self.name_of(node)?;
        let parameters: Vec<Parameter> = node
            .child_by_field_name("parameters")
            .map(|p| self.parameters(p).into_iter().map(|(p, _)| p).collect())
            .unwrap_or_default();
        let return_type = if is_constructor {
            None
        } else {
            node.child_by_field_name("type")
                .map(|t| squash(self.text(t)))
        };

        let params_text = parameters
            .iter()
            .map(|p| format!("{} {}", p.type_name, p.name))
            .collect::<Vec<_>>()
            .join(", ");
        let signature = match &return_type {
            Some(ret) => format!("{} {}({})", ret, name, params_text),
            None => format!("{}({})", name, params_text),
        };

        let mut calls = Vec::new();
        if let Some(body) = node.child_by_field_name("body") {
            self.collect_calls(body, &mut calls);
        }

        Ok(MethodEntity {
            id: self.id(if is_constructor { "constructor" } else { "method" }, &signature, node),
            name,
            signature,
            annotations: self.annotations(node),
            parameters,
            return_type,
            is_constructor,
            start_line: node.start_position().row + 1,
            end_line: node.end_position().row + 1,
            calls,
            description: String::new(),
            embedding: None,
            source: self.text(node).to_string(),
        })
    }

    fn parameters<'t>(&self, params: Node<'t>) -> Vec<(Parameter, Node<'t>)> {
        let mut out = Vec::new();
        let mut cursor = params.walk();
        for param in params.named_children(&mut cursor) {
            match param.kind() {
                "formal_parameter" => {
                    let type_name = param
                        .child_by_field_name("type")
                        .map(|t| squash(self.text(t)))
                        .unwrap_or_default();
                    let name = param
                        .child_by_field_name("name")
                        .map(|n| self.text(n).to_string())
                        .unwrap_or_default();
                    out.push((Parameter { name, type_name }, param));
                }
                "spread_parameter" => {
                    let mut inner = param.walk();
                    let mut type_name = String::new();
                    let mut name = String::new();
                    for part in param.named_children(&mut inner) {
                        match part.kind() {
                            "modifiers" => {}
                            "variable_declarator" => {
                                name = part
                                    .child_by_field_name("name")
                                    .map(|n| self.text(n).to_string())
                                    .unwrap_or_default();
                            }
                            _ if type_name.is_empty() => {
                                type_name = format!("{}...", squash(self.text(part)));
                            }
                            _ => {}
                        }
                    }
                    out.push((Parameter { name, type_name }, param));
                }
                _ => {}
            }
        }
        out
    }

    fn fields(&self, node: Node<'_>) -> Vec<FieldEntity> {
        let field_type = node
            .child_by_field_name("type")
            .map(|t| squash(self.text(t)))
            .unwrap_or_default();
        let annotations = self.annotations(node);

        let mut out = Vec::new();
        let mut cursor = node.walk();
        for declarator in node.children_by_field_name("declarator", &mut cursor) {
            let Some(name) = declarator.child_by_field_name("name") else {
                continue;
            };
            let name = self.text(name).to_string();
            out.push(FieldEntity {
                id: self.id("field", &name, declarator),
                name,
                field_type: field_type.clone(),
                annotations: annotations.clone(),
                start_line: node.start_position().row + 1,
                end_line: node.end_position().row + 1,
            });
        }
        out
    }

    /// Names of invoked methods in source order, without duplicates
    fn collect_calls(&self, node: Node<'_>, calls: &mut Vec<String>) {
        let mut cursor = node.walk();
        loop {
            let current = cursor.node();
            if current.kind() == "method_invocation"
                && let Some(name) = current.child_by_field_name("name")
            {
                let name = self.text(name).to_string();
                if !calls.contains(&name) {
                    calls.push(name);
                }
            }
            if cursor.goto_first_child() {
                continue;
            }
            while !cursor.goto_next_sibling() {
                if !cursor.goto_parent() {
                    return;
                }
            }
        }
    }
}
