//! Natural-language descriptions of parsed entities
//!
//! Descriptions, not raw source, are what gets embedded.

use crate::graph::model::{MethodEntity, TypeEntity, TypeKind};
use anyhow::Result;

/// Produces descriptions for types and methods
pub trait DescriptionGenerator: Send + Sync {
    fn describe_type(&self, entity: &TypeEntity) -> Result<String>;

    /// Describe a method in the context of its declaring type
    fn describe_method(&self, method: &MethodEntity, owner: &TypeEntity) -> Result<String>;
}

/// Rule-based describer built from declaration metadata
#[derive(Debug, Default, Clone)]
pub struct TemplateDescriber;

/// Stereotype annotations and name suffixes that hint at a type's role
const ROLE_HINTS: &[(&str, &str)] = &[
    ("RestController", "REST controller handling HTTP requests"),
    ("Controller", "controller handling incoming requests"),
    ("Service", "service implementing business logic"),
    ("Repository", "repository providing data access"),
    ("Entity", "persistent entity mapped to storage"),
    ("Configuration", "configuration component"),
    ("Component", "managed component"),
    ("Factory", "factory creating instances"),
    ("Builder", "builder assembling objects step by step"),
    ("Exception", "exception signalling an error condition"),
    ("Mapper", "mapper converting between representations"),
    ("Client", "client calling an external system"),
    ("Handler", "handler reacting to events"),
    ("Listener", "listener reacting to events"),
    ("Util", "utility helpers"),
    ("Utils", "utility helpers"),
    ("Dto", "data transfer object"),
    ("DTO", "data transfer object"),
];

/// Split an identifier into lowercase words: `findByCustomerId` -> "find by customer id"
pub fn humanize(identifier: &str) -> String {
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();
    let chars: Vec<char> = identifier.chars().collect();
    for (i, &c) in chars.iter().enumerate() {
        if c == '_' || c == '$' {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }
        let boundary = i > 0
            && c.is_uppercase()
            && (chars[i - 1].is_lowercase()
                || chars[i - 1].is_ascii_digit()
                || chars.get(i + 1).is_some_and(|n| n.is_lowercase()) && chars[i - 1].is_uppercase());
        if boundary && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        current.push(c);
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
        .iter()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

fn kind_noun(kind: TypeKind) -> &'static str {
    match kind {
        TypeKind::Class => "class",
        TypeKind::Interface => "interface",
        TypeKind::Enum => "enum",
        TypeKind::Annotation => "annotation type",
    }
}

fn role_of(entity: &TypeEntity) -> Option<&'static str> {
    for (marker, role) in ROLE_HINTS {
        let annotated = entity
            .annotations
            .iter()
            .any(|a| a.trim_start_matches('@') == *marker);
        if annotated {
            return Some(role);
        }
    }
    ROLE_HINTS
        .iter()
        .find(|(marker, _)| entity.name.ends_with(marker))
        .map(|(_, role)| *role)
}

fn package_of(fqn: &str) -> Option<&str> {
    fqn.rsplit_once('.').map(|(pkg, _)| pkg)
}

/// Join at most `limit` items, noting how many were left out
fn list(items: &[String], limit: usize) -> String {
    if items.len() <= limit {
        return items.join(", ");
    }
    format!(
        "{} and {} more",
        items[..limit].join(", "),
        items.len() - limit
    )
}

impl DescriptionGenerator for TemplateDescriber {
    fn describe_type(&self, entity: &TypeEntity) -> Result<String> {
        let mut parts = Vec::new();

        let mut opening = format!(
            "{} {} ({})",
            capitalize(kind_noun(entity.kind)),
            entity.name,
            humanize(&entity.name)
        );
        if let Some(pkg) = package_of(&entity.fqn) {
            opening.push_str(&format!(" in package {}", pkg));
        }
        parts.push(opening);

        if let Some(role) = role_of(entity) {
            parts.push(format!("Acts as a {}", role));
        }
        if !entity.annotations.is_empty() {
            parts.push(format!("Annotated with {}", entity.annotations.join(", ")));
        }
        if let Some(superclass) = &entity.superclass {
            parts.push(format!("Extends {}", superclass));
        }
        if !entity.interfaces.is_empty() {
            let verb = if entity.kind == TypeKind::Interface {
                "Extends"
            } else {
                "Implements"
            };
            parts.push(format!("{} {}", verb, entity.interfaces.join(", ")));
        }

        let constants: Vec<String> = entity
            .fields
            .iter()
            .filter(|f| f.is_enum_constant())
            .map(|f| f.name.clone())
            .collect();
        if !constants.is_empty() {
            parts.push(format!("Constants: {}", list(&constants, 12)));
        }

        let operations: Vec<String> = entity
            .methods
            .iter()
            .filter(|m| !m.is_constructor)
            .map(|m| humanize(&m.name))
            .collect();
        if !operations.is_empty() {
            parts.push(format!("Operations: {}", list(&operations, 12)));
        }

        let state: Vec<String> = entity
            .fields
            .iter()
            .filter(|f| !f.is_enum_constant())
            .map(|f| format!("{} ({})", f.name, f.field_type))
            .collect();
        if !state.is_empty() {
            parts.push(format!("Holds {}", list(&state, 8)));
        }

        Ok(format!("{}.", parts.join(". ")))
    }

    fn describe_method(&self, method: &MethodEntity, owner: &TypeEntity) -> Result<String> {
        let mut parts = Vec::new();

        if method.is_constructor {
            parts.push(format!("Constructor of {} ({})", owner.name, owner.fqn));
        } else {
            parts.push(format!(
                "Method {} of {} that does: {}",
                method.name,
                owner.name,
                humanize(&method.name)
            ));
        }

        if !method.parameters.is_empty() {
            let params: Vec<String> = method
                .parameters
                .iter()
                .map(|p| format!("{} ({})", p.name, p.type_name))
                .collect();
            parts.push(format!("Takes {}", params.join(", ")));
        }
        match method.return_type.as_deref() {
            Some("void") | None => {}
            Some(ret) => parts.push(format!("Returns {}", ret)),
        }
        if !method.annotations.is_empty() {
            parts.push(format!("Annotated with {}", method.annotations.join(", ")));
        }
        if !method.calls.is_empty() {
            parts.push(format!("Calls {}", list(&method.calls, 10)));
        }

        Ok(format!("{}.", parts.join(". ")))
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::model::{FieldEntity, Parameter};

    fn service() -> TypeEntity {
        TypeEntity {
            id: "t1".to_string(),
            repository_id: "r".to_string(),
            name: "PaymentService".to_string(),
            fqn: "com.acme.PaymentService".to_string(),
            file_path: "src/main/java/com/acme/PaymentService.java".to_string(),
            kind: TypeKind::Class,
            annotations: vec!["@Service".to_string()],
            superclass: Some("BaseService".to_string()),
            interfaces: vec!["PaymentApi".to_string()],
            description: String::new(),
            embedding: None,
            start_line: 1,
            end_line: 40,
            source: "class PaymentService {}".to_string(),
            methods: vec![MethodEntity {
                id: "m1".to_string(),
                name: "chargeCustomer".to_string(),
                signature: "Receipt chargeCustomer(Customer customer)".to_string(),
                annotations: vec![],
                parameters: vec![Parameter {
                    name: "customer".to_string(),
                    type_name: "Customer".to_string(),
                }],
                return_type: Some("Receipt".to_string()),
                is_constructor: false,
                start_line: 5,
                end_line: 9,
                calls: vec!["validate".to_string(), "save".to_string()],
                description: String::new(),
                embedding: None,
                source: "Receipt chargeCustomer(Customer customer) {}".to_string(),
            }],
            fields: vec![FieldEntity {
                id: "f1".to_string(),
                name: "repository".to_string(),
                field_type: "PaymentRepository".to_string(),
                annotations: vec![],
                start_line: 3,
                end_line: 3,
            }],
        }
    }

    #[test]
    fn test_humanize() {
        assert_eq!(humanize("findByCustomerId"), "find by customer id");
        assert_eq!(humanize("PaymentService"), "payment service");
        assert_eq!(humanize("HTTPClient"), "http client");
        assert_eq!(humanize("MAX_RETRIES"), "max retries");
        assert_eq!(humanize("run"), "run");
    }

    #[test]
    fn test_describe_type() {
        let text = TemplateDescriber.describe_type(&service()).unwrap();
        assert!(text.starts_with("Class PaymentService (payment service) in package com.acme"));
        assert!(text.contains("service implementing business logic"));
        assert!(text.contains("Extends BaseService"));
        assert!(text.contains("Implements PaymentApi"));
        assert!(text.contains("Operations: charge customer"));
        assert!(text.contains("repository (PaymentRepository)"));
        assert!(!text.contains("class PaymentService {}"));
    }

    #[test]
    fn test_describe_method() {
        let entity = service();
        let text = TemplateDescriber
            .describe_method(&entity.methods[0], &entity)
            .unwrap();
        assert!(text.contains("Method chargeCustomer of PaymentService"));
        assert!(text.contains("charge customer"));
        assert!(text.contains("Takes customer (Customer)"));
        assert!(text.contains("Returns Receipt"));
        assert!(text.contains("Calls validate, save"));
    }

    #[test]
    fn test_describe_constructor_and_void() {
        let entity = service();
        let mut ctor = entity.methods[0].clone();
        ctor.is_constructor = true;
        ctor.return_type = None;
        let text = TemplateDescriber.describe_method(&ctor, &entity).unwrap();
        assert!(text.starts_with("Constructor of PaymentService"));

        let mut void = entity.methods[0].clone();
        void.return_type = Some("void".to_string());
        let text = TemplateDescriber.describe_method(&void, &entity).unwrap();
        assert!(!text.contains("Returns"));
    }

    #[test]
    fn test_role_from_name_suffix() {
        let mut entity = service();
        entity.annotations.clear();
        entity.name = "OrderRepository".to_string();
        assert_eq!(role_of(&entity), Some("repository providing data access"));
    }

    #[test]
    fn test_interface_uses_extends_wording() {
        let mut entity = service();
        entity.kind = TypeKind::Interface;
        entity.superclass = None;
        let text = TemplateDescriber.describe_type(&entity).unwrap();
        assert!(text.starts_with("Interface PaymentService"));
        assert!(text.contains("Extends PaymentApi"));
    }

    #[test]
    fn test_list_truncates() {
        let items: Vec<String> = (0..5).map(|i| i.to_string()).collect();
        assert_eq!(list(&items, 3), "0, 1, 2 and 2 more");
        assert_eq!(list(&items, 5), "0, 1, 2, 3, 4");
    }
}
