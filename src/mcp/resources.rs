//! Resource registry.
//!
//! Resources are read-only documents addressed by URI. They come in two
//! flavours:
//!
//! - **Literal** resources match one exact URI (`aws://ec2/instances`).
//! - **Templates** contain `{placeholder}` path segments
//!   (`aws://ec2/instances/{instanceId}`) and bind each placeholder to the
//!   corresponding segment of the requested URI.
//!
//! URIs are compared as `/`-separated segments. Literal segments must match
//! byte-for-byte; placeholder segments match any single non-empty segment.
//! Percent-encoding is left untouched, so handlers see raw segment text.
//!
//! Registration rejects any resource that could claim a URI already claimed
//! by another, so [`ResourceRegistry::resolve`] has at most one answer.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::Serialize;

use crate::error::RegistrationError;

/// Placeholder values bound by a template match, in pattern order.
pub type Placeholders = IndexMap<String, String>;

/// Describes a literal resource for `resources/list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub uri: String,
    pub name: String,
    pub description: String,
    pub mime_type: String,
}

/// Describes a template resource for `resources/templates/list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceTemplate {
    #[serde(rename = "uriTemplate")]
    pub pattern: String,
    pub name: String,
    pub description: String,
    pub mime_type: String,
}

/// One entry of a `resources/read` result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceContents {
    pub uri: String,
    pub mime_type: String,
    pub text: String,
}

/// Why a resource handler could not produce contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// The object behind the URI does not exist.
    NotFound(String),
    /// Any other failure while reading.
    Internal(String),
}

/// Produces the contents of a resource.
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    /// Reads `uri`. `placeholders` is empty for literal resources.
    async fn read(
        &self,
        uri: &str,
        placeholders: &Placeholders,
    ) -> Result<Vec<ResourceContents>, ResourceError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

impl Segment {
    /// Whether some single URI segment could satisfy both.
    fn overlaps(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Literal(a), Self::Literal(b)) => a == b,
            (Self::Placeholder(_), Self::Literal(text))
            | (Self::Literal(text), Self::Placeholder(_)) => !text.is_empty(),
            (Self::Placeholder(_), Self::Placeholder(_)) => true,
        }
    }
}

/// A parsed URI template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriTemplate {
    pattern: String,
    segments: Vec<Segment>,
}

impl UriTemplate {
    /// Parses a pattern such as `aws://ec2/instances/{instanceId}`.
    ///
    /// # Errors
    ///
    /// Fails if the pattern has no placeholder, a placeholder shares a
    /// segment with literal text, a placeholder name is empty, or a name is
    /// used twice.
    pub fn parse(pattern: &str) -> Result<Self, RegistrationError> {
        let invalid = |reason: &str| RegistrationError::InvalidTemplate {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        };

        let mut segments = Vec::new();
        let mut names: Vec<&str> = Vec::new();

        for raw in pattern.split('/') {
            if let Some(name) = raw.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                if name.is_empty() || name.contains(['{', '}']) {
                    return Err(invalid("placeholder name must be non-empty"));
                }
                if names.contains(&name) {
                    return Err(invalid("placeholder names must be unique"));
                }
                names.push(name);
                segments.push(Segment::Placeholder(name.to_string()));
            } else if raw.contains(['{', '}']) {
                return Err(invalid("a placeholder must span a whole segment"));
            } else {
                segments.push(Segment::Literal(raw.to_string()));
            }
        }

        if names.is_empty() {
            return Err(invalid("template has no placeholders"));
        }

        Ok(Self {
            pattern: pattern.to_string(),
            segments,
        })
    }

    /// The original pattern text.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Placeholder names in pattern order.
    pub fn placeholder_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Placeholder(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Matches a concrete URI, returning the bound placeholders.
    ///
    /// Only whole matches count: the segment counts must agree.
    #[must_use]
    pub fn matches(&self, uri: &str) -> Option<Placeholders> {
        let parts: Vec<&str> = uri.split('/').collect();
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut bound = Placeholders::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(text) if text == part => {}
                Segment::Placeholder(name) if !part.is_empty() => {
                    bound.insert(name.clone(), part.to_string());
                }
                _ => return None,
            }
        }
        Some(bound)
    }

    /// Whether some URI could match both templates.
    fn overlaps(&self, other: &Self) -> bool {
        self.segments.len() == other.segments.len()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|(a, b)| a.overlaps(b))
    }
}

struct LiteralEntry {
    resource: Resource,
    handler: Arc<dyn ResourceHandler>,
}

struct TemplateEntry {
    descriptor: ResourceTemplate,
    template: UriTemplate,
    handler: Arc<dyn ResourceHandler>,
}

/// The outcome of a successful [`ResourceRegistry::resolve`].
pub struct ResolvedResource {
    pub handler: Arc<dyn ResourceHandler>,
    pub placeholders: Placeholders,
    /// MIME type declared at registration.
    pub mime_type: String,
}

impl std::fmt::Debug for ResolvedResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedResource")
            .field("placeholders", &self.placeholders)
            .field("mime_type", &self.mime_type)
            .finish_non_exhaustive()
    }
}

/// Holds literal and template resources and resolves URIs against them.
#[derive(Default)]
pub struct ResourceRegistry {
    literals: HashMap<String, LiteralEntry>,
    literal_order: Vec<String>,
    templates: Vec<TemplateEntry>,
}

impl ResourceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an exact-URI resource.
    ///
    /// # Errors
    ///
    /// [`RegistrationError::DuplicateResource`] if the URI is taken, or
    /// [`RegistrationError::AmbiguousTemplate`] if a registered template
    /// already matches it.
    pub fn register_literal(
        &mut self,
        resource: Resource,
        handler: Arc<dyn ResourceHandler>,
    ) -> Result<(), RegistrationError> {
        if self.literals.contains_key(&resource.uri) {
            return Err(RegistrationError::DuplicateResource { uri: resource.uri });
        }

        if let Some(entry) = self
            .templates
            .iter()
            .find(|entry| entry.template.matches(&resource.uri).is_some())
        {
            return Err(RegistrationError::AmbiguousTemplate {
                pattern: entry.template.pattern().to_string(),
                conflict: resource.uri,
            });
        }

        tracing::debug!(uri = %resource.uri, "registered resource");
        self.literal_order.push(resource.uri.clone());
        self.literals
            .insert(resource.uri.clone(), LiteralEntry { resource, handler });
        Ok(())
    }

    /// Adds a pattern-based resource.
    ///
    /// # Errors
    ///
    /// [`RegistrationError::InvalidTemplate`] for a malformed pattern, or
    /// [`RegistrationError::AmbiguousTemplate`] if it could match a URI
    /// already claimed by a literal or another template.
    pub fn register_template(
        &mut self,
        descriptor: ResourceTemplate,
        handler: Arc<dyn ResourceHandler>,
    ) -> Result<(), RegistrationError> {
        let template = UriTemplate::parse(&descriptor.pattern)?;

        let ambiguous = |conflict: &str| RegistrationError::AmbiguousTemplate {
            pattern: descriptor.pattern.clone(),
            conflict: conflict.to_string(),
        };

        if let Some(existing) = self
            .templates
            .iter()
            .find(|entry| entry.template.overlaps(&template))
        {
            return Err(ambiguous(existing.template.pattern()));
        }

        if let Some(uri) = self
            .literal_order
            .iter()
            .find(|uri| template.matches(uri).is_some())
        {
            return Err(ambiguous(uri));
        }

        tracing::debug!(pattern = %descriptor.pattern, "registered resource template");
        self.templates.push(TemplateEntry {
            descriptor,
            template,
            handler,
        });
        Ok(())
    }

    /// Resolves a URI to its handler and placeholder bindings.
    ///
    /// Exact URIs win; otherwise templates are tried in registration order.
    /// Returns `None` when nothing matches.
    #[must_use]
    pub fn resolve(&self, uri: &str) -> Option<ResolvedResource> {
        if let Some(entry) = self.literals.get(uri) {
            return Some(ResolvedResource {
                handler: Arc::clone(&entry.handler),
                placeholders: Placeholders::new(),
                mime_type: entry.resource.mime_type.clone(),
            });
        }

        self.templates.iter().find_map(|entry| {
            entry.template.matches(uri).map(|placeholders| ResolvedResource {
                handler: Arc::clone(&entry.handler),
                placeholders,
                mime_type: entry.descriptor.mime_type.clone(),
            })
        })
    }

    /// Literal resources in registration order.
    #[must_use]
    pub fn resources(&self) -> Vec<&Resource> {
        self.literal_order
            .iter()
            .filter_map(|uri| self.literals.get(uri).map(|entry| &entry.resource))
            .collect()
    }

    /// Templates in registration order.
    #[must_use]
    pub fn templates(&self) -> Vec<&ResourceTemplate> {
        self.templates.iter().map(|entry| &entry.descriptor).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo(&'static str);

    #[async_trait]
    impl ResourceHandler for Echo {
        async fn read(
            &self,
            uri: &str,
            placeholders: &Placeholders,
        ) -> Result<Vec<ResourceContents>, ResourceError> {
            Ok(vec![ResourceContents {
                uri: uri.to_string(),
                mime_type: "text/plain".to_string(),
                text: format!("{}:{placeholders:?}", self.0),
            }])
        }
    }

    fn literal(uri: &str) -> Resource {
        Resource {
            uri: uri.to_string(),
            name: uri.to_string(),
            description: String::new(),
            mime_type: "application/json".to_string(),
        }
    }

    fn template(pattern: &str) -> ResourceTemplate {
        ResourceTemplate {
            pattern: pattern.to_string(),
            name: pattern.to_string(),
            description: String::new(),
            mime_type: "application/json".to_string(),
        }
    }

    fn registry() -> ResourceRegistry {
        let mut registry = ResourceRegistry::new();
        registry
            .register_literal(literal("aws://ec2/instances"), Arc::new(Echo("list")))
            .unwrap();
        registry
            .register_template(
                template("aws://ec2/instances/{instanceId}"),
                Arc::new(Echo("detail")),
            )
            .unwrap();
        registry
            .register_template(
                template("aws://{service}/regions/{region}/quotas"),
                Arc::new(Echo("quotas")),
            )
            .unwrap();
        registry
    }

    #[test]
    fn literal_resolves_with_no_placeholders() {
        let resolved = registry().resolve("aws://ec2/instances").unwrap();
        assert!(resolved.placeholders.is_empty());
        assert_eq!(resolved.mime_type, "application/json");
    }

    #[test]
    fn template_binds_placeholder() {
        let resolved = registry().resolve("aws://ec2/instances/i-12345").unwrap();
        assert_eq!(resolved.placeholders.len(), 1);
        assert_eq!(resolved.placeholders["instanceId"], "i-12345");
    }

    #[test]
    fn template_binds_multiple_placeholders_in_order() {
        let resolved = registry()
            .resolve("aws://ec2/regions/eu-west-1/quotas")
            .unwrap();
        let bound: Vec<_> = resolved
            .placeholders
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        assert_eq!(bound, vec![("service", "ec2"), ("region", "eu-west-1")]);
    }

    #[test]
    fn no_prefix_or_partial_matches() {
        let registry = registry();
        assert!(registry.resolve("aws://ec2/instances/i-1/volumes").is_none());
        assert!(registry.resolve("aws://ec2").is_none());
        assert!(registry.resolve("aws://s3/buckets").is_none());
    }

    #[test]
    fn empty_segments_do_not_match() {
        let registry = registry();
        assert!(registry.resolve("aws://ec2/instances/").is_none());
        assert!(registry.resolve("aws://ec2//instances/i-1").is_none());
        assert!(registry.resolve("/aws://ec2/instances/i-1").is_none());
    }

    #[test]
    fn percent_encoding_is_not_decoded() {
        let resolved = registry().resolve("aws://ec2/instances/i%2D1").unwrap();
        assert_eq!(resolved.placeholders["instanceId"], "i%2D1");
    }

    #[test]
    fn duplicate_literal_rejected() {
        let mut registry = registry();
        let err = registry
            .register_literal(literal("aws://ec2/instances"), Arc::new(Echo("again")))
            .unwrap_err();
        assert_eq!(
            err,
            RegistrationError::DuplicateResource {
                uri: "aws://ec2/instances".to_string()
            }
        );
    }

    #[test]
    fn overlapping_template_rejected() {
        let mut registry = registry();
        let err = registry
            .register_template(template("aws://ec2/instances/{id}"), Arc::new(Echo("x")))
            .unwrap_err();
        assert!(matches!(err, RegistrationError::AmbiguousTemplate { .. }));

        let err = registry
            .register_template(template("aws://{svc}/instances/{id}"), Arc::new(Echo("x")))
            .unwrap_err();
        assert!(matches!(err, RegistrationError::AmbiguousTemplate { .. }));
    }

    #[test]
    fn template_claiming_literal_rejected() {
        let mut registry = registry();
        let err = registry
            .register_template(template("aws://{service}/instances"), Arc::new(Echo("x")))
            .unwrap_err();
        assert_eq!(
            err,
            RegistrationError::AmbiguousTemplate {
                pattern: "aws://{service}/instances".to_string(),
                conflict: "aws://ec2/instances".to_string(),
            }
        );
    }

    #[test]
    fn literal_claimed_by_template_rejected() {
        let mut registry = registry();
        let err = registry
            .register_literal(literal("aws://ec2/instances/i-fixed"), Arc::new(Echo("x")))
            .unwrap_err();
        assert!(matches!(err, RegistrationError::AmbiguousTemplate { .. }));
    }

    #[test]
    fn distinct_structure_is_not_ambiguous() {
        let mut registry = registry();
        registry
            .register_template(
                template("aws://ec2/instances/{instanceId}/volumes"),
                Arc::new(Echo("volumes")),
            )
            .unwrap();
        registry
            .register_template(template("aws://rds/clusters/{id}"), Arc::new(Echo("rds")))
            .unwrap();
        assert_eq!(registry.templates().len(), 4);
    }

    #[test]
    fn malformed_templates_rejected() {
        for pattern in [
            "aws://ec2/instances",
            "aws://ec2/instances/{}",
            "aws://ec2/instances/i-{id}",
            "aws://{a}/x/{a}",
        ] {
            assert!(
                matches!(
                    UriTemplate::parse(pattern),
                    Err(RegistrationError::InvalidTemplate { .. })
                ),
                "{pattern} should be rejected"
            );
        }
    }

    #[test]
    fn placeholder_names_in_order() {
        let template = UriTemplate::parse("aws://{service}/regions/{region}").unwrap();
        let names: Vec<_> = template.placeholder_names().collect();
        assert_eq!(names, vec!["service", "region"]);
    }

    #[test]
    fn listings_keep_registration_order() {
        let registry = registry();
        let uris: Vec<_> = registry.resources().iter().map(|r| r.uri.clone()).collect();
        assert_eq!(uris, vec!["aws://ec2/instances"]);
        let patterns: Vec<_> = registry
            .templates()
            .iter()
            .map(|t| t.pattern.clone())
            .collect();
        assert_eq!(
            patterns,
            vec![
                "aws://ec2/instances/{instanceId}",
                "aws://{service}/regions/{region}/quotas"
            ]
        );
    }

    #[tokio::test]
    async fn resolved_handler_receives_placeholders() {
        let resolved = registry().resolve("aws://ec2/instances/i-9").unwrap();
        let contents = resolved
            .handler
            .read("aws://ec2/instances/i-9", &resolved.placeholders)
            .await
            .unwrap();
        assert!(contents[0].text.starts_with("detail:"));
        assert!(contents[0].text.contains("i-9"));
    }
}
