//! Dependency descriptors: what a tool function declares it needs.

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::capability::validate_capability;
use crate::error::{Error, Result};

/// A capability a tool function depends on.
///
/// Accepts the bare-string shorthand on the wire (`"date_service"`) and
/// normalizes it immediately to the full object form
/// `{capability, tags: [], version_constraint: null}`, per the
/// "do not guess intent" note on the two decorator variants: both forms
/// converge to this one representation as soon as they cross the
/// deserialization boundary.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DependencyDescriptor {
    capability: String,
    tags: Vec<String>,
    version_constraint: Option<String>,
}

impl DependencyDescriptor {
    /// Builds a descriptor from its full, validated fields.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDependency`] if `capability` fails
    /// validation or any tag is empty.
    pub fn new(
        capability: impl Into<String>,
        tags: Vec<String>,
        version_constraint: Option<String>,
    ) -> Result<Self> {
        let capability = capability.into();
        validate_capability(&capability).map_err(|e| Error::InvalidDependency {
            reason: e.to_string(),
        })?;

        for tag in &tags {
            if tag.trim().is_empty() {
                return Err(Error::InvalidDependency {
                    reason: "dependency tags must be non-empty strings".into(),
                });
            }
        }

        Ok(Self {
            capability,
            tags,
            version_constraint,
        })
    }

    /// The capability this dependency resolves to.
    #[must_use]
    pub fn capability(&self) -> &str {
        &self.capability
    }

    /// Tags narrowing which provider may satisfy this dependency.
    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Optional version constraint string.
    #[must_use]
    pub fn version_constraint(&self) -> Option<&str> {
        self.version_constraint.as_deref()
    }
}

/// Shorthand-normalizing `Deserialize` impl: accepts either a bare string or
/// the full object shape (rejecting unknown keys, per the registration
/// rules).
impl<'de> Deserialize<'de> for DependencyDescriptor {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct DependencyVisitor;

        impl<'de> Visitor<'de> for DependencyVisitor {
            type Value = DependencyDescriptor;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a capability string or a dependency object")
            }

            fn visit_str<E>(self, value: &str) -> std::result::Result<Self::Value, E>
            where
                E: de::Error,
            {
                DependencyDescriptor::new(value, Vec::new(), None).map_err(de::Error::custom)
            }

            fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut capability: Option<String> = None;
                let mut tags: Vec<String> = Vec::new();
                let mut version_constraint: Option<String> = None;

                while let Some(key) = map.next_key::<String>()? {
                    match key.as_str() {
                        "capability" => capability = Some(map.next_value()?),
                        "tags" => tags = map.next_value()?,
                        "version" | "version_constraint" => {
                            version_constraint = map.next_value()?;
                        }
                        unknown => {
                            return Err(de::Error::custom(format!(
                                "unknown dependency field `{unknown}`"
                            )));
                        }
                    }
                }

                let capability = capability
                    .ok_or_else(|| de::Error::missing_field("capability"))?;

                DependencyDescriptor::new(capability, tags, version_constraint)
                    .map_err(de::Error::custom)
            }
        }

        deserializer.deserialize_any(DependencyVisitor)
    }
}

/// `Serialize` always emits the full object shape — only the wire *input*
/// accepts the shorthand.
impl Serialize for DependencyDescriptor {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        DependencyWire {
            capability: &self.capability,
            tags: &self.tags,
            version: self.version_constraint.as_deref(),
        }
        .serialize(serializer)
    }
}

#[derive(Serialize)]
struct DependencyWire<'a> {
    capability: &'a str,
    tags: &'a [String],
    version: Option<&'a str>,
}
