//! Plan template registry.
//!
//! Templates are loaded once at startup from a directory and from inline
//! configuration, keyed by their advertised plan id. The registry is
//! immutable afterwards; rebuilding it means building a new one.

use meridian_core::TemplatesConfig;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::PlanError;

/// Prefix shared by every identifier the broker advertises.
pub const ID_PREFIX: &str = "meridian";

/// File extensions recognised as plan templates.
const TEMPLATE_EXTENSIONS: &[&str] = &["yaml", "yml", "tpl", "j2"];

/// Identifier of the single service the broker advertises.
pub fn service_id() -> String {
    format!("{}-service-template", ID_PREFIX)
}

/// Plan identifier advertised for a template name.
pub fn plan_id_for(template_name: &str) -> String {
    format!(
        "{}-plan-template-{}",
        ID_PREFIX,
        template_name.to_lowercase()
    )
}

/// A named, unrendered plan template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanTemplate {
    name: String,
    plan_id: String,
    source: String,
}

impl PlanTemplate {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            plan_id: plan_id_for(&name),
            name,
            source: source.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn plan_id(&self) -> &str {
        &self.plan_id
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

/// Immutable set of templates, ordered by plan id.
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: BTreeMap<String, PlanTemplate>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load templates from configuration: the directory first, then inline
    /// entries.
    pub fn from_config(config: &TemplatesConfig) -> Result<Self, PlanError> {
        let mut registry = Self::new();
        if let Some(dir) = &config.directory {
            registry.load_directory(dir)?;
        }
        for (name, source) in &config.inline {
            registry.register(PlanTemplate::new(name.clone(), source.clone()))?;
        }
        Ok(registry)
    }

    /// Load every template file in `dir`. Files are visited in name order.
    pub fn load_directory(&mut self, dir: impl AsRef<Path>) -> Result<(), PlanError> {
        let dir = dir.as_ref();
        let mut paths = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() && is_template_file(&path) {
                paths.push(path);
            }
        }
        paths.sort();

        for path in paths {
            let name = template_name(&path)
                .ok_or_else(|| PlanError::InvalidTemplateName(path.display().to_string()))?;
            let source = fs::read_to_string(&path)?;
            tracing::debug!(template = %name, path = %path.display(), "Loaded plan template");
            self.register(PlanTemplate::new(name, source))?;
        }
        Ok(())
    }

    /// Add a template. Names must be unique case-insensitively, since they
    /// share the lowercase plan id.
    pub fn register(&mut self, template: PlanTemplate) -> Result<(), PlanError> {
        if template.name.trim().is_empty() {
            return Err(PlanError::InvalidTemplateName(template.name));
        }
        if self.templates.contains_key(&template.plan_id) {
            return Err(PlanError::DuplicateTemplate(template.name));
        }
        self.templates.insert(template.plan_id.clone(), template);
        Ok(())
    }

    pub fn get(&self, plan_id: &str) -> Option<&PlanTemplate> {
        self.templates.get(plan_id)
    }

    /// Templates in plan id order.
    pub fn iter(&self) -> impl Iterator<Item = &PlanTemplate> {
        self.templates.values()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

fn is_template_file(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'));
    let known_ext = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| TEMPLATE_EXTENSIONS.contains(&e));
    !hidden && known_ext
}

/// Template name: the file name up to the first `.`.
fn template_name(path: &Path) -> Option<String> {
    let file_name = path.file_name()?.to_str()?;
    let name = file_name.split('.').next()?;
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_plan_id_is_lowercased() {
        assert_eq!(plan_id_for("Basic"), "meridian-plan-template-basic");
        assert_eq!(service_id(), "meridian-service-template");
    }

    #[test]
    fn test_load_directory_filters_and_names() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("basic.yaml"), "name: basic\n").unwrap();
        fs::write(dir.path().join("override.yml.j2"), "name: override\n").unwrap();
        fs::write(dir.path().join("README.md"), "not a template").unwrap();
        fs::write(dir.path().join(".hidden.yaml"), "name: hidden\n").unwrap();

        let mut registry = TemplateRegistry::new();
        registry.load_directory(dir.path()).unwrap();

        let names: Vec<&str> = registry.iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["basic", "override"]);
        assert!(registry.get("meridian-plan-template-override").is_some());
    }

    #[test]
    fn test_duplicate_names_are_rejected() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("basic.yaml"), "name: a\n").unwrap();

        let mut config = TemplatesConfig {
            directory: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        config
            .inline
            .insert("BASIC".to_string(), "name: b\n".to_string());

        let err = TemplateRegistry::from_config(&config).unwrap_err();
        assert!(matches!(err, PlanError::DuplicateTemplate(name) if name == "BASIC"));
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let mut registry = TemplateRegistry::new();
        let err = registry
            .load_directory("/nonexistent/meridian/templates")
            .unwrap_err();
        assert!(matches!(err, PlanError::Io(_)));
    }
}
