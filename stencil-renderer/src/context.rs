//! Template context: manifest defaults, caller overrides, prompts.

use std::path::Path;

use serde_json::Value;
use stencil_core::{Context, CHECKOUT_KEY, TEMPLATE_KEY};

use crate::error::{io_err, RenderError};
use crate::render::RenderRequest;

/// Name of the defaults manifest at the template root.
pub const MANIFEST_FILE: &str = "stencil.json";

/// Name under which the resolved context is exposed to templates.
pub const CONTEXT_VAR: &str = "stencil";

/// Load `<root>/stencil.json`.
pub fn load_manifest(root: &Path) -> Result<Context, RenderError> {
    let path = root.join(MANIFEST_FILE);
    if !path.exists() {
        return Err(RenderError::MissingManifest { path });
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    serde_json::from_str(&contents).map_err(|source| RenderError::Manifest { path, source })
}

/// Resolve the final rendering context.
///
/// Priority, lowest first: manifest defaults, request context, interactive
/// answers. `_template` / `_checkout` always describe the current request.
/// String defaults may reference other variables (`"{{ stencil.name | slugify }}"`)
/// and are expanded after prompting.
pub fn resolve(defaults: &Context, request: &RenderRequest<'_>) -> Result<Context, RenderError> {
    let mut context = Context::merge(defaults, request.context);
    if !request.no_input {
        prompt_for_values(&mut context)?;
    }
    expand_references(&mut context)?;

    context.insert(TEMPLATE_KEY, request.source);
    match request.checkout {
        Some(revision) => {
            context.insert(CHECKOUT_KEY, revision);
        }
        None => {
            context.remove(CHECKOUT_KEY);
        }
    }
    Ok(context)
}

/// Wrap `context` as the single `stencil` variable of a [`tera::Context`].
pub fn to_tera_context(context: &Context) -> Result<tera::Context, RenderError> {
    let mut tera_ctx = tera::Context::new();
    tera_ctx.insert(CONTEXT_VAR, &serde_json::to_value(context)?);
    Ok(tera_ctx)
}

fn is_private(key: &str) -> bool {
    key.starts_with('_')
}

fn prompt_for_values(context: &mut Context) -> Result<(), RenderError> {
    let keys: Vec<String> = context
        .iter()
        .map(|(k, _)| k.clone())
        .filter(|k| !is_private(k))
        .collect();

    for key in keys {
        let Some(current) = context.get(&key).cloned() else {
            continue;
        };
        let answer = match current {
            Value::String(default) => {
                Value::String(inquire::Text::new(&key).with_default(&default).prompt()?)
            }
            Value::Bool(default) => {
                Value::Bool(inquire::Confirm::new(&key).with_default(default).prompt()?)
            }
            Value::Array(choices) if !choices.is_empty() => {
                let labels: Vec<String> = choices.iter().map(display_value).collect();
                let picked = inquire::Select::new(&key, labels.clone()).prompt()?;
                let index = labels.iter().position(|l| *l == picked).unwrap_or(0);
                choices[index].clone()
            }
            // Numbers, objects and empty lists are not prompted for.
            _ => continue,
        };
        context.insert(key, answer);
    }
    Ok(())
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Render string values that reference other variables until nothing changes.
fn expand_references(context: &mut Context) -> Result<(), RenderError> {
    for _ in 0..context.len() {
        let tera_ctx = to_tera_context(context)?;
        let mut changed = false;
        let pending: Vec<(String, String)> = context
            .iter()
            .filter_map(|(k, v)| match v {
                Value::String(s) if s.contains("{{") || s.contains("{%") => {
                    Some((k.clone(), s.clone()))
                }
                _ => None,
            })
            .collect();
        for (key, raw) in pending {
            let rendered = tera::Tera::one_off(&raw, &tera_ctx, false)?;
            if rendered != raw {
                context.insert(key, rendered);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx(value: Value) -> Context {
        serde_json::from_value(value).expect("object")
    }

    #[test]
    fn request_context_overrides_manifest_defaults() {
        let defaults = ctx(json!({"name": "default", "license": "MIT"}));
        let overrides = ctx(json!({"name": "custom"}));
        let request = RenderRequest {
            source: "/srv/t",
            checkout: Some("v2"),
            context: &overrides,
            no_input: true,
        };
        let resolved = resolve(&defaults, &request).expect("resolve");
        assert_eq!(resolved.get("name"), Some(&json!("custom")));
        assert_eq!(resolved.get("license"), Some(&json!("MIT")));
        assert_eq!(resolved.template(), Some("/srv/t"));
        assert_eq!(resolved.checkout(), Some("v2"));
    }

    #[test]
    fn stale_checkout_is_dropped_without_revision() {
        let stored = ctx(json!({"_template": "/old", "_checkout": "v1"}));
        let request = RenderRequest {
            source: "/srv/t",
            checkout: None,
            context: &stored,
            no_input: true,
        };
        let resolved = resolve(&Context::new(), &request).expect("resolve");
        assert_eq!(resolved.template(), Some("/srv/t"));
        assert!(resolved.checkout().is_none());
    }

    #[test]
    fn derived_defaults_are_expanded() {
        let defaults = ctx(json!({
            "project_name": "My Service",
            "project_slug": "{{ stencil.project_name | slugify }}",
        }));
        let request = RenderRequest {
            source: "/srv/t",
            checkout: None,
            context: &Context::new(),
            no_input: true,
        };
        let resolved = resolve(&defaults, &request).expect("resolve");
        assert_eq!(resolved.get("project_slug"), Some(&json!("my-service")));
    }
}
