//! Named response templates.
//!
//! # Responsibilities
//! - Load every template (body + optional `<name>.meta.toml` sidecar)
//! - Resolve a name to an immutable, ready-to-serve template
//! - Rescan on explicit reload, recording per-file failures
//!
//! # Design Decisions
//! - Catalog published as one `Arc`, swapped whole on reload
//! - No filesystem access per request
//! - A broken file only makes that template unavailable

use arc_swap::ArcSwap;
use axum::body::Bytes;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

use crate::observability::metrics;
use crate::templates::source::TemplateSource;

/// Suffix of the metadata sidecar that accompanies a template.
pub const META_SUFFIX: &str = ".meta.toml";

/// Failure to resolve a template at dispatch time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("template {name:?} not found")]
    NotFound { name: String },
    #[error("template {name:?} is unavailable: {reason}")]
    Unavailable { name: String, reason: String },
}

impl TemplateError {
    pub fn name(&self) -> &str {
        match self {
            TemplateError::NotFound { name } | TemplateError::Unavailable { name, .. } => name,
        }
    }
}

/// A loaded template, ready to serve verbatim.
#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl Template {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Response headers, `content-type` always included.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }
}

/// Optional sidecar metadata.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TemplateMeta {
    status: Option<u16>,
    content_type: Option<String>,
    #[serde(default)]
    headers: BTreeMap<String, String>,
}

/// Outcome of one reload pass.
#[derive(Debug, Clone, Default)]
pub struct ReloadReport {
    pub generation: u64,
    pub loaded: usize,
    /// Template name → reason it could not be loaded.
    pub failed: BTreeMap<String, String>,
}

#[derive(Debug, Default)]
struct Catalog {
    generation: u64,
    templates: HashMap<String, Arc<Template>>,
    failures: BTreeMap<String, String>,
}

/// Thread-safe template catalog.
pub struct TemplateStore {
    source: Box<dyn TemplateSource>,
    default_content_type: String,
    catalog: ArcSwap<Catalog>,
    reload_lock: Mutex<()>,
}

impl std::fmt::Debug for TemplateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateStore")
            .field("source", &self.source.describe())
            .field("generation", &self.generation())
            .finish()
    }
}

impl TemplateStore {
    /// Create an empty store; call [`TemplateStore::reload`] to populate it.
    pub fn new(source: impl TemplateSource + 'static, default_content_type: impl Into<String>) -> Self {
        Self {
            source: Box::new(source),
            default_content_type: default_content_type.into(),
            catalog: ArcSwap::from_pointee(Catalog::default()),
            reload_lock: Mutex::new(()),
        }
    }

    /// Create and eagerly load a store.
    pub fn load(
        source: impl TemplateSource + 'static,
        default_content_type: impl Into<String>,
    ) -> io::Result<Self> {
        let store = Self::new(source, default_content_type);
        store.reload()?;
        Ok(store)
    }

    /// Resolve a name to its loaded template.
    pub fn resolve(&self, name: &str) -> Result<Arc<Template>, TemplateError> {
        let catalog = self.catalog.load();
        if let Some(template) = catalog.templates.get(name) {
            return Ok(Arc::clone(template));
        }
        match catalog.failures.get(name) {
            Some(reason) => Err(TemplateError::Unavailable {
                name: name.to_string(),
                reason: reason.clone(),
            }),
            None => Err(TemplateError::NotFound {
                name: name.to_string(),
            }),
        }
    }

    /// Re-read every template from the source.
    ///
    /// Fails only if the source cannot be listed, in which case the current
    /// catalog is kept. Individual files that fail are recorded in the report
    /// and become unavailable until the next successful reload.
    pub fn reload(&self) -> io::Result<ReloadReport> {
        let _guard = self.reload_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let names = self.source.list()?;
        let available: HashSet<&str> = names.iter().map(String::as_str).collect();
        let mut templates = HashMap::new();
        let mut failures = BTreeMap::new();

        for name in names.iter().filter(|n| !n.ends_with(META_SUFFIX)) {
            let meta_name = format!("{name}{META_SUFFIX}");
            let has_meta = available.contains(meta_name.as_str());

            match self.load_one(name, has_meta.then_some(meta_name.as_str())) {
                Ok(template) => {
                    templates.insert(name.clone(), Arc::new(template));
                }
                Err(reason) => {
                    tracing::warn!(template = %name, %reason, "Template failed to load");
                    failures.insert(name.clone(), reason);
                }
            }
        }

        for orphan in names
            .iter()
            .filter_map(|n| n.strip_suffix(META_SUFFIX))
            .filter(|base| !available.contains(base))
        {
            tracing::debug!(template = %orphan, "Metadata sidecar without template");
        }

        let generation = self.catalog.load().generation + 1;
        let report = ReloadReport {
            generation,
            loaded: templates.len(),
            failed: failures.clone(),
        };

        self.catalog.store(Arc::new(Catalog {
            generation,
            templates,
            failures,
        }));

        metrics::record_templates(report.loaded, report.failed.len());
        tracing::info!(
            source = %self.source.describe(),
            generation,
            loaded = report.loaded,
            failed = report.failed.len(),
            "Templates loaded"
        );

        Ok(report)
    }

    fn load_one(&self, name: &str, meta_name: Option<&str>) -> Result<Template, String> {
        let body = self.source.read(name).map_err(|e| format!("read failed: {e}"))?;

        let meta = match meta_name {
            Some(meta_name) => {
                let raw = self
                    .source
                    .read(meta_name)
                    .map_err(|e| format!("read {meta_name} failed: {e}"))?;
                let text = String::from_utf8(raw).map_err(|_| format!("{meta_name} is not UTF-8"))?;
                toml::from_str::<TemplateMeta>(&text).map_err(|e| format!("invalid {meta_name}: {e}"))?
            }
            None => TemplateMeta::default(),
        };

        let status = match meta.status {
            Some(code) => StatusCode::from_u16(code).map_err(|_| format!("invalid status {code}"))?,
            None => StatusCode::OK,
        };

        let mut headers = HeaderMap::new();
        for (key, value) in &meta.headers {
            let key = HeaderName::from_bytes(key.as_bytes()).map_err(|_| format!("invalid header name {key:?}"))?;
            let value = HeaderValue::from_str(value).map_err(|_| format!("invalid value for header {key}"))?;
            headers.append(key, value);
        }

        if !headers.contains_key(header::CONTENT_TYPE) {
            let content_type = meta
                .content_type
                .as_deref()
                .or_else(|| content_type_for(name))
                .unwrap_or(self.default_content_type.as_str());
            let value = HeaderValue::from_str(content_type)
                .map_err(|_| format!("invalid content type {content_type:?}"))?;
            headers.insert(header::CONTENT_TYPE, value);
        }

        Ok(Template {
            name: name.to_string(),
            status,
            headers,
            body: Bytes::from(body),
        })
    }

    /// Names of all resolvable templates, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.catalog.load().templates.keys().cloned().collect();
        names.sort();
        names
    }

    /// Templates that failed during the last reload, with reasons.
    pub fn failures(&self) -> BTreeMap<String, String> {
        self.catalog.load().failures.clone()
    }

    pub fn len(&self) -> usize {
        self.catalog.load().templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reload counter; 0 before the first load.
    pub fn generation(&self) -> u64 {
        self.catalog.load().generation
    }
}

fn content_type_for(name: &str) -> Option<&'static str> {
    let ext = name.rsplit_once('.')?.1.to_ascii_lowercase();
    let content_type = match ext.as_str() {
        "json" => "application/json",
        "xml" => "application/xml",
        "html" | "htm" => "text/html; charset=utf-8",
        "txt" => "text/plain; charset=utf-8",
        "csv" => "text/csv",
        "yaml" | "yml" => "application/yaml",
        _ => return None,
    };
    Some(content_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::source::{DirectorySource, MemorySource};
    use std::fs;

    #[test]
    fn test_resolve_with_inferred_content_type() {
        let store = TemplateStore::load(
            MemorySource::new()
                .with("hello.json", r#"{"msg":"hi"}"#)
                .with("page.html", "<p>hi</p>")
                .with("blob", "raw"),
            "application/octet-stream",
        )
        .unwrap();

        let hello = store.resolve("hello.json").unwrap();
        assert_eq!(hello.status(), StatusCode::OK);
        assert_eq!(hello.headers()[header::CONTENT_TYPE], "application/json");
        assert_eq!(hello.body().as_ref(), br#"{"msg":"hi"}"#);

        let page = store.resolve("page.html").unwrap();
        assert_eq!(page.headers()[header::CONTENT_TYPE], "text/html; charset=utf-8");

        let blob = store.resolve("blob").unwrap();
        assert_eq!(blob.headers()[header::CONTENT_TYPE], "application/octet-stream");
    }

    #[test]
    fn test_sidecar_sets_status_and_headers() {
        let store = TemplateStore::load(
            MemorySource::new()
                .with("created.json", "{}")
                .with(
                    "created.json.meta.toml",
                    "status = 201\n[headers]\nLocation = \"/items/1\"\n",
                ),
            "application/json",
        )
        .unwrap();

        let created = store.resolve("created.json").unwrap();
        assert_eq!(created.status(), StatusCode::CREATED);
        assert_eq!(created.headers()["location"], "/items/1");
        assert!(store.resolve("created.json.meta.toml").is_err());
        assert_eq!(store.names(), vec!["created.json"]);
    }

    #[test]
    fn test_missing_template_is_not_found() {
        let store = TemplateStore::load(MemorySource::new(), "application/json").unwrap();
        assert_eq!(
            store.resolve("nope.json").unwrap_err(),
            TemplateError::NotFound {
                name: "nope.json".into()
            }
        );
    }

    #[test]
    fn test_reload_records_failures_without_aborting() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("good.json"), "{}").unwrap();
        fs::write(dir.path().join("bad.json"), "{}").unwrap();
        fs::write(dir.path().join("bad.json.meta.toml"), "status = \"nope\"").unwrap();

        let store = TemplateStore::load(DirectorySource::new(dir.path()), "application/json").unwrap();
        assert!(store.resolve("good.json").is_ok());
        let err = store.resolve("bad.json").unwrap_err();
        assert!(matches!(err, TemplateError::Unavailable { .. }));
        assert_eq!(err.name(), "bad.json");
        assert_eq!(store.failures().len(), 1);

        // Fix the sidecar and reload.
        fs::write(dir.path().join("bad.json.meta.toml"), "status = 404").unwrap();
        let report = store.reload().unwrap();
        assert_eq!(report.generation, 2);
        assert!(report.failed.is_empty());
        assert_eq!(store.resolve("bad.json").unwrap().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_content_is_stable_until_reload() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.json"), "v1").unwrap();
        let store = TemplateStore::load(DirectorySource::new(dir.path()), "application/json").unwrap();

        fs::write(dir.path().join("a.json"), "v2").unwrap();
        assert_eq!(store.resolve("a.json").unwrap().body().as_ref(), b"v1");

        store.reload().unwrap();
        assert_eq!(store.resolve("a.json").unwrap().body().as_ref(), b"v2");
    }

    #[test]
    fn test_failed_listing_keeps_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("responses");
        fs::create_dir(&root).unwrap();
        fs::write(root.join("a.json"), "{}").unwrap();

        let store = TemplateStore::load(DirectorySource::new(&root), "application/json").unwrap();
        fs::remove_dir_all(&root).unwrap();

        assert!(store.reload().is_err());
        assert!(store.resolve("a.json").is_ok());
        assert_eq!(store.generation(), 1);
    }
}
