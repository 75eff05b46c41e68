//! JSON histogram files: named 1D/2D objects in one document.
//!
//! Layout:
//!
//! ```json
//! { "objects": { "hPrior": { "kind": "h1", "name": "hPrior", ... },
//!                "hResponse": { "kind": "h2", ... } } }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{HistError, Result};
use crate::histogram::Histogram1D;
use crate::histogram2d::Histogram2D;

/// A stored histogram of either dimensionality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoredObject {
    /// 1D histogram.
    H1(Histogram1D),
    /// 2D histogram.
    H2(Histogram2D),
}

impl StoredObject {
    /// Object name.
    pub fn name(&self) -> &str {
        match self {
            StoredObject::H1(h) => &h.name,
            StoredObject::H2(h) => &h.name,
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            StoredObject::H1(h) => h.validate(),
            StoredObject::H2(h) => h.validate(),
        }
    }
}

impl From<Histogram1D> for StoredObject {
    fn from(h: Histogram1D) -> Self {
        StoredObject::H1(h)
    }
}

impl From<Histogram2D> for StoredObject {
    fn from(h: Histogram2D) -> Self {
        StoredObject::H2(h)
    }
}

/// Where named distributions are loaded from.
pub trait DistributionSource {
    /// Identifier used in error messages (usually a path).
    fn source_id(&self) -> String;

    /// Load a 1D distribution by name.
    fn load_1d(&self, name: &str) -> Result<Histogram1D>;

    /// Load a 2D distribution by name.
    fn load_2d(&self, name: &str) -> Result<Histogram2D>;
}

/// Where named distributions are persisted to.
pub trait DistributionSink {
    /// Store one object under its own name, replacing any previous one.
    fn persist(&mut self, object: StoredObject) -> Result<()>;

    /// Write everything persisted so far to the destination.
    fn flush(&mut self) -> Result<()>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct FileDocument {
    #[serde(default)]
    objects: BTreeMap<String, StoredObject>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    metadata: BTreeMap<String, serde_json::Value>,
}

/// An in-memory histogram file bound to a path.
#[derive(Debug)]
pub struct HistogramFile {
    path: PathBuf,
    doc: FileDocument,
}

impl HistogramFile {
    /// Read and validate every object in `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let bytes = std::fs::read(&path)?;
        let doc: FileDocument = serde_json::from_slice(&bytes)?;
        for obj in doc.objects.values() {
            obj.validate()?;
        }
        tracing::debug!(path = %path.display(), objects = doc.objects.len(), "histogram file opened");
        Ok(Self { path, doc })
    }

    /// Empty file that will be written to `path` on `flush`/`write`.
    pub fn create(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf(), doc: FileDocument::default() }
    }

    /// Path this file is bound to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Names of all stored objects (sorted).
    pub fn names(&self) -> Vec<&str> {
        self.doc.objects.keys().map(String::as_str).collect()
    }

    /// Look up an object.
    pub fn get(&self, name: &str) -> Option<&StoredObject> {
        self.doc.objects.get(name)
    }

    /// Insert (or replace) an object under its own name.
    pub fn insert(&mut self, object: impl Into<StoredObject>) {
        let object = object.into();
        self.doc.objects.insert(object.name().to_string(), object);
    }

    /// Attach a free-form metadata value (labels, scores, ...).
    pub fn set_metadata(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.doc.metadata.insert(key.into(), value);
    }

    /// Metadata value by key.
    pub fn metadata(&self, key: &str) -> Option<&serde_json::Value> {
        self.doc.metadata.get(key)
    }

    /// Serialise to the bound path.
    pub fn write(&self) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_vec_pretty(&self.doc)?)?;
        tracing::debug!(path = %self.path.display(), objects = self.doc.objects.len(), "histogram file written");
        Ok(())
    }

    fn not_found(&self, name: &str) -> HistError {
        HistError::NotFound { source_id: self.source_id(), name: name.to_string() }
    }
}

impl DistributionSource for HistogramFile {
    fn source_id(&self) -> String {
        self.path.display().to_string()
    }

    fn load_1d(&self, name: &str) -> Result<Histogram1D> {
        match self.doc.objects.get(name) {
            Some(StoredObject::H1(h)) => Ok(h.clone()),
            Some(StoredObject::H2(_)) => {
                Err(HistError::WrongKind { name: name.to_string(), expected: "1D" })
            }
            None => Err(self.not_found(name)),
        }
    }

    fn load_2d(&self, name: &str) -> Result<Histogram2D> {
        match self.doc.objects.get(name) {
            Some(StoredObject::H2(h)) => Ok(h.clone()),
            Some(StoredObject::H1(_)) => {
                Err(HistError::WrongKind { name: name.to_string(), expected: "2D" })
            }
            None => Err(self.not_found(name)),
        }
    }
}

impl DistributionSink for HistogramFile {
    fn persist(&mut self, object: StoredObject) -> Result<()> {
        object.validate()?;
        self.insert(object);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.write()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn tmp_path(filename: &str) -> PathBuf {
        let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
        let mut p = std::env::temp_dir();
        p.push(format!("bf_hist_{}_{}_{}", std::process::id(), nanos, filename));
        p
    }

    #[test]
    fn test_write_then_open() {
        let path = tmp_path("objects.json");
        let mut f = HistogramFile::create(&path);
        let mut h = Histogram1D::uniform("hPrior", 3, 0.0, 3.0).unwrap();
        h.fill(1.5);
        f.persist(h.clone().into()).unwrap();
        f.persist(Histogram2D::new("hResponse", vec![0.0, 1.0], vec![0.0, 1.0]).unwrap().into())
            .unwrap();
        f.flush().unwrap();

        let g = HistogramFile::open(&path).unwrap();
        assert_eq!(g.names(), vec!["hPrior", "hResponse"]);
        assert_eq!(g.load_1d("hPrior").unwrap(), h);
        assert!(g.load_2d("hResponse").is_ok());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_missing_and_wrong_kind() {
        let mut f = HistogramFile::create(tmp_path("unused.json"));
        f.insert(Histogram1D::uniform("h", 1, 0.0, 1.0).unwrap());
        assert!(matches!(f.load_1d("nope"), Err(HistError::NotFound { .. })));
        assert!(matches!(f.load_2d("h"), Err(HistError::WrongKind { .. })));

        let core: bf_core::Error = f.load_1d("nope").unwrap_err().into();
        assert!(matches!(core, bf_core::Error::SourceNotFound { .. }));
    }

    #[test]
    fn test_pearson_like_matrix_with_negative_cells_persists() {
        let mut f = HistogramFile::create(tmp_path("unused2.json"));
        let mut p = Histogram2D::new("pearson", vec![0.0, 1.0, 2.0], vec![0.0, 1.0, 2.0]).unwrap();
        p.set_content(0, 1, -0.4, 0.0);
        f.persist(p.into()).unwrap();
        assert!(f.get("pearson").is_some());
    }

    #[test]
    fn test_open_rejects_invalid_histogram() {
        let path = tmp_path("bad.json");
        std::fs::write(
            &path,
            r#"{"objects":{"h":{"kind":"h1","name":"h","bin_edges":[1.0,0.0],"bin_content":[1.0],"sumw2":[1.0]}}}"#,
        )
        .unwrap();
        assert!(HistogramFile::open(&path).is_err());
        let _ = std::fs::remove_file(&path);
    }
}
