//! Shared test fixtures: database/capture setup and fake collaborators

// Not every test binary uses every fixture.
#![allow(dead_code)]

use async_trait::async_trait;
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::fs::{File, FileTimes, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;
use tokio::sync::Semaphore;

use smogwatch_server::models::{Classification, EmissionLabel, VisionAnalysis};
use smogwatch_server::services::classifier::{Classifier, ClassifierError};
use smogwatch_server::services::vision::{VisionAnalyzer, VisionError};

/// Fresh SQLite database in a scratch directory. Keep the TempDir alive for
/// the duration of the test.
pub async fn setup_db() -> (SqlitePool, TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let pool = smogwatch_server::db::init_database_pool(&dir.path().join("test.db"))
        .await
        .expect("database init");
    (pool, dir)
}

/// Create a capture file whose mtime lies `age` in the past.
pub fn make_capture(dir: &Path, name: &str, age: Duration) -> PathBuf {
    let path = dir.join(name);
    File::create(&path).expect("create capture");
    let mtime = SystemTime::now() - age;
    let file = OpenOptions::new().write(true).open(&path).expect("open");
    file.set_times(FileTimes::new().set_modified(mtime))
        .expect("set mtime");
    path
}

/// Poll until the condition holds or the deadline passes.
pub async fn wait_until<F: Fn() -> bool>(condition: F, deadline: Duration) {
    let started = std::time::Instant::now();
    while !condition() {
        if started.elapsed() > deadline {
            panic!("condition not reached within {:?}", deadline);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Scripted classifier: records call order, fails for selected filenames,
/// and can be gated to hold a run open.
pub struct FakeClassifier {
    pub calls: Mutex<Vec<String>>,
    pub fail_files: HashSet<String>,
    pub gate: Option<Arc<Semaphore>>,
}

impl FakeClassifier {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_files: HashSet::new(),
            gate: None,
        }
    }

    pub fn failing_on(names: &[&str]) -> Self {
        let mut fake = Self::new();
        fake.fail_files = names.iter().map(|n| n.to_string()).collect();
        fake
    }

    /// Each classify call consumes one permit from the gate.
    pub fn gated(gate: Arc<Semaphore>) -> Self {
        let mut fake = Self::new();
        fake.gate = Some(gate);
        fake
    }

    pub fn recorded_calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Classifier for FakeClassifier {
    async fn classify(&self, path: &Path) -> Result<Classification, ClassifierError> {
        if let Some(gate) = &self.gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|e| ClassifierError::Network(e.to_string()))?;
            permit.forget();
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.calls.lock().unwrap().push(name.clone());

        if self.fail_files.contains(&name) {
            return Err(ClassifierError::Network("injected failure".to_string()));
        }

        Ok(Classification {
            label: EmissionLabel::Smog,
            probability: 0.9,
            confidence: 0.85,
        })
    }
}

/// Scripted vision service: returns a fixed analysis, failing for locators
/// that contain the configured marker.
pub struct FakeVision {
    pub calls: Mutex<Vec<String>>,
    pub fail_marker: Option<String>,
    pub analysis: VisionAnalysis,
}

impl FakeVision {
    pub fn new(analysis: VisionAnalysis) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_marker: None,
            analysis,
        }
    }

    pub fn failing_on(analysis: VisionAnalysis, marker: &str) -> Self {
        let mut fake = Self::new(analysis);
        fake.fail_marker = Some(marker.to_string());
        fake
    }

    pub fn recorded_calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

pub fn sample_analysis() -> VisionAnalysis {
    VisionAnalysis {
        smoke_visible: false,
        severity_pct: 10,
        confidence_pct: 95,
        short_description: "light haze only".to_string(),
        plate: "ABC-123".to_string(),
    }
}

#[async_trait]
impl VisionAnalyzer for FakeVision {
    async fn analyze(&self, locator: &str) -> Result<VisionAnalysis, VisionError> {
        self.calls.lock().unwrap().push(locator.to_string());

        if let Some(marker) = &self.fail_marker {
            if locator.contains(marker.as_str()) {
                return Err(VisionError::Network("injected failure".to_string()));
            }
        }

        Ok(self.analysis.clone())
    }
}
