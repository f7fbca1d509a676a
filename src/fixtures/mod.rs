//! Fixture utilities for the deterministic CLI harness.
//!
//! This module discovers pen-trace fixtures (`<name>.pen.json`), parses the
//! optional expectation JSON next to them (`<name>.expect.json`), and runs
//! the segmentation pipeline over the loaded samples. It is intended for CI
//! and QA workflows.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::analysis::strokes::StrokeKind;
use crate::config::AppConfig;
use crate::project::Project;
use crate::samples::RawSample;
use crate::testing::SyntheticTrace;

/// Default location for fixture JSON assets.
pub const DEFAULT_FIXTURE_ROOT: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/fixtures");

const FIXTURE_SUFFIX: &str = ".pen.json";
const EXPECT_SUFFIX: &str = ".expect.json";

/// Metadata describing an available fixture.
#[derive(Clone, Debug)]
pub struct FixtureMetadata {
    pub name: String,
    pub pen_path: PathBuf,
    pub expect_path: Option<PathBuf>,
}

/// On-disk fixture body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PenFixture {
    /// Generator parameters when the fixture was synthesized
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synthetic: Option<SyntheticTrace>,
    /// Overrides the caller's configuration when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<AppConfig>,
    pub samples: Vec<RawSample>,
}

impl PenFixture {
    pub fn from_trace(trace: &SyntheticTrace) -> Self {
        Self {
            synthetic: Some(trace.clone()),
            config: None,
            samples: trace.build_raw(),
        }
    }
}

/// Loaded fixture data.
pub struct FixtureData {
    pub metadata: FixtureMetadata,
    pub fixture: PenFixture,
    pub expectations: Option<FixtureExpectations>,
}

/// Counts derived from one processed fixture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FixtureSummary {
    pub sample_count: usize,
    pub series_count: usize,
    pub run_count: usize,
    pub stroke_count: usize,
    pub motion_count: usize,
}

impl FixtureSummary {
    pub fn of(project: &Project) -> Self {
        Self {
            sample_count: project.samples().len(),
            series_count: project.series().len(),
            run_count: project.runs().len(),
            stroke_count: project.strokes().len(),
            motion_count: project
                .strokes()
                .iter()
                .filter(|s| s.kind == StrokeKind::Motion)
                .count(),
        }
    }
}

/// JSON expectation schema for fixture verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureExpectations {
    pub fixture: String,
    #[serde(default)]
    pub notes: Option<String>,
    pub series_count: usize,
    pub run_count: usize,
    /// Lower bound on MOTION strokes
    #[serde(default)]
    pub min_strokes: usize,
    /// Exact MOTION stroke count, when pinned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motion_count: Option<usize>,
}

impl FixtureExpectations {
    pub fn for_summary(fixture: &str, summary: &FixtureSummary) -> Self {
        Self {
            fixture: fixture.to_string(),
            notes: None,
            series_count: summary.series_count,
            run_count: summary.run_count,
            min_strokes: summary.motion_count,
            motion_count: Some(summary.motion_count),
        }
    }

    pub fn verify(&self, actual: &FixtureSummary) -> std::result::Result<(), ExpectationDiff> {
        let mut failures = Vec::new();

        if actual.series_count != self.series_count {
            failures.push(ExpectationFailure {
                field: "series_count",
                expected: self.series_count,
                actual: actual.series_count,
            });
        }
        if actual.run_count != self.run_count {
            failures.push(ExpectationFailure {
                field: "run_count",
                expected: self.run_count,
                actual: actual.run_count,
            });
        }
        if actual.motion_count < self.min_strokes {
            failures.push(ExpectationFailure {
                field: "min_strokes",
                expected: self.min_strokes,
                actual: actual.motion_count,
            });
        }
        if let Some(expected) = self.motion_count {
            if actual.motion_count != expected {
                failures.push(ExpectationFailure {
                    field: "motion_count",
                    expected,
                    actual: actual.motion_count,
                });
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ExpectationDiff { failures })
        }
    }
}

/// Outcome of comparing actual results with expectations.
#[derive(Debug)]
pub struct ExpectationDiff {
    pub failures: Vec<ExpectationFailure>,
}

impl ExpectationDiff {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "failures": self.failures.iter().map(|failure| {
                serde_json::json!({
                    "field": failure.field,
                    "expected": failure.expected,
                    "actual": failure.actual,
                })
            }).collect::<Vec<_>>()
        })
    }
}

/// Detailed diff entry for a single failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectationFailure {
    pub field: &'static str,
    pub expected: usize,
    pub actual: usize,
}

/// Catalog responsible for discovering fixtures on disk.
pub struct FixtureCatalog {
    root: PathBuf,
}

impl FixtureCatalog {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// List all fixtures by their metadata.
    pub fn discover(&self) -> Result<Vec<FixtureMetadata>> {
        let mut fixtures = Vec::new();
        if !self.root.exists() {
            return Ok(fixtures);
        }

        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                let path = entry.path();
                if fixture_name(&path).is_some() {
                    fixtures.push(self.metadata_for_path(&path)?);
                }
            }
        }

        fixtures.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(fixtures)
    }

    /// Load fixture samples + expectations for provided name or path.
    pub fn load(&self, fixture: &str, override_expect: Option<PathBuf>) -> Result<FixtureData> {
        let pen_path = self.resolve_fixture_path(fixture)?;
        let metadata = self.metadata_for_path(&pen_path)?;
        let body = fs::read_to_string(&pen_path)
            .with_context(|| format!("reading fixture {}", pen_path.display()))?;
        let parsed: PenFixture = serde_json::from_str(&body)
            .with_context(|| format!("parsing {}", pen_path.display()))?;

        let expectation_path = override_expect.or(metadata.expect_path.clone());
        let expectations = match expectation_path {
            Some(path) => {
                let json = fs::read_to_string(&path)
                    .with_context(|| format!("reading expectation {}", path.display()))?;
                Some(
                    serde_json::from_str(&json)
                        .with_context(|| format!("parsing {}", path.display()))?,
                )
            }
            None => None,
        };

        Ok(FixtureData {
            metadata,
            fixture: parsed,
            expectations,
        })
    }

    /// Write a fixture (and optionally its expectation) under the root
    pub fn save(
        &self,
        name: &str,
        fixture: &PenFixture,
        expectations: Option<&FixtureExpectations>,
    ) -> Result<PathBuf> {
        fs::create_dir_all(&self.root)
            .with_context(|| format!("creating {}", self.root.display()))?;
        let pen_path = self.root.join(format!("{name}{FIXTURE_SUFFIX}"));
        fs::write(&pen_path, serde_json::to_string_pretty(fixture)?)
            .with_context(|| format!("writing {}", pen_path.display()))?;

        if let Some(expect) = expectations {
            let expect_path = self.root.join(format!("{name}{EXPECT_SUFFIX}"));
            fs::write(&expect_path, serde_json::to_string_pretty(expect)?)
                .with_context(|| format!("writing {}", expect_path.display()))?;
        }
        Ok(pen_path)
    }

    fn resolve_fixture_path(&self, fixture: &str) -> Result<PathBuf> {
        let as_path = Path::new(fixture);
        if as_path.is_file() {
            return Ok(as_path.to_path_buf());
        }

        let candidate = self.root.join(format!("{fixture}{FIXTURE_SUFFIX}"));
        if candidate.exists() {
            Ok(candidate)
        } else {
            Err(anyhow!(
                "Fixture '{fixture}' not found in {}",
                self.root.display()
            ))
        }
    }

    fn metadata_for_path(&self, pen_path: &Path) -> Result<FixtureMetadata> {
        let name = fixture_name(pen_path)
            .ok_or_else(|| anyhow!("Invalid fixture name for {}", pen_path.display()))?;
        let expect_path = pen_path.with_file_name(format!("{name}{EXPECT_SUFFIX}"));
        Ok(FixtureMetadata {
            name,
            pen_path: pen_path.to_path_buf(),
            expect_path: expect_path.exists().then_some(expect_path),
        })
    }
}

impl Default for FixtureCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_FIXTURE_ROOT)
    }
}

fn fixture_name(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.strip_suffix(FIXTURE_SUFFIX))
        .filter(|stem| !stem.is_empty())
        .map(str::to_string)
}

/// Runs fixtures through the segmentation pipeline.
pub struct FixtureProcessor {
    config: AppConfig,
}

impl FixtureProcessor {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub fn run(&self, data: &FixtureData) -> Result<Project> {
        let config = data
            .fixture
            .config
            .clone()
            .unwrap_or_else(|| self.config.clone());
        Project::load(&data.metadata.name, data.fixture.samples.clone(), config)
            .with_context(|| format!("segmenting fixture {}", data.metadata.name))
    }
}
