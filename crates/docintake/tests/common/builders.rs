//! Builders for policies, candidates and on-disk configuration.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use docintake::{ByteSource, CategoryPolicy, FileCandidate, FileMeta};

pub const MB: u64 = 1024 * 1024;

/// Builder for `CategoryPolicy`.
pub struct PolicyBuilder {
    policy: CategoryPolicy,
}

impl PolicyBuilder {
    pub fn new(category_id: &str) -> Self {
        Self {
            policy: CategoryPolicy::new(category_id, 5, &["pdf"], 10 * MB),
        }
    }

    pub fn max_tasks(mut self, max_tasks: usize) -> Self {
        self.policy.max_tasks = max_tasks;
        self
    }

    pub fn extensions(mut self, extensions: &[&str]) -> Self {
        self.policy.accepted_extensions = extensions.iter().map(|e| e.to_string()).collect();
        self
    }

    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.policy.max_file_size_bytes = bytes;
        self
    }

    pub fn threshold(mut self, threshold: u8) -> Self {
        self.policy.confidence_threshold = threshold;
        self
    }

    pub fn hint(mut self, hint: &str) -> Self {
        self.policy.document_hint = Some(hint.to_string());
        self
    }

    pub fn build(self) -> CategoryPolicy {
        self.policy
    }
}

/// The `academic` category used throughout the scenarios.
pub fn academic_policy() -> CategoryPolicy {
    PolicyBuilder::new("academic")
        .max_tasks(5)
        .extensions(&[".pdf", ".jpg", ".png"])
        .max_file_size(10_485_760)
        .threshold(70)
        .hint("transcript")
        .build()
}

/// A candidate whose declared size need not match its (small) content.
pub fn candidate(filename: &str, declared_size: u64) -> FileCandidate {
    FileCandidate::new(
        FileMeta::new(filename, declared_size),
        ByteSource::from_bytes(b"%PDF-1.4 test".to_vec()),
    )
}

pub fn candidates(prefix: &str, count: usize, declared_size: u64) -> Vec<FileCandidate> {
    (0..count)
        .map(|i| candidate(&format!("{}-{}.pdf", prefix, i), declared_size))
        .collect()
}

/// Writes a YAML config with a filesystem blob store and a pattern parser.
pub fn write_pattern_config(dir: &Path, blob_root: &Path) -> PathBuf {
    let content = format!(
        r#"version: "1.0"
categories:
  - category_id: academic
    max_tasks: 5
    accepted_extensions: [".pdf", ".txt"]
    max_file_size_bytes: 10485760
    confidence_threshold: 70
    document_hint: transcript
  - category_id: career
    max_tasks: 2
    accepted_extensions: ["txt"]
    max_file_size_bytes: 1048576
    confidence_threshold: 90
    document_hint: cv
progress:
  step_percent: 10
stage_timeout_secs: 5
blob_store:
  root: "{}"
  chunk_size: 16
parser:
  kind: pattern
  profiles:
    - hint: transcript
      fields:
        - name: student
          pattern: 'Student:\s*(?P<student>[^\n]+)'
        - name: gpa
          pattern: 'GPA:\s*(?P<gpa>\d+\.\d+)'
    - hint: cv
      fields:
        - name: name
          pattern: 'Name:\s*(?P<name>[^\n]+)'
        - name: email
          pattern: '(?P<email>[\w.+-]+@[\w-]+\.[\w.]+)'
        - name: phone
          pattern: 'Phone:\s*(?P<phone>[+\d -]+)'
"#,
        blob_root.display()
    );
    let path = dir.join("config.yaml");
    std::fs::write(&path, content).unwrap();
    path
}
