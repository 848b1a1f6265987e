#![allow(dead_code)]

use std::path::{Path, PathBuf};

use scorecard::{DatasetInfo, EvaluationContext};
use serde_json::Value;
use tempfile::TempDir;

#[path = "../../src/model/fixtures.rs"]
mod fixtures;

pub use fixtures::{feature_names, pipeline, xgb_model};

/// Temporary run layout: `in/model.json`, `out/`, `eval.db`.
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("in")).unwrap();
        Self { dir }
    }

    pub fn input(&self) -> PathBuf {
        self.dir.path().join("in")
    }

    pub fn output(&self) -> PathBuf {
        self.dir.path().join("out")
    }

    pub fn database(&self) -> PathBuf {
        self.dir.path().join("eval.db")
    }

    pub fn write_model(&self, trained_names: &[&str]) -> PathBuf {
        self.write_pipeline(&pipeline(trained_names))
    }

    pub fn write_pipeline(&self, pipeline: &Value) -> PathBuf {
        let path = self.input().join("model.json");
        std::fs::write(&path, serde_json::to_vec_pretty(pipeline).unwrap()).unwrap();
        path
    }

    pub fn context(&self, features: &[&str]) -> EvaluationContext {
        EvaluationContext::new(
            self.input(),
            self.output(),
            DatasetInfo {
                feature_names: features.iter().map(|s| s.to_string()).collect(),
                target_names: vec!["isFraud".into()],
                sql: "SELECT * FROM transactions WHERE split = 'test'".into(),
            },
        )
        .with_model("fraud-xgb", "4")
        .with_job("eval-001")
    }

    pub fn read_json(&self, name: &str) -> Value {
        read_json(&self.output().join(name))
    }
}

pub fn read_json(path: &Path) -> Value {
    serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap()
}

/// Four held-out rows plus one training row. Targets `[0, 0, 1, 1]`,
/// fixture predictions `[0, 1, 1, 1]`.
pub const TRANSACTIONS_SQL: &str = "
    CREATE TABLE transactions (
        txn_id INTEGER,
        step INTEGER,
        type TEXT,
        CASH_OUT INTEGER,
        TRANSFER INTEGER,
        amount REAL,
        nameOrig TEXT,
        isFraud INTEGER,
        split TEXT
    );
    INSERT INTO transactions VALUES
        (1001, 1, 'PAYMENT',  0, 0,  100.0, 'C1', 0, 'test'),
        (1002, 2, 'TRANSFER', 0, 1, 2000.0, 'C2', 0, 'test'),
        (1003, 3, 'TRANSFER', 0, 1, 9000.0, 'C3', 1, 'test'),
        (1004, 7, 'TRANSFER', 0, 1, 1500.0, 'C4', 1, 'test'),
        (9999, 1, 'CASH_OUT', 1, 0,   50.0, 'C5', 1, 'train');
";
