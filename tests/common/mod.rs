#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::{TempDir, tempdir};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        self.write_bytes(name, contents.as_bytes())
    }

    pub fn write_bytes(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents).expect("write temp file contents");
        path
    }
}

/// Ten-row sample with one datetime, one categorical, and one numeric column
/// (one missing value in `sales`).
pub fn sales_csv() -> String {
    let mut csv = String::from("date,region,sales\n");
    for day in 1..=10 {
        let region = if day % 2 == 0 { "West" } else { "East" };
        let sales = if day == 5 {
            String::new()
        } else {
            format!("{}", 100 + day * 10)
        };
        csv.push_str(&format!("2024-01-{day:02},{region},{sales}\n"));
    }
    csv
}
