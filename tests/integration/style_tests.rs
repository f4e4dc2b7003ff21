//! Source layout rules that hold across the crate

use std::fs;
use std::path::{Path, PathBuf};

const MAX_WIDTH: usize = 100;

fn rust_files(dir: &Path, files: &mut Vec<PathBuf>) {
    for entry in fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
            rust_files(&path, files);
        } else if path.extension().is_some_and(|ext| ext == "rs") {
            files.push(path);
        }
    }
}

#[test]
fn test_code_lines_fit_width() {
    let root = Path::new(env!("CARGO_MANIFEST_DIR"));
    let mut files = Vec::new();
    rust_files(&root.join("src"), &mut files);
    rust_files(&root.join("tests"), &mut files);

    let mut too_long = Vec::new();
    for file in &files {
        let source = fs::read_to_string(file).unwrap();
        for (i, line) in source.lines().enumerate() {
            // Long string literals cannot be wrapped
            if line.chars().count() > MAX_WIDTH && !line.contains('"') {
                too_long.push(format!("{}:{}", file.display(), i + 1));
            }
        }
    }
    assert!(too_long.is_empty(), "lines over {} columns: {:?}", MAX_WIDTH, too_long);
}
