//! Filesystem utilities.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use glob::glob;

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("failed to create directory: {}", path.display()))?;
    }
    Ok(())
}

/// Read a file to string, with nice error messages.
pub fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read file: {}", path.display()))
}

/// Write a string to a file, creating parent directories if needed.
pub fn write_string(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    fs::write(path, contents).with_context(|| format!("failed to write file: {}", path.display()))
}

/// Expand glob patterns relative to a base directory.
///
/// `**` matches recursively, `*` matches a single path level, and a pattern
/// without wildcards names a literal file. Results are returned relative to
/// `base`, sorted and deduplicated.
pub fn glob_files(base: &Path, patterns: &[String]) -> Result<Vec<String>> {
    let mut results = Vec::new();

    for pattern in patterns {
        if !pattern.contains('*') && !pattern.contains('?') {
            // Literal path, kept even when missing so the generated rule
            // surfaces the absent file at build time.
            results.push(pattern.clone());
            continue;
        }

        let full_pattern = base.join(pattern);
        let pattern_str = full_pattern.to_string_lossy();

        for entry in
            glob(&pattern_str).with_context(|| format!("invalid glob pattern: {}", pattern))?
        {
            match entry {
                Ok(path) => {
                    if path.is_file() {
                        results.push(relative_to(&path, base));
                    }
                }
                Err(e) => {
                    tracing::warn!("glob error: {}", e);
                }
            }
        }
    }

    results.sort();
    results.dedup();
    Ok(results)
}

/// Render `path` relative to `base`, with forward slashes.
pub fn relative_to(path: &Path, base: &Path) -> String {
    let rel = path.strip_prefix(base).unwrap_or(path);
    rel.to_string_lossy().replace('\\', "/")
}

/// Join two path fragments into a `/`-separated string, collapsing an empty
/// left side.
pub fn join_str(base: &str, tail: &str) -> String {
    if base.is_empty() {
        tail.to_string()
    } else if tail.is_empty() {
        base.to_string()
    } else {
        format!("{}/{}", base.trim_end_matches('/'), tail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_glob_files_single_level() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir_all(src.join("sub")).unwrap();
        fs::write(src.join("main.c"), "int main() {}").unwrap();
        fs::write(src.join("util.c"), "void util() {}").unwrap();
        fs::write(src.join("sub/deep.c"), "").unwrap();
        fs::write(src.join("readme.txt"), "readme").unwrap();

        let files = glob_files(tmp.path(), &["src/*.c".to_string()]).unwrap();
        assert_eq!(files, vec!["src/main.c", "src/util.c"]);
    }

    #[test]
    fn test_glob_files_recursive() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir_all(src.join("sub")).unwrap();
        fs::write(src.join("main.c"), "").unwrap();
        fs::write(src.join("sub/deep.c"), "").unwrap();

        let files = glob_files(tmp.path(), &["src/**/*.c".to_string()]).unwrap();
        assert!(files.contains(&"src/main.c".to_string()));
        assert!(files.contains(&"src/sub/deep.c".to_string()));
    }

    #[test]
    fn test_glob_files_literal_kept() {
        let tmp = TempDir::new().unwrap();

        let files = glob_files(tmp.path(), &["main.c".to_string()]).unwrap();
        assert_eq!(files, vec!["main.c"]);
    }

    #[test]
    fn test_join_str() {
        assert_eq!(join_str("build", "hello"), "build/hello");
        assert_eq!(join_str("", "hello"), "hello");
        assert_eq!(join_str("build/", "hello"), "build/hello");
    }
}
