use glob::Pattern;
use std::path::Path;

/// Check if a path should be excluded based on a list of glob patterns.
pub fn is_path_excluded(path: &Path, exclude_patterns: &[Pattern]) -> bool {
    let path_str = path.to_string_lossy();
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy())
        .unwrap_or_default();

    for pattern in exclude_patterns {
        // Match against full path
        if pattern.matches(&path_str) {
            return true;
        }

        // Match against just the file/directory name
        if pattern.matches(&file_name) {
            return true;
        }
    }

    false
}

/// Compile glob patterns, skipping (and logging) invalid ones.
pub fn compile_patterns(patterns: &[String]) -> Vec<Pattern> {
    patterns
        .iter()
        .filter_map(|pattern| match Pattern::new(pattern) {
            Ok(compiled) => Some(compiled),
            Err(e) => {
                log::warn!("Ignoring invalid exclude pattern '{}': {}", pattern, e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_path_excluded_by_name_and_path() {
        let patterns = compile_patterns(&["*.tmp".to_string(), "node_modules".to_string()]);
        assert!(is_path_excluded(Path::new("a/b/c.tmp"), &patterns));
        assert!(is_path_excluded(Path::new("a/node_modules"), &patterns));
        assert!(!is_path_excluded(Path::new("a/b/LICENSE"), &patterns));
    }

    #[test]
    fn test_compile_patterns_skips_invalid() {
        let patterns = compile_patterns(&["[".to_string(), "*.o".to_string()]);
        assert_eq!(patterns.len(), 1);
    }
}
