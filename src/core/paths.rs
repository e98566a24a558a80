//! Path Expansion Module
//!
//! Write-mode `*` templating with name functions, and glob pattern
//! translation used by read-mode expansion.

use regex::Regex;
use tracing::warn;

use crate::models::errors::{FsError, FsResult};
use crate::utils::constants::PART_SUFFIX;

/// Index -> name mapper used to expand write templates
pub type NameFunction = dyn Fn(usize) -> String + Send + Sync;

/// Zero-padded decimal name function.
///
/// Pads to the width of `max_index` so generated names sort to
/// partition order: `build_name_function(99)(5)` is `"05"`.
pub fn build_name_function(max_index: usize) -> Box<dyn Fn(usize) -> String + Send + Sync> {
    let width = max_index.to_string().len();
    Box::new(move |i| format!("{:0width$}", i, width = width))
}

/// Whether the path contains glob metacharacters
#[inline]
pub fn contains_wildcard(path: &str) -> bool {
    path.chars().any(|c| matches!(c, '*' | '?' | '['))
}

/// Directory to start a recursive walk from when expanding `pattern`
pub fn glob_root(pattern: &str) -> String {
    let idx = pattern
        .find(|c: char| matches!(c, '*' | '?' | '['))
        .unwrap_or(pattern.len());
    let prefix = &pattern[..idx];
    match prefix.rfind('/') {
        Some(0) => "/".to_string(),
        Some(i) => prefix[..i].to_string(),
        None => ".".to_string(),
    }
}

/// Translate a glob pattern into an anchored regex.
///
/// `*` matches within one path segment, `**` across segments, `?` one
/// character, `[...]` a character class (`[!...]` negated).
pub fn glob_to_regex(pattern: &str) -> FsResult<Regex> {
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push('^');
    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => {
                if i + 1 < chars.len() && chars[i + 1] == '*' {
                    out.push_str(".*");
                    i += 1;
                } else {
                    out.push_str("[^/]*");
                }
            }
            '?' => out.push_str("[^/]"),
            '[' => {
                let close = chars[i + 1..]
                    .iter()
                    .position(|&c| c == ']')
                    .ok_or_else(|| {
                        FsError::glob_invalid(format!("Unclosed character class in '{}'", pattern))
                    })?;
                let class: String = chars[i + 1..i + 1 + close].iter().collect();
                out.push('[');
                if let Some(rest) = class.strip_prefix('!') {
                    out.push('^');
                    out.push_str(rest);
                } else {
                    out.push_str(&class);
                }
                out.push(']');
                i += close + 1;
            }
            c => out.push_str(&regex::escape(&c.to_string())),
        }
        i += 1;
    }
    out.push('$');
    Regex::new(&out).map_err(|e| FsError::glob_invalid(e.to_string()))
}

/// Expand a single write template into `num` concrete paths.
///
/// A template without `*` is treated as a directory and becomes
/// `<path>/*.part`. More than one `*` is an error.
pub fn expand_write_paths(
    path: &str,
    name_function: Option<&NameFunction>,
    num: usize,
) -> FsResult<Vec<String>> {
    if path.matches('*').count() > 1 {
        return Err(FsError::path_invalid(
            "Output path template must contain at most one '*'",
        ));
    }
    let template = if path.contains('*') {
        path.to_string()
    } else {
        format!("{}/{}", path.trim_end_matches('/'), PART_SUFFIX)
    };

    let default_fn;
    let name_fn: &NameFunction = match name_function {
        Some(f) => f,
        None => {
            default_fn = build_name_function(num.saturating_sub(1));
            &*default_fn
        }
    };

    let paths: Vec<String> = (0..num)
        .map(|i| template.replace('*', &name_fn(i)))
        .collect();
    if !paths.windows(2).all(|w| w[0] <= w[1]) {
        warn!(
            "Paths created with a name function should sort to partition order; \
             got an unsorted sequence"
        );
    }
    Ok(paths)
}

/// Expand a list of write paths, where at most one entry may carry a
/// `*` mask. The result is trimmed to `num` entries.
pub fn expand_write_list(
    paths: &[String],
    name_function: Option<&NameFunction>,
    num: usize,
) -> FsResult<Vec<String>> {
    let masked = paths.iter().filter(|p| p.contains('*')).count();
    if masked > 1 {
        return Err(FsError::path_invalid(
            "When writing data, only one filename mask can be specified",
        ));
    }
    let mut expanded = Vec::new();
    for path in paths {
        if path.contains('*') {
            expanded.extend(expand_write_paths(path, name_function, num)?);
        } else {
            expanded.push(path.clone());
        }
    }
    if expanded.len() > num {
        expanded.truncate(num);
    }
    Ok(expanded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_function_padding() {
        let f = build_name_function(99);
        assert_eq!(f(0), "00");
        assert_eq!(f(7), "07");
        assert_eq!(f(42), "42");
        let g = build_name_function(5);
        assert_eq!(g(3), "3");
    }

    #[test]
    fn test_expand_template() {
        let paths = expand_write_paths("out-*.csv", None, 3).unwrap();
        assert_eq!(paths, vec!["out-0.csv", "out-1.csv", "out-2.csv"]);
    }

    #[test]
    fn test_expand_directory_template() {
        let paths = expand_write_paths("/data/out", None, 2).unwrap();
        assert_eq!(paths, vec!["/data/out/0.part", "/data/out/1.part"]);
    }

    #[test]
    fn test_expand_rejects_double_mask() {
        let err = expand_write_paths("a-*-*.csv", None, 2).unwrap_err();
        assert_eq!(err.code_str(), "PATH_INVALID");
    }

    #[test]
    fn test_expand_list_trims() {
        let input = vec!["part-*.csv".to_string()];
        let paths = expand_write_list(&input, None, 2).unwrap();
        assert_eq!(paths.len(), 2);
    }

    #[test]
    fn test_expand_list_rejects_two_masks() {
        let input = vec!["a-*.csv".to_string(), "b-*.csv".to_string()];
        assert!(expand_write_list(&input, None, 2).is_err());
    }

    #[test]
    fn test_glob_to_regex_segments() {
        let re = glob_to_regex("/data/*.csv").unwrap();
        assert!(re.is_match("/data/a.csv"));
        assert!(!re.is_match("/data/sub/a.csv"));
        assert!(!re.is_match("/data/a.json"));
    }

    #[test]
    fn test_glob_to_regex_recursive() {
        let re = glob_to_regex("/data/**.csv").unwrap();
        assert!(re.is_match("/data/a.csv"));
        assert!(re.is_match("/data/sub/deep/a.csv"));
    }

    #[test]
    fn test_glob_to_regex_question_and_class() {
        let re = glob_to_regex("/logs/2015-0?-[0-3]*.log").unwrap();
        assert!(re.is_match("/logs/2015-03-14.log"));
        assert!(!re.is_match("/logs/2015-11-14.log"));
    }

    #[test]
    fn test_glob_to_regex_unclosed_class() {
        let err = glob_to_regex("/data/[abc.csv").unwrap_err();
        assert_eq!(err.code_str(), "GLOB_INVALID");
    }

    #[test]
    fn test_glob_root() {
        assert_eq!(glob_root("/data/*.csv"), "/data");
        assert_eq!(glob_root("/*.csv"), "/");
        assert_eq!(glob_root("data/sub/*.csv"), "data/sub");
        assert_eq!(glob_root("*.csv"), ".");
    }

    #[test]
    fn test_contains_wildcard() {
        assert!(contains_wildcard("/a/*.csv"));
        assert!(contains_wildcard("/a/b?.csv"));
        assert!(!contains_wildcard("/a/b.csv"));
    }
}
