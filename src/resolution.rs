/// Type name resolution.
///
/// This module maps a type token as written in source (`Entry`,
/// `Map.Entry`, `Inner`) to an absolute type name (`java.util.Map$Entry`,
/// `p.Outer$Inner`).
///
/// # Resolution pipeline
///
///   1. **Local declaration**: if the file itself declares
///      `class <token>`, the enclosing declarations before it give the
///      nesting path and the file's `package` gives the prefix.  No oracle
///      round trip is needed.
///   2. **Import search**: otherwise the file's `import` statements plus
///      the implicit fallbacks (built-in package, current package, empty
///      entry for primitives) are sent to the oracle with `-findclass`.
///      An explicit import ending in `.<token>` is promoted to the front.
///   3. **Nested retry**: when the oracle finds nothing and the token
///      contains `.`, the whole pipeline runs once more with `.` replaced
///      by `$` (`Map.Entry` may mean nested class `Map$Entry`).
use std::sync::LazyLock;
use std::time::Instant;

use regex::Regex;
use tracing::debug;

use crate::error::OracleError;
use crate::oracle::Oracle;
use crate::source_text::enclosing_classes;
use crate::types::{AbsoluteType, ImportSet, NESTED_SEPARATOR};

static PACKAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]*package[ \t]+([^;]*);").expect("valid package regex"));

static IMPORT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]*import[ \t]+([^;]*);").expect("valid import regex"));

static DECORATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(<.*>)|(\[.*\])").expect("valid decoration regex"));

/// The `package` declared in `text`, or `""` for the default package.
pub fn current_package(text: &str) -> String {
    PACKAGE_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}

/// Every `import` target in `text`, in source order.
pub fn imports(text: &str) -> Vec<String> {
    IMPORT_RE
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .collect()
}

/// Remove generic arguments and array brackets: `Map<K, V>[]` → `Map`.
pub fn strip_type_decoration(typename: &str) -> String {
    DECORATION_RE.replace_all(typename, "").trim().to_string()
}

/// If `full_text` declares `type_token` itself, return its name qualified
/// by the enclosing declarations (`Outer$Inner`), without the package.
pub fn find_local_type(full_text: &str, type_token: &str) -> Option<String> {
    let pattern = format!(
        r"\b(?:class|interface|enum)\s+{}\b",
        regex::escape(type_token)
    );
    let declaration = Regex::new(&pattern).ok()?;
    let found = declaration.find(full_text)?;

    let mut nesting = enclosing_classes(&full_text[..found.start()]);
    nesting.push(type_token.to_string());
    Some(nesting.join(&NESTED_SEPARATOR.to_string()))
}

/// Build the ordered search list sent with `-findclass`.
///
/// Source imports come first, then `builtin_package`, the current package
/// wildcard and `""`.  The first import ending in `.<type_token>` puts its
/// owner, as `<owner>.*` and `<owner>`, ahead of everything else.  The set
/// is terminated with the end-of-request sentinel.
pub fn build_import_set(
    text: &str,
    package: &str,
    builtin_package: &str,
    type_token: &str,
) -> ImportSet {
    let mut set = ImportSet::new();
    for import in imports(text) {
        set.push(import);
    }
    set.push(builtin_package);
    set.push(format!("{}.*", package));
    set.push("");

    let suffix = format!(".{}", type_token);
    let owner = set
        .iter()
        .find_map(|entry| entry.strip_suffix(suffix.as_str()))
        .map(str::to_string);
    if let Some(owner) = owner {
        set.insert(0, format!("{}.*", owner));
        set.insert(1, owner);
    }

    set.terminate();
    set
}

/// Resolve `type_token` as seen from a file.
///
/// `text` is the file up to the caret (package and imports are read from
/// it); `full_text` is the whole file (searched for local declarations).
/// Returns `Ok(None)` when the type cannot be resolved.
pub fn resolve_absolute_type<O: Oracle + ?Sized>(
    oracle: &mut O,
    builtin_package: &str,
    text: &str,
    full_text: &str,
    type_token: &str,
) -> Result<Option<AbsoluteType>, OracleError> {
    let start = Instant::now();
    let package = current_package(text);

    if let Some(local) = find_local_type(full_text, type_token) {
        let absolute = if package.is_empty() {
            local
        } else {
            format!("{}.{}", package, local)
        };
        debug!(
            token = type_token,
            absolute = absolute.as_str(),
            "resolved local type"
        );
        return Ok(Some(absolute));
    }

    let packages = build_import_set(text, &package, builtin_package, type_token);
    let resolved = oracle.find_absolute_of_type(&packages, type_token)?;
    debug!(
        token = type_token,
        absolute = resolved.as_deref().unwrap_or(""),
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        "absolute type lookup"
    );

    if resolved.is_none() && type_token.contains('.') {
        let nested = type_token.replace('.', &NESTED_SEPARATOR.to_string());
        return resolve_absolute_type(oracle, builtin_package, text, full_text, &nested);
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_package() {
        assert_eq!(current_package("package com.example.app;\nclass A {}"), "com.example.app");
        assert_eq!(current_package("  package   p ;"), "p");
        assert_eq!(current_package("class A {}"), "");
    }

    #[test]
    fn test_imports_in_order() {
        let text = "package p;\nimport java.util.*;\nimport java.io.File;\n\timport static q.R.x;\n";
        assert_eq!(
            imports(text),
            vec!["java.util.*", "java.io.File", "static q.R.x"]
        );
    }

    #[test]
    fn test_strip_type_decoration() {
        assert_eq!(strip_type_decoration("List<String>"), "List");
        assert_eq!(strip_type_decoration("Map<K, List<V>>"), "Map");
        assert_eq!(strip_type_decoration("String[]"), "String");
        assert_eq!(strip_type_decoration("Entry"), "Entry");
    }

    #[test]
    fn test_import_set_fallbacks() {
        let set = build_import_set("import java.util.*;\n", "p", "java.lang.*", "List");
        assert_eq!(
            set.entries(),
            &["java.util.*", "java.lang.*", "p.*", "", ";;--;;"]
        );
    }

    #[test]
    fn test_import_set_default_package() {
        let set = build_import_set("", "", "java.lang.*", "Object");
        assert_eq!(set.entries(), &["java.lang.*", ".*", "", ";;--;;"]);
    }

    #[test]
    fn test_explicit_import_promoted() {
        let text = "import java.awt.*;\nimport java.util.List;\nimport java.util.Map;\n";
        let set = build_import_set(text, "p", "java.lang.*", "List");
        assert_eq!(
            set.entries(),
            &[
                "java.util.*",
                "java.util",
                "java.awt.*",
                "java.util.List",
                "java.util.Map",
                "java.lang.*",
                "p.*",
                "",
                ";;--;;",
            ]
        );
    }

    #[test]
    fn test_explicit_nested_import_promoted() {
        let set = build_import_set("import java.util.Map.Entry;\n", "", "java.lang.*", "Entry");
        assert_eq!(set.entries()[0], "java.util.Map.*");
        assert_eq!(set.entries()[1], "java.util.Map");
    }

    #[test]
    fn test_only_first_exact_import_promoted() {
        let text = "import a.List;\nimport b.List;\n";
        let set = build_import_set(text, "", "java.lang.*", "List");
        assert_eq!(set.entries()[0], "a.*");
        assert_eq!(set.entries()[1], "a");
        assert_eq!(set.entries()[2], "a.List");
    }

    #[test]
    fn test_find_local_type_nested() {
        let text = concat!(
            "package p;\n",
            "class Outer {\n",
            "    class Before { }\n",
            "    class Inner {\n",
            "    }\n",
            "}\n",
        );
        assert_eq!(find_local_type(text, "Inner").as_deref(), Some("Outer$Inner"));
        assert_eq!(find_local_type(text, "Outer").as_deref(), Some("Outer"));
        assert_eq!(find_local_type(text, "Before").as_deref(), Some("Outer$Before"));
    }

    #[test]
    fn test_find_local_type_requires_whole_word() {
        let text = "class InnerHelper {}\n";
        assert_eq!(find_local_type(text, "Inner"), None);
    }
}
