//! Lightweight Python source helpers.
//!
//! Line-oriented, no full parser: enough to find class headers and their
//! docstrings, collect imports for ordering, and check that a rewritten file
//! kept every line of executable code.

/// Header comment stamped on every generated file.
pub const DOCSTRING_HEADER: &str =
    "# Docstring generated by docstring-ai : http://github.com/ph-ausseil/docstring-ai";

const TRIPLE_QUOTES: [&str; 2] = ["\"\"\"", "'''"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDef {
    pub name: String,
    pub bases: Vec<String>,
}

/// Class names and their (unqualified) base classes, in source order.
pub fn parse_classes(source: &str) -> Vec<ClassDef> {
    source
        .lines()
        .filter_map(|line| parse_class_header(line.trim_start()))
        .collect()
}

fn parse_class_header(line: &str) -> Option<ClassDef> {
    let rest = line.strip_prefix("class ")?;
    let name_end = rest.find(['(', ':'])?;
    let name = rest[..name_end].trim();
    if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return None;
    }

    let mut bases = Vec::new();
    if rest[name_end..].starts_with('(') {
        let inner = &rest[name_end + 1..];
        let close = inner.find(')').unwrap_or(inner.len());
        for base in inner[..close].split(',') {
            let base = base.trim();
            if base.is_empty() || base.contains('=') {
                continue;
            }
            let short = base.rsplit('.').next().unwrap_or(base);
            bases.push(short.to_string());
        }
    }

    Some(ClassDef {
        name: name.to_string(),
        bases,
    })
}

/// The docstring of `class_name`, if its first statement is a string literal.
pub fn class_docstring(source: &str, class_name: &str) -> Option<String> {
    let lines: Vec<&str> = source.lines().collect();
    let header = lines.iter().position(|line| {
        parse_class_header(line.trim_start()).is_some_and(|c| c.name == class_name)
    })?;

    let first = lines[header + 1..]
        .iter()
        .position(|l| !l.trim().is_empty())
        .map(|offset| header + 1 + offset)?;
    let (quote, body_start) = opening_quote(lines[first].trim_start())?;

    let mut text = String::new();
    let mut current = body_start;
    let mut index = first;
    loop {
        if let Some(end) = current.find(quote) {
            text.push_str(&current[..end]);
            break;
        }
        text.push_str(current);
        text.push('\n');
        index += 1;
        current = *lines.get(index)?;
    }

    let text = text.trim().to_string();
    (!text.is_empty()).then_some(text)
}

/// If `trimmed` opens a triple-quoted string, the delimiter and the rest.
fn opening_quote(trimmed: &str) -> Option<(&'static str, &str)> {
    let unprefixed = trimmed
        .strip_prefix(['r', 'R', 'u', 'U'])
        .filter(|rest| TRIPLE_QUOTES.iter().any(|q| rest.starts_with(*q)))
        .unwrap_or(trimmed);
    TRIPLE_QUOTES
        .iter()
        .find_map(|q| unprefixed.strip_prefix(*q).map(|rest| (*q, rest)))
}

/// First line of a docstring, used as the one-line class summary.
pub fn first_line(doc: &str) -> &str {
    doc.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("")
}

/// Top-level module names imported by `source`.
pub fn imported_modules(source: &str) -> Vec<String> {
    let mut modules = Vec::new();
    for line in source.lines().map(str::trim_start) {
        if let Some(rest) = line.strip_prefix("import ") {
            for item in rest.split(',') {
                if let Some(name) = item.split_whitespace().next() {
                    modules.push(name.to_string());
                }
            }
        } else if let Some(rest) = line.strip_prefix("from ") {
            if let Some(name) = rest.split_whitespace().next() {
                modules.push(name.trim_start_matches('.').to_string());
            }
        }
    }
    modules.retain(|m| !m.is_empty());
    modules
}

/// Prepend [`DOCSTRING_HEADER`] after any shebang/encoding lines, once.
pub fn ensure_header(content: &str) -> String {
    if content.lines().any(|l| l.trim() == DOCSTRING_HEADER) {
        return content.to_string();
    }

    let mut prefix_len = 0;
    for line in content.split_inclusive('\n').take(2) {
        let t = line.trim_start();
        if t.starts_with("#!") || (t.starts_with('#') && t.contains("coding")) {
            prefix_len += line.len();
        } else {
            break;
        }
    }

    let (prefix, rest) = content.split_at(prefix_len);
    let mut out = String::with_capacity(content.len() + DOCSTRING_HEADER.len() + 2);
    out.push_str(prefix);
    if !prefix.is_empty() && !prefix.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(DOCSTRING_HEADER);
    out.push('\n');
    out.push_str(rest);
    out
}

/// Lines of executable code: no blanks, comments, or docstring statements.
///
/// Lines inside a multi-line string that belongs to a statement (for example
/// `SQL = """`) are kept verbatim; only strings standing alone as statements
/// are dropped.
pub fn code_lines(source: &str) -> Vec<&str> {
    let mut out = Vec::new();
    // Open delimiter, and whether the string stands alone as a statement.
    let mut open: Option<(&str, bool)> = None;

    for line in source.lines() {
        let trimmed = line.trim();
        if let Some((quote, standalone)) = open {
            if !standalone {
                out.push(line.trim_end());
            }
            if trimmed.matches(quote).count() % 2 == 1 {
                open = None;
            }
            continue;
        }
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if let Some((quote, rest)) = opening_quote(trimmed) {
            if rest.matches(quote).count() % 2 == 0 {
                open = Some((quote, true));
            }
            continue;
        }
        out.push(line.trim_end());
        if let Some(quote) = first_triple_quote(trimmed) {
            if trimmed.matches(quote).count() % 2 == 1 {
                open = Some((quote, false));
            }
        }
    }
    out
}

fn first_triple_quote(line: &str) -> Option<&'static str> {
    TRIPLE_QUOTES
        .iter()
        .filter_map(|q| line.find(*q).map(|at| (at, *q)))
        .min_by_key(|(at, _)| *at)
        .map(|(_, q)| q)
}

/// Check `modified` has exactly the code lines of `original`, in order.
pub fn check_code_preserved(original: &str, modified: &str) -> Result<(), String> {
    let before = code_lines(original);
    let after = code_lines(modified);
    for (old, new) in before.iter().zip(after.iter()) {
        if old != new {
            return Err(format!(
                "code line altered: `{}` became `{}`",
                old.trim(),
                new.trim()
            ));
        }
    }
    match before.len().cmp(&after.len()) {
        std::cmp::Ordering::Greater => Err(format!(
            "code line missing: `{}`",
            before[after.len()].trim()
        )),
        std::cmp::Ordering::Less => Err(format!(
            "code line added: `{}`",
            after[before.len()].trim()
        )),
        std::cmp::Ordering::Equal => Ok(()),
    }
}

/// Unwrap a single fenced code block if the text is wrapped in one.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return text;
    };
    let Some(body_start) = rest.find('\n') else {
        return text;
    };
    let body = &rest[body_start + 1..];
    match body.trim_end().strip_suffix("```") {
        Some(inner) => inner,
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"import os
from .models import Base
from pkg.sub import thing

class Loader(Base, mixins.Cached, metaclass=Meta):
    """Load configuration files.

    Longer description.
    """

    def load(self):
        # read it
        return os.path.exists("x")


class Plain:
    pass
"#;

    #[test]
    fn finds_classes_and_bases() {
        let classes = parse_classes(SAMPLE);
        assert_eq!(
            classes,
            vec![
                ClassDef {
                    name: "Loader".into(),
                    bases: vec!["Base".into(), "Cached".into()]
                },
                ClassDef {
                    name: "Plain".into(),
                    bases: vec![]
                },
            ]
        );
    }

    #[test]
    fn extracts_class_docstring() {
        let doc = class_docstring(SAMPLE, "Loader").unwrap();
        assert!(doc.starts_with("Load configuration files."));
        assert_eq!(first_line(&doc), "Load configuration files.");
        assert!(class_docstring(SAMPLE, "Plain").is_none());
        assert!(class_docstring(SAMPLE, "Missing").is_none());
    }

    #[test]
    fn single_line_docstring() {
        let src = "class A:\n    '''Short.'''\n    x = 1\n";
        assert_eq!(class_docstring(src, "A").as_deref(), Some("Short."));
    }

    #[test]
    fn collects_imports() {
        assert_eq!(imported_modules(SAMPLE), vec!["os", "models", "pkg.sub"]);
    }

    #[test]
    fn header_goes_after_shebang_once() {
        let src = "#!/usr/bin/env python\nx = 1\n";
        let out = ensure_header(src);
        assert_eq!(
            out,
            format!("#!/usr/bin/env python\n{}\nx = 1\n", DOCSTRING_HEADER)
        );
        assert_eq!(ensure_header(&out), out);
        assert!(ensure_header("x = 1\n").starts_with(DOCSTRING_HEADER));
    }

    #[test]
    fn added_docstrings_preserve_code() {
        let original = "def f(a):\n    return a + 1\n";
        let modified = format!(
            "{}\n\"\"\"Module doc.\"\"\"\n\ndef f(a):\n    \"\"\"Add one.\n\n    Args:\n        a: value\n    \"\"\"\n    return a + 1\n",
            DOCSTRING_HEADER
        );
        assert!(check_code_preserved(original, &modified).is_ok());
    }

    #[test]
    fn altered_code_is_detected() {
        let original = "def f(a):\n    return a + 1\n";
        let modified = "def f(a):\n    \"\"\"Add one.\"\"\"\n    return a + 2\n";
        let err = check_code_preserved(original, modified).unwrap_err();
        assert!(err.contains("return a + 1"));
    }

    #[test]
    fn added_statements_are_detected() {
        let original = "def f(a):\n    return a + 1\n";
        let modified = "import os\n\ndef f(a):\n    \"\"\"Add one.\"\"\"\n    os.system(\"rm -rf /tmp/x\")\n    a = a * 100\n    return a + 1\n";
        let err = check_code_preserved(original, modified).unwrap_err();
        assert!(err.contains("import os"), "{}", err);

        let trailing = "def f(a):\n    return a + 1\nprint(f(1))\n";
        let err = check_code_preserved(original, trailing).unwrap_err();
        assert!(err.contains("added"), "{}", err);
    }

    #[test]
    fn assigned_multiline_strings_are_code() {
        let original = "SQL = \"\"\"\nselect 1\n\"\"\"\nLIMIT = 10\n\ndef f():\n    return LIMIT\n";
        assert_eq!(
            code_lines(original),
            vec![
                "SQL = \"\"\"",
                "select 1",
                "\"\"\"",
                "LIMIT = 10",
                "def f():",
                "    return LIMIT"
            ]
        );

        let documented = "SQL = \"\"\"\nselect 1\n\"\"\"\nLIMIT = 10\n\ndef f():\n    \"\"\"Return the limit.\"\"\"\n    return LIMIT\n";
        assert!(check_code_preserved(original, documented).is_ok());

        let tampered = "SQL = \"\"\"\nselect 1\n\"\"\"\nLIMIT = 99999\n\ndef f():\n    return LIMIT + 1\n";
        let err = check_code_preserved(original, tampered).unwrap_err();
        assert!(err.contains("LIMIT = 10"), "{}", err);

        let query_edit = "SQL = \"\"\"\nselect 2\n\"\"\"\nLIMIT = 10\n\ndef f():\n    return LIMIT\n";
        assert!(check_code_preserved(original, query_edit).is_err());
    }

    #[test]
    fn reordered_code_is_detected() {
        let original = "a = 1\nb = 2\n";
        let modified = "b = 2\na = 1\n";
        assert!(check_code_preserved(original, modified).is_err());
    }

    #[test]
    fn replaced_docstrings_are_allowed() {
        let original = "def f():\n    \"\"\"Old.\n    text\n    \"\"\"\n    pass\n";
        let modified = "def f():\n    \"\"\"New and better.\"\"\"\n    pass\n";
        assert!(check_code_preserved(original, modified).is_ok());
    }

    #[test]
    fn fence_stripping() {
        assert_eq!(strip_code_fence("```python\nx = 1\n```"), "x = 1\n");
        assert_eq!(strip_code_fence("x = 1\n"), "x = 1\n");
    }
}
