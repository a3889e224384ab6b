//! Finalisation: turn raw model output into a complete HTML document.
//!
//! Even well-prompted models wrap their answer in ```` ```html ```` fences,
//! omit the doctype, forget the `<head>`, or return a bare fragment. The
//! rules below fix those quirks deterministically without touching content.
//!
//! Rules (applied in order by [`finalize_document`]):
//! 1. Strip outer code fences
//! 2. Empty output → error document
//! 3. Bare fragment (no `<html>`) → wrap in a full document
//! 4. Set `<html lang="…">` to the document language
//! 5. Insert the standard `<head>` when missing
//! 6. Ensure a leading `<!DOCTYPE html>`

use minijinja::HtmlEscape;
use once_cell::sync::Lazy;
use regex::Regex;

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z]*[ \t]*\r?\n(.*?)\r?\n?```\s*$").unwrap());
static RE_HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<html(\s[^>]*)?>").unwrap());
static RE_LANG_ATTR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\slang\s*=\s*("[^"]*"|'[^']*'|[^\s>]+)"#).unwrap());
static RE_HEAD_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<head[\s>]").unwrap());
static RE_BODY_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<body(\s[^>]*)?>").unwrap());
static RE_DOCTYPE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\s*<!doctype\s+html").unwrap());

/// Standard `<head>` contents shared by every generated document.
///
/// Fonts cover Latin and Indic scripts; MathJax renders the LaTeX the model
/// is asked to emit for equations.
pub fn document_head(title: &str) -> String {
    format!(
        r#"<meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <link href="https://fonts.googleapis.com/css2?family=Noto+Sans+Devanagari:wght@400;700&family=Noto+Sans:wght@400;700&display=swap" rel="stylesheet">
    <script>
        window.MathJax = {{
          tex: {{ inlineMath: [['$', '$'], ['\\(', '\\)']], displayMath: [['$$', '$$'], ['\\[', '\\]']] }},
          chtml: {{ matchFontHeight: false, mtextInheritFont: true }},
          svg: {{ mtextInheritFont: true }}
        }};
    </script>
    <script type="text/javascript" id="MathJax-script" async src="https://cdn.jsdelivr.net/npm/mathjax@3/es5/tex-mml-chtml.js"></script>
    <style>
      body {{ font-family: 'Noto Sans', 'Noto Sans Devanagari', sans-serif; margin: 20px; line-height: 1.6; }}
      .scrollable-table-wrapper {{ overflow-x: auto; margin-bottom: 1em; border: 1px solid #ddd; }}
      table {{ border-collapse: collapse; width: 100%; }}
      th, td {{ border: 1px solid #ccc; padding: 8px; text-align: left; vertical-align: top; }}
      th {{ background-color: #f2f2f2; }}
      img {{ max-width: 100%; height: auto; display: block; margin: 1em auto; border: 1px solid #eee; }}
    </style>"#,
        title = HtmlEscape(title)
    )
}

/// Apply all finalisation rules to one model answer.
pub fn finalize_document(raw: &str, head: &str, lang_code: &str) -> String {
    let html = strip_code_fences(raw);
    let html = html.trim();

    if html.is_empty() {
        return format!(
            "<!DOCTYPE html>\n<html lang=\"{lang_code}\">\n<head>\n{head}\n</head>\n<body>\n<p>Error: Received empty content from the generation model.</p>\n</body>\n</html>\n"
        );
    }

    let html = if RE_HTML_TAG.is_match(html) {
        let html = set_lang(html, lang_code);
        ensure_head(&html, head)
    } else {
        format!(
            "<html lang=\"{lang_code}\">\n<head>\n{head}\n</head>\n<body>\n{html}\n</body>\n</html>"
        )
    };

    ensure_doctype(&html)
}

/// Remove a single pair of fences wrapping the whole answer.
pub fn strip_code_fences(input: &str) -> String {
    let trimmed = input.trim();
    match RE_OUTER_FENCES.captures(trimmed) {
        Some(caps) => caps[1].to_string(),
        None => trimmed.to_string(),
    }
}

/// Normalise an alt-text answer into a single attribute-safe line.
pub fn clean_alt_text(raw: &str) -> String {
    let text = strip_code_fences(raw);
    text.replace(['"', '\'', '`'], "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn set_lang(html: &str, lang_code: &str) -> String {
    RE_HTML_TAG
        .replacen(html, 1, |caps: &regex::Captures| {
            let attrs = caps.get(1).map(|m| m.as_str()).unwrap_or("");
            let attrs = RE_LANG_ATTR.replace(attrs, "");
            format!("<html lang=\"{}\"{}>", lang_code, attrs)
        })
        .into_owned()
}

fn ensure_head(html: &str, head: &str) -> String {
    if RE_HEAD_TAG.is_match(html) {
        return html.to_string();
    }
    if let Some(body) = RE_BODY_TAG.find(html) {
        let mut out = String::with_capacity(html.len() + head.len() + 32);
        out.push_str(&html[..body.start()]);
        out.push_str("<head>\n");
        out.push_str(head);
        out.push_str("\n</head>\n");
        out.push_str(&html[body.start()..]);
        return out;
    }
    // `<html>` without `<body>`: put everything after the html tag in a body.
    match RE_HTML_TAG.find(html) {
        Some(tag) => {
            let inner = html[tag.end()..].trim();
            let inner = inner
                .strip_suffix("</html>")
                .or_else(|| inner.strip_suffix("</HTML>"))
                .unwrap_or(inner);
            format!(
                "{}\n<head>\n{}\n</head>\n<body>\n{}\n</body>\n</html>",
                &html[..tag.end()],
                head,
                inner.trim()
            )
        }
        None => html.to_string(),
    }
}

fn ensure_doctype(html: &str) -> String {
    if RE_DOCTYPE.is_match(html) {
        format!("{}\n", html.trim_end())
    } else {
        format!("<!DOCTYPE html>\n{}\n", html.trim_end())
    }
}
