//! Labels and overlay bodies
//!
//! Everything that ends up in the host's markup goes through [`escape`] first.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Symbol metadata returned by a lookup
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SymbolInfo {
    /// Namespace the symbol lives in
    #[serde(default)]
    pub ns: Option<String>,
    /// Symbol name
    pub name: String,
    /// Source file, rendered as a link
    #[serde(default)]
    pub file: Option<String>,
    /// Argument lists, e.g. `([x] [x y])`
    #[serde(default)]
    pub arglists: Option<String>,
    /// Special-form syntax
    #[serde(default)]
    pub forms: Option<Forms>,
    /// Docstring
    #[serde(default)]
    pub doc: Option<String>,
}

/// Special-form syntax, either preformatted or as nested lists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Forms {
    /// Already formatted, e.g. `[(if test then else?)]`
    Text(String),
    /// One entry per form
    List(Vec<Form>),
}

/// A form inside [`Forms::List`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Form {
    /// Bare token
    Atom(String),
    /// Parenthesized sequence
    List(Vec<Form>),
}

impl Form {
    fn format(&self) -> String {
        match self {
            Form::Atom(atom) => atom.clone(),
            Form::List(items) => {
                let inner: Vec<String> = items.iter().map(Form::format).collect();
                format!("({})", inner.join(" "))
            }
        }
    }
}

/// Escape text for the host's markup.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            '\t' => out.push_str("&nbsp;&nbsp;&nbsp;&nbsp;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Human-readable elapsed time, or `None` below `threshold`.
pub fn format_elapsed(elapsed: Option<Duration>, threshold: Duration) -> Option<String> {
    let elapsed = elapsed?;
    if elapsed < threshold {
        return None;
    }
    let millis = elapsed.as_millis();
    let text = if millis < 1_000 {
        format!("({} ms)", millis)
    } else if millis < 60_000 {
        format!("({:.1} sec)", elapsed.as_secs_f64())
    } else {
        let secs = elapsed.as_secs();
        format!("({}:{:02} min)", secs / 60, secs % 60)
    };
    Some(text)
}

/// Visual flavor of a detail overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayKind {
    /// Successful value
    Value,
    /// Value reporting failures
    Failure,
    /// Exception trace
    Trace,
}

impl OverlayKind {
    fn styles(self) -> &'static str {
        match self {
            OverlayKind::Value => {
                ".light body { background-color: hsl(100, 100%, 90%); }\n\
                 .dark body { background-color: hsl(100, 100%, 10%); }\n\
                 body { border: 4px solid #33CC33; }"
            }
            OverlayKind::Failure | OverlayKind::Trace => {
                ".light body { background-color: hsl(0, 100%, 90%); }\n\
                 .dark body { background-color: hsl(0, 100%, 10%); }\n\
                 body { border: 4px solid #CC3333; }"
            }
        }
    }
}

/// Overlay body for a value or trace, each line re-wrapped to `width`.
pub fn detail_body(text: &str, kind: OverlayKind, width: usize) -> String {
    let mut body = format!(
        "<body id='evalsync'><style>{}</style>",
        kind.styles()
    );
    for line in text.lines() {
        if line.is_empty() {
            body.push_str("<p></p>");
            continue;
        }
        for wrapped in textwrap::wrap(line, width.max(1)) {
            body.push_str("<p>");
            body.push_str(&escape(&wrapped));
            body.push_str("</p>");
        }
    }
    body.push_str("</body>");
    body
}

/// Overlay body for a lookup result.
pub fn lookup_body(info: Option<&SymbolInfo>) -> String {
    let mut body = String::from(
        "<body id='evalsync'><style>\
         .dark body { background-color: color(var(--background) blend(#FFF 90%)); }\n\
         .light body { background-color: color(var(--background) blend(#000 95%)); }\n\
         a { text-decoration: none; }\n\
         .arglists { color: color(var(--foreground) alpha(0.5)); }\
         </style>",
    );

    let Some(info) = info else {
        body.push_str("<p>Not found</p></body>");
        return body;
    };

    body.push_str("<p>");
    if let Some(file) = &info.file {
        body.push_str(&format!("<a href='{}'>", escape(file)));
    }
    if let Some(ns) = &info.ns {
        body.push_str(&escape(ns));
        body.push('/');
    }
    body.push_str(&escape(&info.name));
    if info.file.is_some() {
        body.push_str("</a>");
    }
    body.push_str("</p>");

    if let Some(arglists) = &info.arglists {
        let trimmed = arglists.trim_start_matches('(').trim_end_matches(')');
        body.push_str(&format!("<p class=\"arglists\">{}</p>", escape(trimmed)));
    }

    match &info.forms {
        Some(Forms::Text(text)) => {
            let trimmed = text.trim_start_matches('[').trim_end_matches(']');
            body.push_str(&format!("<p class=\"arglists\">{}</p>", escape(trimmed)));
        }
        Some(Forms::List(forms)) => {
            let joined: Vec<String> = forms.iter().map(Form::format).collect();
            body.push_str(&format!(
                "<p class=\"arglists\">{}</p>",
                escape(&joined.join(" "))
            ));
        }
        None => {}
    }

    if let Some(doc) = &info.doc {
        let paragraphs: Vec<String> = doc.split('\n').map(escape).collect();
        body.push_str("<p>");
        body.push_str(&paragraphs.join("</p><p>"));
        body.push_str("</p>");
    }

    body.push_str("</body>");
    body
}
