//! Depth-colored tree rendering for nested values
//!
//! Values enter the renderer as a [`Node`], a closed tree of mappings,
//! sequences, attributed objects and primitives. Conversions from
//! `serde_json::Value` and from any `Serialize` type happen once at the
//! boundary; the recursive walk itself never inspects concrete types.
//!
//! ```
//! use agent_utils::tree::{Node, TreeRenderer};
//! use serde_json::json;
//!
//! let node = Node::from(json!({"message": {"role": "user", "content": "hi"}}));
//! let text = TreeRenderer::plain().render(&node);
//! assert_eq!(text, "    message: {\"role\": \"user\", \"content\": \"hi\"}\n");
//! ```

use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::io::{self, Write};

const INDENT: &str = "    ";

/// Palette cycled by depth (depth 0 uses the first entry)
const DEPTH_COLORS: [&str; 5] = [
    "\x1b[96m", // bright cyan
    "\x1b[93m", // yellow
    "\x1b[94m", // bright blue
    "\x1b[95m", // magenta
    "\x1b[92m", // bright green
];
const DEFAULT_COLOR: &str = "\x1b[96m";

/// ANSI reset sequence emitted after every colored label
pub const RESET: &str = "\x1b[0m";

/// Color used for lines at `depth`
pub fn depth_color(depth: usize) -> &'static str {
    DEPTH_COLORS.get(depth).copied().unwrap_or(DEFAULT_COLOR)
}

/// Leaf value of a render tree
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    /// Displayed quoted
    Text(String),
    /// Already-formatted display string, shown as is
    Opaque(String),
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Number(value) => write!(f, "{value}"),
            Self::Text(value) => write!(f, "\"{value}\""),
            Self::Opaque(value) => f.write_str(value),
        }
    }
}

/// A renderable value
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Ordered key/value pairs
    Mapping(Vec<(String, Node)>),
    /// Ordered elements
    Sequence(Vec<Node>),
    /// Field view of a structured object; rendered flattened into the
    /// parent's level
    Attributed(Vec<(String, Node)>),
    Primitive(Primitive),
}

impl Node {
    /// Build a mapping from key/value pairs, keeping their order
    pub fn mapping<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Node)>,
    {
        Self::Mapping(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Build a sequence
    pub fn sequence<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Node>,
    {
        Self::Sequence(items.into_iter().collect())
    }

    /// Build an attributed object from its fields
    pub fn attributed<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Node)>,
    {
        Self::Attributed(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn null() -> Self {
        Self::Primitive(Primitive::Null)
    }

    /// Primitive shown exactly as given (no quoting)
    pub fn opaque(display: impl Into<String>) -> Self {
        Self::Primitive(Primitive::Opaque(display.into()))
    }

    /// Convert any serializable value
    ///
    /// Struct-like values (those serializing to a JSON object) become
    /// [`Node::Attributed`]. Values that fail to serialize fall back to an
    /// opaque primitive holding their `Debug` form.
    pub fn from_serialize<T>(value: &T) -> Self
    where
        T: Serialize + fmt::Debug + ?Sized,
    {
        match serde_json::to_value(value) {
            Ok(Value::Object(map)) => {
                Self::Attributed(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
            Ok(other) => Self::from(other),
            Err(_) => Self::opaque(format!("{value:?}")),
        }
    }

    fn is_primitive(&self) -> bool {
        matches!(self, Self::Primitive(_))
    }
}

impl From<Value> for Node {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::null(),
            Value::Bool(b) => Self::Primitive(Primitive::Bool(b)),
            Value::Number(n) => Self::Primitive(Primitive::Number(n)),
            Value::String(s) => Self::Primitive(Primitive::Text(s)),
            Value::Array(items) => Self::Sequence(items.into_iter().map(Self::from).collect()),
            Value::Object(map) => {
                Self::Mapping(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl From<&str> for Node {
    fn from(value: &str) -> Self {
        Self::Primitive(Primitive::Text(value.to_string()))
    }
}

impl From<String> for Node {
    fn from(value: String) -> Self {
        Self::Primitive(Primitive::Text(value))
    }
}

impl From<bool> for Node {
    fn from(value: bool) -> Self {
        Self::Primitive(Primitive::Bool(value))
    }
}

impl From<i64> for Node {
    fn from(value: i64) -> Self {
        Self::Primitive(Primitive::Number(value.into()))
    }
}

impl From<f64> for Node {
    fn from(value: f64) -> Self {
        match serde_json::Number::from_f64(value) {
            Some(n) => Self::Primitive(Primitive::Number(n)),
            None => Self::opaque(value.to_string()),
        }
    }
}

/// What a rendered line shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineContent {
    /// `label:` introducing nested lines
    Header(String),
    /// `label: value`
    Entry { label: String, value: String },
    /// `index [i]` marker before a sequence element
    Index(usize),
    /// Bare value of an unlabeled primitive
    Value(String),
}

/// One rendered line, before indentation and color are applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeLine {
    pub depth: usize,
    pub content: LineContent,
}

impl TreeLine {
    fn new(depth: usize, content: LineContent) -> Self {
        Self { depth, content }
    }

    /// Indented text without color codes
    pub fn plain(&self) -> String {
        format!("{}{}", INDENT.repeat(self.depth), self.body(None))
    }

    /// Indented text with the depth color around the label
    ///
    /// Index markers take the color of the sequence that owns them.
    pub fn colored(&self) -> String {
        let color_depth = match self.content {
            LineContent::Index(_) => self.depth.saturating_sub(1),
            _ => self.depth,
        };
        format!(
            "{}{}",
            INDENT.repeat(self.depth),
            self.body(Some(depth_color(color_depth)))
        )
    }

    fn body(&self, color: Option<&str>) -> String {
        let paint = |text: &str| match color {
            Some(color) => format!("{color}{text}{RESET}"),
            None => text.to_string(),
        };

        match &self.content {
            LineContent::Header(label) => format!("{}:", paint(label)),
            LineContent::Entry { label, value } => format!("{}: {value}", paint(label)),
            LineContent::Index(index) => paint(&format!("index [{index}]")),
            LineContent::Value(value) => value.clone(),
        }
    }
}

/// Render `node` into lines, depth-first and pre-order
pub fn render_lines(node: &Node) -> Vec<TreeLine> {
    let mut lines = Vec::new();
    walk(node, 0, None, true, &mut lines);
    lines
}

fn walk(node: &Node, depth: usize, label: Option<&str>, is_root: bool, out: &mut Vec<TreeLine>) {
    match node {
        Node::Mapping(entries) => walk_mapping(entries, depth, label, is_root, out),
        Node::Sequence(items) => {
            if let (false, Some(label)) = (is_root, label) {
                out.push(TreeLine::new(depth, LineContent::Header(label.to_string())));
            }
            for (index, item) in items.iter().enumerate() {
                out.push(TreeLine::new(depth + 1, LineContent::Index(index)));
                walk(item, depth + 1, None, false, out);
            }
        }
        Node::Attributed(fields) => {
            if is_root {
                walk_entries(fields, depth + 1, out);
            } else {
                if let Some(label) = label {
                    out.push(TreeLine::new(depth, LineContent::Header(label.to_string())));
                }
                // Fields land on the level the label's children would use.
                walk_mapping(fields, depth, None, false, out);
            }
        }
        Node::Primitive(value) => match label {
            Some(label) => out.push(TreeLine::new(
                depth,
                LineContent::Entry {
                    label: label.to_string(),
                    value: value.to_string(),
                },
            )),
            None => out.push(TreeLine::new(depth + 1, LineContent::Value(value.to_string()))),
        },
    }
}

fn walk_mapping(
    entries: &[(String, Node)],
    depth: usize,
    label: Option<&str>,
    is_root: bool,
    out: &mut Vec<TreeLine>,
) {
    match label.filter(|_| !is_root) {
        Some(label) if is_leaf_mapping(entries) => out.push(TreeLine::new(
            depth,
            LineContent::Entry {
                label: label.to_string(),
                value: format_leaf_mapping(entries),
            },
        )),
        Some(label) => {
            out.push(TreeLine::new(depth, LineContent::Header(label.to_string())));
            walk_entries(entries, depth + 1, out);
        }
        None => walk_entries(entries, depth + 1, out),
    }
}

fn walk_entries(entries: &[(String, Node)], depth: usize, out: &mut Vec<TreeLine>) {
    for (key, value) in entries {
        walk(value, depth, Some(key), false, out);
    }
}

/// A mapping whose values are all primitives
fn is_leaf_mapping(entries: &[(String, Node)]) -> bool {
    entries.iter().all(|(_, value)| value.is_primitive())
}

fn format_leaf_mapping(entries: &[(String, Node)]) -> String {
    let items: Vec<String> = entries
        .iter()
        .map(|(key, value)| match value {
            Node::Primitive(primitive) => format!("\"{key}\": {primitive}"),
            _ => format!("\"{key}\": ..."),
        })
        .collect();
    format!("{{{}}}", items.join(", "))
}

/// Writes render trees to a text sink
#[derive(Debug, Clone, Copy)]
pub struct TreeRenderer {
    colored: bool,
}

impl Default for TreeRenderer {
    fn default() -> Self {
        Self { colored: true }
    }
}

impl TreeRenderer {
    /// Renderer with ANSI colors
    pub fn new() -> Self {
        Self::default()
    }

    /// Renderer without color codes
    pub fn plain() -> Self {
        Self { colored: false }
    }

    pub fn with_color(mut self, colored: bool) -> Self {
        self.colored = colored;
        self
    }

    fn format_line(&self, line: &TreeLine) -> String {
        if self.colored {
            line.colored()
        } else {
            line.plain()
        }
    }

    /// Render to a string, one terminated line per tree line
    pub fn render(&self, node: &Node) -> String {
        render_lines(node)
            .iter()
            .map(|line| format!("{}\n", self.format_line(line)))
            .collect()
    }

    /// Write the rendering of `node` to `writer`
    pub fn write<W: Write>(&self, node: &Node, writer: &mut W) -> io::Result<()> {
        for line in render_lines(node) {
            writeln!(writer, "{}", self.format_line(&line))?;
        }
        Ok(())
    }
}

/// Print `node` to stdout with colors
pub fn display_tree(node: &Node) -> io::Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    TreeRenderer::new().write(node, &mut handle)
}
