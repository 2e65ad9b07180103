//! The conversion capability and its Markdown implementation.

use regex::Regex;
use serde_json::{Map, Value};

use nbsync_core::SyncConfig;

use crate::error::ConvertError;
use crate::notebook::{Cell, CellSource, Notebook, Output};

/// Pure, deterministic conversion between the two document kinds.
///
/// The engine calls exactly one of these per propagation and treats any
/// error as a failed propagation.
pub trait Converter: Send + Sync {
    /// Text document (tree A) to structured notebook (tree B).
    fn to_structured(&self, text: &str) -> Result<Notebook, ConvertError>;

    /// Structured notebook (tree B) to text document (tree A).
    fn to_text(&self, notebook: &Notebook) -> Result<String, ConvertError>;
}

/// Fenced code block: opening fence, optional language word, lazy body.
const FENCE_PATTERN: &str = r"```(\w*)([\s\S]*?)```";

/// Markdown ↔ notebook converter.
///
/// Fenced code blocks become code cells, everything between them becomes
/// markdown cells. Going back, code cells are fenced with their language and,
/// when `preserve_output` is set, their outputs are appended as `#` comments.
#[derive(Debug, Clone)]
pub struct MarkdownConverter {
    default_language: String,
    preserve_output: bool,
    fence: Regex,
}

impl MarkdownConverter {
    pub fn new(default_language: &str, preserve_output: bool) -> Result<Self, ConvertError> {
        let default_language = match default_language.trim() {
            "" => "python".to_string(),
            lang => lang.to_lowercase(),
        };
        Ok(Self {
            default_language,
            preserve_output,
            fence: Regex::new(FENCE_PATTERN)?,
        })
    }

    pub fn from_config(config: &SyncConfig) -> Result<Self, ConvertError> {
        Self::new(&config.default_language, config.preserve_output)
    }

    pub fn default_language(&self) -> &str {
        &self.default_language
    }

    fn push_markdown(cells: &mut Vec<Cell>, text: &str) {
        let text = text.trim_matches('\n');
        if !text.trim().is_empty() {
            cells.push(Cell::markdown(text));
        }
    }

    fn code_cell(&self, lang: &str, body: &str) -> Cell {
        let lang = if lang.is_empty() {
            self.default_language.as_str()
        } else {
            lang
        };
        let body = body.strip_prefix('\n').unwrap_or(body);
        let body = body.strip_suffix('\n').unwrap_or(body);

        let mut metadata = Map::new();
        metadata.insert("trusted".to_string(), Value::Bool(true));
        if !same_language(lang, &self.default_language) {
            metadata.insert("language".to_string(), Value::String(lang.to_string()));
        }
        Cell::Code {
            metadata,
            source: CellSource::from_text(body),
            execution_count: None,
            outputs: Vec::new(),
        }
    }

    fn render_outputs(outputs: &[Output]) -> Vec<String> {
        let mut rendered = Vec::new();
        for output in outputs {
            match output {
                Output::Stream { name, text } => {
                    rendered.push(format!("# {name}:\n# {}", comment_lines(&text.text())));
                }
                Output::ExecuteResult { data, .. } | Output::DisplayData { data, .. } => {
                    if let Some(text) = data.get("text/plain").and_then(plain_text) {
                        rendered.push(format!("# Output:\n# {}", comment_lines(&text)));
                    }
                }
                Output::Error { ename, evalue, .. } => {
                    rendered.push(format!("# Error: {ename}: {evalue}"));
                }
                Output::Unknown => {}
            }
        }
        rendered
    }
}

impl Converter for MarkdownConverter {
    fn to_structured(&self, text: &str) -> Result<Notebook, ConvertError> {
        let mut notebook = Notebook::with_language(&self.default_language);
        let mut cursor = 0;
        for caps in self.fence.captures_iter(text) {
            let (Some(whole), Some(lang), Some(body)) = (caps.get(0), caps.get(1), caps.get(2))
            else {
                continue;
            };
            Self::push_markdown(&mut notebook.cells, &text[cursor..whole.start()]);
            notebook.cells.push(self.code_cell(lang.as_str(), body.as_str()));
            cursor = whole.end();
        }
        Self::push_markdown(&mut notebook.cells, &text[cursor..]);
        Ok(notebook)
    }

    fn to_text(&self, notebook: &Notebook) -> Result<String, ConvertError> {
        let notebook_language = notebook
            .language()
            .unwrap_or_else(|| self.default_language.clone());

        let mut blocks = Vec::with_capacity(notebook.cells.len());
        for cell in &notebook.cells {
            match cell {
                Cell::Markdown { source, .. } => blocks.push(source.text()),
                Cell::Code {
                    metadata,
                    source,
                    outputs,
                    ..
                } => {
                    let language = metadata
                        .get("language")
                        .and_then(Value::as_str)
                        .unwrap_or(&notebook_language);
                    let mut block = format!("```{language}\n");
                    let code = source.text();
                    if !code.is_empty() {
                        block.push_str(code.trim_end_matches('\n'));
                        block.push('\n');
                    }
                    if self.preserve_output {
                        let rendered = Self::render_outputs(outputs);
                        if !rendered.is_empty() {
                            block.push_str(&rendered.join("\n"));
                            block.push('\n');
                        }
                    }
                    block.push_str("```");
                    blocks.push(block);
                }
                // Raw cells have no Markdown counterpart.
                Cell::Raw { .. } => {}
            }
        }

        if blocks.is_empty() {
            return Ok(String::new());
        }
        let mut text = blocks.join("\n\n");
        text.push('\n');
        Ok(text)
    }
}

fn same_language(lang: &str, other: &str) -> bool {
    let canonical = |l: &str| match l.to_lowercase().as_str() {
        "py" | "python3" => "python".to_string(),
        other => other.to_string(),
    };
    canonical(lang) == canonical(other)
}

fn plain_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => Some(items.iter().filter_map(Value::as_str).collect()),
        _ => None,
    }
}

fn comment_lines(text: &str) -> String {
    text.trim_end_matches('\n').replace('\n', "\n# ")
}
