//! Notebook document model (nbformat 4).
//!
//! Only the parts the converter reads or writes are typed; everything else in
//! cell and notebook metadata is carried as raw JSON.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::ConvertError;

pub const NBFORMAT: u32 = 4;
pub const NBFORMAT_MINOR: u32 = 4;

/// A whole notebook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notebook {
    #[serde(default)]
    pub cells: Vec<Cell>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default = "default_nbformat")]
    pub nbformat: u32,
    #[serde(default = "default_nbformat_minor")]
    pub nbformat_minor: u32,
}

fn default_nbformat() -> u32 {
    NBFORMAT
}

fn default_nbformat_minor() -> u32 {
    NBFORMAT_MINOR
}

/// One notebook cell, tagged by `cell_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cell_type", rename_all = "lowercase")]
pub enum Cell {
    Markdown {
        #[serde(default)]
        metadata: Map<String, Value>,
        #[serde(default)]
        source: CellSource,
    },
    Code {
        #[serde(default)]
        metadata: Map<String, Value>,
        #[serde(default)]
        source: CellSource,
        execution_count: Option<u64>,
        #[serde(default)]
        outputs: Vec<Output>,
    },
    Raw {
        #[serde(default)]
        metadata: Map<String, Value>,
        #[serde(default)]
        source: CellSource,
    },
}

/// Cell text: nbformat allows a single string or a list of lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellSource {
    Text(String),
    Lines(Vec<String>),
}

impl Default for CellSource {
    fn default() -> Self {
        CellSource::Lines(Vec::new())
    }
}

impl CellSource {
    /// Split `text` into nbformat lines: every line keeps its `\n` except the last.
    pub fn from_text(text: &str) -> Self {
        CellSource::Lines(text.split_inclusive('\n').map(str::to_string).collect())
    }

    /// The joined text.
    pub fn text(&self) -> String {
        match self {
            CellSource::Text(text) => text.clone(),
            CellSource::Lines(lines) => lines.concat(),
        }
    }
}

/// A code cell output, tagged by `output_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "output_type", rename_all = "snake_case")]
pub enum Output {
    Stream {
        #[serde(default = "default_stream_name")]
        name: String,
        #[serde(default)]
        text: CellSource,
    },
    ExecuteResult {
        #[serde(default)]
        data: Map<String, Value>,
        #[serde(default)]
        metadata: Map<String, Value>,
        execution_count: Option<u64>,
    },
    DisplayData {
        #[serde(default)]
        data: Map<String, Value>,
        #[serde(default)]
        metadata: Map<String, Value>,
    },
    Error {
        #[serde(default)]
        ename: String,
        #[serde(default)]
        evalue: String,
        #[serde(default)]
        traceback: Vec<String>,
    },
    #[serde(other)]
    Unknown,
}

fn default_stream_name() -> String {
    "stdout".to_string()
}

impl Cell {
    pub fn markdown(text: &str) -> Self {
        Cell::Markdown {
            metadata: Map::new(),
            source: CellSource::from_text(text),
        }
    }

    pub fn source(&self) -> &CellSource {
        match self {
            Cell::Markdown { source, .. } | Cell::Code { source, .. } | Cell::Raw { source, .. } => {
                source
            }
        }
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        match self {
            Cell::Markdown { metadata, .. }
            | Cell::Code { metadata, .. }
            | Cell::Raw { metadata, .. } => metadata,
        }
    }
}

impl Notebook {
    /// A notebook with no cells and no metadata.
    pub fn empty() -> Self {
        Self {
            cells: Vec::new(),
            metadata: Map::new(),
            nbformat: NBFORMAT,
            nbformat_minor: NBFORMAT_MINOR,
        }
    }

    /// A notebook whose metadata declares `language` as its kernel language.
    pub fn with_language(language: &str) -> Self {
        let mut notebook = Self::empty();
        notebook.metadata = kernel_metadata(language);
        notebook
    }

    /// Parse notebook JSON. Empty or whitespace-only input is an empty notebook.
    pub fn parse(raw: &str) -> Result<Self, ConvertError> {
        if raw.trim().is_empty() {
            return Ok(Self::empty());
        }
        Ok(serde_json::from_str(raw)?)
    }

    /// Pretty JSON with a trailing newline.
    pub fn to_json(&self) -> Result<String, ConvertError> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }

    /// Language declared in the notebook metadata.
    ///
    /// `language_info.name` takes precedence over `kernelspec.language`;
    /// C++ kernels map to the `cpp` fence label.
    pub fn language(&self) -> Option<String> {
        let from_info = self
            .metadata
            .get("language_info")
            .and_then(|info| info.get("name"))
            .and_then(Value::as_str);
        if let Some(name) = from_info {
            return Some(fence_label(name));
        }
        self.metadata
            .get("kernelspec")
            .and_then(|spec| spec.get("language"))
            .and_then(Value::as_str)
            .map(fence_label)
    }
}

fn fence_label(language: &str) -> String {
    let lower = language.to_lowercase();
    if lower.contains("c++") {
        "cpp".to_string()
    } else {
        lower
    }
}

fn kernel_metadata(language: &str) -> Map<String, Value> {
    let metadata = if language == "python" {
        json!({
            "kernelspec": {
                "display_name": "Python 3",
                "language": "python",
                "name": "python3"
            },
            "language_info": {
                "codemirror_mode": { "name": "ipython", "version": 3 },
                "file_extension": ".py",
                "mimetype": "text/x-python",
                "name": "python",
                "nbconvert_exporter": "python",
                "pygments_lexer": "ipython3"
            }
        })
    } else {
        json!({
            "kernelspec": {
                "display_name": language,
                "language": language,
                "name": language
            },
            "language_info": { "name": language }
        })
    };
    match metadata {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
