use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{DigestError, Result};
use crate::focus::content_hash;

pub const DEFAULT_PRESET: &str = "general";

const TEMPLATE_EXTENSIONS: &[&str] = &["txt", "md"];

const GENERAL: &str = "\
Produce a balanced overview of the material.
- Lead with the main subject and purpose of each document
- Cover key facts, figures, and decisions
- Note points where the documents agree or conflict
";

const INJURY_TIMELINE: &str = "\
Build a chronological account of injuries, dates, and treatment.
- Order events by date, giving exact dates where the text states them
- Name each injury, the body part involved, and how it occurred
- Record every provider visit and the treatment given
- Flag gaps in treatment and inconsistent dates between documents
";

const DEPOSITION: &str = "\
Summarize testimony with attention to admissions and contradictions.
- Identify the witness and the examining party
- Quote or closely paraphrase key admissions
- List statements that conflict with other testimony or records
- Note objections and questions the witness declined to answer
";

const MEDICAL_RECORDS: &str = "\
Extract clinically relevant findings from the records.
- List diagnoses, procedures, and medications with dates
- Record objective findings such as imaging and test results
- Note work restrictions and prognosis statements
- Call out pre-existing conditions mentioned anywhere
";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateOrigin {
    Builtin,
    User(PathBuf),
}

/// A free-text summarization template and the preset it was selected under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pub preset_id: String,
    pub content: String,
    pub origin: TemplateOrigin,
}

impl Template {
    pub fn new(preset_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            preset_id: preset_id.into(),
            content: content.into(),
            origin: TemplateOrigin::Builtin,
        }
    }

    pub fn content_hash(&self) -> String {
        content_hash(&self.content)
    }
}

/// Preset id → template. User templates shadow built-ins with the same id.
#[derive(Debug, Clone)]
pub struct TemplateLibrary {
    templates: BTreeMap<String, Template>,
}

impl TemplateLibrary {
    pub fn builtin() -> Self {
        let mut library = Self {
            templates: BTreeMap::new(),
        };
        for (id, content) in [
            ("general", GENERAL),
            ("injury-timeline", INJURY_TIMELINE),
            ("deposition", DEPOSITION),
            ("medical-records", MEDICAL_RECORDS),
        ] {
            library.insert(Template::new(id, content));
        }
        library
    }

    /// Built-ins plus every `*.txt` / `*.md` file in `dir`, keyed by file stem.
    pub fn with_user_dir(dir: &Path) -> Result<Self> {
        let mut library = Self::builtin();
        library.load_dir(dir)?;
        Ok(library)
    }

    pub fn load_dir(&mut self, dir: &Path) -> Result<usize> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            let supported = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| TEMPLATE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
                .unwrap_or(false);
            if path.is_file() && supported {
                paths.push(path);
            }
        }
        paths.sort();
        let mut loaded = 0;
        for path in paths {
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                warn!(path = %path.display(), "skipping template with non-UTF-8 name");
                continue;
            };
            let content = fs::read_to_string(&path)?;
            debug!(preset = stem, path = %path.display(), "loaded user template");
            self.insert(Template {
                preset_id: stem.to_string(),
                content,
                origin: TemplateOrigin::User(path.clone()),
            });
            loaded += 1;
        }
        Ok(loaded)
    }

    pub fn insert(&mut self, template: Template) {
        self.templates.insert(template.preset_id.clone(), template);
    }

    pub fn get(&self, preset_id: &str) -> Result<&Template> {
        self.templates
            .get(preset_id)
            .ok_or_else(|| DigestError::UnknownPreset(preset_id.to_string()))
    }

    /// Sorted by preset id.
    pub fn presets(&self) -> impl Iterator<Item = &Template> {
        self.templates.values()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl Default for TemplateLibrary {
    fn default() -> Self {
        Self::builtin()
    }
}
