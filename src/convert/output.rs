//! Output files of a conversion.

use super::Conversion;
use crate::error::{Error, Result};
use crate::render::JsonFormat;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// One output file of a conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Artifact {
    Tei,
    LostComments,
    LostApparatus,
    Problematic,
    Report,
}

impl Artifact {
    /// File name suffix appended to the input stem.
    pub fn suffix(self) -> &'static str {
        match self {
            Artifact::Tei => ".tei.xml",
            Artifact::LostComments => ".lost-comments.txt",
            Artifact::LostApparatus => ".lost-apparatus.txt",
            Artifact::Problematic => ".problematic.txt",
            Artifact::Report => ".report.json",
        }
    }
}

/// Destination paths for the artifacts of one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSet {
    pub tei: PathBuf,
    pub lost_comments: PathBuf,
    pub lost_apparatus: PathBuf,
    pub problematic: PathBuf,
    /// JSON report, written only when set
    pub report: Option<PathBuf>,
}

impl OutputSet {
    /// Default paths in `dir`, named after the input file's stem.
    ///
    /// `content.xml` inside an unpacked container is named after its
    /// directory instead, since every container has the same part name.
    pub fn for_input<P: AsRef<Path>, Q: AsRef<Path>>(dir: P, input: Q) -> Self {
        let dir = dir.as_ref();
        let stem = stem_of(input.as_ref());
        let path = |artifact: Artifact| dir.join(format!("{}{}", stem, artifact.suffix()));
        Self {
            tei: path(Artifact::Tei),
            lost_comments: path(Artifact::LostComments),
            lost_apparatus: path(Artifact::LostApparatus),
            problematic: path(Artifact::Problematic),
            report: None,
        }
    }

    /// Also write the JSON report next to the TEI file.
    pub fn with_report(mut self) -> Self {
        let name = self
            .tei
            .file_name()
            .map(|n| n.to_string_lossy().replace(Artifact::Tei.suffix(), Artifact::Report.suffix()))
            .unwrap_or_else(|| format!("document{}", Artifact::Report.suffix()));
        self.report = Some(self.tei.with_file_name(name));
        self
    }

    /// Override the path of one artifact.
    pub fn with_path(mut self, artifact: Artifact, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match artifact {
            Artifact::Tei => self.tei = path,
            Artifact::LostComments => self.lost_comments = path,
            Artifact::LostApparatus => self.lost_apparatus = path,
            Artifact::Problematic => self.problematic = path,
            Artifact::Report => self.report = Some(path),
        }
        self
    }

    /// Path of one artifact.
    pub fn path(&self, artifact: Artifact) -> Option<&Path> {
        match artifact {
            Artifact::Tei => Some(&self.tei),
            Artifact::LostComments => Some(&self.lost_comments),
            Artifact::LostApparatus => Some(&self.lost_apparatus),
            Artifact::Problematic => Some(&self.problematic),
            Artifact::Report => self.report.as_deref(),
        }
    }

    /// Write every artifact. Ledgers are written even when empty.
    ///
    /// All contents go to temporary files in the destination directories
    /// first and are renamed into place only after every write succeeded.
    pub fn persist(&self, conversion: &Conversion) -> Result<Vec<PathBuf>> {
        let mut contents = conversion.outputs();
        if self.report.is_some() {
            contents.push((Artifact::Report, conversion.report_json(JsonFormat::Pretty)?));
        }

        let mut staged = Vec::with_capacity(contents.len());
        for (artifact, text) in contents {
            let Some(path) = self.path(artifact) else {
                continue;
            };
            let dir = match path.parent() {
                Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
                _ => PathBuf::from("."),
            };
            std::fs::create_dir_all(&dir)?;
            let mut file = NamedTempFile::new_in(&dir)?;
            file.write_all(text.as_bytes())?;
            file.flush()?;
            staged.push((file, path.to_path_buf()));
        }

        let mut written = Vec::with_capacity(staged.len());
        for (file, path) in staged {
            file.persist(&path).map_err(|e| Error::Io(e.error))?;
            log::debug!("wrote {}", path.display());
            written.push(path);
        }
        Ok(written)
    }
}

fn stem_of(input: &Path) -> String {
    let file_stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    if file_stem != "content" {
        return file_stem;
    }
    input
        .parent()
        .and_then(|p| p.file_name())
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or(file_stem)
}
