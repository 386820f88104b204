//! DOCX container I/O: zip entries in and out, unpacked folders, part selection.

use crate::audit::AuditSink;
use crate::engine::{Diagnostic, Engine, PartReport};
use anyhow::{bail, Context, Result};
use regex::Regex;
use std::io::{Read, Write};
use std::path::{Component, Path, PathBuf};

/// Ordered `(entry_name, bytes)` list of a container.
pub type Entries = Vec<(String, Vec<u8>)>;

// ─── Zip I/O ────────────────────────────────────────────────────────────────

/// Every file entry of the container, in archive order. Directory entries are dropped.
pub fn read_docx(path: &Path) -> Result<Entries> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open DOCX: {}", path.display()))?;
    let mut archive = zip::ZipArchive::new(file)
        .with_context(|| format!("Not a zip archive: {}", path.display()))?;
    let mut entries = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        let mut data = Vec::new();
        entry.read_to_end(&mut data)?;
        entries.push((name, data));
    }
    Ok(entries)
}

/// Create `path` holding `entries` in the given order. Parts under
/// `word/media/` are already compressed and go in uncompressed.
pub fn write_docx(path: &Path, entries: &[(String, Vec<u8>)]) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create output: {}", path.display()))?;
    let mut zip = zip::ZipWriter::new(file);
    let deflated = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);
    let stored =
        zip::write::SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    for (name, data) in entries {
        let opts = if name.starts_with("word/media/") {
            stored
        } else {
            deflated
        };
        zip.start_file(name.as_str(), opts)?;
        zip.write_all(data)?;
    }
    zip.finish()?;
    Ok(())
}

// ─── Unpacked folders ───────────────────────────────────────────────────────

/// Extract every entry of `docx` below `dir`.
pub fn unpack_docx(docx: &Path, dir: &Path) -> Result<usize> {
    let entries = read_docx(docx)?;
    for (name, data) in &entries {
        let target = dir.join(safe_relative(name)?);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(&target, data)
            .with_context(|| format!("Failed to write {}", target.display()))?;
    }
    Ok(entries.len())
}

/// Zip the files below `dir` into `docx`. `[Content_Types].xml` goes first,
/// the rest in name order.
pub fn pack_dir(dir: &Path, docx: &Path) -> Result<usize> {
    let mut files = Vec::new();
    collect_files(dir, dir, &mut files)?;
    if files.is_empty() {
        bail!("No files found below {}", dir.display());
    }
    files.sort_by(|a, b| {
        let a_first = a.0 != "[Content_Types].xml";
        let b_first = b.0 != "[Content_Types].xml";
        a_first.cmp(&b_first).then_with(|| a.0.cmp(&b.0))
    });
    let mut entries = Vec::with_capacity(files.len());
    for (name, path) in files {
        let data =
            std::fs::read(&path).with_context(|| format!("Failed to read {}", path.display()))?;
        entries.push((name, data));
    }
    write_docx(docx, &entries)?;
    Ok(entries.len())
}

fn collect_files(root: &Path, dir: &Path, out: &mut Vec<(String, PathBuf)>) -> Result<()> {
    let listing =
        std::fs::read_dir(dir).with_context(|| format!("Failed to list {}", dir.display()))?;
    for item in listing {
        let path = item?.path();
        if path.is_dir() {
            collect_files(root, &path, out)?;
        } else {
            let relative = path.strip_prefix(root)?;
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            out.push((name, path));
        }
    }
    Ok(())
}

/// Entry names must stay below the extraction folder.
fn safe_relative(name: &str) -> Result<PathBuf> {
    let path = Path::new(name);
    if path
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        bail!("Refusing to extract entry outside the target folder: {}", name);
    }
    Ok(path.to_path_buf())
}

// ─── Input / output naming ──────────────────────────────────────────────────

/// First `.docx` in `dir` by name, ignoring Word lock files (`~$...`).
pub fn find_docx_in_dir(dir: &Path) -> Result<PathBuf> {
    let mut candidates: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to list {}", dir.display()))?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("docx"))
                && !p
                    .file_name()
                    .is_some_and(|n| n.to_string_lossy().starts_with("~$"))
        })
        .collect();
    candidates.sort();
    candidates
        .into_iter()
        .next()
        .with_context(|| format!("No .docx file in {}", dir.display()))
}

/// `【校閲ずみ】<stem>.docx` next to the input.
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    input.with_file_name(format!("【校閲ずみ】{}.docx", stem))
}

// ─── Part selection ─────────────────────────────────────────────────────────

/// Which XML parts of the container are proofread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartSelector {
    pub footers: bool,
    pub headers: bool,
    /// Footnotes and endnotes.
    pub notes: bool,
}

impl Default for PartSelector {
    fn default() -> Self {
        Self {
            footers: true,
            headers: false,
            notes: false,
        }
    }
}

impl PartSelector {
    pub fn matches(&self, name: &str) -> bool {
        lazy_static::lazy_static! {
            static ref HEADER_FOOTER: Regex =
                Regex::new(r"^word/(header|footer)\d*\.xml$").expect("invalid regex");
        }
        if name == "word/document.xml" {
            return true;
        }
        if let Some(caps) = HEADER_FOOTER.captures(name) {
            return match &caps[1] {
                "footer" => self.footers,
                _ => self.headers,
            };
        }
        self.notes && (name == "word/footnotes.xml" || name == "word/endnotes.xml")
    }
}

/// Proofread the selected parts of `entries` in place, in entry order.
///
/// A part that is not UTF-8 or not well-formed is left untouched and reported.
pub fn process_entries(
    engine: &Engine,
    entries: &mut [(String, Vec<u8>)],
    selector: &PartSelector,
    sink: &mut dyn AuditSink,
) -> Result<Vec<PartReport>> {
    let mut reports = Vec::new();
    for (name, data) in entries.iter_mut() {
        if !selector.matches(name) {
            continue;
        }
        let Ok(xml_text) = std::str::from_utf8(data) else {
            log::warn!("{}: not UTF-8, left unchanged", name);
            reports.push(skipped(name, "not UTF-8"));
            continue;
        };
        match engine.process_part(name, xml_text, sink) {
            Ok((output, report)) => {
                *data = output.into_bytes();
                reports.push(report);
            }
            Err(crate::error::ProofError::Xml { position, message }) => {
                log::warn!("{}: malformed XML at byte {}, left unchanged", name, position);
                reports.push(skipped(name, &format!("malformed XML: {}", message)));
            }
            Err(e) => return Err(e).with_context(|| format!("Failed to process {}", name)),
        }
    }
    sink.finish()?;
    Ok(reports)
}

fn skipped(part: &str, message: &str) -> PartReport {
    PartReport {
        part: part.to_string(),
        diagnostics: vec![Diagnostic {
            part: part.to_string(),
            paragraph: None,
            message: message.to_string(),
        }],
        ..PartReport::default()
    }
}
