//! On-disk layout of a pulled document folder.
//!
//! A folder holds the editable `document.xml`, an optional `styles.xml`, and
//! a read-only `.pristine/document.zip` with the same pair as of the last
//! pull. The engine reads all of them and writes none.

use std::fs;
use std::io::Read;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::error::{DocError, Result};

pub const DOCUMENT_XML: &str = "document.xml";
pub const STYLES_XML: &str = "styles.xml";
pub const PRISTINE_DIR: &str = ".pristine";
pub const PRISTINE_ZIP: &str = "document.zip";

static DOC_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<doc\s+id="([^"]+)""#).expect("valid regex"));

/// The loaded contents of a document folder.
#[derive(Debug, Clone)]
pub struct DocFolder {
    pub document_id: String,
    pub current_xml: String,
    pub current_styles: Option<String>,
    pub pristine_xml: String,
    pub pristine_styles: Option<String>,
}

impl DocFolder {
    pub fn load(folder: &Path) -> Result<Self> {
        let current_xml = fs::read_to_string(folder.join(DOCUMENT_XML))?;

        let styles_path = folder.join(STYLES_XML);
        let current_styles = if styles_path.exists() {
            Some(fs::read_to_string(styles_path)?)
        } else {
            None
        };

        let (pristine_xml, pristine_styles) = read_pristine(folder)?;

        // Prefer the id recorded in the pristine document; fall back to the
        // folder name, which the pull side sets to the document id.
        let document_id = DOC_ID
            .captures(&pristine_xml)
            .map(|c| c[1].to_string())
            .or_else(|| {
                folder
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
            })
            .unwrap_or_default();

        Ok(Self {
            document_id,
            current_xml,
            current_styles,
            pristine_xml,
            pristine_styles,
        })
    }
}

fn read_pristine(folder: &Path) -> Result<(String, Option<String>)> {
    let zip_path = folder.join(PRISTINE_DIR).join(PRISTINE_ZIP);
    if !zip_path.exists() {
        return Err(DocError::NotFound(format!(
            "pristine zip not found: {}",
            zip_path.display()
        )));
    }

    let file = fs::File::open(&zip_path)?;
    let mut archive = ZipArchive::new(file)?;

    let pristine_xml = match archive.by_name(DOCUMENT_XML) {
        Ok(mut entry) => {
            let mut content = String::new();
            entry.read_to_string(&mut content)?;
            content
        }
        Err(ZipError::FileNotFound) => {
            return Err(DocError::NotFound(format!(
                "{DOCUMENT_XML} not found in pristine zip"
            )))
        }
        Err(err) => return Err(err.into()),
    };

    let pristine_styles = match archive.by_name(STYLES_XML) {
        Ok(mut entry) => {
            let mut content = String::new();
            entry.read_to_string(&mut content)?;
            Some(content)
        }
        Err(ZipError::FileNotFound) => None,
        Err(err) => return Err(err.into()),
    };

    Ok((pristine_xml, pristine_styles))
}
