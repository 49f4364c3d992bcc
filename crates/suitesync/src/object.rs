//! Metadata-object XML inspection.
//!
//! Deliberately not a full XML parser: the object definitions this tool sees
//! come in a small, known set of shapes, so single-pass pattern extraction is
//! enough. Malformed or exotic XML fails loudly instead of mis-extracting.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use derive_more::{Display, Error, From};
use once_cell::sync::Lazy;
use regex::Regex;

/// XML declaration and comment blocks, removed before tag inspection.
static PROLOGUE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<\?xml.*?\?>|<!--.*?-->").expect("invalid regex string"));

/// First opening tag, with an optional namespace prefix on the name.
static ROOT_TAG_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<\s*(?:[A-Za-z_][\w.-]*:)?([A-Za-z_][\w.-]*)([^>]*)>").expect("invalid regex string")
});

/// `scriptid` attribute inside the root tag.
static SCRIPT_ID_ATTR_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"scriptid\s*=\s*["']([^"']+)["']"#).expect("invalid regex string"));

/// `<scriptid>` child element fallback.
static SCRIPT_ID_ELEMENT_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<scriptid>\s*([^<\s]+)\s*</scriptid>").expect("invalid regex string"));

/// Any element tag, used for depth tracking by the element fallback.
static TAG_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<(/?)[A-Za-z_][^>]*>").expect("invalid regex string"));

/// Object metadata extraction errors.
#[derive(Debug, Display, Error, From)]
pub(crate) enum ObjectMetadataError {
    /// IO-related error.
    Io(io::Error),

    /// No opening tag was found in the definition file.
    #[display(fmt = "unable to determine the object type of {}", "_0.display()")]
    #[from(ignore)]
    MissingType(#[error(not(source))] PathBuf),

    /// Neither a `scriptid` attribute nor a `<scriptid>` element is present.
    #[display(fmt = "unable to determine the script id of {}", "_0.display()")]
    #[from(ignore)]
    MissingScriptId(#[error(not(source))] PathBuf),
}

/// Type and identifier recovered from a metadata-object definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ObjectMetadata {
    /// Lower-cased local name of the root element.
    pub kind: String,

    /// Declared `scriptid` of the object.
    pub script_id: String,
}

/// Extract the object type and script id from an XML definition file.
pub(crate) fn extract(xml_path: &Path) -> Result<ObjectMetadata, ObjectMetadataError> {
    let raw = fs::read_to_string(xml_path)?;
    let body = PROLOGUE_REGEX.replace_all(&raw, "");

    let root = ROOT_TAG_REGEX
        .captures(&body)
        .ok_or_else(|| ObjectMetadataError::MissingType(xml_path.to_path_buf()))?;

    let kind = root[1].to_lowercase();
    let attributes = root[2].to_owned();

    let script_id = SCRIPT_ID_ATTR_REGEX
        .captures(&attributes)
        .map(|captures| captures[1].to_owned())
        .or_else(|| direct_child_script_id(&body))
        .ok_or_else(|| ObjectMetadataError::MissingScriptId(xml_path.to_path_buf()))?;

    Ok(ObjectMetadata { kind, script_id })
}

/// `<scriptid>` element fallback, accepted only as a direct child of the
/// root element. A scriptid nested deeper belongs to some referenced object,
/// not to this one.
fn direct_child_script_id(body: &str) -> Option<String> {
    SCRIPT_ID_ELEMENT_REGEX
        .captures_iter(body)
        .find(|captures| match captures.get(0) {
            Some(found) => element_depth(&body[..found.start()]) == 1,
            None => false,
        })
        .map(|captures| captures[1].to_owned())
}

/// Nesting depth at the end of `prefix`, counting the root element itself.
fn element_depth(prefix: &str) -> i32 {
    let mut depth = 0;

    for tag in TAG_REGEX.find_iter(prefix) {
        let tag = tag.as_str();

        if tag.starts_with("</") {
            depth -= 1;
        } else if !tag.ends_with("/>") {
            depth += 1;
        }
    }

    depth
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn write_object(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().expect("unable to create temp dir");
        let path = dir.path().join("object.xml");
        fs::write(&path, contents).expect("unable to write object file");
        (dir, path)
    }

    #[test]
    fn extracts_type_and_script_id_attribute() {
        let (_dir, path) =
            write_object(r#"<clientscript scriptid="customscript_foo"></clientscript>"#);

        let metadata = extract(&path).expect("extraction failed");

        assert_eq!(metadata.kind, "clientscript");
        assert_eq!(metadata.script_id, "customscript_foo");
    }

    #[test]
    fn skips_declaration_and_comments() {
        let (_dir, path) = write_object(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <!-- exported object -->\n\
             <workflow scriptid=\"customworkflow_bar\"/>",
        );

        let metadata = extract(&path).expect("extraction failed");

        assert_eq!(metadata.kind, "workflow");
        assert_eq!(metadata.script_id, "customworkflow_bar");
    }

    #[test]
    fn ignores_namespace_prefix_and_lowercases() {
        let (_dir, path) = write_object(r#"<ns:UserEventScript scriptid="customscript_ue"/>"#);

        let metadata = extract(&path).expect("extraction failed");

        assert_eq!(metadata.kind, "usereventscript");
    }

    #[test]
    fn falls_back_to_script_id_element() {
        let (_dir, path) = write_object(
            "<savedsearch>\n    <scriptid>customsearch_baz</scriptid>\n</savedsearch>",
        );

        let metadata = extract(&path).expect("extraction failed");

        assert_eq!(metadata.kind, "savedsearch");
        assert_eq!(metadata.script_id, "customsearch_baz");
    }

    #[test]
    fn nested_script_id_elements_are_not_the_objects_own() {
        let (_dir, path) = write_object(
            "<savedsearch>\n\
             \x20   <dependencies>\n\
             \x20       <scriptid>customscript_dep</scriptid>\n\
             \x20   </dependencies>\n\
             </savedsearch>",
        );

        assert!(matches!(
            extract(&path),
            Err(ObjectMetadataError::MissingScriptId(_))
        ));
    }

    #[test]
    fn missing_script_id_is_an_error() {
        let (_dir, path) = write_object("<clientscript></clientscript>");

        assert!(matches!(
            extract(&path),
            Err(ObjectMetadataError::MissingScriptId(_))
        ));
    }

    #[test]
    fn empty_file_has_no_type() {
        let (_dir, path) = write_object("");

        assert!(matches!(
            extract(&path),
            Err(ObjectMetadataError::MissingType(_))
        ));
    }
}
