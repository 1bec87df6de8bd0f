//! Upload validation utilities
//!
//! Cheap checks that run before any decoding so obviously bad uploads never
//! reach the model.

use crate::error::{BgRemovalError, Result};
use unicode_normalization::UnicodeNormalization;

/// File extensions accepted by the upload endpoint
pub const ALLOWED_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "webp"];

/// Prefix of the attachment name returned to the client
const DOWNLOAD_PREFIX: &str = "bg_removed_";

/// Utility for validating uploaded files
pub struct UploadValidator;

impl UploadValidator {
    /// Check whether a filename carries an accepted extension
    ///
    /// Only the suffix after the last `.` is inspected (case-insensitive);
    /// file contents are not sniffed.
    ///
    /// # Examples
    /// ```rust
    /// use bgremove_server::utils::UploadValidator;
    ///
    /// assert!(UploadValidator::allowed_file("photo.JPG"));
    /// assert!(UploadValidator::allowed_file("archive.tar.webp"));
    /// assert!(!UploadValidator::allowed_file("photo"));
    /// assert!(!UploadValidator::allowed_file("photo.gif"));
    /// ```
    #[must_use]
    pub fn allowed_file(filename: &str) -> bool {
        filename.rsplit_once('.').is_some_and(|(_, extension)| {
            let extension = extension.to_ascii_lowercase();
            ALLOWED_EXTENSIONS.contains(&extension.as_str())
        })
    }

    /// Validate an uploaded filename, returning a `Validation` error when it
    /// is empty or has a disallowed extension
    pub fn validate_filename(filename: &str) -> Result<()> {
        if filename.is_empty() {
            return Err(BgRemovalError::validation("Empty filename"));
        }
        if !Self::allowed_file(filename) {
            return Err(BgRemovalError::validation(format!(
                "Disallowed file extension in '{}'. Allowed: {}",
                filename,
                ALLOWED_EXTENSIONS.join(", ")
            )));
        }
        Ok(())
    }

    /// Reduce a client-supplied filename to a safe ASCII name
    ///
    /// The name is NFKD-decomposed and what is left outside ASCII is dropped
    /// (`café` becomes `cafe`). Path separators and whitespace runs
    /// become `_`, anything outside `[A-Za-z0-9_.-]` is removed, and leading or
    /// trailing `.`/`_` are stripped.
    ///
    /// # Examples
    /// ```rust
    /// use bgremove_server::utils::UploadValidator;
    ///
    /// assert_eq!(UploadValidator::secure_filename("My cool movie.mov"), "My_cool_movie.mov");
    /// assert_eq!(UploadValidator::secure_filename("../../../etc/passwd"), "etc_passwd");
    /// ```
    #[must_use]
    pub fn secure_filename(filename: &str) -> String {
        let ascii: String = filename
            .nfkd()
            .filter(char::is_ascii)
            .map(|c| if c == '/' { ' ' } else { c })
            .collect();

        let joined = ascii.split_whitespace().collect::<Vec<_>>().join("_");

        joined
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
            .collect::<String>()
            .trim_matches(|c| c == '.' || c == '_')
            .to_string()
    }

    /// Attachment name for a processed upload: `bg_removed_<secure name>.png`
    ///
    /// ```rust
    /// use bgremove_server::utils::UploadValidator;
    ///
    /// assert_eq!(UploadValidator::download_name("cat.jpg"), "bg_removed_cat.jpg.png");
    /// ```
    #[must_use]
    pub fn download_name(filename: &str) -> String {
        format!("{}{}.png", DOWNLOAD_PREFIX, Self::secure_filename(filename))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_extensions() {
        assert!(UploadValidator::allowed_file("a.png"));
        assert!(UploadValidator::allowed_file("a.jpg"));
        assert!(UploadValidator::allowed_file("a.jpeg"));
        assert!(UploadValidator::allowed_file("a.webp"));
        assert!(UploadValidator::allowed_file("A.PNG"));
        assert!(UploadValidator::allowed_file("a.JpEg"));
    }

    #[test]
    fn test_disallowed_extensions() {
        assert!(!UploadValidator::allowed_file(""));
        assert!(!UploadValidator::allowed_file("png"));
        assert!(!UploadValidator::allowed_file("a.gif"));
        assert!(!UploadValidator::allowed_file("a.png.exe"));
        assert!(!UploadValidator::allowed_file("a."));
    }

    #[test]
    fn test_validate_filename_errors() {
        assert!(UploadValidator::validate_filename("ok.png").is_ok());
        assert!(matches!(
            UploadValidator::validate_filename(""),
            Err(BgRemovalError::Validation(_))
        ));
        assert!(matches!(
            UploadValidator::validate_filename("doc.pdf"),
            Err(BgRemovalError::Validation(_))
        ));
    }

    #[test]
    fn test_secure_filename() {
        assert_eq!(UploadValidator::secure_filename("photo.jpg"), "photo.jpg");
        assert_eq!(UploadValidator::secure_filename("My cool  photo.png"), "My_cool_photo.png");
        assert_eq!(UploadValidator::secure_filename("../../../etc/passwd"), "etc_passwd");
        assert_eq!(UploadValidator::secure_filename("i contain cool \u{fc}ml\u{e4}uts.txt"), "i_contain_cool_umlauts.txt");
        assert_eq!(UploadValidator::secure_filename("__init__.py"), "init__.py");
        assert_eq!(UploadValidator::secure_filename("we$ird&name!.webp"), "weirdname.webp");
        assert_eq!(UploadValidator::secure_filename("caf\u{e9}.png"), "cafe.png");
        assert_eq!(UploadValidator::secure_filename("\u{ff21}\u{ff22}.png"), "AB.png");
        assert_eq!(UploadValidator::secure_filename("\u{65e5}\u{672c}.png"), "png");
    }

    #[test]
    fn test_download_name() {
        assert_eq!(UploadValidator::download_name("shoe.png"), "bg_removed_shoe.png.png");
        assert_eq!(
            UploadValidator::download_name("summer shoe.JPG"),
            "bg_removed_summer_shoe.JPG.png"
        );
    }
}
