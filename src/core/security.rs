use crate::core::error::SecurityError;

pub const MAX_PATH_LEN: usize = 4096;
pub const MAX_FILTER_LEN: usize = 32 * 1024;
pub const MAX_COMMAND_LEN: usize = 64 * 1024;

const SHELL_METACHARACTERS: &[char] = &[';', '&', '|', '`', '$', '(', ')', '<', '>', '\n'];

// Sequences that smell like traversal, expansion, or substitution. The
// validator never rewrites input, it only accepts or rejects.
const FORBIDDEN_SEQUENCES: &[&str] = &["..", "~", "${", "$(", "`"];

pub fn validate_path(path: &str, allowed_extensions: Option<&[&str]>) -> Result<(), SecurityError> {
    if path.is_empty() {
        return Err(SecurityError::EmptyPath);
    }
    if path.len() > MAX_PATH_LEN {
        return Err(SecurityError::TooLong {
            length: path.len(),
            limit: MAX_PATH_LEN,
        });
    }
    if path.contains('\0') {
        return Err(SecurityError::NullByte);
    }
    for sequence in FORBIDDEN_SEQUENCES {
        if path.contains(sequence) {
            return Err(SecurityError::ForbiddenSequence {
                path: path.to_string(),
                sequence: sequence.to_string(),
            });
        }
    }
    if let Some(found) = path.chars().find(|c| SHELL_METACHARACTERS.contains(c)) {
        return Err(SecurityError::ShellMetacharacter { found });
    }
    if let Some(allowed) = allowed_extensions {
        let extension = path.rsplit('.').next().unwrap_or("").to_ascii_lowercase();
        if !allowed.iter().any(|ext| ext.eq_ignore_ascii_case(&extension)) {
            return Err(SecurityError::ExtensionNotAllowed { extension });
        }
    }
    Ok(())
}

/// Validates and returns the path unchanged. The name is historical: safe
/// paths need no rewriting, and unsafe ones are rejected rather than fixed,
/// so escaping is the identity on every accepted input.
pub fn escape_path(path: &str) -> Result<String, SecurityError> {
    validate_path(path, None)?;
    Ok(path.to_string())
}

pub fn validate_filter_expression(expression: &str, strict: bool) -> Result<(), SecurityError> {
    if expression.contains('\0') {
        return Err(SecurityError::NullByte);
    }
    if expression.len() > MAX_FILTER_LEN {
        return Err(SecurityError::TooLong {
            length: expression.len(),
            limit: MAX_FILTER_LEN,
        });
    }
    if strict {
        // Strict mode is for expressions assembled from user-influenced
        // parts; the full metacharacter set applies, parens included.
        if let Some(found) = expression
            .chars()
            .find(|c| SHELL_METACHARACTERS.contains(c))
        {
            return Err(SecurityError::ShellMetacharacter { found });
        }
    }
    Ok(())
}

pub fn validate_option(flag: &str, value: Option<&str>) -> Result<(), SecurityError> {
    if !flag.starts_with('-') {
        return Err(SecurityError::BadOptionFlag {
            flag: flag.to_string(),
        });
    }
    if let Some(found) = flag.chars().find(|c| SHELL_METACHARACTERS.contains(c)) {
        return Err(SecurityError::ShellMetacharacter { found });
    }
    if let Some(value) = value {
        if value.contains('\0') {
            return Err(SecurityError::NullByte);
        }
        if let Some(found) = value.chars().find(|c| SHELL_METACHARACTERS.contains(c)) {
            return Err(SecurityError::ShellMetacharacter { found });
        }
    }
    Ok(())
}

pub fn validate_command_length(command_text: &str) -> Result<(), SecurityError> {
    if command_text.len() > MAX_COMMAND_LEN {
        return Err(SecurityError::TooLong {
            length: command_text.len(),
            limit: MAX_COMMAND_LEN,
        });
    }
    Ok(())
}

/// Strips non-printable control characters (newline and tab survive) and
/// enforces a caller-supplied length ceiling.
pub fn sanitize_text(text: &str, max_len: usize) -> Result<String, SecurityError> {
    if text.len() > max_len {
        return Err(SecurityError::TooLong {
            length: text.len(),
            limit: max_len,
        });
    }
    Ok(text
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_paths() {
        assert!(validate_path("/media/in/clip_01.mp4", None).is_ok());
        assert!(validate_path("relative/path to/clip.mov", None).is_ok());
    }

    #[test]
    fn escape_path_is_identity_on_safe_input() {
        let path = "/media/in/clip_01.mp4";
        let once = escape_path(path).unwrap();
        let twice = escape_path(&once).unwrap();
        assert_eq!(once, path);
        assert_eq!(twice, once);
    }

    #[test]
    fn rejects_adversarial_corpus() {
        let corpus = [
            "../etc/passwd",
            "a/../../b.mp4",
            "~/video.mp4",
            "$HOME/video.mp4",
            "${PWD}/x.mp4",
            "$(rm -rf /).mp4",
            "`id`.mp4",
            "a;rm.mp4",
            "a&b.mp4",
            "a|b.mp4",
            "a<b.mp4",
            "a>b.mp4",
            "a\nb.mp4",
            "a\0b.mp4",
        ];
        for path in corpus {
            assert!(validate_path(path, None).is_err(), "accepted {path:?}");
        }
    }

    #[test]
    fn rejects_oversized_path() {
        let long = "a".repeat(MAX_PATH_LEN + 1);
        assert!(matches!(
            validate_path(&long, None),
            Err(SecurityError::TooLong { .. })
        ));
    }

    #[test]
    fn extension_allow_list() {
        assert!(validate_path("clip.mp4", Some(&["mp4", "mov"])).is_ok());
        assert!(validate_path("clip.MP4", Some(&["mp4"])).is_ok());
        assert!(matches!(
            validate_path("clip.exe", Some(&["mp4"])),
            Err(SecurityError::ExtensionNotAllowed { .. })
        ));
    }

    #[test]
    fn filter_expression_limits() {
        assert!(validate_filter_expression("scale=1920:1080", false).is_ok());
        assert!(validate_filter_expression("x\0y", false).is_err());
        let big = "a".repeat(MAX_FILTER_LEN + 1);
        assert!(validate_filter_expression(&big, false).is_err());
        assert!(validate_filter_expression("fade=t=in:d=1", true).is_ok());
        assert!(validate_filter_expression("fade;rm", true).is_err());
        // Strict mode covers the whole metacharacter set, parens included.
        assert!(matches!(
            validate_filter_expression("enable=between(t,0,2)", true),
            Err(SecurityError::ShellMetacharacter { found: '(' })
        ));
        assert!(validate_filter_expression("enable=between(t,0,2)", false).is_ok());
    }

    #[test]
    fn option_flags() {
        assert!(validate_option("-c:v", Some("libx264")).is_ok());
        assert!(validate_option("--preset", Some("slow")).is_ok());
        assert!(validate_option("c:v", None).is_err());
        assert!(validate_option("-map", Some("0:v|")).is_err());
    }

    #[test]
    fn sanitize_strips_control_chars() {
        let out = sanitize_text("a\u{7}b\tc\nd", 64).unwrap();
        assert_eq!(out, "ab\tc\nd");
        assert!(sanitize_text("abc", 2).is_err());
    }
}
