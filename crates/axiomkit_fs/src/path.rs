//! Pure path algebra: no filesystem access.

use std::path::MAIN_SEPARATOR;

/// Split off a leading `<letter>:` drive prefix, lowercasing the letter.
fn _split_drive_letter(path: &str) -> (Option<char>, &str) {
    let mut chars = path.chars();
    match (chars.next(), chars.next()) {
        (Some(letter), Some(':')) if letter.is_ascii_alphabetic() => {
            (Some(letter.to_ascii_lowercase()), &path[2..])
        }
        _ => (None, path),
    }
}

/// Segments with empty and `.` parts dropped and `..` folded into its parent.
fn _split_segments(path: &str) -> Vec<&str> {
    let mut l_segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                l_segments.pop();
            }
            _ => l_segments.push(segment),
        }
    }
    l_segments
}

fn _normalize_separators(path: &str) -> String {
    if MAIN_SEPARATOR == '/' {
        path.to_string()
    } else {
        path.replace(MAIN_SEPARATOR, "/")
    }
}

/// Relative path that leads from directory `start_path` to directory `end_path`.
///
/// Both inputs are treated as directories. The result always uses `/`,
/// ends with `/` unless it is empty, and is empty when both paths name the
/// same directory.
///
/// ```
/// use axiomkit_fs::make_path_relative;
///
/// assert_eq!(
///     make_path_relative(
///         "/var/lib/symfony/src/Symfony/",
///         "/var/lib/symfony/src/Symfony/Component"
///     ),
///     "../"
/// );
/// assert_eq!(make_path_relative("/usr/lib/", "/usr/"), "lib/");
/// assert_eq!(make_path_relative("/a/b/", "/a/b"), "");
/// ```
///
/// When both paths carry a drive letter and the letters differ there is no
/// common root; the end path is returned in normalized absolute form.
pub fn make_path_relative(end_path: &str, start_path: &str) -> String {
    let end_path = _normalize_separators(end_path);
    let start_path = _normalize_separators(start_path);

    let (end_drive, end_rest) = _split_drive_letter(&end_path);
    let (start_drive, start_rest) = _split_drive_letter(&start_path);

    let l_end_segments = _split_segments(end_rest);
    let l_start_segments = _split_segments(start_rest);

    if let (Some(end_drive), Some(start_drive)) = (end_drive, start_drive)
        && end_drive != start_drive
    {
        let mut c_relative = format!("{end_drive}:/");
        for segment in &l_end_segments {
            c_relative.push_str(segment);
            c_relative.push('/');
        }
        return c_relative;
    }

    let n_common = l_start_segments
        .iter()
        .zip(l_end_segments.iter())
        .take_while(|(start, end)| start == end)
        .count();

    let mut c_relative = "../".repeat(l_start_segments.len() - n_common);
    for segment in &l_end_segments[n_common..] {
        c_relative.push_str(segment);
        c_relative.push('/');
    }
    c_relative
}

fn _is_separator(ch: char) -> bool {
    ch == '/' || ch == '\\'
}

/// `scheme://...` with an RFC 3986 scheme (`file://`, `s3://`, ...).
fn _has_url_scheme(path: &str) -> bool {
    let Some((scheme, _)) = path.split_once("://") else {
        return false;
    };
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Whether `path` is absolute in any of the forms this library understands.
///
/// Accepts a leading separator (`/var`, `\var`, which also covers UNC
/// `\\server\share`), a drive letter followed by a separator (`c:\var`,
/// `C:/var`), and URL-style paths (`file:///tmp`). Everything else,
/// including `./a`, `a/b` and a bare `c:`, is relative.
pub fn is_absolute_path(path: &str) -> bool {
    let mut chars = path.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if _is_separator(first) {
        return true;
    }
    if first.is_ascii_alphabetic()
        && chars.next() == Some(':')
        && chars.next().is_some_and(_is_separator)
    {
        return true;
    }
    _has_url_scheme(path)
}

#[cfg(test)]
mod tests {
    use super::{is_absolute_path, make_path_relative};

    #[test]
    fn make_path_relative_cases() {
        let l_cases = [
            ("/var/lib/symfony/src/Symfony/", "/var/lib/symfony/src/Symfony/Component", "../"),
            ("/var/lib/symfony/src/Symfony/", "/var/lib/symfony/src/Symfony/Component/", "../"),
            ("/var/lib/symfony/src/Symfony", "/var/lib/symfony/src/Symfony/Component", "../"),
            ("/var/lib/symfony/src/Symfony", "/var/lib/symfony/src/Symfony/Component/", "../"),
            ("var/lib/symfony/", "var/lib/symfony/src/Symfony/Component", "../../../"),
            (
                "/usr/lib/symfony/",
                "/var/lib/symfony/src/Symfony/Component",
                "../../../../../../usr/lib/symfony/",
            ),
            ("/var/lib/symfony/src/Symfony/", "/var/lib/", "symfony/src/Symfony/"),
            ("/aa/bb", "/aa/bb", ""),
            ("/aa/bb", "/aa/bb/", ""),
            ("/aa/bb/", "/aa/bb", ""),
            ("/aa/bb/", "/aa/bb/", ""),
            ("/aa/bb/cc", "/aa/bb/cc/dd", "../"),
            ("/aa/bb/cc", "/aa/bb/cc/dd/", "../"),
            ("/aa/bb/cc/", "/aa/bb/cc/dd", "../"),
            ("/aa/bb/cc/", "/aa/bb/cc/dd/", "../"),
            ("/aa/bb/cc", "/aa", "bb/cc/"),
            ("/aa/bb/cc", "/aa/", "bb/cc/"),
            ("/aa/bb/cc/", "/aa", "bb/cc/"),
            ("/aa/bb/cc/", "/aa/", "bb/cc/"),
            ("/a/aab/bb", "/a/aa", "../aab/bb/"),
            ("/a/aab/bb/", "/a/aa/", "../aab/bb/"),
            ("/a/aab/bb/", "/", "a/aab/bb/"),
            ("/", "/a/aab/bb/", "../../../"),
            ("/aab/bb", "/aa", "../aab/bb/"),
            ("/aa/bb/../cc", "/aa/bb", "../cc/"),
            ("/aa/./bb//cc/", "/aa/bb", "cc/"),
        ];

        for (end_path, start_path, expected) in l_cases {
            assert_eq!(
                make_path_relative(end_path, start_path),
                expected,
                "end={end_path} start={start_path}"
            );
        }
    }

    #[test]
    fn make_path_relative_drive_letters() {
        assert_eq!(make_path_relative("C:/aa/bb/", "c:/aa/"), "bb/");
        assert_eq!(make_path_relative("c:/aa/", "C:/aa/bb/cc"), "../../");
        assert_eq!(make_path_relative("d:/aa/bb/", "c:/aa/"), "d:/aa/bb/");
        assert_eq!(make_path_relative("D:/", "c:/aa/"), "d:/");
    }

    #[cfg(windows)]
    #[test]
    fn make_path_relative_native_separator() {
        assert_eq!(make_path_relative("C:\\aa\\bb\\", "c:\\aa\\cc"), "../bb/");
    }

    #[test]
    fn is_absolute_path_cases() {
        let l_cases = [
            ("/var/lib", true),
            ("c:\\\\var\\lib", true),
            ("c:\\var\\lib", true),
            ("C:/var/lib", true),
            ("\\var\\lib", true),
            ("\\\\server\\share", true),
            ("file:///tmp/x", true),
            ("s3://bucket/key", true),
            ("var/lib", false),
            ("../var/lib", false),
            ("./var", false),
            (".", false),
            ("c:", false),
            ("c:var", false),
            ("1://nope", false),
            ("", false),
        ];

        for (path, expected) in l_cases {
            assert_eq!(is_absolute_path(path), expected, "path={path}");
        }
    }
}
