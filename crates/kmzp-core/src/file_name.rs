/// Display-name prefix marking a placemark as "has attached photos".
pub const MARKER_PREFIX: &str = "?-";

const UNSAFE_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '*'];

/// Build an output file name from a placemark label.
///
/// Each filesystem-unsafe character becomes the two characters `-?`. The
/// marker prefix is dropped unless `keep_structure` is set, and `extension`
/// gets a leading dot if it lacks one.
pub fn generate_file_name(placemark_name: &str, extension: &str, keep_structure: bool) -> String {
    let mut clean = String::with_capacity(placemark_name.len() + extension.len() + 1);
    for c in placemark_name.chars() {
        if UNSAFE_CHARS.contains(&c) {
            clean.push_str("-?");
        } else {
            clean.push(c);
        }
    }

    if !keep_structure && clean.starts_with(MARKER_PREFIX) {
        clean.replace_range(..MARKER_PREFIX.len(), "");
    }

    if !extension.starts_with('.') {
        clean.push('.');
    }
    clean.push_str(extension);
    clean
}
