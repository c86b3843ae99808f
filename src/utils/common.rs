//! Common utility functions used across the application

/// Sanitize filename to be safe for all operating systems.
/// Replaces path separators and other special characters with underscores,
/// keeping the original case.
pub fn sanitize_filename(input: &str) -> String {
    let invalid_chars = ['/', '\\', ':', '*', '?', '"', '<', '>', '|', ' ', '\t'];
    let mut result = input.trim().to_string();
    for c in invalid_chars {
        result = result.replace(c, "_");
    }
    if result.is_empty() || result.chars().all(|c| c == '.') {
        result = "untitled".to_string();
    }
    result
}
