// Execution-context identifiers for the tab-scoped tier.
// Format: "tab-<uuid>"

use std::fs;
use std::io::Write;
use std::path::Path;
use uuid::Uuid;

const ORIGIN_ID_FILE: &str = "origin_id.txt";
const ORIGIN_ID_PREFIX: &str = "tab-";

/// Error type for origin ID operations
#[derive(Debug, thiserror::Error)]
pub enum OriginIdError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid origin ID format: {0}")]
    InvalidFormat(String),
}

/// A new, never-before-seen origin id.
pub fn generate_origin_id() -> String {
    format!("{}{}", ORIGIN_ID_PREFIX, Uuid::new_v4())
}

pub fn is_valid_origin_id(id: &str) -> bool {
    id.strip_prefix(ORIGIN_ID_PREFIX)
        .map(|rest| Uuid::parse_str(rest).is_ok())
        .unwrap_or(false)
}

/// Get or create the origin id remembered in `dir`.
///
/// Lets successive short-lived processes (one CLI invocation per command)
/// behave as a single execution context reloading, rather than a fresh one
/// each time.
pub fn get_or_create_origin_id_at(dir: &Path) -> Result<String, OriginIdError> {
    let path = dir.join(ORIGIN_ID_FILE);

    if path.exists() {
        let id = fs::read_to_string(&path)?.trim().to_string();
        if is_valid_origin_id(&id) {
            return Ok(id);
        }
        return Err(OriginIdError::InvalidFormat(id));
    }

    let id = generate_origin_id();
    if !dir.exists() {
        fs::create_dir_all(dir)?;
    }
    let mut file = fs::File::create(&path)?;
    writeln!(file, "{}", id)?;
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn generated_ids_are_valid_and_unique() {
        let a = generate_origin_id();
        let b = generate_origin_id();
        assert!(is_valid_origin_id(&a));
        assert_eq!(a.len(), ORIGIN_ID_PREFIX.len() + 36);
        assert_ne!(a, b);
    }

    #[test]
    fn id_persists_across_calls() {
        let dir = TempDir::new().unwrap();
        let first = get_or_create_origin_id_at(dir.path()).unwrap();
        let second = get_or_create_origin_id_at(dir.path()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn creates_missing_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a/b");
        let id = get_or_create_origin_id_at(&nested).unwrap();
        assert!(nested.join(ORIGIN_ID_FILE).exists());
        assert!(id.starts_with(ORIGIN_ID_PREFIX));
    }

    #[test]
    fn rejects_tampered_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(ORIGIN_ID_FILE), "tab-not-a-uuid\n").unwrap();
        assert!(matches!(
            get_or_create_origin_id_at(dir.path()),
            Err(OriginIdError::InvalidFormat(_))
        ));
    }
}
