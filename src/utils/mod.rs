//! Small filesystem helpers used during startup.

use anyhow::{Context, Result};
use std::path::Path;

/// Create a directory (and parents) if it does not exist yet.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory: {}", path.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_dir_creates_nested() {
        let base = std::env::temp_dir().join(format!("rostr-test-{}", uuid::Uuid::new_v4()));
        let nested = base.join("a/b");

        assert!(ensure_dir(&nested).is_ok());
        assert!(nested.is_dir());

        // Idempotent on an existing directory
        assert!(ensure_dir(&nested).is_ok());

        std::fs::remove_dir_all(&base).ok();
    }
}
