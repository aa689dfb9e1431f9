//! Shared utility functions

use std::path::PathBuf;

use crate::error::{Error, Result};

/// Get the user's home directory
///
/// HOME wins over `dirs::home_dir()` so containers that remap HOME keep
/// their config in the mounted location.
pub fn get_home_dir() -> Result<PathBuf> {
    if let Ok(home) = std::env::var("HOME") {
        if !home.is_empty() {
            return Ok(PathBuf::from(home));
        }
    }

    dirs::home_dir().ok_or_else(|| Error::config("Could not determine home directory"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_get_home_dir_prefers_env() {
        let previous = std::env::var("HOME").ok();
        std::env::set_var("HOME", "/tmp/backstop-home");

        let home = get_home_dir();

        match previous {
            Some(value) => std::env::set_var("HOME", value),
            None => std::env::remove_var("HOME"),
        }
        assert_eq!(home.unwrap(), PathBuf::from("/tmp/backstop-home"));
    }
}
