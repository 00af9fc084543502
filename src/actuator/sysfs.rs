//! Linux sysfs GPIO lines
//!
//! `/sys/class/gpio/export` + `gpioN/direction` + `gpioN/value`.

use super::{Level, LineProvider, OutputLine};
use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// sysfs GPIO line provider
#[derive(Debug, Clone)]
pub struct SysfsGpio {
    root: PathBuf,
}

impl SysfsGpio {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn pin_dir(&self, pin: u32) -> PathBuf {
        self.root.join(format!("gpio{}", pin))
    }
}

impl Default for SysfsGpio {
    fn default() -> Self {
        Self::new("/sys/class/gpio")
    }
}

impl LineProvider for SysfsGpio {
    fn claim_output(&self, pin: u32) -> Result<Box<dyn OutputLine>> {
        let dir = self.pin_dir(pin);
        let exported = !dir.exists();
        if exported {
            write_attr(&self.root.join("export"), &pin.to_string())?;
        }
        write_attr(&dir.join("direction"), "out")?;

        tracing::debug!(pin = pin, path = %dir.display(), "GPIO line claimed");
        Ok(Box::new(SysfsLine {
            pin,
            root: self.root.clone(),
            value_path: dir.join("value"),
            exported,
        }))
    }
}

fn write_attr(path: &Path, value: &str) -> Result<()> {
    fs::write(path, value).map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!("{}: {}", path.display(), e),
        ))
    })
}

/// One exported output line
struct SysfsLine {
    pin: u32,
    root: PathBuf,
    value_path: PathBuf,
    /// Unexport on drop only if this process exported it
    exported: bool,
}

impl OutputLine for SysfsLine {
    fn pin(&self) -> u32 {
        self.pin
    }

    fn write(&self, level: Level) -> Result<()> {
        let value = match level {
            Level::Low => "0",
            Level::High => "1",
        };
        write_attr(&self.value_path, value)
    }
}

impl Drop for SysfsLine {
    fn drop(&mut self) {
        if let Err(e) = self.write(Level::Low) {
            tracing::warn!(pin = self.pin, error = %e, "Failed to drive GPIO low on drop");
        }
        if self.exported {
            if let Err(e) = write_attr(&self.root.join("unexport"), &self.pin.to_string()) {
                tracing::warn!(pin = self.pin, error = %e, "Failed to unexport GPIO");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fake_sysfs(pins: &[u32]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for pin in pins {
            fs::create_dir(dir.path().join(format!("gpio{}", pin))).unwrap();
        }
        dir
    }

    #[test]
    fn test_claim_sets_direction_and_writes_value() {
        let root = fake_sysfs(&[17]);
        let gpio = SysfsGpio::new(root.path());

        let line = gpio.claim_output(17).unwrap();
        let pin_dir = root.path().join("gpio17");
        assert_eq!(fs::read_to_string(pin_dir.join("direction")).unwrap(), "out");

        line.write(Level::High).unwrap();
        assert_eq!(fs::read_to_string(pin_dir.join("value")).unwrap(), "1");

        drop(line);
        assert_eq!(fs::read_to_string(pin_dir.join("value")).unwrap(), "0");
        // Already exported before the claim, so it is left exported
        assert!(!root.path().join("unexport").exists());
    }

    #[test]
    fn test_claim_fails_when_export_does_not_create_line() {
        let root = TempDir::new().unwrap();
        let gpio = SysfsGpio::new(root.path());

        // Plain directory: export is written but no gpio27 dir appears
        let result = gpio.claim_output(27);
        assert!(matches!(result, Err(Error::Io(_))));
        assert_eq!(fs::read_to_string(root.path().join("export")).unwrap(), "27");
    }
}
