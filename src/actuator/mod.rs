//! ActuatorController - Sorting Motor Output Lines
//!
//! ## Responsibilities
//!
//! - Drive one of two output lines (Can / Plastic) for a class-specific duration
//! - Return the line to Low on every exit path (error, cancellation, panic)
//! - Claim lines lazily, release them explicitly

mod sysfs;

pub use sysfs::SysfsGpio;

use crate::error::{Error, Result};
use crate::models::SortLabel;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Output level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

/// A claimed digital output line
///
/// Writes are synchronous so that a guard can restore Low from `Drop`.
pub trait OutputLine: Send + Sync {
    fn pin(&self) -> u32;
    fn write(&self, level: Level) -> Result<()>;
}

/// Hands out output lines
pub trait LineProvider: Send + Sync {
    fn claim_output(&self, pin: u32) -> Result<Box<dyn OutputLine>>;
}

/// Motor wiring and timing
#[derive(Debug, Clone)]
pub struct ActuatorConfig {
    pub can_pin: u32,
    pub plastic_pin: u32,
    /// Can motor run time (45°)
    pub can_duration: Duration,
    /// Plastic motor run time (90°)
    pub plastic_duration: Duration,
}

impl Default for ActuatorConfig {
    fn default() -> Self {
        Self {
            can_pin: 17,
            plastic_pin: 27,
            can_duration: Duration::from_millis(1000),
            plastic_duration: Duration::from_millis(2000),
        }
    }
}

impl ActuatorConfig {
    /// Pin, run time and sweep angle for a label
    pub fn motor_for(&self, label: SortLabel) -> (u32, Duration, u32) {
        match label {
            SortLabel::Can => (self.can_pin, self.can_duration, 45),
            SortLabel::Plastic => (self.plastic_pin, self.plastic_duration, 90),
        }
    }
}

/// Result of a completed activation
#[derive(Debug, Clone, Serialize)]
pub struct ActuationReport {
    pub label: SortLabel,
    pub pin: u32,
    pub duration_ms: u64,
    pub message: String,
}

struct ActuatorLines {
    can: Box<dyn OutputLine>,
    plastic: Box<dyn OutputLine>,
}

impl ActuatorLines {
    fn line(&self, label: SortLabel) -> &dyn OutputLine {
        match label {
            SortLabel::Can => self.can.as_ref(),
            SortLabel::Plastic => self.plastic.as_ref(),
        }
    }
}

/// Holds a line High; Drop drives it Low
struct PulseGuard<'a> {
    line: &'a dyn OutputLine,
}

impl<'a> PulseGuard<'a> {
    fn engage(line: &'a dyn OutputLine) -> Result<Self> {
        // Guard exists before the High write so a failed write is still followed by Low
        let guard = Self { line };
        line.write(Level::High)?;
        Ok(guard)
    }
}

impl Drop for PulseGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.line.write(Level::Low) {
            tracing::error!(pin = self.line.pin(), error = %e, "Failed to return motor line to low");
        }
    }
}

/// ActuatorController instance
pub struct ActuatorController {
    provider: Arc<dyn LineProvider>,
    config: ActuatorConfig,
    lines: Option<ActuatorLines>,
}

impl ActuatorController {
    /// Create new ActuatorController (lines are claimed on first use)
    pub fn new(provider: Arc<dyn LineProvider>, config: ActuatorConfig) -> Self {
        Self {
            provider,
            config,
            lines: None,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.lines.is_some()
    }

    /// Claim both lines and drive them Low. No-op when already claimed.
    pub fn initialize(&mut self) -> Result<()> {
        if self.lines.is_some() {
            return Ok(());
        }

        let can = self.provider.claim_output(self.config.can_pin)?;
        let plastic = self.provider.claim_output(self.config.plastic_pin)?;
        can.write(Level::Low)?;
        plastic.write(Level::Low)?;

        tracing::info!(
            can_pin = self.config.can_pin,
            plastic_pin = self.config.plastic_pin,
            "Motor lines initialized"
        );
        self.lines = Some(ActuatorLines { can, plastic });
        Ok(())
    }

    /// Activate the motor named by a label string ("can" / "plastic")
    pub async fn activate(&mut self, target: &str) -> Result<ActuationReport> {
        let label: SortLabel = target
            .parse()
            .map_err(|_| Error::UnknownActuatorTarget(target.to_string()))?;
        self.activate_label(label).await
    }

    /// Drive the label's line High for its run time, then Low
    ///
    /// Blocks the caller for the full duration.
    pub async fn activate_label(&mut self, label: SortLabel) -> Result<ActuationReport> {
        self.initialize()
            .map_err(|e| Error::ActuationFailed(format!("motor lines unavailable: {}", e)))?;

        let (pin, duration, angle) = self.config.motor_for(label);
        let lines = self
            .lines
            .as_ref()
            .ok_or_else(|| Error::Internal("motor lines missing after init".to_string()))?;

        tracing::info!(
            label = %label,
            pin = pin,
            duration_ms = duration.as_millis() as u64,
            "Activating motor"
        );

        {
            let _pulse = PulseGuard::engage(lines.line(label))
                .map_err(|e| Error::ActuationFailed(format!("pin {}: {}", pin, e)))?;
            tokio::time::sleep(duration).await;
        }

        Ok(ActuationReport {
            label,
            pin,
            duration_ms: duration.as_millis() as u64,
            message: format!(
                "{} motor activated for {:.1}s ({}°)",
                label,
                duration.as_secs_f64(),
                angle
            ),
        })
    }

    /// Drive both lines Low and give them back
    pub fn release(&mut self) {
        if let Some(lines) = self.lines.take() {
            for line in [&lines.can, &lines.plastic] {
                if let Err(e) = line.write(Level::Low) {
                    tracing::warn!(pin = line.pin(), error = %e, "Failed to drive line low on release");
                }
            }
            tracing::info!("Motor lines released");
        }
    }
}

impl Drop for ActuatorController {
    fn drop(&mut self) {
        self.release();
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FakeLines;
    use super::*;

    fn fast_config() -> ActuatorConfig {
        ActuatorConfig {
            can_duration: Duration::from_millis(10),
            plastic_duration: Duration::from_millis(20),
            ..ActuatorConfig::default()
        }
    }

    #[tokio::test]
    async fn test_activate_pulses_only_target_line() {
        let lines = Arc::new(FakeLines::default());
        let log = lines.log.clone();
        let mut actuator = ActuatorController::new(lines, fast_config());

        let report = actuator.activate("plastic").await.unwrap();
        assert_eq!(report.label, SortLabel::Plastic);
        assert_eq!(report.pin, 27);
        assert_eq!(report.duration_ms, 20);
        assert_eq!(report.message, "Plastic motor activated for 0.0s (90°)");

        let log = log.lock().unwrap();
        assert_eq!(log.high_count(27), 1);
        assert_eq!(log.high_count(17), 0);
        assert_eq!(log.last_level(27), Some(Level::Low));
        assert_eq!(log.last_level(17), Some(Level::Low));
    }

    #[tokio::test]
    async fn test_activation_blocks_for_duration() {
        let lines = Arc::new(FakeLines::default());
        let mut actuator = ActuatorController::new(lines, fast_config());

        let started = std::time::Instant::now();
        actuator.activate_label(SortLabel::Plastic).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[tokio::test]
    async fn test_unknown_target_touches_nothing() {
        let lines = Arc::new(FakeLines::default());
        let log = lines.log.clone();
        let mut actuator = ActuatorController::new(lines, fast_config());

        let result = actuator.activate("glass").await;
        assert!(matches!(result, Err(Error::UnknownActuatorTarget(t)) if t == "glass"));
        assert!(!actuator.is_initialized());

        let log = log.lock().unwrap();
        assert!(log.claimed.is_empty());
        assert!(log.writes.is_empty());
    }

    #[tokio::test]
    async fn test_failed_high_write_still_restores_low() {
        let mut lines = FakeLines::default();
        lines.failing_high.insert(17);
        let log = lines.log.clone();
        let mut actuator = ActuatorController::new(Arc::new(lines), fast_config());

        let result = actuator.activate_label(SortLabel::Can).await;
        assert!(matches!(result, Err(Error::ActuationFailed(_))));

        let log = log.lock().unwrap();
        // init Low, then guard Low after the rejected High
        assert_eq!(log.writes.iter().filter(|w| **w == (17, Level::Low)).count(), 2);
        assert_eq!(log.last_level(17), Some(Level::Low));
    }

    #[tokio::test]
    async fn test_cancelled_activation_restores_low() {
        let lines = Arc::new(FakeLines::default());
        let log = lines.log.clone();
        let mut actuator = ActuatorController::new(
            lines,
            ActuatorConfig {
                plastic_duration: Duration::from_secs(10),
                ..fast_config()
            },
        );

        let result = tokio::time::timeout(
            Duration::from_millis(20),
            actuator.activate_label(SortLabel::Plastic),
        )
        .await;
        assert!(result.is_err());

        let log = log.lock().unwrap();
        assert_eq!(log.high_count(27), 1);
        assert_eq!(log.last_level(27), Some(Level::Low));
    }

    #[tokio::test]
    async fn test_unclaimable_lines_report_actuation_failure() {
        let mut lines = FakeLines::default();
        lines.unclaimable.insert(27);
        let mut actuator = ActuatorController::new(Arc::new(lines), fast_config());

        let result = actuator.activate_label(SortLabel::Can).await;
        assert!(matches!(result, Err(Error::ActuationFailed(_))));
        assert!(!actuator.is_initialized());
    }

    #[test]
    fn test_release_drives_lines_low() {
        let lines = Arc::new(FakeLines::default());
        let log = lines.log.clone();
        let mut actuator = ActuatorController::new(lines, fast_config());

        actuator.initialize().unwrap();
        let writes_after_init = log.lock().unwrap().writes.len();
        actuator.release();
        actuator.release();

        assert!(!actuator.is_initialized());
        assert_eq!(log.lock().unwrap().writes.len(), writes_after_init + 2);
    }
}
