//! Contains logic for asking the host how long the user has been away from keyboard and mouse.
//! [GenericIdleSampler] picks the implementation compiled for the target, [IdleMonitor] keeps a
//! tracker running through occasional failed samples.

#[cfg(feature = "win")]
pub mod win;
#[cfg(feature = "x11")]
pub mod x11;

#[cfg(feature = "win")]
extern crate windows;

#[cfg(feature = "x11")]
extern crate xcb;

use std::time::Duration;

use anyhow::Result;
use tracing::error;

/// Intended to serve as a contract windows and linux systems must implement.
#[cfg_attr(test, mockall::automock)]
pub trait IdleSampler {
    /// Time elapsed since the last keyboard or mouse event. Must not block.
    fn sample_idle_duration(&mut self) -> Result<Duration>;
}

/// Serves as a cross-compatible IdleSampler implementation.
pub struct GenericIdleSampler {
    inner: Box<dyn IdleSampler>,
}

impl GenericIdleSampler {
    pub fn new() -> Result<Self> {
        cfg_if::cfg_if! {
            if #[cfg(feature = "win")] {
                use win::WindowsIdleSampler;
                Ok(Self {
                    inner: Box::new(WindowsIdleSampler::new()),
                })
            }
            else if #[cfg(feature = "x11")] {
                use x11::X11IdleSampler;
                Ok(Self {
                    inner: Box::new(X11IdleSampler::new()?),
                })
            }
            else {
                Err(anyhow::anyhow!(
                    "No idle sampler was compiled in, enable the `win` or `x11` feature"
                ))
            }
        }
    }
}

impl IdleSampler for GenericIdleSampler {
    fn sample_idle_duration(&mut self) -> Result<Duration> {
        self.inner.sample_idle_duration()
    }
}

/// Wraps a sampler so that a failed sample reuses the last known value instead of stopping the
/// tracker.
pub struct IdleMonitor {
    sampler: Box<dyn IdleSampler>,
    last_known: Duration,
}

impl IdleMonitor {
    pub fn new(sampler: Box<dyn IdleSampler>) -> Self {
        Self {
            sampler,
            last_known: Duration::ZERO,
        }
    }

    pub fn sample(&mut self) -> Duration {
        match self.sampler.sample_idle_duration() {
            Ok(idle) => {
                self.last_known = idle;
                idle
            }
            Err(e) => {
                error!(
                    "Failed to sample idle time, reusing {:?}: {e:?}",
                    self.last_known
                );
                self.last_known
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use anyhow::anyhow;
    use mockall::Sequence;

    use super::{IdleMonitor, MockIdleSampler};

    #[test]
    fn failed_sample_keeps_last_value() {
        let mut sampler = MockIdleSampler::new();
        let mut sequence = Sequence::new();
        sampler
            .expect_sample_idle_duration()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|| Err(anyhow!("no display")));
        sampler
            .expect_sample_idle_duration()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|| Ok(Duration::from_secs(42)));
        sampler
            .expect_sample_idle_duration()
            .times(2)
            .in_sequence(&mut sequence)
            .returning(|| Err(anyhow!("no display")));

        let mut monitor = IdleMonitor::new(Box::new(sampler));
        assert_eq!(monitor.sample(), Duration::ZERO);
        assert_eq!(monitor.sample(), Duration::from_secs(42));
        assert_eq!(monitor.sample(), Duration::from_secs(42));
        assert_eq!(monitor.sample(), Duration::from_secs(42));
    }
}
