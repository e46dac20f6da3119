use std::time::Duration;

use anyhow::{anyhow, Result};
use tracing::{error, instrument};
use windows::Win32::{
    System::SystemInformation::GetTickCount64,
    UI::Input::KeyboardAndMouse::{GetLastInputInfo, LASTINPUTINFO},
};

use super::IdleSampler;

/// Compares the tick of the last input event with the current tick count.
#[instrument]
pub fn get_idle_time() -> Result<Duration> {
    let mut last: LASTINPUTINFO = LASTINPUTINFO {
        cbSize: size_of::<LASTINPUTINFO>() as u32,
        dwTime: 0,
    };
    let is_success = unsafe { GetLastInputInfo(&mut last) };
    if !is_success.as_bool() {
        error!("Failed to retrieve user idle time");
        return Err(anyhow!("Failed to retrieve user idle time"));
    }

    let tick_count = unsafe { GetTickCount64() };
    // dwTime is a 32 bit tick count and wraps roughly every 49.7 days.
    let elapsed = (tick_count as u32).wrapping_sub(last.dwTime);
    Ok(Duration::from_millis(elapsed as u64))
}

pub struct WindowsIdleSampler {}

impl WindowsIdleSampler {
    pub fn new() -> Self {
        Self {}
    }
}

impl Default for WindowsIdleSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl IdleSampler for WindowsIdleSampler {
    fn sample_idle_duration(&mut self) -> Result<Duration> {
        get_idle_time().inspect_err(|e| error!("Failed to get idle time {e:?}"))
    }
}
