use std::time::Duration;

use anyhow::{anyhow, Result};
use tracing::instrument;
use xcb::{
    screensaver::{QueryInfo, QueryInfoReply},
    x::{Drawable, Window},
    Connection, Extension,
};

use super::IdleSampler;

/// Reads idle time from the X11 screensaver extension, which the server keeps up to date with
/// every input event.
pub struct X11IdleSampler {
    connection: Connection,
    preferred_screen: i32,
}

impl X11IdleSampler {
    pub fn new() -> Result<Self> {
        let (connection, preferred_screen) =
            Connection::connect_with_extensions(None, &[Extension::ScreenSaver], &[])?;
        Ok(Self {
            connection,
            preferred_screen,
        })
    }

    fn root_window(&self) -> Result<Window> {
        // Currently the application only supports 1 x11 screen.
        self.connection
            .get_setup()
            .roots()
            .nth(self.preferred_screen.max(0) as usize)
            .map(|screen| screen.root())
            .ok_or_else(|| anyhow!("Screen {} is not available", self.preferred_screen))
    }
}

impl IdleSampler for X11IdleSampler {
    #[instrument(skip(self))]
    fn sample_idle_duration(&mut self) -> Result<Duration> {
        let root = self.root_window()?;
        let cookie = self.connection.send_request(&QueryInfo {
            drawable: Drawable::Window(root),
        });
        let reply: QueryInfoReply = self.connection.wait_for_reply(cookie)?;
        Ok(Duration::from_millis(reply.ms_since_user_input() as u64))
    }
}
