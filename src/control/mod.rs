//! # Control Loop Module
//!
//! The fixed-rate loop that ties input, diagnostics and the link together.
//!
//! ## Per Tick
//!
//! 1. Drain queued input events; a button press writes the command token,
//!    a termination event stops the loop after this tick
//! 2. Clear the surface and start a fresh diagnostics writer
//! 3. Re-enumerate controllers and print the device count
//! 4. Print every axis, button and hat of every controller
//! 5. Present the frame
//! 6. Wait for the rest of the 50 ms tick
//!
//! Everything runs on one task. The command write is awaited inline, so a
//! slow link slows the frame rate.

use bytes::Bytes;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, trace};

use crate::display::{DiagnosticsWriter, Surface, BACKGROUND};
use crate::error::{HarnessError, Result};
use crate::input::{read_snapshot, Controller, InputEvent, InputSubsystem};
use crate::transport::link::LinkConnector;
use crate::transport::{command_token, CommandTransport, LinkState};

/// Loop frequency
pub const TICK_RATE_HZ: u32 = 20;

/// Time budget of one tick
pub const TICK_PERIOD: Duration = Duration::from_millis(1000 / TICK_RATE_HZ as u64);

/// Lines printed per controller besides its axes, buttons and hats
pub const HEADER_LINES_PER_CONTROLLER: usize = 4;

/// Whether the loop keeps going
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    Stopped,
}

/// Number of lines [`render_snapshot`] prints for these controllers
pub fn expected_line_count(controllers: &[Controller]) -> usize {
    1 + controllers
        .iter()
        .map(|c| HEADER_LINES_PER_CONTROLLER + c.axes.len() + c.buttons.len() + c.hats.len())
        .sum::<usize>()
}

/// Print a controller snapshot
pub fn render_snapshot<S: Surface + ?Sized>(
    writer: &mut DiagnosticsWriter<'_, S>,
    controllers: &[Controller],
) {
    writer.emit(&format!("Number of joysticks: {}", controllers.len()));
    writer.indent();

    for controller in controllers {
        writer.emit(&format!("Joystick {}: {}", controller.index, controller.name));
        writer.indent();

        writer.emit(&format!("Number of axes: {}", controller.axes.len()));
        writer.indent();
        for (i, value) in controller.axes.iter().enumerate() {
            writer.emit(&format!("Axis {} value: {:>6.3}", i, value));
        }
        writer.unindent();

        writer.emit(&format!("Number of buttons: {}", controller.buttons.len()));
        writer.indent();
        for (i, pressed) in controller.buttons.iter().enumerate() {
            writer.emit(&format!("Button {:>2} value: {}", i, u8::from(*pressed)));
        }
        writer.unindent();

        writer.emit(&format!("Number of hats: {}", controller.hats.len()));
        writer.indent();
        for (i, direction) in controller.hats.iter().enumerate() {
            writer.emit(&format!("Hat {} value: {}", i, direction));
        }
        writer.unindent();

        writer.unindent();
    }
}

/// Owns every collaborator for the lifetime of the run
pub struct ControlLoop<I: InputSubsystem, S: Surface, C: LinkConnector> {
    input: I,
    surface: S,
    transport: CommandTransport<C>,
    token: Bytes,
    state: RunState,
    frames: u64,
    last_lines: usize,
    last_controller_count: Option<usize>,
}

impl<I: InputSubsystem, S: Surface, C: LinkConnector> ControlLoop<I, S, C> {
    /// Build the loop around an already connected transport
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless `transport` is `Connected`. Nothing is
    /// drawn in that case.
    pub fn new(input: I, surface: S, transport: CommandTransport<C>) -> Result<Self> {
        if transport.state() != LinkState::Connected {
            return Err(HarnessError::InvalidState {
                operation: "start control loop",
                state: transport.state(),
            });
        }

        Ok(Self {
            input,
            surface,
            transport,
            token: command_token(),
            state: RunState::Running,
            frames: 0,
            last_lines: 0,
            last_controller_count: None,
        })
    }

    /// Run ticks at [`TICK_RATE_HZ`] until a termination event, then close the link
    ///
    /// # Errors
    ///
    /// Any error from a tick ends the loop immediately and is returned as is.
    /// The link is left as it was; the last frame stays on screen.
    pub async fn run(&mut self) -> Result<()> {
        let mut ticker = interval(TICK_PERIOD);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Starting control loop at {}Hz", TICK_RATE_HZ);

        while self.state == RunState::Running {
            ticker.tick().await;
            self.tick().await?;
        }

        info!("Control loop stopped after {} frames", self.frames);
        self.transport.close().await
    }

    /// One pass: events, diagnostics, present
    pub async fn tick(&mut self) -> Result<RunState> {
        for event in self.input.poll_events() {
            self.handle_event(event).await?;
        }

        self.surface.clear(BACKGROUND);
        let controllers = read_snapshot(&mut self.input)?;
        if self.last_controller_count != Some(controllers.len()) {
            info!("{} controllers attached", controllers.len());
            self.last_controller_count = Some(controllers.len());
        }

        let mut writer = DiagnosticsWriter::new(&mut self.surface);
        writer.reset_cursor();
        render_snapshot(&mut writer, &controllers);
        self.last_lines = writer.lines_emitted();

        self.surface.present()?;
        self.frames += 1;
        trace!("Frame {} presented ({} lines)", self.frames, self.last_lines);

        Ok(self.state)
    }

    async fn handle_event(&mut self, event: InputEvent) -> Result<()> {
        match event {
            InputEvent::Terminate => {
                info!("Termination requested");
                self.state = RunState::Stopped;
            }
            InputEvent::ButtonDown { controller, button } => {
                info!(controller, button, "Joystick button pressed.");
                self.transport.send_command(&self.token).await?;
            }
            InputEvent::ButtonUp { controller, button } => {
                info!(controller, button, "Joystick button released.");
            }
            InputEvent::AxisMotion { .. }
            | InputEvent::HatMotion { .. }
            | InputEvent::BallMotion { .. }
            | InputEvent::DeviceAdded { .. }
            | InputEvent::DeviceRemoved { .. } => {
                // Picked up by the next full render
                debug!("Ignoring {:?}", event);
            }
        }
        Ok(())
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Frames presented so far
    pub fn frames_rendered(&self) -> u64 {
        self.frames
    }

    /// Lines printed in the most recent frame
    pub fn last_frame_lines(&self) -> usize {
        self.last_lines
    }

    pub fn input(&self) -> &I {
        &self.input
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn transport(&self) -> &CommandTransport<C> {
        &self.transport
    }
}
