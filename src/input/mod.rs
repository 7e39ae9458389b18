//! # Input Module
//!
//! Controller snapshots and discrete input events.
//!
//! This module handles:
//! - The controller data model (axes, buttons, hats) read fresh every tick
//! - The closed set of input events the control loop reacts to
//! - The [`InputSubsystem`] seam the control loop polls, implemented for
//!   Linux joysticks in [`evdev_backend`]
//! - Turning termination signals into events in [`termination`]

pub mod evdev_backend;
pub mod termination;

use std::fmt;
use tracing::debug;

use crate::error::Result;

/// Discrete position of a hat switch
///
/// Eight directions plus neutral. `y` is positive towards "up".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HatDirection {
    #[default]
    Centered,
    Up,
    RightUp,
    Right,
    RightDown,
    Down,
    LeftDown,
    Left,
    LeftUp,
}

impl HatDirection {
    /// Build a direction from per-axis offsets; only the signs matter
    pub fn from_offsets(x: i32, y: i32) -> Self {
        match (x.signum(), y.signum()) {
            (0, 0) => Self::Centered,
            (0, 1) => Self::Up,
            (1, 1) => Self::RightUp,
            (1, 0) => Self::Right,
            (1, -1) => Self::RightDown,
            (0, -1) => Self::Down,
            (-1, -1) => Self::LeftDown,
            (-1, 0) => Self::Left,
            _ => Self::LeftUp,
        }
    }

    /// Unit offsets `(x, y)` of this direction
    pub fn offsets(self) -> (i8, i8) {
        match self {
            Self::Centered => (0, 0),
            Self::Up => (0, 1),
            Self::RightUp => (1, 1),
            Self::Right => (1, 0),
            Self::RightDown => (1, -1),
            Self::Down => (0, -1),
            Self::LeftDown => (-1, -1),
            Self::Left => (-1, 0),
            Self::LeftUp => (-1, 1),
        }
    }
}

impl fmt::Display for HatDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (x, y) = self.offsets();
        write!(f, "({}, {})", x, y)
    }
}

/// Events drained from the input subsystem once per tick
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    /// The window was closed or the process was asked to stop
    Terminate,
    ButtonDown { controller: usize, button: usize },
    ButtonUp { controller: usize, button: usize },
    AxisMotion { controller: usize, axis: usize, value: f32 },
    HatMotion { controller: usize, hat: usize, direction: HatDirection },
    BallMotion { controller: usize, ball: usize, dx: i32, dy: i32 },
    DeviceAdded { controller: usize },
    DeviceRemoved { controller: usize },
}

/// Reference to an attached controller as returned by enumeration
///
/// Only valid for the tick that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerHandle {
    /// Ordinal position in the enumeration
    pub index: usize,
    /// Backend-specific node the controller was found at
    pub node: String,
}

/// Read access to an activated controller
pub trait ControllerDevice {
    fn name(&self) -> &str;

    fn axis_count(&self) -> usize;

    /// Value of an axis in [-1.0, 1.0]. Expect jitter between reads.
    fn axis_value(&self, axis: usize) -> f32;

    fn button_count(&self) -> usize;

    fn button_state(&self, button: usize) -> bool;

    fn hat_count(&self) -> usize;

    fn hat_state(&self, hat: usize) -> HatDirection;
}

/// Windowing/input collaborator the control loop drives
pub trait InputSubsystem {
    type Device: ControllerDevice;

    /// Everything queued since the previous call. Never waits.
    fn poll_events(&mut self) -> Vec<InputEvent>;

    /// The controllers attached right now, in a stable order
    ///
    /// # Errors
    ///
    /// Returns `Input` if the device list itself cannot be read
    fn enumerate(&mut self) -> Result<Vec<ControllerHandle>>;

    /// Open an enumerated controller for reading
    ///
    /// # Errors
    ///
    /// Returns `DeviceUnavailable` if the controller went away since enumeration
    fn activate(&mut self, handle: &ControllerHandle) -> Result<Self::Device>;
}

/// State of one controller for one tick
#[derive(Debug, Clone, PartialEq)]
pub struct Controller {
    pub index: usize,
    pub name: String,
    pub axes: Vec<f32>,
    pub buttons: Vec<bool>,
    pub hats: Vec<HatDirection>,
}

impl Controller {
    /// Copy everything out of an activated device
    pub fn read<D: ControllerDevice + ?Sized>(index: usize, device: &D) -> Self {
        Self {
            index,
            name: device.name().to_string(),
            axes: (0..device.axis_count())
                .map(|i| device.axis_value(i).clamp(-1.0, 1.0))
                .collect(),
            buttons: (0..device.button_count())
                .map(|i| device.button_state(i))
                .collect(),
            hats: (0..device.hat_count()).map(|i| device.hat_state(i)).collect(),
        }
    }
}

/// Enumerate, activate and read every attached controller
///
/// # Errors
///
/// Propagates `DeviceUnavailable` when a controller disappears between
/// enumeration and activation.
pub fn read_snapshot<I: InputSubsystem + ?Sized>(input: &mut I) -> Result<Vec<Controller>> {
    let handles = input.enumerate()?;
    let mut controllers = Vec::with_capacity(handles.len());

    for handle in &handles {
        let device = input.activate(handle)?;
        controllers.push(Controller::read(handle.index, &device));
    }

    debug!("Read snapshot of {} controllers", controllers.len());
    Ok(controllers)
}


#[cfg(test)]
mod tests {
    use super::mocks::{FakeController, FakeInput};
    use super::*;
    use crate::error::HarnessError;

    fn pad(name: &str, axes: Vec<f32>, buttons: Vec<bool>, hats: Vec<HatDirection>) -> FakeController {
        FakeController {
            name: name.to_string(),
            axes,
            buttons,
            hats,
        }
    }

    #[test]
    fn test_hat_offsets_match_directions() {
        for direction in [
            HatDirection::Centered,
            HatDirection::Up,
            HatDirection::RightUp,
            HatDirection::Right,
            HatDirection::RightDown,
            HatDirection::Down,
            HatDirection::LeftDown,
            HatDirection::Left,
            HatDirection::LeftUp,
        ] {
            let (x, y) = direction.offsets();
            assert_eq!(HatDirection::from_offsets(x as i32, y as i32), direction);
        }
    }

    #[test]
    fn test_hat_from_offsets_uses_sign_only() {
        assert_eq!(HatDirection::from_offsets(5, 0), HatDirection::Right);
        assert_eq!(HatDirection::from_offsets(-3, 7), HatDirection::LeftUp);
    }

    #[test]
    fn test_hat_display() {
        assert_eq!(HatDirection::Centered.to_string(), "(0, 0)");
        assert_eq!(HatDirection::Up.to_string(), "(0, 1)");
        assert_eq!(HatDirection::LeftDown.to_string(), "(-1, -1)");
    }

    #[test]
    fn test_snapshot_with_no_controllers() {
        let mut input = FakeInput::default();
        assert!(read_snapshot(&mut input).unwrap().is_empty());
    }

    #[test]
    fn test_snapshot_reads_every_control() {
        let mut input = FakeInput {
            controllers: vec![
                pad("Pad A", vec![0.5, -0.25], vec![true], vec![]),
                pad("Pad B", vec![], vec![false, true], vec![HatDirection::Left]),
            ],
            ..Default::default()
        };

        let snapshot = read_snapshot(&mut input).unwrap();

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].index, 0);
        assert_eq!(snapshot[0].name, "Pad A");
        assert_eq!(snapshot[0].axes, vec![0.5, -0.25]);
        assert_eq!(snapshot[0].buttons, vec![true]);
        assert!(snapshot[0].hats.is_empty());
        assert_eq!(snapshot[1].index, 1);
        assert_eq!(snapshot[1].buttons, vec![false, true]);
        assert_eq!(snapshot[1].hats, vec![HatDirection::Left]);
    }

    #[test]
    fn test_snapshot_keeps_axes_in_range() {
        let mut input = FakeInput {
            controllers: vec![pad("Noisy", vec![1.2, -1.0001, 0.3], vec![], vec![])],
            ..Default::default()
        };

        let snapshot = read_snapshot(&mut input).unwrap();

        for value in &snapshot[0].axes {
            assert!((-1.0..=1.0).contains(value), "axis out of range: {}", value);
        }
        assert_eq!(snapshot[0].axes[2], 0.3);
    }

    #[test]
    fn test_snapshot_fails_when_controller_unplugged() {
        let mut input = FakeInput {
            controllers: vec![pad("Pad", vec![0.0], vec![false], vec![])],
            unplugged: vec![0],
            ..Default::default()
        };

        match read_snapshot(&mut input) {
            Err(HarnessError::DeviceUnavailable { index }) => assert_eq!(index, 0),
            other => panic!("Expected DeviceUnavailable, got: {:?}", other),
        }
    }

    #[test]
    fn test_snapshot_is_stable_for_unchanged_devices() {
        let mut input = FakeInput {
            controllers: vec![pad("Pad", vec![0.1, 0.2], vec![true, false], vec![HatDirection::Up])],
            ..Default::default()
        };

        let first = read_snapshot(&mut input).unwrap();
        let second = read_snapshot(&mut input).unwrap();
        assert_eq!(first, second);
    }
}
