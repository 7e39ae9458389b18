//! # Linux Joystick Backend
//!
//! Reads joysticks and gamepads through the Linux evdev interface.
//!
//! ## Controller Detection
//!
//! Every `/dev/input/event*` node is opened in path order. A node counts as
//! a controller when it reports at least one joystick-class button and at
//! least one absolute axis or hat.
//!
//! ## Controls
//!
//! | Control | evdev codes | Order |
//! |---------|-------------|-------|
//! | Axes | every `ABS_*` below `ABS_MISC` except hats | code |
//! | Buttons | `BTN_JOYSTICK..=BTN_THUMBR`, `BTN_DPAD_*`, `BTN_TRIGGER_HAPPY*` | code |
//! | Hats | `ABS_HAT0X/Y` .. `ABS_HAT3X/Y` pairs | hat number |
//!
//! ## Events
//!
//! Each controller node gets a listener task reading its event stream and
//! forwarding translated [`InputEvent`]s into one channel.
//! [`InputSubsystem::poll_events`] drains that channel without waiting.

use evdev::{Device, InputEvent as RawEvent, InputEventKind, Key, RelativeAxisType};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{ControllerDevice, ControllerHandle, HatDirection, InputEvent, InputSubsystem};
use crate::error::{HarnessError, Result};

/// Where the kernel exposes input nodes
pub const INPUT_DIR: &str = "/dev/input";

/// First and last code of the joystick and gamepad button block
const BTN_JOYSTICK_RANGE: (u16, u16) = (0x120, 0x13f);

/// D-pad buttons reported as keys by some gamepads
const BTN_DPAD_RANGE: (u16, u16) = (0x220, 0x223);

/// Extra buttons on large controllers
const BTN_TRIGGER_HAPPY_RANGE: (u16, u16) = (0x2c0, 0x2e7);

/// First hat axis code (ABS_HAT0X)
const ABS_HAT_FIRST: u16 = 0x10;

/// Last hat axis code (ABS_HAT3Y)
const ABS_HAT_LAST: u16 = 0x17;

/// Codes at and above this are not controller axes (ABS_MISC, multitouch)
const ABS_AXIS_END: u16 = 0x28;

/// Number of hats evdev can describe
const MAX_HATS: usize = 4;

fn is_button_code(code: u16) -> bool {
    [BTN_JOYSTICK_RANGE, BTN_DPAD_RANGE, BTN_TRIGGER_HAPPY_RANGE]
        .iter()
        .any(|&(first, last)| (first..=last).contains(&code))
}

fn is_hat_code(code: u16) -> bool {
    (ABS_HAT_FIRST..=ABS_HAT_LAST).contains(&code)
}

/// Hat number and whether the code is the Y half
fn hat_of(code: u16) -> (usize, bool) {
    let offset = code - ABS_HAT_FIRST;
    ((offset / 2) as usize, offset % 2 == 1)
}

/// Scale a raw absolute value into [-1.0, 1.0]
pub fn normalize_axis(value: i32, minimum: i32, maximum: i32) -> f32 {
    if maximum <= minimum {
        return 0.0;
    }
    let span = (maximum as f64) - (minimum as f64);
    let scaled = 2.0 * ((value as f64) - (minimum as f64)) / span - 1.0;
    scaled.clamp(-1.0, 1.0) as f32
}

/// Which evdev codes make up a controller's axes, buttons and hats
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceLayout {
    /// Absolute axis codes in axis order
    pub axes: Vec<u16>,
    /// Key codes in button order
    pub buttons: Vec<u16>,
    /// Hat numbers (0..4) present on the device, in hat order
    pub hats: Vec<usize>,
}

impl DeviceLayout {
    /// Classify supported codes
    pub fn from_codes(
        abs_codes: impl IntoIterator<Item = u16>,
        key_codes: impl IntoIterator<Item = u16>,
    ) -> Self {
        let mut layout = Self::default();
        let mut hat_present = [false; MAX_HATS];

        for code in abs_codes {
            if is_hat_code(code) {
                hat_present[hat_of(code).0] = true;
            } else if code < ABS_AXIS_END {
                layout.axes.push(code);
            }
        }
        layout.axes.sort_unstable();
        layout.axes.dedup();

        layout.hats = (0..MAX_HATS).filter(|&hat| hat_present[hat]).collect();

        layout.buttons = key_codes.into_iter().filter(|&code| is_button_code(code)).collect();
        layout.buttons.sort_unstable();
        layout.buttons.dedup();

        layout
    }

    /// Layout of an opened device
    pub fn of(device: &Device) -> Self {
        let abs_codes: Vec<u16> = device
            .supported_absolute_axes()
            .map(|axes| axes.iter().map(|axis| axis.0).collect())
            .unwrap_or_default();
        let key_codes: Vec<u16> = device
            .supported_keys()
            .map(|keys| keys.iter().map(|key| key.code()).collect())
            .unwrap_or_default();
        Self::from_codes(abs_codes, key_codes)
    }

    /// Whether the device looks like a joystick or gamepad
    pub fn is_controller(&self) -> bool {
        !self.buttons.is_empty() && (!self.axes.is_empty() || !self.hats.is_empty())
    }
}

/// Raw range and value of one absolute axis
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct AbsReading {
    value: i32,
    minimum: i32,
    maximum: i32,
}

fn read_abs(device: &Device) -> std::io::Result<HashMap<u16, AbsReading>> {
    let state = device.get_abs_state()?;
    let codes: Vec<u16> = device
        .supported_absolute_axes()
        .map(|axes| axes.iter().map(|axis| axis.0).collect())
        .unwrap_or_default();

    Ok(codes
        .into_iter()
        .filter_map(|code| {
            state.get(code as usize).map(|info| {
                (
                    code,
                    AbsReading {
                        value: info.value,
                        minimum: info.minimum,
                        maximum: info.maximum,
                    },
                )
            })
        })
        .collect())
}

fn hat_direction(readings: &HashMap<u16, AbsReading>, hat: usize) -> HatDirection {
    let x_code = ABS_HAT_FIRST + (hat as u16) * 2;
    let x = readings.get(&x_code).map(|r| r.value).unwrap_or(0);
    let y = readings.get(&(x_code + 1)).map(|r| r.value).unwrap_or(0);
    // evdev reports up as negative Y
    HatDirection::from_offsets(x, -y)
}

/// Controller state read from evdev at activation
#[derive(Debug, Clone)]
pub struct EvdevController {
    name: String,
    axes: Vec<f32>,
    buttons: Vec<bool>,
    hats: Vec<HatDirection>,
}

impl EvdevController {
    fn read(device: &Device, layout: &DeviceLayout) -> std::io::Result<Self> {
        let readings = read_abs(device)?;
        let pressed = device.get_key_state()?;

        let axes = layout
            .axes
            .iter()
            .map(|code| {
                let r = readings.get(code).copied().unwrap_or_default();
                normalize_axis(r.value, r.minimum, r.maximum)
            })
            .collect();
        let buttons = layout
            .buttons
            .iter()
            .map(|&code| pressed.contains(Key::new(code)))
            .collect();
        let hats = layout
            .hats
            .iter()
            .map(|&hat| hat_direction(&readings, hat))
            .collect();

        Ok(Self {
            name: device.name().unwrap_or("Unknown controller").to_string(),
            axes,
            buttons,
            hats,
        })
    }
}

impl ControllerDevice for EvdevController {
    fn name(&self) -> &str {
        &self.name
    }

    fn axis_count(&self) -> usize {
        self.axes.len()
    }

    fn axis_value(&self, axis: usize) -> f32 {
        self.axes.get(axis).copied().unwrap_or(0.0)
    }

    fn button_count(&self) -> usize {
        self.buttons.len()
    }

    fn button_state(&self, button: usize) -> bool {
        self.buttons.get(button).copied().unwrap_or(false)
    }

    fn hat_count(&self) -> usize {
        self.hats.len()
    }

    fn hat_state(&self, hat: usize) -> HatDirection {
        self.hats.get(hat).copied().unwrap_or_default()
    }
}

/// Turns raw evdev events of one controller into [`InputEvent`]s
#[derive(Debug, Clone)]
pub struct EventTranslator {
    controller: Arc<AtomicUsize>,
    layout: DeviceLayout,
    ranges: HashMap<u16, (i32, i32)>,
    hat_offsets: [(i32, i32); MAX_HATS],
}

impl EventTranslator {
    /// `controller` is shared with the enumeration so events follow index
    /// shifts. `ranges` maps absolute axis codes to their (minimum, maximum).
    pub fn new(controller: Arc<AtomicUsize>, layout: DeviceLayout, ranges: HashMap<u16, (i32, i32)>) -> Self {
        Self {
            controller,
            layout,
            ranges,
            hat_offsets: [(0, 0); MAX_HATS],
        }
    }

    pub fn translate(&mut self, event: &RawEvent) -> Option<InputEvent> {
        let controller = self.controller.load(Ordering::Relaxed);
        match event.kind() {
            InputEventKind::Key(key) => {
                let button = self.layout.buttons.iter().position(|&code| code == key.code())?;
                match event.value() {
                    1 => Some(InputEvent::ButtonDown { controller, button }),
                    0 => Some(InputEvent::ButtonUp { controller, button }),
                    // autorepeat
                    _ => None,
                }
            }
            InputEventKind::AbsAxis(axis) if is_hat_code(axis.0) => {
                let (hat_number, is_y) = hat_of(axis.0);
                let hat = self.layout.hats.iter().position(|&h| h == hat_number)?;
                let offsets = &mut self.hat_offsets[hat_number];
                if is_y {
                    offsets.1 = -event.value();
                } else {
                    offsets.0 = event.value();
                }
                Some(InputEvent::HatMotion {
                    controller,
                    hat,
                    direction: HatDirection::from_offsets(offsets.0, offsets.1),
                })
            }
            InputEventKind::AbsAxis(axis) => {
                let index = self.layout.axes.iter().position(|&code| code == axis.0)?;
                let (minimum, maximum) = self.ranges.get(&axis.0).copied().unwrap_or((-1, 1));
                Some(InputEvent::AxisMotion {
                    controller,
                    axis: index,
                    value: normalize_axis(event.value(), minimum, maximum),
                })
            }
            InputEventKind::RelAxis(axis) => {
                let (dx, dy) = if axis == RelativeAxisType::REL_X {
                    (event.value(), 0)
                } else if axis == RelativeAxisType::REL_Y {
                    (0, event.value())
                } else {
                    return None;
                };
                Some(InputEvent::BallMotion {
                    controller,
                    ball: 0,
                    dx,
                    dy,
                })
            }
            _ => None,
        }
    }
}

/// Listener task of one controller node
#[derive(Debug)]
struct Listener {
    /// Ordinal index the node had in the latest enumeration
    index: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

/// Linux joystick subsystem
///
/// Must be created and used inside a tokio runtime; listener tasks are
/// spawned as controllers are enumerated.
pub struct EvdevInput {
    input_dir: PathBuf,
    events_tx: mpsc::UnboundedSender<InputEvent>,
    events_rx: mpsc::UnboundedReceiver<InputEvent>,
    listeners: HashMap<PathBuf, Listener>,
}

impl std::fmt::Debug for EvdevInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvdevInput")
            .field("input_dir", &self.input_dir)
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

impl Default for EvdevInput {
    fn default() -> Self {
        Self::new()
    }
}

impl EvdevInput {
    pub fn new() -> Self {
        Self::with_input_dir(INPUT_DIR)
    }

    /// Scan a different directory for event nodes
    pub fn with_input_dir(input_dir: impl AsRef<Path>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            input_dir: input_dir.as_ref().to_path_buf(),
            events_tx,
            events_rx,
            listeners: HashMap::new(),
        }
    }

    /// Sender feeding the same queue [`InputSubsystem::poll_events`] drains
    pub fn event_sender(&self) -> mpsc::UnboundedSender<InputEvent> {
        self.events_tx.clone()
    }

    /// Event node paths in the input directory, sorted
    fn event_nodes(&self) -> Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(&self.input_dir).map_err(|e| {
            HarnessError::Input(format!("Failed to read {}: {}", self.input_dir.display(), e))
        })?;

        let mut nodes: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| {
                path.file_name()
                    .map(|name| name.to_string_lossy().starts_with("event"))
                    .unwrap_or(false)
            })
            .collect();

        // Deterministic ordinal indices
        nodes.sort();
        Ok(nodes)
    }

    fn listen(&mut self, index: usize, path: PathBuf, device: Device, layout: DeviceLayout) {
        let ranges = match read_abs(&device) {
            Ok(readings) => readings
                .into_iter()
                .map(|(code, r)| (code, (r.minimum, r.maximum)))
                .collect(),
            Err(e) => {
                debug!("No axis ranges for {}: {}", path.display(), e);
                HashMap::new()
            }
        };

        let mut stream = match device.into_event_stream() {
            Ok(stream) => stream,
            Err(e) => {
                warn!("Cannot listen to {}: {}", path.display(), e);
                return;
            }
        };

        let slot = Arc::new(AtomicUsize::new(index));
        let mut translator = EventTranslator::new(slot.clone(), layout, ranges);
        let tx = self.events_tx.clone();
        let _ = tx.send(InputEvent::DeviceAdded { controller: index });
        info!("Listening to controller {} at {}", index, path.display());

        let node = path.clone();
        let current = slot.clone();
        let task = tokio::spawn(async move {
            loop {
                match stream.next_event().await {
                    Ok(event) => {
                        if let Some(translated) = translator.translate(&event) {
                            if tx.send(translated).is_err() {
                                break;
                            }
                        }
                    }
                    Err(e) => {
                        debug!("Event stream of {} ended: {}", node.display(), e);
                        let controller = current.load(Ordering::Relaxed);
                        let _ = tx.send(InputEvent::DeviceRemoved { controller });
                        break;
                    }
                }
            }
        });

        self.listeners.insert(path, Listener { index: slot, task });
    }

    /// Point an existing listener at its index in the current enumeration
    ///
    /// Returns `false` when the node has no listener yet.
    fn reassign(&self, path: &Path, index: usize) -> bool {
        match self.listeners.get(path) {
            Some(listener) => {
                let previous = listener.index.swap(index, Ordering::Relaxed);
                if previous != index {
                    debug!(
                        "Controller at {} moved from index {} to {}",
                        path.display(),
                        previous,
                        index
                    );
                }
                true
            }
            None => false,
        }
    }
}

impl InputSubsystem for EvdevInput {
    type Device = EvdevController;

    fn poll_events(&mut self) -> Vec<InputEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events_rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn enumerate(&mut self) -> Result<Vec<ControllerHandle>> {
        self.listeners.retain(|_, listener| !listener.task.is_finished());

        let mut handles = Vec::new();
        for path in self.event_nodes()? {
            let device = match Device::open(&path) {
                Ok(device) => device,
                Err(e) => {
                    // Permission denied or other errors - skip node
                    debug!("Could not open {}: {}", path.display(), e);
                    continue;
                }
            };

            let layout = DeviceLayout::of(&device);
            if !layout.is_controller() {
                continue;
            }

            let index = handles.len();
            handles.push(ControllerHandle {
                index,
                node: path.to_string_lossy().to_string(),
            });

            if !self.reassign(&path, index) {
                self.listen(index, path, device, layout);
            }
        }

        Ok(handles)
    }

    fn activate(&mut self, handle: &ControllerHandle) -> Result<EvdevController> {
        let unavailable = || HarnessError::DeviceUnavailable {
            index: handle.index,
        };

        let device = Device::open(&handle.node).map_err(|e| {
            debug!("Controller {} at {} went away: {}", handle.index, handle.node, e);
            unavailable()
        })?;

        let layout = DeviceLayout::of(&device);
        if !layout.is_controller() {
            return Err(unavailable());
        }

        EvdevController::read(&device, &layout).map_err(|e| {
            debug!("Failed to read controller {}: {}", handle.index, e);
            unavailable()
        })
    }
}

impl Drop for EvdevInput {
    fn drop(&mut self) {
        for (_, listener) in self.listeners.drain() {
            listener.task.abort();
        }
    }
}
