//! Controller session
//!
//! Drives one APT motor controller over an exclusively owned transport.
//!
//! There are no sequence numbers in the protocol: a request is matched to its
//! reply purely by message ID. Anything else that arrives while waiting is
//! appended to the pending queue.

use serde::{Deserialize, Serialize};
use std::io::{self, ErrorKind, Read, Write};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

use super::{
    serial::{find_port, open_port},
    AptError, AptResult, Frame, FrameHeader, MessageId, PendingQueue, SerialChannel, Transport,
    DEFAULT_BAUD_RATE, DEFAULT_CHANNEL, HEADER_SIZE,
};
use crate::stage::{
    params::move_absolute_data, ControllerStatus, DeviceProfile, HardwareInfo, HomeParams,
    PositionCounter, StageModel, VelocityParams, VelocityProfile,
};

/// Pause between reads that returned no data
const READ_RETRY_DELAY: Duration = Duration::from_millis(1);

/// Default pause between status polls while waiting for motion to settle
pub const DEFAULT_SETTLE_POLL_MS: u64 = 10;

/// Controller configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Serial port name; empty to locate the port by `serial_number`
    pub port_name: String,
    /// USB serial number of the controller
    pub serial_number: Option<String>,
    /// Baud rate
    pub baud_rate: u32,
    /// Stage attached to the controller
    pub stage: StageModel,
    /// Reject targets outside the stage's linear range
    pub soft_limits: bool,
    /// Override for the stage's maximum velocity (mm/s)
    pub max_velocity: Option<f64>,
    /// Override for the stage's maximum acceleration (mm/s²)
    pub max_acceleration: Option<f64>,
    /// Bound on every reply wait; `None` waits forever
    pub request_timeout_ms: Option<u64>,
    /// Pause between status polls while motion settles
    pub settle_poll_ms: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            serial_number: None,
            baud_rate: DEFAULT_BAUD_RATE,
            stage: StageModel::Generic,
            soft_limits: true,
            max_velocity: None,
            max_acceleration: None,
            request_timeout_ms: None,
            settle_poll_ms: DEFAULT_SETTLE_POLL_MS,
        }
    }
}

impl ControllerConfig {
    /// Configuration for a stage on a known port
    pub fn new(port_name: impl Into<String>, stage: StageModel) -> Self {
        Self {
            port_name: port_name.into(),
            stage,
            ..Self::default()
        }
    }

    /// Stage calibration with any velocity/acceleration overrides applied
    pub fn profile(&self) -> AptResult<Option<DeviceProfile>> {
        let Some(profile) = self.stage.profile() else {
            return Ok(None);
        };
        let max_velocity = self.max_velocity.unwrap_or(profile.max_velocity());
        let max_acceleration = self.max_acceleration.unwrap_or(profile.max_acceleration());
        profile.with_limits(max_velocity, max_acceleration).map(Some)
    }

    /// Reply wait bound, if configured
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    fn settle_poll(&self) -> Duration {
        Duration::from_millis(self.settle_poll_ms)
    }
}

/// Whether the controller announces the end of moves
///
/// This is device-wide state toggled by its own messages, not a per-move flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndOfMoveMessages {
    /// Completion messages are sent when a move or homing ends
    Enabled,
    /// Completion messages are withheld
    Suspended,
}

/// How a stop decelerates
///
/// Sent as the second header parameter of MOVE_STOP using the protocol's codes
/// (0x01 immediate, 0x02 profiled). Some host software sends 0x00 for a
/// profiled stop instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopMode {
    /// Cut the motor immediately
    Immediate,
    /// Ramp down using the configured acceleration
    Profiled,
}

impl StopMode {
    fn code(self) -> u8 {
        match self {
            StopMode::Immediate => 0x01,
            StopMode::Profiled => 0x02,
        }
    }
}

/// One motor controller (one axis)
pub struct Controller {
    /// Transport handle; `None` once closed
    transport: Option<Box<dyn Transport>>,
    /// Controller configuration
    config: ControllerConfig,
    /// Stage calibration; `None` for the generic stage
    profile: Option<DeviceProfile>,
    /// Whether targets are checked against the linear range
    soft_limits: bool,
    /// Last end-of-move setting sent to the controller
    end_of_move: EndOfMoveMessages,
    /// Frames read while waiting for something else
    pending: PendingQueue,
    /// Metrics: frames sent & received
    tx_frames: u64,
    rx_frames: u64,
}

impl Controller {
    /// Open the serial port described by `config` and start a session
    pub fn open(config: ControllerConfig) -> AptResult<Self> {
        let port_name = if config.port_name.is_empty() {
            let serial = config
                .serial_number
                .as_deref()
                .ok_or_else(|| AptError::PortNotFound("no port or serial number given".into()))?;
            find_port(serial)?.name
        } else {
            config.port_name.clone()
        };

        let port = open_port(&port_name, Some(config.baud_rate))?;
        let channel = SerialChannel::new(port);
        debug!(port = ?channel.name(), "serial channel ready");
        Self::with_transport(Box::new(channel), config)
    }

    /// Start a session over an already open transport
    ///
    /// End-of-move messages are resumed so the device matches the session's
    /// initial state even if an earlier session left them suspended.
    /// The transport is closed if the configuration is rejected.
    pub fn with_transport(
        mut transport: Box<dyn Transport>,
        config: ControllerConfig,
    ) -> AptResult<Self> {
        let profile = match config.profile() {
            Ok(profile) => profile,
            Err(e) => {
                if let Err(close_err) = transport.close() {
                    warn!("error releasing transport: {}", close_err);
                }
                return Err(e);
            }
        };
        Self::start(transport, config, profile)
    }

    /// Start a session for a stage with a custom calibration
    pub fn with_profile(
        transport: Box<dyn Transport>,
        config: ControllerConfig,
        profile: DeviceProfile,
    ) -> AptResult<Self> {
        Self::start(transport, config, Some(profile))
    }

    fn start(
        transport: Box<dyn Transport>,
        config: ControllerConfig,
        profile: Option<DeviceProfile>,
    ) -> AptResult<Self> {
        info!(stage = config.stage.name(), "starting controller session");
        let mut controller = Self {
            transport: Some(transport),
            soft_limits: config.soft_limits,
            config,
            profile,
            end_of_move: EndOfMoveMessages::Enabled,
            pending: PendingQueue::new(),
            tx_frames: 0,
            rx_frames: 0,
        };
        controller.resume_end_of_move_messages()?;
        Ok(controller)
    }

    /// Get controller configuration
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Stage calibration, or `UnconfiguredProfile` for the generic stage
    pub fn profile(&self) -> AptResult<&DeviceProfile> {
        self.profile.as_ref().ok_or_else(|| {
            AptError::UnconfiguredProfile(format!(
                "{} stage has no scale constants",
                self.config.stage.name()
            ))
        })
    }

    /// Whether the transport is still held
    pub fn is_open(&self) -> bool {
        self.transport.is_some()
    }

    /// Whether targets are checked against the linear range
    pub fn soft_limits(&self) -> bool {
        self.soft_limits
    }

    /// Enable or disable the linear range check
    pub fn set_soft_limits(&mut self, soft_limits: bool) {
        self.soft_limits = soft_limits;
    }

    /// Last end-of-move setting sent to the controller
    pub fn end_of_move_messages(&self) -> EndOfMoveMessages {
        self.end_of_move
    }

    /// Frames received out of turn, oldest first
    pub fn pending(&self) -> &PendingQueue {
        &self.pending
    }

    /// Take all frames received out of turn
    pub fn drain_pending(&mut self) -> Vec<Frame> {
        self.pending.drain()
    }

    /// Get cumulative sent/received frame counters
    pub fn counters(&self) -> (u64, u64) {
        (self.tx_frames, self.rx_frames)
    }

    fn transport(&mut self) -> AptResult<&mut Box<dyn Transport>> {
        self.transport.as_mut().ok_or(AptError::NotConnected)
    }

    /// Write one frame; no reply is awaited
    pub fn send(&mut self, frame: &Frame) -> AptResult<()> {
        let bytes = frame.encode()?;
        let transport = self.transport()?;
        transport.write_all(&bytes)?;
        transport.flush()?;
        self.tx_frames += 1;

        debug!("sent {:#06x} ({} bytes)", frame.message_id, bytes.len());
        trace!("tx {:02x?}", bytes);
        Ok(())
    }

    /// Write a frame and wait for the reply with the expected ID
    pub fn request(&mut self, frame: &Frame, expected: MessageId) -> AptResult<Frame> {
        self.send(frame)?;
        self.wait_for(expected)
    }

    /// Send a request and wait for the reply paired with its message ID
    fn round_trip(&mut self, frame: &Frame) -> AptResult<Frame> {
        let expected = MessageId::from_code(frame.message_id)
            .and_then(|id| id.reply())
            .ok_or_else(|| {
                AptError::InvalidPayload(format!(
                    "message {:#06x} has no reply",
                    frame.message_id
                ))
            })?;
        self.request(frame, expected)
    }

    /// Read frames until one with the expected ID arrives
    ///
    /// Other frames are appended to the pending queue. Without a configured
    /// request timeout this blocks until the reply shows up. After a
    /// `Timeout` the stream may be positioned mid-frame.
    pub fn wait_for(&mut self, expected: MessageId) -> AptResult<Frame> {
        let deadline = self.config.request_timeout().map(|t| Instant::now() + t);
        let code = expected.code();

        loop {
            let frame = self.read_frame(deadline, code)?;
            if frame.message_id == code {
                return Ok(frame);
            }

            debug!(
                "queued {:#06x} while waiting for {:#06x}",
                frame.message_id, code
            );
            self.pending.push(frame);

            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Err(AptError::Timeout { expected: code });
            }
        }
    }

    /// Read one frame: the header first, then exactly its data block
    fn read_frame(&mut self, deadline: Option<Instant>, expected: u16) -> AptResult<Frame> {
        let mut header = [0u8; HEADER_SIZE];
        self.read_exact(&mut header, deadline, expected)?;
        let header = FrameHeader::decode(&header)?;

        let mut data = vec![0u8; header.data_len()];
        self.read_exact(&mut data, deadline, expected)?;
        self.rx_frames += 1;

        debug!(
            "received {:#06x} ({} data bytes)",
            header.message_id,
            data.len()
        );
        trace!("rx data {:02x?}", data);
        Ok(header.into_frame(data))
    }

    /// Fill `buf`, looping over short reads and read timeouts
    fn read_exact(
        &mut self,
        buf: &mut [u8],
        deadline: Option<Instant>,
        expected: u16,
    ) -> AptResult<()> {
        let transport = self.transport()?;
        let mut filled = 0;

        while filled < buf.len() {
            match transport.read(&mut buf[filled..]) {
                Ok(0) => {
                    return Err(io::Error::new(
                        ErrorKind::UnexpectedEof,
                        "controller stream ended mid-frame",
                    )
                    .into());
                }
                Ok(n) => filled += n,
                Err(ref e)
                    if matches!(
                        e.kind(),
                        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                    ) =>
                {
                    if deadline.is_some_and(|d| Instant::now() >= d) {
                        return Err(AptError::Timeout { expected });
                    }
                    std::thread::sleep(READ_RETRY_DELAY);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(())
    }

    /// Bring the device's end-of-move setting in line with `wait`
    fn sync_end_of_move(&mut self, wait: bool) -> AptResult<()> {
        match (wait, self.end_of_move) {
            (true, EndOfMoveMessages::Suspended) => self.resume_end_of_move_messages(),
            (false, EndOfMoveMessages::Enabled) => self.suspend_end_of_move_messages(),
            _ => Ok(()),
        }
    }

    /// Stop the controller announcing completed moves
    pub fn suspend_end_of_move_messages(&mut self) -> AptResult<()> {
        self.send(&Frame::new(MessageId::SuspendEndOfMoveMsgs.code()))?;
        self.end_of_move = EndOfMoveMessages::Suspended;
        Ok(())
    }

    /// Have the controller announce completed moves again
    pub fn resume_end_of_move_messages(&mut self) -> AptResult<()> {
        self.send(&Frame::new(MessageId::ResumeEndOfMoveMsgs.code()))?;
        self.end_of_move = EndOfMoveMessages::Enabled;
        Ok(())
    }

    /// Poll status until the reported velocity is exactly zero
    ///
    /// Completion messages arrive while the stage may still be jittering.
    fn settle(&mut self, mut status: ControllerStatus, channel: u16) -> AptResult<ControllerStatus> {
        let poll = self.config.settle_poll();
        while !status.is_stationary() {
            std::thread::sleep(poll);
            status = self.status(channel)?;
        }
        Ok(status)
    }

    /// Current position, velocity and status bits
    pub fn status(&mut self, channel: u16) -> AptResult<ControllerStatus> {
        let profile = *self.profile()?;
        let req = Frame::with_params(
            MessageId::ReqStatusUpdate.code(),
            channel_param(channel)?,
            0,
        );
        let reply = self.round_trip(&req)?;
        ControllerStatus::parse(reply.data().unwrap_or_default(), &profile)
    }

    /// Position counter in encoder counts
    pub fn position_raw(&mut self, channel: u16) -> AptResult<i32> {
        let req = Frame::with_params(MessageId::ReqPosCounter.code(), channel_param(channel)?, 0);
        let reply = self.round_trip(&req)?;
        Ok(PositionCounter::parse(reply.data().unwrap_or_default())?.position)
    }

    /// Position in mm
    pub fn position(&mut self, channel: u16) -> AptResult<f64> {
        let profile = *self.profile()?;
        let raw = self.position_raw(channel)?;
        Ok(profile.to_mm(raw))
    }

    /// Move to an absolute position in mm
    ///
    /// With soft limits on, targets outside the linear range fail with
    /// `OutOfRange` before anything is sent. Non-finite targets are always
    /// rejected. With `wait`, returns once the
    /// move completed and the stage reports zero velocity.
    pub fn goto(
        &mut self,
        position: f64,
        channel: u16,
        wait: bool,
    ) -> AptResult<Option<ControllerStatus>> {
        let profile = *self.profile()?;
        let raw = if self.soft_limits {
            profile.checked_raw_position(position)?
        } else {
            profile.try_to_raw_position(position)?
        };

        self.sync_end_of_move(wait)?;

        debug!(position, raw, channel, "move absolute");
        let req = Frame::with_data(
            MessageId::MoveAbsolute.code(),
            move_absolute_data(channel, raw),
        );

        if !wait {
            self.send(&req)?;
            return Ok(None);
        }

        let reply = self.round_trip(&req)?;
        let status = ControllerStatus::parse(reply.data().unwrap_or_default(), &profile)?;
        self.settle(status, channel).map(Some)
    }

    /// Move by a distance in mm from the current position
    pub fn move_by(
        &mut self,
        distance: f64,
        channel: u16,
        wait: bool,
    ) -> AptResult<Option<ControllerStatus>> {
        let current = self.position(channel)?;
        self.goto(current + distance, channel, wait)
    }

    /// Raw homing parameters as stored on the controller
    pub fn home_parameters(&mut self, channel: u16) -> AptResult<HomeParams> {
        let req = Frame::with_params(MessageId::ReqHomeParams.code(), channel_param(channel)?, 0);
        let reply = self.round_trip(&req)?;
        HomeParams::parse(reply.data().unwrap_or_default())
    }

    /// Home the stage
    ///
    /// The current homing parameters are read back and only the velocity
    /// (when given, capped at the stage maximum) and the offset (limited to
    /// 0..=end of travel) are replaced. With `wait`, returns the status once
    /// the controller reports the stage homed.
    pub fn home(
        &mut self,
        wait: bool,
        velocity: Option<f64>,
        offset: f64,
    ) -> AptResult<Option<ControllerStatus>> {
        let profile = *self.profile()?;
        let channel = DEFAULT_CHANNEL;

        let mut params = self.home_parameters(channel)?;
        if let Some(velocity) = velocity {
            params.velocity = profile.to_raw_velocity(profile.clamp_velocity(velocity));
        }
        params.offset = profile.to_raw_position(profile.clamp_offset(offset));

        self.send(&Frame::with_data(
            MessageId::SetHomeParams.code(),
            params.to_bytes(),
        ))?;

        self.sync_end_of_move(wait)?;

        info!(
            velocity = params.velocity,
            offset = params.offset,
            wait,
            "homing"
        );
        let req = Frame::with_params(MessageId::MoveHome.code(), channel_param(channel)?, 0);

        if !wait {
            self.send(&req)?;
            return Ok(None);
        }

        self.round_trip(&req)?;
        self.status(channel).map(Some)
    }

    /// Stop the motor
    ///
    /// With `wait`, returns once the controller reports the stop and the
    /// stage reports zero velocity.
    pub fn stop(
        &mut self,
        channel: u16,
        immediate: bool,
        wait: bool,
    ) -> AptResult<Option<ControllerStatus>> {
        self.sync_end_of_move(wait)?;

        let mode = if immediate {
            StopMode::Immediate
        } else {
            StopMode::Profiled
        };
        let req = Frame::with_params(
            MessageId::MoveStop.code(),
            channel_param(channel)?,
            mode.code(),
        );

        if !wait {
            self.send(&req)?;
            return Ok(None);
        }

        self.round_trip(&req)?;
        let status = self.status(channel)?;
        self.settle(status, channel).map(Some)
    }

    /// Trapezoidal velocity parameters in controller units
    pub fn velocity_parameters_raw(&mut self, channel: u16) -> AptResult<VelocityParams> {
        let req = Frame::with_params(MessageId::ReqVelParams.code(), channel_param(channel)?, 0);
        let reply = self.round_trip(&req)?;
        VelocityParams::parse(reply.data().unwrap_or_default())
    }

    /// Trapezoidal velocity parameters in mm/s and mm/s²
    pub fn velocity_parameters(&mut self, channel: u16) -> AptResult<VelocityProfile> {
        let profile = *self.profile()?;
        let raw = self.velocity_parameters_raw(channel)?;
        Ok(VelocityProfile {
            min_velocity: profile.velocity_from_raw(raw.min_velocity),
            acceleration: profile.acceleration_from_raw(raw.acceleration),
            max_velocity: profile.velocity_from_raw(raw.max_velocity),
        })
    }

    /// Write the trapezoidal velocity parameters
    ///
    /// Missing values default to the stage maxima, and every value is capped
    /// at them. The minimum velocity is always zero.
    pub fn set_velocity_parameters(
        &mut self,
        acceleration: Option<f64>,
        max_velocity: Option<f64>,
        channel: u16,
    ) -> AptResult<()> {
        let profile = *self.profile()?;
        let acceleration =
            profile.clamp_acceleration(acceleration.unwrap_or(profile.max_acceleration()));
        let max_velocity = profile.clamp_velocity(max_velocity.unwrap_or(profile.max_velocity()));

        let params = VelocityParams {
            channel,
            min_velocity: 0,
            acceleration: profile.to_raw_acceleration(acceleration),
            max_velocity: profile.to_raw_velocity(max_velocity),
        };
        debug!(?params, "set velocity parameters");
        self.send(&Frame::with_data(
            MessageId::SetVelParams.code(),
            params.to_bytes(),
        ))
    }

    /// Hardware information
    pub fn info(&mut self) -> AptResult<HardwareInfo> {
        let reply = self.round_trip(&Frame::new(MessageId::HwReqInfo.code()))?;
        HardwareInfo::parse(reply.data().unwrap_or_default())
    }

    /// Flash the front panel LED
    pub fn identify(&mut self) -> AptResult<()> {
        self.send(&Frame::new(MessageId::Identify.code()))
    }

    /// Tell the controller the host is alive
    ///
    /// Over USB this (or any status round trip) is needed about once a second
    /// or the controller stops responding. Scheduling it is up to the caller.
    pub fn keepalive(&mut self) -> AptResult<()> {
        self.send(&Frame::new(MessageId::AckStatusUpdate.code()))
    }

    /// Restore EEPROM defaults (supported by few controllers)
    pub fn reset_parameters(&mut self) -> AptResult<()> {
        self.send(&Frame::new(MessageId::ResetDefaults.code()))
    }

    /// Stop the stage without waiting and release the transport
    ///
    /// The transport is released even if the stop could not be sent.
    pub fn close(&mut self) -> AptResult<()> {
        if self.transport.is_none() {
            return Ok(());
        }

        let stopped = self.stop(DEFAULT_CHANNEL, false, false);
        let closed = match self.transport.take() {
            Some(mut transport) => transport.close().map_err(AptError::from),
            None => Ok(()),
        };
        info!("controller session closed");

        stopped?;
        closed
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("error closing controller: {}", e);
        }
    }
}

/// Channel numbers travel in a single header byte
fn channel_param(channel: u16) -> AptResult<u8> {
    u8::try_from(channel)
        .map_err(|_| AptError::InvalidPayload(format!("channel {} does not fit a byte", channel)))
}
