//! # APT Stage Core Library
//!
//! Host-side client for motorized stages driven by Thorlabs APT controllers.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - APT frame encoding and two-phase decoding
//! - A blocking controller session with reply matching by message ID
//! - Per-model stage calibration between encoder counts and mm
//! - Decoding of status, hardware info and parameter blocks
//!
//! ## Supported stages
//!
//! - MTS50-Z8
//! - LTS300
//! - KDC101 driven stages
//! - PRM1-Z8 rotation mount
//!
//! ## Example
//!
//! ```rust,ignore
//! use aptstage_core::prelude::*;
//!
//! let config = ControllerConfig::new("/dev/ttyUSB0", StageModel::Mts50);
//! let mut stage = Controller::open(config)?;
//!
//! stage.home(true, None, 0.0)?;
//! let status = stage.goto(12.5, DEFAULT_CHANNEL, true)?;
//! println!("{:?}", status);
//! ```

pub mod protocol;
pub mod stage;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::protocol::{
        AptError, AptResult, Controller, ControllerConfig, EndOfMoveMessages, Frame, MessageId,
        DEFAULT_CHANNEL,
    };
    pub use crate::stage::{
        ControllerStatus, DeviceProfile, HardwareInfo, StageModel, VelocityProfile,
    };
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
