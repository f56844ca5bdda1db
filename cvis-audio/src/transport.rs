//! Output route selection
//!
//! Audio goes to a wireless headset when the radio stack can carry it and to
//! the wired output otherwise. Only a hard radio failure stops bring-up.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

/// Physical route the audio output takes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputRoute {
    Bluetooth,
    Wired,
}

impl std::fmt::Display for OutputRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputRoute::Bluetooth => write!(f, "bluetooth"),
            OutputRoute::Wired => write!(f, "wired"),
        }
    }
}

/// Wireless audio transport bring-up
pub trait WirelessTransport {
    /// Initialize the radio stack for audio streaming.
    ///
    /// Returns [`Error::NotSupported`] when the hardware cannot stream audio.
    fn init(&mut self) -> Result<()>;

    fn name(&self) -> &str;
}

/// Transport for hosts without an audio-capable radio
#[derive(Debug, Default)]
pub struct NoWirelessAudio;

impl WirelessTransport for NoWirelessAudio {
    fn init(&mut self) -> Result<()> {
        Err(Error::NotSupported(
            "no audio streaming profile on this host".to_string(),
        ))
    }

    fn name(&self) -> &str {
        "none"
    }
}

/// Bring up the wireless transport and pick the output route.
///
/// `NotSupported` falls back to the wired route; any other failure is returned.
pub fn select_output_route(transport: &mut dyn WirelessTransport) -> Result<OutputRoute> {
    match transport.init() {
        Ok(()) => {
            info!("Wireless transport '{}' ready, routing audio over Bluetooth", transport.name());
            Ok(OutputRoute::Bluetooth)
        }
        Err(Error::NotSupported(reason)) => {
            warn!(
                "Wireless audio not supported ({}), routing audio to the wired output",
                reason
            );
            Ok(OutputRoute::Wired)
        }
        Err(e) => {
            error!("Wireless transport '{}' failed to initialize: {}", transport.name(), e);
            Err(e)
        }
    }
}
