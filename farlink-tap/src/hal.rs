// Copyright (C) 2025 Farlink Project
//
// MIT License

//! ESP32-C3 GPIO adapter for the bit-bang backend.
//!
//! Wraps `esp_hal::gpio::Flex` as a [`TapPin`] so a [`BitBangBus`] can be
//! built straight from the chip's pins.  Every tap line uses a `Flex` even
//! when it only ever drives one way, so the backend can flip SWDIO without
//! reconfiguring the pin.

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use esp_hal::gpio::{
    DriveMode, DriveStrength, Flex, InputConfig, InputPin, OutputConfig, OutputPin, Pull,
};

use crate::bus::{BitBangBus, TapPin};

/// A chip pin adapted to the bit-bang backend.
pub struct FlexPin<'a> {
    pin: Flex<'a>,
}

impl<'a> FlexPin<'a> {
    /// Wraps a pin, starting it as an input.
    ///
    /// No pull is configured - the target is responsible for pulling the
    /// shared lines, and only does so once the wire protocol is up.
    pub fn new(pin: impl InputPin + OutputPin + 'a) -> Self {
        let mut pin = Flex::new(pin);
        let input_config = InputConfig::default().with_pull(Pull::None);
        pin.apply_input_config(&input_config);
        let output_config = OutputConfig::default()
            .with_drive_strength(DriveStrength::_20mA)
            .with_drive_mode(DriveMode::PushPull);
        pin.apply_output_config(&output_config);
        pin.set_input_enable(true);
        FlexPin { pin }
    }
}

impl TapPin for FlexPin<'_> {
    fn set_as_output(&mut self) {
        self.pin.set_input_enable(false);
        self.pin.set_output_enable(true);
    }

    fn set_as_input(&mut self) {
        self.pin.set_output_enable(false);
        self.pin.set_input_enable(true);
    }

    fn set(&mut self, high: bool) {
        if high {
            self.pin.set_high();
        } else {
            self.pin.set_low();
        }
    }

    fn is_high(&mut self) -> bool {
        self.pin.is_high()
    }
}

/// Builds a bit-bang backend from adapted chip pins.
///
/// The caller adapts each wired pin with [`FlexPin::new()`] and passes
/// `None` for signals the board does not route.
pub fn bit_bang_bus<'a>(
    swdio: FlexPin<'a>,
    swclk: FlexPin<'a>,
    tdi: Option<FlexPin<'a>>,
    tdo: Option<FlexPin<'a>>,
    swdio_dir: Option<FlexPin<'a>>,
    swclk_dir: Option<FlexPin<'a>>,
) -> BitBangBus<FlexPin<'a>> {
    debug!(
        "gpio backend: tdi {} tdo {} dir {}",
        tdi.is_some(),
        tdo.is_some(),
        swdio_dir.is_some()
    );
    BitBangBus::new(swdio, swclk, tdi, tdo, swdio_dir, swclk_dir)
}
