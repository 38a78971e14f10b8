//! Backlight dimming on a PWM channel B output

use embassy_rp::pwm::{ChannelBPin, Config, Pwm, Slice};
use embassy_rp::Peri;

/// PWM counter wrap; one duty step per count
const TOP: u16 = glance_hal::backlight::MAX_DUTY as u16;

/// Backlight driven from the B output of a PWM slice (GP13 is PWM6 B)
pub struct PwmBacklight<'d> {
    pwm: Pwm<'d>,
    config: Config,
}

impl<'d> PwmBacklight<'d> {
    /// Start at full brightness (duty 0)
    pub fn new<T: Slice>(slice: Peri<'d, T>, pin: Peri<'d, impl ChannelBPin<T>>) -> Self {
        let mut config = Config::default();
        config.top = TOP;
        // ~1.9 kHz at 125 MHz sysclk, well clear of visible flicker.
        config.divider = 255u8.into();
        config.compare_b = 0;

        let pwm = Pwm::new_output_b(slice, pin, config.clone());
        Self { pwm, config }
    }
}

impl glance_hal::Backlight for PwmBacklight<'_> {
    fn set_duty(&mut self, duty: u8) {
        self.config.compare_b = u16::from(duty);
        self.pwm.set_config(&self.config);
    }
}
