//! Panel backlight

/// Highest duty the backlight accepts.
pub const MAX_DUTY: u8 = u8::MAX;

/// PWM-dimmed backlight
///
/// The panel's backlight enable is active-low: a duty of 0 is full
/// brightness and larger values dim it.
pub trait Backlight {
    /// Set the PWM duty (0..=[`MAX_DUTY`]).
    fn set_duty(&mut self, duty: u8);
}
