//! Task module root

pub mod buttons;
pub mod led;
pub mod motor_control;

pub use buttons::buttons_task;
pub use led::led_task;
pub use motor_control::motor_control_task;
