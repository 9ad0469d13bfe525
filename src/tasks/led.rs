//! Status LEDs
//!
//! LED1 heartbeat, LED2 mirrors the run command, LED3 latches on faults.

use core::sync::atomic::Ordering;

use embassy_stm32::gpio::Output;
use embassy_time::{Duration, Ticker};

use crate::fmt::*;
use crate::state::{MOTOR_STATUS, RUN_COMMAND};

#[embassy_executor::task]
pub async fn led_task(
    mut led_alive: Output<'static>,
    mut led_run: Output<'static>,
    mut led_fault: Output<'static>,
) {
    info!("LED task started");

    let mut ticker = Ticker::every(Duration::from_millis(100));
    let mut phase = 0u8;

    loop {
        ticker.next().await;

        phase = phase.wrapping_add(1);
        if phase % 5 == 0 {
            led_alive.toggle();
        }

        if RUN_COMMAND.load(Ordering::Relaxed) {
            led_run.set_high();
        } else {
            led_run.set_low();
        }

        let status = *MOTOR_STATUS.lock().await;
        if status.fault() {
            led_fault.set_high();
        } else {
            led_fault.set_low();
        }
    }
}
