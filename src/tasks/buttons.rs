//! Run/stop and direction push buttons
//!
//! The slow service context: edge-triggered scan with a debounce delay.
//! Both buttons only toggle their single-word command cells; the fast
//! control loop picks the commands up on its own tick.

use core::sync::atomic::Ordering;

use embassy_futures::select::{select, Either};
use embassy_stm32::exti::ExtiInput;
use embassy_time::Timer;

use crate::config::BUTTON_DEBOUNCE_MS;
use crate::fmt::*;
use crate::state::{DIRECTION_COMMAND, RUN_COMMAND};

#[embassy_executor::task]
pub async fn buttons_task(
    mut button_run: ExtiInput<'static>,
    mut button_direction: ExtiInput<'static>,
) {
    info!("Button task started");

    loop {
        match select(
            button_run.wait_for_falling_edge(),
            button_direction.wait_for_falling_edge(),
        )
        .await
        {
            Either::First(()) => {
                Timer::after_millis(BUTTON_DEBOUNCE_MS).await;
                if button_run.is_low() {
                    let run = !RUN_COMMAND.fetch_xor(true, Ordering::Relaxed);
                    info!("run command: {}", run);
                }
            }
            Either::Second(()) => {
                Timer::after_millis(BUTTON_DEBOUNCE_MS).await;
                if button_direction.is_low() {
                    let reversed = !DIRECTION_COMMAND.fetch_xor(true, Ordering::Relaxed);
                    info!(
                        "direction command: {}",
                        if reversed { "reverse" } else { "forward" }
                    );
                }
            }
        }
    }
}
