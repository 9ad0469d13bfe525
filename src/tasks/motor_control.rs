//! Motor control task
//!
//! The fast periodic context: a 2.5 kHz loop that samples the ADC,
//! conditions the bus current, runs the hall estimator and steps either
//! the hall sequence identifier (once, at startup) or the six-step
//! control state machine, then applies the result to the inverter.

use core::sync::atomic::Ordering;

use embassy_stm32::adc::{Adc, AnyAdcChannel};
use embassy_stm32::peripherals;
use embassy_time::{Duration, Ticker};

use crate::config::{
    AVG_FILTER_SCALE, CONTROL_LOOP, CONTROL_PERIOD_US, CURRENT_LPF_GAIN, CURRENT_PI,
    IDENT_ABORT_ON_FAILURE, IDENT_COMMUTATION_INTERVAL, IDENT_CURRENT_LIMIT, IDENT_PI,
    MAXIMUM_SPEED_RPM, MINIMUM_SPEED_RPM, MOTOR_STOP_COUNTS, OFFSET_COUNT_BITS, POLE_PAIRS,
    RATED_BUS_CURRENT, SPEED_MULTIPLIER, SPEED_PI,
};
use crate::fmt::*;
use crate::hall_tim;
use crate::hardware::HallPins;
use crate::motor_driver::MotorDriver;
use crate::sixstep::{
    ControlInputs, HallEstimator, HallSeqIdentifier, MeasureCurrent, MotorParameters,
    SixStepControl,
};
use crate::state::{DIRECTION_COMMAND, MOTOR_STATUS, RUN_COMMAND};

/// Status snapshot rate: every 100 ms of control ticks
const STATUS_DIVIDER: u32 = 250;

/// Debug dump rate: once per second
const LOG_DIVIDER: u32 = 2500;

/// Left-justify a 12-bit ADC reading to the Q15 count range.
fn adc_to_counts(raw: u16) -> i16 {
    ((raw as i32) << 3) as i16
}

#[embassy_executor::task]
pub async fn motor_control_task(
    mut driver: MotorDriver,
    mut adc: Adc<'static, peripherals::ADC1>,
    mut ibus_pin: AnyAdcChannel<peripherals::ADC1>,
    mut pot_pin: AnyAdcChannel<peripherals::ADC1>,
    hall: HallPins,
) {
    info!(
        "Motor control task started ({} Hz loop, pole pairs={})",
        1_000_000 / CONTROL_PERIOD_US as u32,
        POLE_PAIRS
    );

    let motor = MotorParameters {
        pole_pairs: POLE_PAIRS,
        min_speed_rpm: MINIMUM_SPEED_RPM,
        max_speed_rpm: MAXIMUM_SPEED_RPM,
        rated_current: RATED_BUS_CURRENT,
    };

    let mut measure = MeasureCurrent::new(OFFSET_COUNT_BITS, CURRENT_LPF_GAIN);
    let mut estimator = HallEstimator::new(SPEED_MULTIPLIER, MOTOR_STOP_COUNTS, AVG_FILTER_SCALE);
    let mut control = SixStepControl::new(
        motor,
        CONTROL_LOOP,
        driver.period(),
        SPEED_PI,
        CURRENT_PI,
    );
    let mut identifier = HallSeqIdentifier::new(
        driver.period(),
        IDENT_PI,
        IDENT_CURRENT_LIMIT,
        IDENT_COMMUTATION_INTERVAL,
        IDENT_ABORT_ON_FAILURE,
    );

    let mut reverse = false;
    let mut was_running = false;
    let mut offset_logged = false;
    let mut status_counter: u32 = 0;
    let mut log_counter: u32 = 0;
    let mut fault_log_counter: u32 = 0;

    driver.disable_outputs();
    hall_tim::start();

    let mut ticker = Ticker::every(Duration::from_micros(CONTROL_PERIOD_US));

    loop {
        ticker.next().await;

        let ibus_raw = adc_to_counts(adc.blocking_read(&mut ibus_pin));

        // Startup DC-offset calibration; outputs stay off until it is done.
        if !measure.offset_done() {
            measure.offset_update(ibus_raw);
            continue;
        }
        if !offset_logged {
            offset_logged = true;
            info!("Bus current offset calibration done");
        }

        let ibus = measure.calibrate(ibus_raw);
        let run = RUN_COMMAND.load(Ordering::Relaxed);

        if !run {
            if was_running {
                info!("Motor control: stopping, outputs off");
                was_running = false;
            }
            driver.disable_outputs();
            control.reset();
            estimator.reset();
            hall_tim::reset();
            // Direction changes latch freely while stopped
            reverse = DIRECTION_COMMAND.load(Ordering::Relaxed);
        } else if !identifier.is_done() {
            // One hall-sequence identification pass per power-up; the
            // estimator stays idle while the identifier owns the bridge.
            if !was_running {
                info!("Motor control: run command, starting hall identification");
                was_running = true;
            }
            let out = identifier.step(ibus, hall.read());
            if out.done {
                driver.disable_outputs();
                hall_tim::reset();
                if identifier.failed() {
                    error!(
                        "Hall identification failed ({} bad transitions), keeping default table",
                        identifier.failure_count()
                    );
                } else {
                    control.set_table(identifier.table());
                    info!("Hall identification complete, learned table installed");
                }
            } else {
                driver.apply(out.duty, out.pattern);
            }
        } else {
            if !was_running {
                info!("Motor control: run command received");
                was_running = true;
            }

            // Keep the interval timer running, snapshot it each tick and
            // zero it whenever the estimator saw an edge.
            hall_tim::start();
            let hall_status = estimator.update(hall.read(), hall_tim::read());
            if hall_status.edge {
                hall_tim::reset();
            }
            estimator.compute_speed();

            // Direction reversals only below the safe-change speed
            let direction_cmd = DIRECTION_COMMAND.load(Ordering::Relaxed);
            if direction_cmd != reverse && estimator.motor_stopped() {
                reverse = direction_cmd;
                info!(
                    "Direction change applied: {}",
                    if reverse { "reverse" } else { "forward" }
                );
            }

            // The estimator only flags sensor faults; transitioning to
            // Fault is this task's decision. Fault then sticks until a
            // stop/start cycle resets the machine.
            if hall_status.hall_failure || hall_status.timer_error {
                control.force_fault();
            }
            if estimator.hall_failure() || estimator.timer_error() {
                fault_log_counter += 1;
                if fault_log_counter >= LOG_DIVIDER {
                    fault_log_counter = 0;
                    error!(
                        "Hall sensor fault persists (hall={}, timer={})",
                        estimator.hall_failure(),
                        estimator.timer_error()
                    );
                }
            }

            let control_input = adc_to_counts(adc.blocking_read(&mut pot_pin));
            let inputs = ControlInputs {
                sector: estimator.value(),
                measured_speed: estimator.speed_rpm(),
                reverse,
                control_input,
                avg_current: measure.filtered(),
            };
            let out = control.step(&inputs);
            if out.active {
                driver.apply(out.duty, out.pattern);
            } else {
                driver.disable_outputs();
            }

            log_counter += 1;
            if log_counter >= LOG_DIVIDER {
                log_counter = 0;
                debug!(
                    "[sixstep] state={} sector={} speed={} rpm target={} duty={}",
                    control.state() as u8,
                    estimator.sector(),
                    estimator.speed_rpm(),
                    control.target_speed(),
                    control.pwm_duty()
                );
            }
        }

        // Low-rate status snapshot for the LED/logging side
        status_counter += 1;
        if status_counter >= STATUS_DIVIDER {
            status_counter = 0;
            let mut status = MOTOR_STATUS.lock().await;
            status.state = control.state();
            status.speed_rpm = estimator.speed_rpm();
            status.hall_fault = estimator.hall_failure();
            status.timer_fault = estimator.timer_error();
            status.ident_failed = identifier.failed();
        }
    }
}
