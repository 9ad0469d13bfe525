#![no_std]
#![no_main]

// This mod MUST go first, so that the others see its macros.
mod fmt;

mod config;
mod hall_tim;
mod hardware;
mod motor_driver;
mod sixstep;
mod state;
mod tasks;

#[cfg(not(feature = "defmt"))]
use panic_halt as _;
#[cfg(feature = "defmt")]
use {defmt_rtt as _, panic_probe as _};

use embassy_executor::Spawner;
use embassy_stm32::{
    adc::{Adc, AdcChannel, SampleTime},
    exti::ExtiInput,
    gpio::{Input, Level, Output, Pull, Speed},
    timer::{
        complementary_pwm::{ComplementaryPwm, ComplementaryPwmPin},
        low_level::CountingMode,
        simple_pwm::PwmPin,
        Channel,
    },
};
use embassy_time::{Duration, Timer};

use fmt::*;
use hardware::HallPins;
use motor_driver::MotorDriver;
use tasks::{buttons_task, led_task, motor_control_task};

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let clock_config = hardware::create_clock_config();
    let p = embassy_stm32::init(clock_config);

    info!("═══════════════════════════════════════════════════════");
    info!("  g4-sixstep • BLDC six-step controller");
    info!("  STM32G431VB @ 170MHz, hall-sensored trapezoidal drive");
    info!("═══════════════════════════════════════════════════════");

    // LEDs: alive / run / fault
    let led1 = Output::new(p.PC13, Level::High, Speed::Low);
    let led2 = Output::new(p.PC14, Level::Low, Speed::Low);
    let led3 = Output::new(p.PC15, Level::Low, Speed::Low);
    spawner.spawn(led_task(led1, led2, led3)).unwrap();

    // Push buttons: run/stop and direction
    let button_run = ExtiInput::new(p.PB10, p.EXTI10, Pull::Up);
    let button_direction = ExtiInput::new(p.PB11, p.EXTI11, Pull::Up);
    spawner
        .spawn(buttons_task(button_run, button_direction))
        .unwrap();

    // ADC1: bus current shunt amplifier on PC0, potentiometer on PC2
    let mut adc1 = Adc::new(p.ADC1);
    adc1.set_sample_time(SampleTime::CYCLES640_5);
    let ibus_pin = p.PC0.degrade_adc();
    let pot_pin = p.PC2.degrade_adc();

    // PWM: TIM1 three-phase complementary pairs, 50 kHz
    let mut uvw_pwm = ComplementaryPwm::new(
        p.TIM1,
        Some(PwmPin::new(
            p.PE9,
            embassy_stm32::gpio::OutputType::PushPull,
        )),
        Some(ComplementaryPwmPin::new(
            p.PE8,
            embassy_stm32::gpio::OutputType::PushPull,
        )),
        Some(PwmPin::new(
            p.PE11,
            embassy_stm32::gpio::OutputType::PushPull,
        )),
        Some(ComplementaryPwmPin::new(
            p.PE10,
            embassy_stm32::gpio::OutputType::PushPull,
        )),
        Some(PwmPin::new(
            p.PE13,
            embassy_stm32::gpio::OutputType::PushPull,
        )),
        Some(ComplementaryPwmPin::new(
            p.PE12,
            embassy_stm32::gpio::OutputType::PushPull,
        )),
        None,
        None,
        config::pwm::FREQUENCY,
        CountingMode::EdgeAlignedUp,
    );
    uvw_pwm.disable(Channel::Ch1);
    uvw_pwm.disable(Channel::Ch2);
    uvw_pwm.disable(Channel::Ch3);
    uvw_pwm.set_dead_time(config::pwm::DEAD_TIME);
    let driver = MotorDriver::new(uvw_pwm);

    // Hall sensors on PB6/PB7/PB8 plus the edge interval timer
    let hall = HallPins::new(
        Input::new(p.PB6, Pull::None),
        Input::new(p.PB7, Pull::None),
        Input::new(p.PB8, Pull::None),
    );
    unsafe {
        hardware::init_hall_timer();
    }

    info!("Starting six-step motor control...");
    spawner
        .spawn(motor_control_task(driver, adc1, ibus_pin, pot_pin, hall))
        .unwrap();

    // Main loop kept for future expansion
    loop {
        Timer::after(Duration::from_millis(100)).await;
    }
}
