//! Hardware initialization module
//!
//! Clock configuration and the bring-up pieces the control core treats as
//! external collaborators: the hall input pins and the hall interval
//! timer.

use embassy_stm32::gpio::Input;
use embassy_stm32::Config;

use crate::fmt::*;
use crate::hall_tim;
use crate::sixstep::hall::pack_hall_code;

/// RCC clock configuration: HSI -> PLL (/4 x85 /2) for 170 MHz.
pub fn create_clock_config() -> Config {
    let mut config = Config::default();
    {
        use embassy_stm32::rcc::mux::{Adcsel, ClockMux};
        use embassy_stm32::rcc::{Pll, PllMul, PllPreDiv, PllRDiv, PllSource, Sysclk};

        config.rcc.hsi = true;
        config.rcc.pll = Some(Pll {
            source: PllSource::HSI,
            prediv: PllPreDiv::DIV4,
            mul: PllMul::MUL85,
            divp: None,
            divq: None,
            divr: Some(PllRDiv::DIV2),
        });
        config.rcc.sys = Sysclk::PLL1_R;

        let mut clock_mux = ClockMux::default();
        clock_mux.adc12sel = Adcsel::SYS;
        config.rcc.mux = clock_mux;
    }
    config
}

/// Three hall sensor inputs read as plain GPIO (external pull-ups on the
/// sensor board).
pub struct HallPins {
    hall_a: Input<'static>,
    hall_b: Input<'static>,
    hall_c: Input<'static>,
}

impl HallPins {
    pub fn new(hall_a: Input<'static>, hall_b: Input<'static>, hall_c: Input<'static>) -> Self {
        Self {
            hall_a,
            hall_b,
            hall_c,
        }
    }

    /// Sample the pins into the 3-bit sector code.
    pub fn read(&self) -> u8 {
        pack_hall_code(
            self.hall_a.is_high(),
            self.hall_b.is_high(),
            self.hall_c.is_high(),
        )
    }
}

/// Hall interval timer bring-up (TIM4, 1 MHz free-running).
///
/// # Safety
/// Raw PAC register access.
pub unsafe fn init_hall_timer() {
    info!("Initializing hall interval timer (TIM4, 1 MHz)...");
    hall_tim::init();
    info!("Hall interval timer running");
}
