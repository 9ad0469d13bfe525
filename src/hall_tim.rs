//! Free-running interval timer for hall edge spacing
//!
//! TIM4 runs as a plain up-counter prescaled to 1 MHz. The estimator reads
//! the elapsed count each control tick and zeroes it on every hall edge,
//! so the counter always measures "time since the last edge". The 16-bit
//! hardware counter is extended to 32 bits by counting update interrupts;
//! the extension saturates instead of wrapping, so a stopped rotor parks
//! the reading at the ceiling until the next reset.

use core::sync::atomic::{AtomicU32, Ordering};
use embassy_stm32::pac;

use crate::config::HALL_TIMER_HZ;

/// Overflow count since the last reset.
static OVERFLOW_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Cap keeping `(overflow << 16) | count` inside u32.
const OVERFLOW_LIMIT: u32 = 0xFFFF;

/// Core clock feeding the timer before the prescaler.
const TIMER_INPUT_HZ: u32 = 170_000_000;

/// TIM4 initialization as a 1 MHz free-running counter.
///
/// # Safety
/// Raw PAC register access; call once before the control task starts.
pub unsafe fn init() {
    let rcc = pac::RCC;
    let tim4 = pac::TIM4;

    rcc.apb1enr1().modify(|w| w.set_tim4en(true));

    tim4.cr1().modify(|w| w.set_cen(false));
    tim4.psc()
        .write_value((TIMER_INPUT_HZ / HALL_TIMER_HZ - 1) as u16);
    tim4.arr().write_value(pac::timer::regs::ArrCore(0xFFFF));

    // Update interrupt extends the counter past 16 bits
    tim4.dier().modify(|w| w.set_uie(true));
    unsafe {
        cortex_m::peripheral::NVIC::unmask(pac::Interrupt::TIM4);
        let mut cp = cortex_m::Peripherals::steal();
        cp.NVIC.set_priority(pac::Interrupt::TIM4, 0x20);
    }

    tim4.cnt().write_value(pac::timer::regs::CntCore(0));
    tim4.sr().write(|w| w.0 = 0);
    tim4.egr().write(|w| w.set_ug(true));
    tim4.cr1().modify(|w| {
        w.set_cen(true);
        w.set_urs(pac::timer::vals::Urs::COUNTER_ONLY);
    });
}

/// TIM4 update interrupt: saturating overflow extension.
#[allow(non_snake_case)]
#[no_mangle]
pub unsafe extern "C" fn TIM4() {
    let tim4 = pac::TIM4;
    if tim4.sr().read().uif() {
        tim4.sr().modify(|w| w.set_uif(false));
        let _ = OVERFLOW_COUNTER.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |count| {
            if count < OVERFLOW_LIMIT {
                Some(count + 1)
            } else {
                None
            }
        });
    }
}

/// Ensure the counter is running (idempotent).
pub fn start() {
    pac::TIM4.cr1().modify(|w| w.set_cen(true));
}

/// Counts since the last reset, overflow-extended to 32 bits.
pub fn read() -> u32 {
    let count = pac::TIM4.cnt().read().cnt() as u32;
    let overflow = OVERFLOW_COUNTER.load(Ordering::Relaxed);
    (overflow << 16) | count
}

/// Zero the counter; the next `read()` measures from here.
pub fn reset() {
    pac::TIM4.cnt().write_value(pac::timer::regs::CntCore(0));
    OVERFLOW_COUNTER.store(0, Ordering::Relaxed);
}
