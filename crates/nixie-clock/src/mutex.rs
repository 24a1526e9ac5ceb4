use cortex_m::peripheral::NVIC;
use embassy_rp::interrupt::Interrupt;
use embassy_sync::blocking_mutex::raw::RawMutex;

/// Interrupt running the high priority executor, which drives the tick task
pub const TICK_IRQ: Interrupt = Interrupt::SWI_IRQ_1;

/// Masks the tick interrupt only, the UART interrupt keeps being served.
///
/// Data behind it must not be touched from any other interrupt.
pub struct TickIrqRawMutex;

unsafe impl RawMutex for TickIrqRawMutex {
    const INIT: Self = TickIrqRawMutex;

    fn lock<R>(&self, f: impl FnOnce() -> R) -> R {
        let enabled = NVIC::is_enabled(TICK_IRQ);
        NVIC::mask(TICK_IRQ);
        cortex_m::asm::dsb();
        cortex_m::asm::isb();

        let r = f();

        if enabled {
            // SAFETY: restores the previous state
            unsafe { NVIC::unmask(TICK_IRQ) };
        }
        r
    }
}
