#![no_std]
#![no_main]

use core::cell::RefCell;

use embassy_executor::{InterruptExecutor, Spawner};
use embassy_futures::select::{Either3, select3};
use embassy_rp::gpio;
use embassy_rp::interrupt;
use embassy_rp::interrupt::{InterruptExt, Priority};
use embassy_rp::peripherals::UART0;
use embassy_rp::uart;
use embassy_sync::blocking_mutex::{Mutex, raw::CriticalSectionRawMutex};
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Ticker};
use static_cell::StaticCell;

use datetime::{LocalTime, Settings, recalc_local_time};
use sirf::{GpsStatus, Message, Receiver, UtcInstant};
use timebase::{StatusBlinker, TimeBase};

use nixie_clock::{
    display::{Display, Payload},
    flash::SettingsStore,
    gps::{ClockSignal, FrameSignal, Gps, SharedReceiver},
    mutex::TickIrqRawMutex,
};

use {defmt_rtt as _, panic_probe as _};

embassy_rp::bind_interrupts!(struct Irqs {
    UART0_IRQ => uart::BufferedInterruptHandler<UART0>;
});

const TICK_HZ: u64 = 10;
const TICKS_PER_DAY: u32 = 86_400 * TICK_HZ as u32;

const FLASH_SIZE: usize = 2 * 1024 * 1024; // W25Q16JV

static EXECUTOR_TICK: InterruptExecutor = InterruptExecutor::new();

static TIME_BASE: TimeBase<TickIrqRawMutex> = TimeBase::new(TICKS_PER_DAY);
static RECEIVER: SharedReceiver = Mutex::new(RefCell::new(Receiver::new()));

static TICK: Signal<CriticalSectionRawMutex, ()> = Signal::new();
static FRAME_READY: FrameSignal = FrameSignal::new();
static FRAME_DONE: FrameSignal = FrameSignal::new();
static CLOCK: ClockSignal = ClockSignal::new();

#[interrupt]
unsafe fn SWI_IRQ_1() {
    unsafe { EXECUTOR_TICK.on_interrupt() }
}

/// Shows the date for a few seconds every minute
fn payload(t: &LocalTime) -> Payload {
    match t.second {
        30..=32 => Payload::date(t),
        _ => Payload::time(t),
    }
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let p = embassy_rp::init(Default::default());

    defmt::info!("Hello World!");

    let settings = match SettingsStore::<_, FLASH_SIZE>::new(p.FLASH).read_or_default() {
        Ok(settings) => settings,
        Err(e) => {
            defmt::warn!("failed to read settings ({}), using defaults", e);
            Settings::default()
        }
    };
    defmt::info!("{}", settings);

    let mut display = Display::new(p.SPI0, p.PIN_2, p.PIN_3, p.DMA_CH0, p.PIN_4, p.PIN_5);
    if let Err(e) = display.show(&Payload::BLANK).await {
        defmt::warn!("display: {}", e);
    }
    display.output(true);

    let led = gpio::Output::new(p.PIN_25, gpio::Level::Low);
    interrupt::SWI_IRQ_1.set_priority(Priority::P2);
    let tick_spawner = EXECUTOR_TICK.start(interrupt::SWI_IRQ_1);
    defmt::unwrap!(tick_spawner.spawn(task_tick(led)));

    let gps = {
        static UART0_BUF_TX: StaticCell<[u8; 64]> = StaticCell::new();
        static UART0_BUF_RX: StaticCell<[u8; 256]> = StaticCell::new();
        Gps::new(
            p.UART0,
            p.PIN_0,
            p.PIN_1,
            UART0_BUF_TX.init([0; 64]).as_mut_slice(),
            UART0_BUF_RX.init([0; 256]).as_mut_slice(),
            Irqs,
            &RECEIVER,
        )
    };
    defmt::unwrap!(spawner.spawn(task_gps(gps)));

    let mut synced = false;
    let mut status = GpsStatus::default();
    let mut shown = Payload::BLANK;

    loop {
        let clock = match select3(TICK.wait(), FRAME_READY.wait(), CLOCK.wait()).await {
            Either3::First(()) => {
                if let (Some(elapsed), true) = (TIME_BASE.take(), synced) {
                    let next = payload(&recalc_local_time(elapsed, &settings));
                    if next != shown {
                        match display.show(&next).await {
                            Ok(()) => shown = next,
                            Err(e) => defmt::warn!("display: {}", e),
                        }
                    }
                }
                None
            }
            Either3::Second(()) => {
                let result = RECEIVER.lock(|r| {
                    let mut r = r.borrow_mut();
                    if let Some(frame) = r.frame() {
                        defmt::debug!("frame: {=[u8]:x}", frame);
                    }
                    r.process_received()
                });
                FRAME_DONE.signal(());
                match result {
                    Some(Ok(Message::Clock(t))) => Some(t),
                    Some(Ok(msg)) => {
                        defmt::debug!("{}", msg);
                        None
                    }
                    Some(Err(e)) => {
                        defmt::warn!("{}", e);
                        None
                    }
                    None => None,
                }
            }
            Either3::Third(t) => Some(t),
        };

        if let Some(t) = clock {
            rebase(t);
            synced = true;
        }

        let next = RECEIVER.lock(|r| r.borrow().status());
        if next != status {
            defmt::info!("GPS status: {} -> {}", status, next);
            status = next;
        }
    }
}

fn rebase(t: UtcInstant) {
    defmt::debug!("clock: {}.{}", t.unix_secs(), t.tenths());
    TIME_BASE.set(t.elapsed());
}

#[embassy_executor::task]
async fn task_tick(mut led: gpio::Output<'static>) {
    let mut ticker = Ticker::every(Duration::from_hz(TICK_HZ));
    let mut blinker = StatusBlinker::new();
    loop {
        ticker.next().await;
        TIME_BASE.tick();
        let status = RECEIVER.lock(|r| {
            let mut r = r.borrow_mut();
            r.handle_tick();
            r.status()
        });
        led.set_level(blinker.tick(status).into());
        TICK.signal(());
    }
}

#[embassy_executor::task]
async fn task_gps(mut gps: Gps<'static, UART0>) {
    gps.run(&FRAME_READY, &FRAME_DONE, &CLOCK).await
}
