use core::cell::RefCell;

use embassy_futures::select::{Either, select};
use embassy_rp::interrupt::typelevel::Binding;
use embassy_rp::{Peripheral, uart};
use embassy_sync::blocking_mutex::{Mutex, raw::CriticalSectionRawMutex};
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Timer, with_timeout};
use embedded_io_async::{Read, Write};

use sirf::command::{SWITCH_TO_BINARY, SetMessageRate, encode_nmea};
use sirf::message::MID_CLOCK_STATUS;
use sirf::{Message, Receiver, UtcInstant};

/// Receiver shared between the UART task, the tick task and the main loop
pub type SharedReceiver = Mutex<CriticalSectionRawMutex, RefCell<Receiver>>;

pub type FrameSignal = Signal<CriticalSectionRawMutex, ()>;

/// Clock messages interpreted by the driver itself, during setup
pub type ClockSignal = Signal<CriticalSectionRawMutex, UtcInstant>;

/// Seconds between two clock messages
const CLOCK_STATUS_RATE: u8 = 10;

const ACK_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Copy, Clone, Debug, PartialEq, defmt::Format)]
enum State {
    Reset,
    Setup,
    Ready,
}

/// SiRF receiver on a UART, 4800 bauds 8N1.
pub struct Gps<'d, T>
where
    T: uart::Instance,
{
    uart: uart::BufferedUart<'d, T>,
    receiver: &'d SharedReceiver,
    buf: [u8; 32],
    pos: usize,
    len: usize,
}

impl<'d, T> Gps<'d, T>
where
    T: uart::Instance,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        uart: impl Peripheral<P = T> + 'd,
        uart_tx: impl Peripheral<P = impl uart::TxPin<T>> + 'd,
        uart_rx: impl Peripheral<P = impl uart::RxPin<T>> + 'd,
        uart_tx_buffer: &'d mut [u8],
        uart_rx_buffer: &'d mut [u8],
        irq: impl Binding<T::Interrupt, uart::BufferedInterruptHandler<T>>,
        receiver: &'d SharedReceiver,
    ) -> Self {
        let uart_config = {
            let mut c = uart::Config::default();
            c.baudrate = 4800;
            c.data_bits = uart::DataBits::DataBits8;
            c.parity = uart::Parity::ParityNone;
            c.stop_bits = uart::StopBits::STOP1;
            c
        };

        Self {
            uart: uart::BufferedUart::new(
                uart,
                irq,
                uart_tx,
                uart_rx,
                uart_tx_buffer,
                uart_rx_buffer,
                uart_config,
            ),
            receiver,
            buf: [0; 32],
            pos: 0,
            len: 0,
        }
    }

    /// Initializes the receiver, then feeds it forever.
    ///
    /// `frame_ready` is signaled on every complete frame, and no byte is fed
    /// until `frame_done` is signaled back.
    pub async fn run(
        &mut self,
        frame_ready: &FrameSignal,
        frame_done: &FrameSignal,
        clock: &ClockSignal,
    ) -> ! {
        let mut state = State::Reset;
        loop {
            let next_state = match state {
                State::Reset => self.do_reset().await,
                State::Setup => self.do_setup(clock).await,
                State::Ready => self.do_receive(frame_ready, frame_done).await,
            };
            if next_state != state {
                defmt::info!("GPS: {} -> {}", state, next_state);
                state = next_state;
            }
        }
    }

    async fn do_reset(&mut self) -> State {
        self.receiver.lock(|r| r.borrow_mut().reset());
        Timer::after_secs(1).await;
        State::Setup
    }

    async fn do_setup(&mut self, clock: &ClockSignal) -> State {
        let mut sentence = [0; 32];
        let switch_to_binary = match encode_nmea(SWITCH_TO_BINARY, &mut sentence) {
            Ok(s) => s,
            Err(e) => {
                defmt::error!("{}", e);
                return State::Reset;
            }
        };
        if let Err(e) = self.send(switch_to_binary).await {
            defmt::warn!("UART write failed ({})", e);
            return State::Reset;
        }
        Timer::after_millis(100).await;

        if let Err(e) = self.send(&SetMessageRate::disable_all().frame()).await {
            defmt::warn!("UART write failed ({})", e);
            return State::Reset;
        }
        self.drain().await;
        self.receiver.lock(|r| r.borrow_mut().reset());

        let mut commands = [0; 2 * SetMessageRate::FRAME_LEN];
        let (every, poll) = commands.split_at_mut(SetMessageRate::FRAME_LEN);
        every.copy_from_slice(&SetMessageRate::every(MID_CLOCK_STATUS, CLOCK_STATUS_RATE).frame());
        poll.copy_from_slice(&SetMessageRate::poll(MID_CLOCK_STATUS).frame());
        if let Err(e) = self.send(&commands).await {
            defmt::warn!("UART write failed ({})", e);
            return State::Reset;
        }

        match with_timeout(ACK_TIMEOUT, self.wait_ack(clock)).await {
            Ok(true) => State::Ready,
            Ok(false) => State::Reset,
            Err(..) => {
                defmt::warn!("no acknowledgment from the receiver");
                State::Reset
            }
        }
    }

    async fn do_receive(&mut self, frame_ready: &FrameSignal, frame_done: &FrameSignal) -> State {
        loop {
            match self.next_byte().await {
                Ok(byte) => {
                    defmt::trace!("rx {=u8:#x}", byte);
                    if self.receiver.lock(|r| r.borrow_mut().handle_serial_rx(byte)) {
                        frame_ready.signal(());
                        frame_done.wait().await;
                    }
                }
                Err(e) => {
                    defmt::warn!("error while reading UART: {}", e);
                    self.receiver.lock(|r| r.borrow_mut().handle_serial_error());
                }
            }
        }
    }

    /// Feeds bytes until a command is acknowledged. Returns `false` on a fault.
    ///
    /// Clock messages received meanwhile are passed on through `clock`.
    async fn wait_ack(&mut self, clock: &ClockSignal) -> bool {
        loop {
            let result = match self.next_byte().await {
                Ok(byte) => self.receiver.lock(|r| {
                    let mut r = r.borrow_mut();
                    if r.handle_serial_rx(byte) {
                        r.process_received()
                    } else {
                        None
                    }
                }),
                Err(e) => {
                    defmt::warn!("error while reading UART: {}", e);
                    self.receiver.lock(|r| r.borrow_mut().handle_serial_error());
                    return false;
                }
            };

            match result {
                Some(Ok(Message::Ack)) => return true,
                Some(Ok(Message::Clock(t))) => clock.signal(t),
                Some(Ok(msg)) => defmt::debug!("{}", msg),
                Some(Err(e)) => {
                    defmt::warn!("invalid frame during setup: {}", e);
                    return false;
                }
                None => {
                    let status = self.receiver.lock(|r| r.borrow().status());
                    if status.is_fault() {
                        defmt::warn!("receiver fault during setup: {}", status);
                        return false;
                    }
                }
            }
        }
    }

    async fn send(&mut self, data: &[u8]) -> Result<(), uart::Error> {
        self.uart.write_all(data).await?;
        self.uart.flush().await
    }

    /// Discards everything until the line has been quiet for a while.
    async fn drain(&mut self) {
        self.pos = self.len;
        let quiet = async {
            loop {
                if let Either::Second(..) =
                    select(self.next_byte(), Timer::after_millis(200)).await
                {
                    return;
                }
            }
        };
        if with_timeout(Duration::from_secs(2), quiet).await.is_err() {
            defmt::warn!("receiver keeps sending while draining");
        }
    }

    async fn next_byte(&mut self) -> Result<u8, uart::Error> {
        while self.pos == self.len {
            self.len = self.uart.read(&mut self.buf).await?;
            self.pos = 0;
        }
        let byte = self.buf[self.pos];
        self.pos += 1;
        Ok(byte)
    }
}
