use embassy_rp::{Peripheral, dma, gpio, spi};
use embassy_time::Timer;

use datetime::LocalTime;

/// Digits are decoded by one BCD driver per tube, codes above 9 blank the tube.
const BLANK: u8 = 0x0f;

/// Six BCD digits, two per byte, the rightmost tube shifted out first.
#[derive(Copy, Clone, Debug, PartialEq, defmt::Format)]
pub struct Payload(pub [u8; 3]);

impl Payload {
    pub const BLANK: Payload = Payload([BLANK << 4 | BLANK; 3]);

    fn pair(v: u8) -> u8 {
        (v / 10 % 10) << 4 | v % 10
    }

    /// hh:mm:ss
    pub fn time(t: &LocalTime) -> Self {
        Self([
            Self::pair(t.second),
            Self::pair(t.minute),
            Self::pair(t.hour),
        ])
    }

    /// DD.MM.YY
    pub fn date(t: &LocalTime) -> Self {
        Self([
            Self::pair((t.year % 100) as u8),
            Self::pair(t.month),
            Self::pair(t.day),
        ])
    }
}

/// Nixie tubes behind shift registers with a latch and an output enable.
pub struct Display<'d, Spi>
where
    Spi: spi::Instance,
{
    spi: spi::Spi<'d, Spi, spi::Async>,
    gpio_noe: gpio::Output<'d>,
    gpio_le: gpio::Output<'d>,
}

impl<'d, Spi> Display<'d, Spi>
where
    Spi: spi::Instance,
{
    pub fn new(
        spi: impl Peripheral<P = Spi> + 'd,
        spi_clk: impl Peripheral<P = impl spi::ClkPin<Spi>> + 'd,
        spi_tx: impl Peripheral<P = impl spi::MosiPin<Spi>> + 'd,
        spi_tx_dma: impl Peripheral<P = impl dma::Channel> + 'd,
        gpio_noe: impl Peripheral<P = impl gpio::Pin> + 'd,
        gpio_le: impl Peripheral<P = impl gpio::Pin> + 'd,
    ) -> Self {
        let spi_config = {
            let mut c = spi::Config::default();
            c.frequency = 1_000_000;
            c.phase = spi::Phase::CaptureOnFirstTransition;
            c.polarity = spi::Polarity::IdleLow;
            c
        };
        Self {
            spi: spi::Spi::new_txonly(spi, spi_clk, spi_tx, spi_tx_dma, spi_config),
            gpio_noe: gpio::Output::new(gpio_noe, gpio::Level::High),
            gpio_le: gpio::Output::new(gpio_le, gpio::Level::Low),
        }
    }

    /// Shifts `payload` out and latches it.
    pub async fn show(&mut self, payload: &Payload) -> Result<(), spi::Error> {
        self.spi.write(&payload.0).await?;
        self.gpio_le.set_high();
        Timer::after_micros(1).await;
        self.gpio_le.set_low();
        Ok(())
    }

    pub fn output(&mut self, on: bool) {
        self.gpio_noe.set_level(if on {
            gpio::Level::Low
        } else {
            gpio::Level::High
        });
    }
}
