use embassy_rp::Peripheral;
use embassy_rp::flash::{self, Blocking, ERASE_SIZE, Flash, Instance};

use datetime::Settings;

#[derive(defmt::Format, Debug)]
pub enum Error {
    Flash(flash::Error),
    Postcard(postcard::Error),
}

/// Size of the COBS-encoded settings, rounded up
const BUF_LEN: usize = 64;

/// [`Settings`] stored in the last erase block of the flash.
pub struct SettingsStore<'d, T, const FLASH_SIZE: usize>
where
    T: Instance,
{
    buf: [u8; BUF_LEN],
    flash: Flash<'d, T, Blocking, FLASH_SIZE>,
}

impl<'d, T, const FLASH_SIZE: usize> SettingsStore<'d, T, FLASH_SIZE>
where
    T: Instance,
{
    const OFFSET: u32 = (FLASH_SIZE - ERASE_SIZE) as u32;

    pub fn new(flash: impl Peripheral<P = T> + 'd) -> Self {
        Self {
            buf: [0; BUF_LEN],
            flash: Flash::<_, Blocking, FLASH_SIZE>::new_blocking(flash),
        }
    }

    /// Reads the settings, writing the defaults if the block holds none.
    pub fn read_or_default(&mut self) -> Result<Settings, Error> {
        match self.read() {
            r @ Ok(..) | r @ Err(Error::Flash(..)) => r,
            Err(e) => {
                defmt::info!("no settings in flash ({}), writing defaults", e);
                let default = Settings::default();
                self.write(&default)?;
                Ok(default)
            }
        }
    }

    pub fn read(&mut self) -> Result<Settings, Error> {
        self.flash.blocking_read(Self::OFFSET, self.buf.as_mut_slice())?;
        Ok(postcard::from_bytes_cobs(self.buf.as_mut_slice())?)
    }

    pub fn write(&mut self, settings: &Settings) -> Result<(), Error> {
        let data = postcard::to_slice_cobs(settings, self.buf.as_mut_slice())?;
        self.flash
            .blocking_erase(Self::OFFSET, Self::OFFSET + ERASE_SIZE as u32)?;
        self.flash.blocking_write(Self::OFFSET, data)?;
        Ok(())
    }
}

impl From<flash::Error> for Error {
    fn from(e: flash::Error) -> Self {
        Self::Flash(e)
    }
}

impl From<postcard::Error> for Error {
    fn from(e: postcard::Error) -> Self {
        Self::Postcard(e)
    }
}
