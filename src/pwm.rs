//! PWM control channel.
//!
//! Same session and command shape as the GPIO channel, without any interrupt
//! handling: `i` requests and enables a chip, `r` selects the chip reported
//! by reads, `w` applies a duty cycle and period, `f` disables and frees.

use core::fmt::Write;
use core::sync::atomic::{AtomicUsize, Ordering};

use spin::Mutex;

use crate::cache::{Message, copy_out};
use crate::command::{Command, Op};
use crate::config::{PwmDeviceConfig, PwmReadMode};
use crate::error::{LineError, LineResult};
use crate::hal::{PWM_CHIP_COUNT, PwmController};
use crate::session::SessionGate;

/// One PWM chip slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PwmChip {
    pub id: usize,
    /// Nanoseconds.
    pub duty_cycle: u32,
    /// Nanoseconds.
    pub period: u32,
    /// Requested and enabled.
    pub active: bool,
}

/// Fixed table of PWM chips guarded by one configuration lock.
pub struct PwmTable<P> {
    chips: Mutex<[PwmChip; PWM_CHIP_COUNT]>,
    limit: usize,
    hw: P,
}

impl<P: PwmController> PwmTable<P> {
    /// Creates a table accepting ids below `limit` (clamped to the table size).
    pub fn new(hw: P, limit: usize) -> Self {
        Self {
            chips: Mutex::new(core::array::from_fn(|id| PwmChip {
                id,
                ..Default::default()
            })),
            limit: limit.min(PWM_CHIP_COUNT),
            hw,
        }
    }

    /// Gets a reference to the PWM controller.
    #[inline]
    pub fn controller(&self) -> &P {
        &self.hw
    }

    fn check(&self, id: u32) -> LineResult<usize> {
        let id = id as usize;
        if id < self.limit {
            Ok(id)
        } else {
            Err(LineError::InvalidIdentifier)
        }
    }

    /// Snapshot of one chip.
    pub fn chip(&self, id: u32) -> LineResult<PwmChip> {
        let id = self.check(id)?;
        Ok(self.chips.lock()[id])
    }

    /// Requests and enables chip `id`. Already active chips are left alone.
    pub fn configure(&self, id: u32) -> LineResult {
        let id = self.check(id)?;
        let mut chips = self.chips.lock();
        let chip = &mut chips[id];

        if chip.active {
            return Ok(());
        }

        self.hw.request(id)?;
        if let Err(err) = self.hw.enable(id) {
            self.hw.free(id);
            warn!("PWM chip {} enable failed: {:?}", id, err);
            return Err(err.into());
        }

        chip.active = true;
        info!(
            "PWM chip {} configured: period {} duty cycle {}",
            id, chip.period, chip.duty_cycle
        );
        Ok(())
    }

    /// Applies `duty_cycle` and `period` to an active chip.
    ///
    /// The pair is only recorded once the hardware accepted it. Returns
    /// whether the chip was active.
    pub fn update(&self, id: u32, duty_cycle: u32, period: u32) -> LineResult<bool> {
        let id = self.check(id)?;
        let mut chips = self.chips.lock();
        let chip = &mut chips[id];

        if !chip.active {
            return Ok(false);
        }

        self.hw.config(id, duty_cycle, period)?;
        chip.duty_cycle = duty_cycle;
        chip.period = period;
        debug!("PWM chip {} set to {}/{}", id, duty_cycle, period);
        Ok(true)
    }

    /// Disables and frees chip `id`. Returns whether it was active.
    pub fn free(&self, id: u32) -> LineResult<bool> {
        let id = self.check(id)?;
        let mut chips = self.chips.lock();
        let chip = &mut chips[id];

        if !chip.active {
            return Ok(false);
        }
        self.release(chip);
        Ok(true)
    }

    /// Frees every active chip. Returns how many were released.
    pub fn teardown(&self) -> usize {
        let mut chips = self.chips.lock();
        let mut released = 0;
        for chip in chips.iter_mut().filter(|chip| chip.active) {
            self.release(chip);
            released += 1;
        }
        released
    }

    fn release(&self, chip: &mut PwmChip) {
        self.hw.disable(chip.id);
        self.hw.free(chip.id);
        *chip = PwmChip {
            id: chip.id,
            ..Default::default()
        };
        info!("PWM chip {} freed", chip.id);
    }

    /// Writes the read result for `mode` into `message`.
    fn render(&self, mode: PwmReadMode, selected: usize, message: &mut Message) {
        let chips = self.chips.lock();
        // Results are bounded by the table size, so they always fit.
        let _ = match mode {
            PwmReadMode::Selected => {
                let chip = &chips[selected];
                write!(message, "{} {}", chip.duty_cycle, chip.period)
            }
            PwmReadMode::Snapshot => chips
                .iter()
                .filter(|chip| chip.active)
                .try_for_each(|chip| {
                    writeln!(message, "{} {} {}", chip.id, chip.period, chip.duty_cycle)
                }),
        };
    }
}

/// A PWM device exposed as a write-command / read-result channel.
pub struct PwmDevice<P: PwmController> {
    config: PwmDeviceConfig,
    gate: SessionGate,
    table: PwmTable<P>,
    selected: AtomicUsize,
}

impl<P: PwmController> PwmDevice<P> {
    /// Creates the device with every chip inactive.
    pub fn new(config: PwmDeviceConfig, hw: P) -> Self {
        info!("{}: device configured", config.name);
        Self {
            table: PwmTable::new(hw, config.chip_limit()),
            config,
            gate: SessionGate::new(),
            selected: AtomicUsize::new(0),
        }
    }

    #[inline]
    pub fn config(&self) -> &PwmDeviceConfig {
        &self.config
    }

    #[inline]
    pub fn table(&self) -> &PwmTable<P> {
        &self.table
    }

    /// Chip reported by reads in [`PwmReadMode::Selected`].
    #[inline]
    pub fn selected(&self) -> usize {
        self.selected.load(Ordering::Acquire)
    }

    /// Opens the single control session, or fails with `ResourceBusy`.
    pub fn open(&self) -> LineResult<PwmSession<'_, P>> {
        if let Err(err) = self.gate.try_open() {
            warn!("{}: device in use by another session", self.config.name);
            return Err(err);
        }
        debug!("{}: session opened", self.config.name);
        Ok(PwmSession {
            device: self,
            offset: AtomicUsize::new(0),
        })
    }

    /// Frees every active chip. Returns how many were released.
    pub fn teardown(&self) -> usize {
        let released = self.table.teardown();
        info!("{}: released {} chips", self.config.name, released);
        released
    }

    fn execute(&self, cmd: Command) -> LineResult {
        trace!("{}: {:?}", self.config.name, cmd);
        let id = self.table.check(cmd.id)?;

        match cmd.op {
            Op::Init => self.table.configure(cmd.id)?,
            Op::Read => {
                if self.table.chip(cmd.id)?.active {
                    self.selected.store(id, Ordering::Release);
                }
            }
            Op::Write => {
                self.table.update(cmd.id, cmd.arg1, cmd.arg2)?;
            }
            Op::Free => {
                self.table.free(cmd.id)?;
            }
            Op::Unknown(op) => trace!("{}: ignoring op {:?}", self.config.name, op),
        }
        Ok(())
    }
}

impl<P: PwmController> Drop for PwmDevice<P> {
    fn drop(&mut self) {
        self.teardown();
        info!("{}: device has been unregistered", self.config.name);
    }
}

/// The open PWM control session. Closing happens on drop.
///
/// Shareable between threads like the GPIO [`Session`](crate::Session).
pub struct PwmSession<'a, P: PwmController> {
    device: &'a PwmDevice<P>,
    /// Read cursor into the current result.
    offset: AtomicUsize,
}

impl<P: PwmController> PwmSession<'_, P> {
    /// Executes one command. Returns the number of bytes consumed.
    pub fn write(&self, bytes: &[u8]) -> LineResult<usize> {
        if bytes.len() > self.device.config.max_command_len {
            warn!(
                "{}: failed to receive {} bytes from the user",
                self.device.config.name,
                bytes.len()
            );
            return Err(LineError::TransferFault);
        }

        self.offset.store(0, Ordering::Release);
        match Command::parse_bytes(bytes) {
            Some(cmd) => self.device.execute(cmd)?,
            None => trace!("{}: absorbed malformed command", self.device.config.name),
        }
        Ok(bytes.len())
    }

    /// Reads the current result; 0 once it has been read in full.
    pub fn read(&self, buf: &mut [u8]) -> LineResult<usize> {
        let mut message = Message::new();
        self.device
            .table
            .render(self.device.config.read_mode, self.device.selected(), &mut message);

        let mut offset = self.offset.load(Ordering::Acquire);
        let copied = copy_out(&message, buf, &mut offset)?;
        self.offset.store(offset, Ordering::Release);
        Ok(copied)
    }

    pub fn close(self) {}
}

impl<P: PwmController> Drop for PwmSession<'_, P> {
    fn drop(&mut self) {
        self.device.gate.close();
        debug!("{}: session closed", self.device.config.name);
    }
}
