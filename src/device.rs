//! GPIO control channel: session admission, command dispatch and reads.

use core::sync::atomic::{AtomicUsize, Ordering};

use crate::cache::{ValueCache, copy_out};
use crate::command::{Command, Op};
use crate::config::GpioDeviceConfig;
use crate::error::{LineError, LineResult};
use crate::hal::{Direction, InterruptController, LineController, LineId};
use crate::notify::{NotificationChannel, PendingEvents};
use crate::session::SessionGate;
use crate::table::LineTable;

/// A GPIO device exposed as a write-command / read-result channel.
///
/// # Usage
///
/// ```rust,ignore
/// let device = GpioDevice::new(GpioDeviceConfig::default(), lines, irqs, channel);
///
/// let session = device.open()?;      // ResourceBusy if already open
/// session.write(b"i 5 1 100")?;          // export output line 5 at level 100
/// let n = session.read(&mut buf)?;       // "100"
/// drop(session);                         // releases the session
/// ```
///
/// Dropping the device frees every line that is still exported.
pub struct GpioDevice<H, I, C>
where
    H: LineController,
    I: InterruptController,
    C: NotificationChannel + 'static,
{
    config: GpioDeviceConfig,
    gate: SessionGate,
    table: LineTable<H, I, C>,
    cache: ValueCache,
}

impl<H, I, C> GpioDevice<H, I, C>
where
    H: LineController,
    I: InterruptController,
    C: NotificationChannel + 'static,
{
    /// Creates the device with every line unconfigured.
    pub fn new(config: GpioDeviceConfig, hw: H, interrupts: I, channel: C) -> Self {
        info!("{}: device configured", config.name);
        Self {
            config,
            gate: SessionGate::new(),
            table: LineTable::new(hw, interrupts, channel),
            cache: ValueCache::new(),
        }
    }

    /// Gets the device configuration.
    #[inline]
    pub fn config(&self) -> &GpioDeviceConfig {
        &self.config
    }

    /// Gets a reference to the line table.
    #[inline]
    pub fn table(&self) -> &LineTable<H, I, C> {
        &self.table
    }

    /// Value the next read will report.
    #[inline]
    pub fn cached_value(&self) -> u32 {
        self.cache.load()
    }

    /// Whether a session is currently open.
    #[inline]
    pub fn is_open(&self) -> bool {
        self.gate.is_open()
    }

    /// Opens the single control session.
    ///
    /// # Errors
    ///
    /// `ResourceBusy` if another session is open. Callers retry; there is no
    /// queueing.
    pub fn open(&self) -> LineResult<Session<'_, H, I, C>> {
        if let Err(err) = self.gate.try_open() {
            warn!("{}: device in use by another session", self.config.name);
            return Err(err);
        }
        debug!("{}: session opened", self.config.name);
        Ok(Session {
            device: self,
            offset: AtomicUsize::new(0),
        })
    }

    /// Frees every exported line. Returns how many were released.
    pub fn teardown(&self) -> usize {
        let released = self.table.teardown();
        info!("{}: released {} lines", self.config.name, released);
        released
    }

    fn execute(&self, cmd: Command) -> LineResult {
        trace!("{}: {:?}", self.config.name, cmd);

        // Range check comes first, whatever the op.
        LineId::new(cmd.id)?;

        match cmd.op {
            Op::Init => {
                let direction = Direction::from_raw(cmd.arg1);
                let binding = match direction {
                    Direction::Input => self.table.channel().binding(cmd.arg2)?,
                    Direction::Output => None,
                };
                // A repeated create leaves the line, and so the cache, alone.
                if self.table.configure(cmd.id, direction, cmd.arg2, binding)? {
                    self.refresh_output(cmd.id)?;
                }
            }
            Op::Read => {
                if let Some(value) = self.table.read(cmd.id)? {
                    self.cache.store(value);
                }
            }
            Op::Write => {
                if self.table.write(cmd.id, cmd.arg1)? {
                    self.refresh_output(cmd.id)?;
                }
            }
            Op::Free => {
                self.table.free(cmd.id)?;
            }
            Op::Unknown(op) => trace!("{}: ignoring op {:?}", self.config.name, op),
        }
        Ok(())
    }

    /// Outputs report their last set level, so keep the cache in step with it.
    fn refresh_output(&self, id: u32) -> LineResult {
        let line = self.table.line(id)?;
        if line.is_exported() && line.direction == Direction::Output {
            self.cache.store(line.value);
        }
        Ok(())
    }
}

impl<H, I, C> Drop for GpioDevice<H, I, C>
where
    H: LineController,
    I: InterruptController,
    C: NotificationChannel + 'static,
{
    fn drop(&mut self) {
        self.teardown();
        info!("{}: device has been unregistered", self.config.name);
    }
}

/// The open control session. Closing happens on drop.
///
/// A session can be shared between threads like an open file: one thread may
/// block in [`poll`](Session::poll) while another issues commands.
pub struct Session<'a, H, I, C>
where
    H: LineController,
    I: InterruptController,
    C: NotificationChannel + 'static,
{
    device: &'a GpioDevice<H, I, C>,
    /// Read cursor into the current result.
    offset: AtomicUsize,
}

impl<H, I, C> Session<'_, H, I, C>
where
    H: LineController,
    I: InterruptController,
    C: NotificationChannel + 'static,
{
    /// Executes one command.
    ///
    /// Returns the number of bytes consumed. Malformed commands are consumed
    /// without effect.
    ///
    /// # Errors
    ///
    /// - `TransferFault` if `bytes` exceeds the configured command length.
    /// - `InvalidIdentifier` if the id is outside the line table.
    /// - `DeviceUnavailable` if the create binding names no possible recipient.
    /// - `HardwareConfigFailure` if exporting or arming a line failed.
    pub fn write(&self, bytes: &[u8]) -> LineResult<usize> {
        if bytes.len() > self.device.config.max_command_len {
            warn!(
                "{}: failed to receive {} bytes from the user",
                self.device.config.name,
                bytes.len()
            );
            return Err(LineError::TransferFault);
        }

        // A new command produces a new result to read.
        self.offset.store(0, Ordering::Release);

        match Command::parse_bytes(bytes) {
            Some(cmd) => self.device.execute(cmd)?,
            None => trace!("{}: absorbed malformed command", self.device.config.name),
        }
        Ok(bytes.len())
    }

    /// Reads the decimal text of the cached value.
    ///
    /// Returns 0 once the current result has been read in full.
    pub fn read(&self, buf: &mut [u8]) -> LineResult<usize> {
        let message = self.device.cache.render();
        let mut offset = self.offset.load(Ordering::Acquire);
        let copied = copy_out(&message, buf, &mut offset).inspect_err(|_| {
            warn!(
                "{}: failed to send {} characters to the user",
                self.device.config.name,
                message.len()
            )
        })?;
        self.offset.store(offset, Ordering::Release);
        Ok(copied)
    }

    /// Explicitly closes the session.
    pub fn close(self) {}
}

impl<H, I, C> Session<'_, H, I, C>
where
    H: LineController,
    I: InterruptController,
    C: NotificationChannel + PendingEvents + 'static,
{
    /// Blocks until an armed line has a pending event and returns the pending
    /// mask, consumed according to the coalescing rule. Returns 0 when woken
    /// because an armed line was freed.
    pub fn poll(&self) -> u32 {
        self.device.table.channel().poll()
    }

    /// Like [`poll`](Self::poll), giving up after `max_relax` relax rounds.
    pub fn poll_timeout(&self, max_relax: usize) -> Option<u32> {
        self.device.table.channel().poll_timeout(max_relax)
    }
}

impl<H, I, C> Drop for Session<'_, H, I, C>
where
    H: LineController,
    I: InterruptController,
    C: NotificationChannel + 'static,
{
    fn drop(&mut self) {
        self.device.gate.close();
        debug!("{}: session closed", self.device.config.name);
    }
}
