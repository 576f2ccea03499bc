//! Fixed-size line table and its configuration path.
//!
//! All configuration changes run under one `spin::Mutex`. That lock is only
//! ever taken from command context: the interrupt path goes through the
//! [`InterruptBridge`], which touches atomics only, so holding the lock while
//! the interrupt controller waits out an in-flight handler cannot deadlock.

use alloc::sync::Arc;

use spin::Mutex;

use crate::error::LineResult;
use crate::hal::{
    Direction, IrqHandler, IrqNum, InterruptController, LINE_COUNT, LineController, LineId,
};
use crate::irq::InterruptBridge;
use crate::line::Line;
use crate::notify::{Binding, NotificationChannel};

/// Arena of every line the device exposes, plus the platform controllers
/// needed to configure them.
pub struct LineTable<H, I, C> {
    lines: Mutex<[Line; LINE_COUNT]>,
    hw: H,
    interrupts: I,
    bridge: Arc<InterruptBridge<C>>,
}

impl<H, I, C> LineTable<H, I, C>
where
    H: LineController,
    I: InterruptController,
    C: NotificationChannel + 'static,
{
    /// Creates a table with every line `Unconfigured`.
    pub fn new(hw: H, interrupts: I, channel: C) -> Self {
        Self {
            lines: Mutex::new(core::array::from_fn(|i| Line::new(LineId::from_index(i)))),
            hw,
            interrupts,
            bridge: Arc::new(InterruptBridge::new(channel)),
        }
    }

    /// Gets a reference to the line controller.
    #[inline]
    pub fn controller(&self) -> &H {
        &self.hw
    }

    /// Gets a reference to the interrupt controller.
    #[inline]
    pub fn interrupts(&self) -> &I {
        &self.interrupts
    }

    /// Gets a reference to the interrupt bridge.
    #[inline]
    pub fn bridge(&self) -> &Arc<InterruptBridge<C>> {
        &self.bridge
    }

    /// Gets a reference to the notification channel.
    #[inline]
    pub fn channel(&self) -> &C {
        self.bridge.channel()
    }

    /// Snapshot of one line.
    pub fn line(&self, id: u32) -> LineResult<Line> {
        let id = LineId::new(id)?;
        Ok(self.lines.lock()[id.index()])
    }

    /// Number of lines with an armed interrupt.
    pub fn armed_lines(&self) -> usize {
        self.lines.lock().iter().filter(|line| line.is_armed()).count()
    }

    /// Exports line `id`. Returns whether the line was newly exported.
    ///
    /// A line that is already exported is left untouched. Otherwise the
    /// hardware line is requested and configured, and if `binding` is given
    /// for an input its interrupt is routed and armed. On any failure the
    /// hardware is released again and the line stays `Unconfigured`.
    pub fn configure(
        &self,
        id: u32,
        direction: Direction,
        value: u32,
        binding: Option<Binding>,
    ) -> LineResult<bool> {
        let id = LineId::new(id)?;
        let mut lines = self.lines.lock();
        let line = &mut lines[id.index()];

        if line.is_exported() {
            trace!("{:?} already exported", id);
            return Ok(false);
        }

        self.hw.request(id)?;

        let value = match direction {
            Direction::Output => value,
            Direction::Input => 0,
        };
        let binding = binding.filter(|_| direction == Direction::Input);

        match self.setup(id, direction, value, binding) {
            Ok(irq) => {
                line.export(direction, value, irq.zip(binding));
                info!(
                    "{:?} configured: direction {:?} value {} irq {:?}",
                    id, direction, value, irq
                );
                Ok(true)
            }
            Err(err) => {
                self.hw.free(id);
                warn!("{:?} configuration failed: {}", id, err);
                Err(err)
            }
        }
    }

    fn setup(
        &self,
        id: LineId,
        direction: Direction,
        value: u32,
        binding: Option<Binding>,
    ) -> LineResult<Option<IrqNum>> {
        self.hw.set_direction(id, direction, value)?;

        match binding {
            Some(binding) => self.arm(id, binding).map(Some),
            None => Ok(None),
        }
    }

    fn arm(&self, id: LineId, binding: Binding) -> LineResult<IrqNum> {
        let irq = self.hw.to_irq(id)?;
        let registry = self.bridge.registry();
        let channel = self.bridge.channel();

        // Route before arming: a handler firing right after `arm` must find
        // its entry. The channel only learns about the line once the arm took
        // effect; an edge in between is delivered as a plain notify.
        registry.insert(irq, id, binding)?;

        let handler: Arc<dyn IrqHandler> = self.bridge.clone();
        if let Err(err) = self.interrupts.arm(irq, handler) {
            registry.remove(irq);
            return Err(err.into());
        }
        channel.on_arm(id, binding);

        debug!("{:?} armed on IRQ {}", id, irq.0);
        Ok(irq)
    }

    /// Reads line `id`.
    ///
    /// Inputs are sampled from hardware, outputs report the last level set.
    /// Returns `None` if the line is not exported.
    pub fn read(&self, id: u32) -> LineResult<Option<u32>> {
        let id = LineId::new(id)?;
        let lines = self.lines.lock();
        let line = &lines[id.index()];

        if !line.is_exported() {
            return Ok(None);
        }
        Ok(Some(match line.direction {
            Direction::Input => self.hw.get_value(id),
            Direction::Output => line.value,
        }))
    }

    /// Drives line `id` to `value`. Returns whether the line was exported.
    pub fn write(&self, id: u32, value: u32) -> LineResult<bool> {
        let id = LineId::new(id)?;
        let mut lines = self.lines.lock();
        let line = &mut lines[id.index()];

        if !line.is_exported() {
            return Ok(false);
        }
        line.value = value;
        self.hw.set_value(id, value);
        Ok(true)
    }

    /// Frees line `id`, disarming its interrupt first.
    ///
    /// Returns whether anything was released; freeing an unexported line is
    /// a no-op.
    pub fn free(&self, id: u32) -> LineResult<bool> {
        let id = LineId::new(id)?;
        let mut lines = self.lines.lock();
        let line = &mut lines[id.index()];

        if !line.is_exported() {
            return Ok(false);
        }
        self.release(line);
        Ok(true)
    }

    /// Frees every exported line. Returns how many were released.
    pub fn teardown(&self) -> usize {
        let mut lines = self.lines.lock();
        let mut released = 0;
        for line in lines.iter_mut().filter(|line| line.is_exported()) {
            self.release(line);
            released += 1;
        }
        released
    }

    fn release(&self, line: &mut Line) {
        if let Some(irq) = line.irq.take() {
            // Disarm waits out any running handler, so nothing can observe
            // the entry or the hardware line after this point.
            self.interrupts.disarm(irq);
            if let Some(entry) = self.bridge.registry().remove(irq) {
                self.bridge.channel().on_disarm(line.id, entry.binding);
            }
        }

        if line.direction == Direction::Output {
            self.hw.set_value(line.id, 0);
        }
        self.hw.free(line.id);
        line.reset();

        info!("{:?} freed", line.id);
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::error::{HwError, HwResult, LineError};
    use crate::hal::{IrqReturn, Pid};
    use crate::line::LineState;
    use crate::notify::CoalescingPollChannel;
    use std::collections::BTreeMap;
    use std::sync::Mutex as StdMutex;
    use std::vec::Vec;

    #[derive(Default)]
    struct MockLines {
        requested: StdMutex<Vec<u32>>,
        freed: StdMutex<Vec<u32>>,
        levels: StdMutex<BTreeMap<u32, u32>>,
        fail_direction: Option<HwError>,
        fail_irq: Option<HwError>,
    }

    impl LineController for MockLines {
        fn request(&self, line: LineId) -> HwResult {
            self.requested.lock().unwrap().push(line.raw());
            Ok(())
        }

        fn free(&self, line: LineId) {
            self.freed.lock().unwrap().push(line.raw());
        }

        fn set_direction(&self, line: LineId, _direction: Direction, initial: u32) -> HwResult {
            if let Some(err) = self.fail_direction {
                return Err(err);
            }
            self.levels.lock().unwrap().insert(line.raw(), initial);
            Ok(())
        }

        fn set_value(&self, line: LineId, value: u32) {
            self.levels.lock().unwrap().insert(line.raw(), value);
        }

        fn get_value(&self, line: LineId) -> u32 {
            self.levels.lock().unwrap().get(&line.raw()).copied().unwrap_or(0)
        }

        fn to_irq(&self, line: LineId) -> HwResult<IrqNum> {
            match self.fail_irq {
                Some(err) => Err(err),
                None => Ok(IrqNum(100 + line.raw())),
            }
        }
    }

    #[derive(Default)]
    struct MockIrqs {
        handlers: StdMutex<BTreeMap<u32, Arc<dyn IrqHandler>>>,
        fail_arm: bool,
    }

    impl MockIrqs {
        fn fire(&self, irq: u32) -> Option<IrqReturn> {
            let handler = self.handlers.lock().unwrap().get(&irq).cloned();
            handler.map(|h| h.handle(IrqNum(irq)))
        }
    }

    impl InterruptController for MockIrqs {
        fn arm(&self, irq: IrqNum, handler: Arc<dyn IrqHandler>) -> HwResult {
            if self.fail_arm {
                return Err(HwError(-38));
            }
            let mut handlers = self.handlers.lock().unwrap();
            if handlers.contains_key(&irq.0) {
                return Err(HwError::BUSY);
            }
            handlers.insert(irq.0, handler);
            Ok(())
        }

        fn disarm(&self, irq: IrqNum) {
            self.handlers.lock().unwrap().remove(&irq.0);
        }
    }

    type TestTable = LineTable<MockLines, MockIrqs, CoalescingPollChannel>;

    fn table() -> TestTable {
        LineTable::new(MockLines::default(), MockIrqs::default(), CoalescingPollChannel::new())
    }

    fn assert_registry_consistent(table: &TestTable) {
        for id in 0..LINE_COUNT as u32 {
            let line = table.line(id).unwrap();
            let routed = table.bridge().registry().irq_of(line.id);
            assert_eq!(line.irq, routed, "line {} disagrees with registry", id);
        }
    }

    #[test]
    fn test_out_of_range_rejected_without_mutation() {
        let table = table();
        let id = LINE_COUNT as u32;

        assert_eq!(table.configure(id, Direction::Output, 1, None), Err(LineError::InvalidIdentifier));
        assert_eq!(table.read(id), Err(LineError::InvalidIdentifier));
        assert_eq!(table.write(id, 1), Err(LineError::InvalidIdentifier));
        assert_eq!(table.free(id), Err(LineError::InvalidIdentifier));
        assert_eq!(table.line(id), Err(LineError::InvalidIdentifier));

        assert!(table.controller().requested.lock().unwrap().is_empty());
        assert!(table.controller().levels.lock().unwrap().is_empty());
    }

    #[test]
    fn test_configure_output_and_read_cached() {
        let table = table();
        table.configure(5, Direction::Output, 100, None).unwrap();

        let line = table.line(5).unwrap();
        assert_eq!(line.state(), LineState::Exported);
        assert_eq!(table.read(5).unwrap(), Some(100));

        assert!(table.write(5, 200).unwrap());
        assert_eq!(table.read(5).unwrap(), Some(200));
        assert_eq!(table.controller().get_value(line.id), 200);
    }

    #[test]
    fn test_configure_is_idempotent() {
        let table = table();
        assert!(table.configure(7, Direction::Output, 1, None).unwrap());
        let before = table.line(7).unwrap();

        assert!(!table.configure(7, Direction::Input, 0, Some(Binding::PollMask(1))).unwrap());
        assert_eq!(table.line(7).unwrap(), before);
        assert_eq!(table.controller().requested.lock().unwrap().as_slice(), &[7]);
    }

    #[test]
    fn test_unexported_line_is_noop() {
        let table = table();
        assert_eq!(table.read(3).unwrap(), None);
        assert!(!table.write(3, 1).unwrap());
        assert!(!table.free(3).unwrap());
        assert!(table.controller().levels.lock().unwrap().is_empty());
    }

    #[test]
    fn test_free_twice_releases_once() {
        let table = table();
        table.configure(2, Direction::Input, 0, None).unwrap();

        assert!(table.free(2).unwrap());
        assert!(!table.free(2).unwrap());
        assert_eq!(table.line(2).unwrap().state(), LineState::Unconfigured);
        assert_eq!(table.controller().freed.lock().unwrap().as_slice(), &[2]);
    }

    #[test]
    fn test_free_drives_output_low() {
        let table = table();
        table.configure(4, Direction::Output, 1, None).unwrap();
        table.free(4).unwrap();
        assert_eq!(table.controller().get_value(LineId::new(4).unwrap()), 0);
    }

    #[test]
    fn test_arm_and_fire() {
        let table = table();
        table.configure(3, Direction::Input, 0, Some(Binding::PollMask(0b1000))).unwrap();

        let line = table.line(3).unwrap();
        assert_eq!(line.state(), LineState::InterruptArmed);
        assert_eq!(line.irq, Some(IrqNum(103)));
        assert_eq!(table.armed_lines(), 1);
        assert_registry_consistent(&table);

        assert_eq!(table.interrupts().fire(103), Some(IrqReturn::Handled));
        assert_eq!(table.channel().peek(), 0b1000);

        table.free(3).unwrap();
        assert_eq!(table.interrupts().fire(103), None);
        assert_eq!(table.channel().peek(), 0);
        assert_eq!(table.armed_lines(), 0);
        assert_registry_consistent(&table);
    }

    #[test]
    fn test_output_never_armed() {
        let table = table();
        table.configure(8, Direction::Output, 0, Some(Binding::PollMask(1))).unwrap();
        assert_eq!(table.line(8).unwrap().state(), LineState::Exported);
        assert!(table.bridge().registry().is_empty());
    }

    #[test]
    fn test_direction_failure_rolls_back() {
        let table = LineTable::new(
            MockLines {
                fail_direction: Some(HwError(-5)),
                ..Default::default()
            },
            MockIrqs::default(),
            CoalescingPollChannel::<spin::relax::Spin>::new(),
        );

        let result = table.configure(1, Direction::Input, 0, Some(Binding::PollMask(1)));
        assert_eq!(result, Err(LineError::HardwareConfigFailure(HwError(-5))));
        assert_eq!(table.line(1).unwrap().state(), LineState::Unconfigured);
        assert_eq!(table.controller().freed.lock().unwrap().as_slice(), &[1]);
    }

    #[test]
    fn test_irq_lookup_failure_rolls_back() {
        let table = LineTable::new(
            MockLines {
                fail_irq: Some(HwError::NO_DEVICE),
                ..Default::default()
            },
            MockIrqs::default(),
            CoalescingPollChannel::<spin::relax::Spin>::new(),
        );

        let result = table.configure(1, Direction::Input, 0, Some(Binding::Recipient(Pid(9))));
        assert_eq!(result, Err(LineError::HardwareConfigFailure(HwError::NO_DEVICE)));
        assert!(!table.line(1).unwrap().is_exported());
        assert!(table.bridge().registry().is_empty());
    }

    #[test]
    fn test_arm_failure_rolls_back() {
        let table = LineTable::new(
            MockLines::default(),
            MockIrqs {
                fail_arm: true,
                ..Default::default()
            },
            CoalescingPollChannel::<spin::relax::Spin>::new(),
        );

        let result = table.configure(6, Direction::Input, 0, Some(Binding::PollMask(2)));
        assert_eq!(result, Err(LineError::HardwareConfigFailure(HwError(-38))));
        assert!(!table.line(6).unwrap().is_exported());
        assert!(table.bridge().registry().is_empty());
        assert_eq!(table.channel().armed(), 0);
        assert_eq!(table.channel().countdown(), 0);
        assert_eq!(table.controller().freed.lock().unwrap().as_slice(), &[6]);

        // The slot can be reused afterwards.
        assert!(!table.free(6).unwrap());
    }

    #[test]
    fn test_teardown_frees_everything() {
        let table = table();
        table.configure(0, Direction::Output, 1, None).unwrap();
        table.configure(10, Direction::Input, 0, Some(Binding::PollMask(1))).unwrap();
        table.configure(64, Direction::Input, 0, None).unwrap();

        assert_eq!(table.teardown(), 3);
        assert_eq!(table.teardown(), 0);
        assert!(table.bridge().registry().is_empty());
        assert_registry_consistent(&table);
        for id in 0..LINE_COUNT as u32 {
            assert!(!table.line(id).unwrap().is_exported());
        }
    }

    #[test]
    fn test_failed_arm_keeps_channel_state() {
        let table = table();
        table.configure(1, Direction::Input, 0, Some(Binding::PollMask(1))).unwrap();
        assert_eq!(table.interrupts().fire(101), Some(IrqReturn::Handled));
        assert_eq!(table.channel().peek(), 1);
        let counters = (table.channel().armed(), table.channel().countdown());

        // Something else already owns line 2's interrupt.
        let foreign: Arc<dyn IrqHandler> = table.bridge().clone();
        table.interrupts().handlers.lock().unwrap().insert(102, foreign);
        let result = table.configure(2, Direction::Input, 0, Some(Binding::PollMask(1)));
        assert_eq!(result, Err(LineError::HardwareConfigFailure(HwError::BUSY)));

        assert_eq!(table.channel().peek(), 1);
        assert_eq!((table.channel().armed(), table.channel().countdown()), counters);
        assert!(!table.line(2).unwrap().is_exported());
        assert_eq!(table.bridge().registry().len(), 1);
    }
}
