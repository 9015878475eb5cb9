//! Test doubles for the controller: virtual time and a recording PWM.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::vec::Vec;

use core::time::Duration;

use crate::traits::{PulseOutput, TimeSource};

/// Virtual clock. Sleeping advances time instantly and is recorded.
#[derive(Debug, Clone, Default)]
pub struct SimClock {
    now: Rc<Cell<Duration>>,
    sleeps: Rc<RefCell<Vec<Duration>>>,
}

impl SimClock {
    /// Move time forward without recording a sleep, as if the caller idled.
    pub fn advance(&self, duration: Duration) {
        self.now.set(self.now.get() + duration);
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.borrow().clone()
    }

    pub fn total_slept(&self) -> Duration {
        self.sleeps.borrow().iter().sum()
    }

    pub fn clear_sleeps(&self) {
        self.sleeps.borrow_mut().clear();
    }
}

impl TimeSource for SimClock {
    fn now(&self) -> Duration {
        self.now.get()
    }

    fn sleep(&mut self, duration: Duration) {
        self.sleeps.borrow_mut().push(duration);
        self.advance(duration);
    }
}

/// Setup stage a [`RecordingOutput`] should fail at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    Configure,
    Channel,
    Init,
}

/// PWM output that remembers every pulse written to it.
#[derive(Debug, Clone, Default)]
pub struct RecordingOutput {
    writes: Rc<RefCell<Vec<u16>>>,
    configured: Rc<Cell<Option<Duration>>>,
    fail_at: Option<FailAt>,
}

impl RecordingOutput {
    pub fn failing(stage: FailAt) -> Self {
        RecordingOutput { fail_at: Some(stage), ..Default::default() }
    }

    pub fn writes(&self) -> Vec<u16> {
        self.writes.borrow().clone()
    }

    pub fn clear(&self) {
        self.writes.borrow_mut().clear();
    }

    pub fn configured_period(&self) -> Option<Duration> {
        self.configured.get()
    }

    fn check(&self, stage: FailAt) -> Result<(), &'static str> {
        if self.fail_at == Some(stage) {
            return Err("injected failure");
        }
        Ok(())
    }
}

impl PulseOutput for RecordingOutput {
    type Channel = u8;
    type Error = &'static str;

    fn configure(&mut self, period: Duration) -> Result<(), Self::Error> {
        self.check(FailAt::Configure)?;
        self.configured.set(Some(period));
        Ok(())
    }

    fn acquire_channel(&mut self) -> Result<Self::Channel, Self::Error> {
        self.check(FailAt::Channel)?;
        Ok(0)
    }

    fn init_channel(&mut self, _channel: Self::Channel) -> Result<(), Self::Error> {
        self.check(FailAt::Init)
    }

    fn set_pulse(&mut self, _channel: Self::Channel, pulse_us: u16, _period: Duration) {
        self.writes.borrow_mut().push(pulse_us);
    }
}
