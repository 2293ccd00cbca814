use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU8, Ordering};

use rppal::gpio::{Gpio, InputPin, Level, Trigger};
use tracing::{debug, trace};
use turret_traits::Encoder;

use crate::error::{HwError, Result};

/// Count delta indexed by `(previous_state << 2) | new_state`, where a state is
/// `(a << 1) | b`. Invalid double transitions count as 0.
const TRANSITIONS: [i8; 16] = [0, -1, 1, 0, 1, 0, 0, -1, -1, 0, 0, 1, 0, 1, -1, 0];

const A_BIT: u8 = 0b10;
const B_BIT: u8 = 0b01;

/// Full-quad decoder fed by GPIO edge interrupts on both channels.
pub struct QuadratureEncoder {
    // The pins own the interrupt threads; dropping them stops counting.
    _a: InputPin,
    _b: InputPin,
    count: Arc<AtomicI64>,
}

impl QuadratureEncoder {
    pub fn new(a_pin: u8, b_pin: u8) -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let mut a = gpio
            .get(a_pin)
            .map_err(|e| HwError::Gpio(e.to_string()))?
            .into_input_pullup();
        let mut b = gpio
            .get(b_pin)
            .map_err(|e| HwError::Gpio(e.to_string()))?
            .into_input_pullup();

        let initial = (if a.is_high() { A_BIT } else { 0 }) | (if b.is_high() { B_BIT } else { 0 });
        let state = Arc::new(AtomicU8::new(initial));
        let count = Arc::new(AtomicI64::new(0));

        a.set_async_interrupt(Trigger::Both, edge_handler(state.clone(), count.clone(), A_BIT))
            .map_err(|e| HwError::Gpio(e.to_string()))?;
        b.set_async_interrupt(Trigger::Both, edge_handler(state, count.clone(), B_BIT))
            .map_err(|e| HwError::Gpio(e.to_string()))?;

        debug!(a_pin, b_pin, "quadrature encoder attached");
        Ok(Self {
            _a: a,
            _b: b,
            count,
        })
    }
}

fn edge_handler(
    state: Arc<AtomicU8>,
    count: Arc<AtomicI64>,
    bit: u8,
) -> impl FnMut(Level) + Send + 'static {
    move |level| {
        let update = |s: u8| {
            Some(match level {
                Level::High => s | bit,
                Level::Low => s & !bit,
            })
        };
        // fetch_update never fails when the closure always returns Some.
        let prev = match state.fetch_update(Ordering::AcqRel, Ordering::Acquire, update) {
            Ok(p) | Err(p) => p,
        };
        let next = update(prev).unwrap_or(prev);
        let delta = TRANSITIONS[usize::from((prev << 2) | next)];
        if delta != 0 {
            count.fetch_add(i64::from(delta), Ordering::Relaxed);
        }
        trace!(prev, next, delta, "quadrature edge");
    }
}

impl Encoder for QuadratureEncoder {
    fn count(&self) -> i64 {
        self.count.load(Ordering::Relaxed)
    }

    fn set_count(
        &self,
        count: i64,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.count.store(count, Ordering::Relaxed);
        Ok(())
    }
}
