use std::{
    sync::Arc,
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use flume::RecvTimeoutError;
use parking_lot::Mutex;

use super::{
    store::{DataStore, Store},
    types::RegisterMode,
};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(2);

struct Worker {
    stop: flume::Sender<()>,
    handle: JoinHandle<()>,
}

/// Periodically randomizes the read-only tables so a connected master has
/// something live to poll.
///
/// Writes go through the store, so subscribers observe every change.
pub struct Simulator {
    store: Arc<Store>,
    interval: Duration,
    worker: Option<Worker>,
}

impl Simulator {
    pub fn new(store: Arc<Store>, interval: Duration) -> Self {
        Self {
            store,
            interval,
            worker: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    pub fn start(&mut self) {
        if self.worker.is_some() {
            return;
        }
        let (stop, stopped) = flume::bounded::<()>(1);
        let store = self.store.clone();
        let interval = self.interval;

        let handle = thread::spawn(move || loop {
            match stopped.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => randomize(&store),
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        });
        log::info!("simulation started, interval {:?}", self.interval);
        self.worker = Some(Worker { stop, handle });
    }

    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        let _ = worker.stop.send(());
        if worker.handle.join().is_err() {
            log::error!("simulation worker panicked");
        }
        log::info!("simulation stopped");
    }

    /// Flip between running and stopped; returns the new state.
    pub fn toggle(&mut self) -> bool {
        if self.is_running() {
            self.stop();
        } else {
            self.start();
        }
        self.is_running()
    }
}

impl Drop for Simulator {
    fn drop(&mut self) {
        self.stop();
    }
}

/// One simulation step over every seeded discrete input and input register.
pub fn randomize(store: &Store) {
    for address in store.addresses(RegisterMode::DiscreteInputs) {
        let value = rand::random::<bool>();
        if let Err(err) = store.set_discrete_input(address, value) {
            log::warn!("simulation: {err}");
        }
        log::trace!("updating discrete input 0x{address:X} to {value}");
    }
    for address in store.addresses(RegisterMode::Input) {
        let value = rand::random::<u16>();
        if let Err(err) = store.set_input_register(address, value) {
            log::warn!("simulation: {err}");
        }
        log::trace!("updating input register 0x{address:X} to 0x{value:X}");
    }
}

const UPTIME_LOCK_TIMEOUT: Duration = Duration::from_secs(1);

/// Whole seconds since the slave started, advanced by a once-per-second tick.
pub struct UptimeCounter {
    started: Instant,
    seconds: Mutex<u64>,
    lock_timeout: Duration,
}

impl Default for UptimeCounter {
    fn default() -> Self {
        Self::started_at(Instant::now())
    }
}

impl UptimeCounter {
    pub fn started_at(started: Instant) -> Self {
        Self {
            started,
            seconds: Mutex::new(0),
            lock_timeout: UPTIME_LOCK_TIMEOUT,
        }
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Advance the counter. Gives up and returns `false` if the lock is not
    /// acquired within the lock timeout.
    pub fn tick(&self) -> bool {
        let Some(mut seconds) = self.seconds.try_lock_for(self.lock_timeout) else {
            log::debug!("uptime tick skipped, counter busy");
            return false;
        };
        let elapsed = self.started.elapsed().as_secs();
        if elapsed > *seconds {
            *seconds = elapsed;
        }
        true
    }

    pub fn seconds(&self) -> u64 {
        *self.seconds.lock()
    }

    /// Non-blocking check for a holder of the counter lock.
    pub fn is_locked(&self) -> bool {
        self.seconds.is_locked()
    }

    /// Tick once per second until the returned task is aborted.
    pub fn spawn_ticker(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            loop {
                interval.tick().await;
                let counter = self.clone();
                if tokio::task::spawn_blocking(move || counter.tick())
                    .await
                    .is_err()
                {
                    log::error!("uptime tick panicked");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::types::{Coil, Dump, Register};

    fn store() -> Arc<Store> {
        Arc::new(Store::from_dump(&Dump {
            discrete_inputs: (0..32)
                .map(|address| Coil {
                    address,
                    value: false,
                })
                .collect(),
            input_registers: vec![Register {
                address: 7,
                value: 0,
            }],
            holding_registers: vec![Register {
                address: 7,
                value: 5,
            }],
            ..Default::default()
        }))
    }

    #[test]
    fn test_randomize_touches_read_only_tables_only() {
        let store = store();
        let changes = Arc::new(Mutex::new(0usize));
        let sink = changes.clone();
        store.subscribe_discrete_inputs(move |_| *sink.lock() += 1);

        for _ in 0..4 {
            randomize(&store);
        }

        // 128 fair coin flips all landing on `false` is vanishingly unlikely.
        assert!(*changes.lock() > 0);
        assert_eq!(store.get_holding_register(7), Ok(5));
        assert_eq!(store.addresses(RegisterMode::Input), vec![7]);
    }

    #[test]
    fn test_start_stop_toggle() {
        let mut simulator = Simulator::new(store(), Duration::from_millis(10));
        assert!(!simulator.is_running());

        simulator.start();
        simulator.start();
        assert!(simulator.is_running());

        assert!(!simulator.toggle());
        assert!(simulator.toggle());
        simulator.stop();
        assert!(!simulator.is_running());
    }

    #[test]
    fn test_uptime_tick_advances() {
        let started = Instant::now()
            .checked_sub(Duration::from_secs(5))
            .unwrap();
        let counter = UptimeCounter::started_at(started);
        assert_eq!(counter.seconds(), 0);

        assert!(counter.tick());
        assert!(counter.seconds() >= 5);
        assert!(!counter.is_locked());
    }

    #[test]
    fn test_uptime_tick_skips_when_lock_is_held() {
        let counter = Arc::new(
            UptimeCounter::started_at(Instant::now()).with_lock_timeout(Duration::from_millis(20)),
        );
        let guard = counter.seconds.lock();
        assert!(counter.is_locked());

        let ticking = counter.clone();
        let acquired = thread::spawn(move || ticking.tick()).join().unwrap();
        assert!(!acquired);
        drop(guard);

        assert!(counter.tick());
    }
}
