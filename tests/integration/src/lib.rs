// Licensed under the Apache-2.0 license

mod test_mailbox_loopback;

#[cfg(test)]
mod test {
    use emulator_periph::{EmuClock, EmuMailboxHw, EmuMailboxOps};
    use log::LevelFilter;
    use mailbox_framework::{MailboxDesc, MailboxRegistry, MboxMsg};
    use mbox_config::MailboxConfig;
    use simple_logger::SimpleLogger;
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex, PoisonError};
    use std::time::Duration;

    pub const TIMEOUT: Duration = Duration::from_secs(5);

    pub fn init_logging() {
        let _ = SimpleLogger::new().with_level(LevelFilter::Debug).init();
    }

    pub fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
        mutex.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A registry whose endpoints sit on emulated mailbox hardware. Every
    /// channel's interrupt line is routed back into the registry.
    pub struct MailboxRig {
        pub registry: Arc<MailboxRegistry>,
        pub clock: Arc<EmuClock>,
        pub hw: BTreeMap<String, Arc<EmuMailboxHw>>,
    }

    impl MailboxRig {
        pub fn from_config(config: &MailboxConfig) -> Self {
            config.validate().unwrap();
            let registry = Arc::new(MailboxRegistry::new());
            let clock = Arc::new(EmuClock::new());
            let mut hw = BTreeMap::new();
            let mut descs = Vec::new();

            for endpoint in &config.endpoints {
                let channel = EmuMailboxHw::new(&endpoint.name, endpoint.irq, endpoint.fifo_depth);
                let weak = Arc::downgrade(&registry);
                channel.set_irq_sink(move |line| {
                    if let Some(registry) = weak.upgrade() {
                        registry.dispatch_irq(line);
                    }
                });
                let ops = EmuMailboxOps::new(channel.clone(), endpoint.hw_type, clock.clone());
                descs.push(MailboxDesc::from_config(config, endpoint, Box::new(ops)));
                hw.insert(endpoint.name.clone(), channel);
            }
            registry.register("emulated-soc", descs).unwrap();
            Self {
                registry,
                clock,
                hw,
            }
        }

        pub fn hw(&self, name: &str) -> &Arc<EmuMailboxHw> {
            &self.hw[name]
        }

        pub fn wait_idle(&self) {
            assert!(self.registry.wait_idle(TIMEOUT), "deferred work stuck");
        }

        /// Remote side of `name` reads `count` messages, letting the local
        /// transmit path refill the FIFO in between.
        pub fn collect_sent(&self, name: &str, count: usize) -> Vec<MboxMsg> {
            let hw = self.hw(name);
            let mut sent = Vec::new();
            let mut idle_rounds = 0;
            while sent.len() < count && idle_rounds < 100 {
                match hw.pop_sent() {
                    Some(msg) => sent.push(msg),
                    None => {
                        self.wait_idle();
                        idle_rounds += 1;
                    }
                }
            }
            sent
        }

        /// Remote side posts every message, waiting for the local receive path
        /// whenever the FIFO is full.
        pub fn post_all(&self, name: &str, msgs: &[MboxMsg]) {
            let hw = self.hw(name);
            for &msg in msgs {
                let mut tries = 0;
                while !hw.post(msg) {
                    tries += 1;
                    assert!(tries < 100, "receive path stopped draining");
                    self.wait_idle();
                    hw.retrigger();
                }
            }
            self.wait_idle();
        }
    }
}
