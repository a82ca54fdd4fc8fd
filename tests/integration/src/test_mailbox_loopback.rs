// Licensed under the Apache-2.0 license

//! Mailbox endpoints running on emulated FIFO hardware with their interrupt
//! lines wired back into the registry.

#[cfg(test)]
mod test {
    use crate::test::{init_logging, lock, MailboxRig};
    use mailbox_framework::{
        Mailbox, MailboxError, MailboxIrq, MailboxObserver, MboxMsg,
    };
    use mbox_config::{EndpointConfig, FifoType, MailboxConfig};
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    fn config(depth: usize, capacity: usize) -> MailboxConfig {
        let mut dsp = EndpointConfig::new("dsp", 26, FifoType::Fifo2);
        dsp.fifo_depth = depth;
        let mut iva = EndpointConfig::new("iva", 34, FifoType::Fifo1);
        iva.fifo_depth = 1;
        MailboxConfig {
            queue_capacity: capacity,
            endpoints: vec![dsp, iva],
            ..MailboxConfig::default()
        }
    }

    fn recorder() -> (Arc<dyn MailboxObserver>, Arc<Mutex<Vec<MboxMsg>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let observer: Arc<dyn MailboxObserver> = Arc::new(move |_mbox: &Mailbox, msg: MboxMsg| {
            lock(&seen_clone).push(msg);
        });
        (observer, seen)
    }

    #[test]
    fn test_echo_loopback() {
        init_logging();
        let rig = MailboxRig::from_config(&config(4, 16));
        let echo: Arc<dyn MailboxObserver> = Arc::new(|mbox: &Mailbox, msg: MboxMsg| {
            mbox.send(msg + 0x100).unwrap();
        });
        let dsp = rig.registry.get("dsp", &echo).unwrap();

        let msgs: Vec<MboxMsg> = (1..=12).collect();
        rig.post_all("dsp", &msgs);
        let expected: Vec<MboxMsg> = msgs.iter().map(|m| m + 0x100).collect();
        assert_eq!(rig.collect_sent("dsp", msgs.len()), expected);

        let stats = dsp.stats();
        assert_eq!(stats.rx.delivered, 12);
        assert_eq!(stats.tx.delivered, 12);
        assert_eq!(stats.tx.rejected, 0);

        rig.registry.put(&dsp, &echo);
        assert!(!rig.clock.is_enabled("dsp"));
    }

    #[test]
    fn test_tx_back_pressure() {
        init_logging();
        let rig = MailboxRig::from_config(&config(2, 8));
        let (observer, _) = recorder();
        let dsp = rig.registry.get("dsp", &observer).unwrap();
        let hw = rig.hw("dsp");

        for msg in 1..=6 {
            dsp.send(msg).unwrap();
        }
        rig.wait_idle();
        assert_eq!(hw.tx_len(), 2);
        assert_eq!(dsp.stats().tx.len, 4);
        assert!(hw.irq_enabled(MailboxIrq::Tx));

        assert_eq!(rig.collect_sent("dsp", 6), vec![1, 2, 3, 4, 5, 6]);
        rig.wait_idle();
        assert_eq!(dsp.stats().tx.len, 0);
        assert_eq!(hw.overflows(), 0);
    }

    #[test]
    fn test_rx_overrun_resumes_on_next_signal() {
        init_logging();
        let rig = MailboxRig::from_config(&config(4, 2));
        let hw = rig.hw("dsp");
        // Posted while the channel is down: latched without a signal.
        for msg in [10, 20, 30, 40] {
            assert!(hw.post(msg));
        }

        let (observer, seen) = recorder();
        let _dsp = rig.registry.get("dsp", &observer).unwrap();
        assert!(hw.retrigger());
        rig.wait_idle();
        assert_eq!(*lock(&seen), vec![10, 20]);
        assert_eq!(hw.rx_len(), 2);

        assert!(hw.retrigger());
        rig.wait_idle();
        assert_eq!(*lock(&seen), vec![10, 20, 30, 40]);
        assert!(!hw.retrigger());
    }

    #[test]
    fn test_fifo1_endpoint_one_word_per_signal() {
        init_logging();
        let rig = MailboxRig::from_config(&config(4, 8));
        let (observer, seen) = recorder();
        let iva = rig.registry.get("iva", &observer).unwrap();
        assert_eq!(iva.hw_type(), FifoType::Fifo1);

        rig.post_all("iva", &[7, 8, 9]);
        assert_eq!(*lock(&seen), vec![7, 8, 9]);
    }

    #[test]
    fn test_fifo1_deep_fifo_drains_on_ack() {
        init_logging();
        let mut iva = EndpointConfig::new("iva", 34, FifoType::Fifo1);
        iva.fifo_depth = 3;
        let rig = MailboxRig::from_config(&MailboxConfig {
            queue_capacity: 4,
            endpoints: vec![iva],
            ..MailboxConfig::default()
        });
        let (observer, seen) = recorder();
        let _iva = rig.registry.get("iva", &observer).unwrap();
        let hw = rig.hw("iva");

        // Only the acks re-raise the line; nothing else kicks the endpoint.
        let msgs: Vec<MboxMsg> = (0..500).collect();
        for &msg in &msgs {
            let mut tries = 0;
            while !hw.post(msg) {
                tries += 1;
                assert!(tries < 100, "receive path stopped draining");
                rig.wait_idle();
            }
        }
        rig.wait_idle();
        assert_eq!(*lock(&seen), msgs);
        assert_eq!(hw.rx_len(), 0);
    }

    #[test]
    fn test_shared_observers_and_use_count() {
        init_logging();
        let rig = MailboxRig::from_config(&config(4, 8));
        let (a, seen_a) = recorder();
        let (b, seen_b) = recorder();
        let dsp = rig.registry.get("dsp", &a).unwrap();
        rig.registry.get("dsp", &b).unwrap();
        assert_eq!(dsp.use_count(), 2);
        assert_eq!(rig.hw("dsp").startups(), 1);

        rig.post_all("dsp", &[5]);
        assert_eq!(*lock(&seen_a), vec![5]);
        assert_eq!(*lock(&seen_b), vec![5]);

        rig.registry.put(&dsp, &b);
        rig.post_all("dsp", &[6]);
        assert_eq!(*lock(&seen_a), vec![5, 6]);
        assert_eq!(*lock(&seen_b), vec![5]);

        rig.registry.put(&dsp, &a);
        assert_eq!(rig.hw("dsp").shutdowns(), 1);
        assert!(!dsp.is_live());
    }

    #[test]
    fn test_startup_failure_reported() {
        init_logging();
        let rig = MailboxRig::from_config(&config(4, 8));
        let (observer, _) = recorder();
        rig.clock.fail("dsp");

        match rig.registry.get("dsp", &observer) {
            Err(MailboxError::Startup { name, .. }) => assert_eq!(name, "dsp"),
            other => panic!("unexpected {:?}", other.map(|m| m.name().to_string())),
        }
        assert_eq!(rig.registry.find("dsp").unwrap().use_count(), 0);

        rig.clock.restore("dsp");
        let dsp = rig.registry.get("dsp", &observer).unwrap();
        assert!(dsp.is_live());
        assert!(rig.clock.is_enabled("dsp"));
    }

    #[test]
    fn test_suspend_resume_restores_interrupts() {
        init_logging();
        let rig = MailboxRig::from_config(&config(4, 8));
        let (observer, seen) = recorder();
        let dsp = rig.registry.get("dsp", &observer).unwrap();

        rig.registry.save_all_contexts();
        dsp.disable_irq(MailboxIrq::Rx);
        rig.registry.restore_all_contexts();
        assert_eq!(rig.hw("dsp").context_ops(), (1, 1));
        assert_eq!(rig.hw("iva").context_ops(), (0, 0));

        rig.post_all("dsp", &[0xabcd]);
        assert_eq!(*lock(&seen), vec![0xabcd]);
    }

    #[test]
    fn test_registry_from_config_file() {
        init_logging();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
            queue_capacity = 4

            [[endpoints]]
            name = "dsp"
            irq = 26
            fifo_depth = 2

            [[endpoints]]
            name = "ipu"
            irq = 27
            hw_type = "fifo1"
            queue_capacity = 3
            "#
        )
        .unwrap();

        let config = MailboxConfig::load(file.path()).unwrap();
        let rig = MailboxRig::from_config(&config);
        assert_eq!(rig.registry.names(), vec!["dsp", "ipu"]);
        assert_eq!(rig.registry.owner().as_deref(), Some("emulated-soc"));

        let ipu = rig.registry.by_id(1).unwrap();
        assert_eq!(ipu.irq(), 27);
        assert_eq!(ipu.hw_type(), FifoType::Fifo1);
        assert_eq!(ipu.stats().tx.capacity, 3);
        assert_eq!(rig.registry.by_id(0).unwrap().stats().rx.capacity, 4);
        assert_eq!(rig.hw("dsp").depth(), 2);

        assert!(matches!(
            rig.registry.get("dsp2", &recorder().0),
            Err(MailboxError::NotFound(_))
        ));
        assert_eq!(rig.registry.unregister(), 2);
        assert!(rig.registry.is_empty());
    }
}
