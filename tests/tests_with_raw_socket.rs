use std::sync::Once;
use std::time::{Duration, Instant};

use more_asserts as ma;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use ping_sweep::{PingError, SweepConfig};

static SETUP: Once = Once::new();

fn setup() {
    SETUP.call_once(|| {
        let subscriber = FmtSubscriber::builder().with_max_level(Level::ERROR).finish();
        tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
    });
}

#[test]
fn sweep_of_unknown_interface_fails_before_opening_sockets() {
    setup();

    let result = ping_sweep::start_sweep("no-such-interface0", Duration::from_millis(100));

    assert!(matches!(result, Err(PingError::InterfaceNotFound(_))));
}

/*
* Note: Raw sockets work only with root privileges.
*/
#[test]
#[ignore = "raw sockets need root or CAP_NET_RAW"]
fn sweep_localhost_with_raw_socket() {
    setup();

    let timeout = Duration::from_millis(300);
    let hosts = vec!["127.0.0.1".to_string(), "127.0.0.2".to_string()];
    let start = Instant::now();

    let result = ping_sweep::sweep_hosts(hosts, &SweepConfig::new(timeout)).unwrap();

    ma::assert_ge!(start.elapsed(), timeout);
    assert_eq!(2, result.len());
    let alive = result.alive();
    assert_eq!(2, alive.len());
    assert_eq!("127.0.0.1", alive[0].address);
    ma::assert_lt!(alive[0].latency.unwrap(), timeout);
}
