mod support;

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use memeshare_client::identity::StaticIdentity;
use memeshare_client::ws::{ConnectionState, WsClient};
use memeshare_shared::CLOSE_ABNORMAL;

use support::{alice, dial_count, latest, settle, test_config, FakeConnector, FakeNet};

fn client() -> (WsClient, Rc<RefCell<FakeNet>>) {
    let (connector, net) = FakeConnector::new();
    let identity = Rc::new(StaticIdentity::new(alice()));
    let ws = WsClient::new(Rc::new(test_config()), connector, identity);
    (ws, net)
}

fn gaps_ms(net: &Rc<RefCell<FakeNet>>) -> Vec<u128> {
    let net = net.borrow();
    net.dial_times
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).as_millis())
        .collect()
}

fn assert_close(actual: u128, expected: u128) {
    assert!(
        actual >= expected && actual < expected + 100,
        "expected a gap of ~{expected}ms, got {actual}ms"
    );
}

#[tokio::test(start_paused = true)]
async fn delays_grow_exponentially_between_failed_dials() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let (ws, net) = client();
            net.borrow_mut().fail_next = 3;

            ws.connect("u1");
            tokio::time::sleep(Duration::from_secs(6)).await;
            settle().await;

            // dial, then retries after 1000ms, 1500ms, 2250ms
            assert_eq!(dial_count(&net), 4);
            let gaps = gaps_ms(&net);
            assert_close(gaps[0], 1000);
            assert_close(gaps[1], 1500);
            assert_close(gaps[2], 2250);
            assert_eq!(ws.state(), ConnectionState::Connected);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn a_successful_connect_resets_the_backoff() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let (ws, net) = client();
            net.borrow_mut().fail_next = 2;

            ws.connect("u1");
            tokio::time::sleep(Duration::from_secs(4)).await;
            settle().await;
            assert_eq!(ws.state(), ConnectionState::Connected);
            let dials_so_far = dial_count(&net);

            // drop the connection; the next retry is back at the base delay
            let dropped_at = tokio::time::Instant::now();
            latest(&net).server_close(CLOSE_ABNORMAL, "flap");
            tokio::time::sleep(Duration::from_millis(1200)).await;
            settle().await;

            assert_eq!(dial_count(&net), dials_so_far + 1);
            let redial_at = *net.borrow().dial_times.last().unwrap();
            assert_close((redial_at - dropped_at).as_millis(), 1000);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn retries_continue_indefinitely_at_the_max_delay() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let (ws, net) = client();
            net.borrow_mut().fail_next = 12;

            ws.connect("u1");
            // delays: 1000, 1500, 2250, 3375, 5062, 7593, then 10000 capped
            tokio::time::sleep(Duration::from_secs(100)).await;
            settle().await;

            assert_eq!(dial_count(&net), 13);
            assert_eq!(ws.state(), ConnectionState::Connected);

            let gaps = gaps_ms(&net);
            // the last several gaps sit at the ceiling
            for gap in &gaps[gaps.len() - 4..] {
                assert_close(*gap, 10_000);
            }
        })
        .await;
}
