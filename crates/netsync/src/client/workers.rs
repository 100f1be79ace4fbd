use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use log::{debug, trace};

use super::link::Link;
use crate::net::MAX_DATAGRAM_SIZE;

/// Starts the receive, resend and keepalive loops for one connection.
pub(crate) fn spawn_all(link: &Arc<Link>) -> Vec<JoinHandle<()>> {
    let loops: [fn(Arc<Link>); 3] = [receive_loop, resend_loop, keepalive_loop];
    loops
        .into_iter()
        .map(|run| {
            let link = Arc::clone(link);
            thread::spawn(move || run(link))
        })
        .collect()
}

fn receive_loop(link: Arc<Link>) {
    let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];

    while !link.cancel.is_cancelled() {
        match link.endpoint.receive(&mut buffer) {
            Ok(Some(size)) => link.handle_datagram(&buffer[..size], Instant::now()),
            Ok(None) => {}
            Err(e) => {
                link.fail(format!("receive failed: {}", e));
                break;
            }
        }
    }
    trace!("Receive loop stopped");
}

fn resend_loop(link: Arc<Link>) {
    let counters = link.endpoint.counters();

    while !link.cancel.wait(link.config.resend_interval) {
        let batch = link.channel.collect_resends(Instant::now());

        for (sequence, data) in &batch.resend {
            if let Err(e) = link.endpoint.send_bytes(data) {
                link.fail(format!("resend of packet {} failed: {}", sequence, e));
                return;
            }
            counters.record_retransmission();
        }

        if !batch.exhausted.is_empty() {
            counters.record_reliable_dropped(batch.exhausted.len());
            debug!(
                "Gave up on reliable packets {:?} after {} retries",
                batch.exhausted, link.config.max_retries
            );
        }
    }
    trace!("Resend loop stopped");
}

fn keepalive_loop(link: Arc<Link>) {
    while !link.cancel.wait(link.config.keepalive_interval) {
        let sent = link
            .channel
            .keepalive()
            .map_err(|e| e.to_string())
            .and_then(|data| link.endpoint.send_bytes(&data).map_err(|e| e.to_string()));
        if let Err(reason) = sent {
            link.fail(format!("keepalive failed: {}", reason));
            return;
        }
    }
    trace!("Keepalive loop stopped");
}
