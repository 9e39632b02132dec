//! Line-per-message transport on stdin

use crate::worker::MessageSender;
use log::{debug, info, warn};
use std::io::{self, BufRead};
use std::thread::{self, JoinHandle};

/// Forward each line of `reader` as one message
///
/// Line endings (`\n` or `\r\n`) are stripped. Returns the number of lines
/// forwarded; stops early if the queue is closed.
pub fn forward_lines<R: BufRead>(reader: R, tx: &MessageSender) -> usize {
    let mut sent = 0;

    for line in reader.split(b'\n') {
        let mut line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("stdin read error: {}", e);
                break;
            }
        };
        if line.last() == Some(&b'\r') {
            line.pop();
        }

        if tx.send(line).is_err() {
            debug!("Message queue closed, stopping stdin reader");
            break;
        }
        sent += 1;
    }

    sent
}

/// Read messages from stdin on a background thread
///
/// EOF on stdin ends this reader only; other transports keep running.
pub fn spawn_reader(tx: MessageSender) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || {
            let stdin = io::stdin();
            let count = forward_lines(stdin.lock(), &tx);
            info!("stdin closed after {} messages", count);
        })
}
