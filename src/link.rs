// Bluetooth serial link
//
// The module shows up as a plain serial port carrying one symbol per byte,
// same alphabet as the keypad. Reads happen on a blocking thread and bytes
// are handed to the control loop over a channel.

use std::io::{ErrorKind, Read};
use std::time::Duration;

use serialport::SerialPort;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Read timeout; bounds how long shutdown waits on the reader
pub const READ_TIMEOUT_MS: u64 = 100;

const READ_CHUNK: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Link closed by peer")]
    Closed,
}

pub type Result<T> = std::result::Result<T, LinkError>;

/// Pulls symbol bytes out of any byte stream
pub struct SymbolReader<R> {
    inner: R,
    buf: [u8; READ_CHUNK],
}

impl<R: Read> SymbolReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: [0; READ_CHUNK],
        }
    }

    /// Next chunk of symbols; empty on timeout
    pub fn poll(&mut self) -> Result<&[u8]> {
        match self.inner.read(&mut self.buf) {
            Ok(0) => Err(LinkError::Closed),
            Ok(n) => Ok(&self.buf[..n]),
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::Interrupted) => {
                Ok(&[])
            }
            Err(e) => Err(LinkError::Io(e)),
        }
    }
}

pub type BluetoothLink = SymbolReader<Box<dyn SerialPort>>;

/// Open the Bluetooth module's serial port
pub fn open_bluetooth(port_name: &str, baudrate: u32) -> Result<BluetoothLink> {
    info!("Opening Bluetooth link on {} at {} baud", port_name, baudrate);
    let port = serialport::new(port_name, baudrate)
        .timeout(Duration::from_millis(READ_TIMEOUT_MS))
        .open()?;
    Ok(SymbolReader::new(port))
}

/// Forward every received byte to `tx` until the link or the channel closes
pub fn spawn_reader<R>(mut reader: SymbolReader<R>, tx: mpsc::Sender<u8>) -> JoinHandle<()>
where
    R: Read + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        loop {
            // A quiet link only ever times out, so check for a gone receiver here
            if tx.is_closed() {
                debug!("Symbol receiver dropped, stopping link reader");
                return;
            }
            let bytes = match reader.poll() {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!("Symbol link stopped: {}", e);
                    return;
                }
            };
            for &byte in bytes {
                debug!("Link symbol 0x{:02X}", byte);
                if tx.blocking_send(byte).is_err() {
                    return;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    struct TimeoutThenData {
        timed_out: bool,
    }

    impl Read for TimeoutThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.timed_out {
                self.timed_out = true;
                return Err(std::io::Error::new(ErrorKind::TimedOut, "timeout"));
            }
            buf[0] = b'#';
            Ok(1)
        }
    }

    /// A link with nothing to say
    struct AlwaysTimedOut;

    impl Read for AlwaysTimedOut {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            std::thread::sleep(Duration::from_millis(1));
            Err(std::io::Error::new(ErrorKind::TimedOut, "timeout"))
        }
    }

    #[test]
    fn test_timeout_is_empty_read() {
        let mut reader = SymbolReader::new(TimeoutThenData { timed_out: false });
        assert!(reader.poll().unwrap().is_empty());
        assert_eq!(reader.poll().unwrap(), b"#");
    }

    #[test]
    fn test_eof_closes() {
        let mut reader = SymbolReader::new(Cursor::new(vec![0x67u8, 0x69]));
        assert_eq!(reader.poll().unwrap(), &[0x67, 0x69]);
        assert!(matches!(reader.poll(), Err(LinkError::Closed)));
    }

    #[tokio::test]
    async fn test_reader_forwards_bytes() {
        let (tx, mut rx) = mpsc::channel(16);
        let handle = spawn_reader(SymbolReader::new(Cursor::new(vec![0x66u8, b'x', 0xA0])), tx);

        let mut received = Vec::new();
        while let Some(byte) = rx.recv().await {
            received.push(byte);
        }
        handle.await.unwrap();
        assert_eq!(received, vec![0x66, b'x', 0xA0]);
    }

    #[tokio::test]
    async fn test_reader_exits_when_receiver_dropped() {
        let (tx, rx) = mpsc::channel(16);
        let handle = spawn_reader(SymbolReader::new(AlwaysTimedOut), tx);
        tokio::time::sleep(Duration::from_millis(10)).await;
        drop(rx);

        let joined = tokio::time::timeout(Duration::from_secs(2), handle).await;
        assert!(joined.is_ok(), "reader still running on an idle link");
    }
}
