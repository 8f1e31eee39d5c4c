use pulsar::{Connection, Detail, Error, Fault, Protocol, SendfileTransfer, ServerBuilder, Signal};
use std::io::Read;
use std::net::TcpStream;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

fn temp_path(tag: &str) -> PathBuf {
    let unique = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock drift")
        .as_nanos();

    std::env::temp_dir().join(format!(
        "pulsar-{}-{}-{}.tmp",
        tag,
        std::process::id(),
        unique
    ))
}

/// Streams one file to the client across as many pulses as it takes, then
/// hangs up.
struct FileServer {
    path: PathBuf,
    transfer: Option<SendfileTransfer>,
}

impl Protocol for FileServer {
    fn ready(&mut self, connection: &Connection, _: &Detail) -> Result<Signal, Fault> {
        if self.transfer.is_none() {
            self.transfer = Some(SendfileTransfer::new(&self.path, 0, usize::MAX)?);
        }
        let transfer = self.transfer.as_mut().expect("transfer just created");

        connection.sendfile(transfer)?;

        if transfer.is_done() {
            Ok(Signal::TERMINATE)
        } else {
            Ok(Signal::CONTINUE)
        }
    }
}

#[test]
fn file_is_streamed_over_several_pulses() {
    let contents: Vec<u8> = (0..3 * 1024 * 1024u32).map(|i| (i * 7 % 256) as u8).collect();
    let path = temp_path("stream");
    std::fs::write(&path, &contents).unwrap();

    let served = path.clone();
    let server = ServerBuilder::new()
        .workers(2)
        .pulse_interval(Duration::from_millis(5))
        .build(move || FileServer {
            path: served.clone(),
            transfer: None,
        })
        .expect("server");

    let port = server.local_addr().unwrap().port();
    let mut client = TcpStream::connect(("127.0.0.1", port)).unwrap();
    client
        .set_read_timeout(Some(Duration::from_secs(10)))
        .unwrap();

    let mut received = Vec::new();
    client.read_to_end(&mut received).expect("read until server hangs up");
    assert_eq!(received.len(), contents.len());
    assert!(received == contents);

    drop(server);
    let _ = std::fs::remove_file(path);
}

#[test]
fn construction_failures_are_distinct() {
    let missing = temp_path("missing");
    assert!(matches!(
        SendfileTransfer::new(&missing, 0, 1),
        Err(Error::SendfileNotFound(_))
    ));

    assert!(matches!(
        SendfileTransfer::new(std::env::temp_dir(), 0, 1),
        Err(Error::SendfileNotFile)
    ));

    let path = temp_path("offset");
    std::fs::write(&path, b"tiny").unwrap();
    let err = SendfileTransfer::new(&path, 5, 1).unwrap_err();
    assert!(err.is_sendfile());
    assert_eq!(err.to_string(), "sendfile offset 5 is beyond file size 4");

    let _ = std::fs::remove_file(path);
}
