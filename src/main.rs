mod config;
mod db;
mod error;
mod import;
mod ipc;
mod logging;
mod store;

use std::io::{self, BufRead, Write};

use tracing::{info, warn};

/// Reads one `\n`-terminated line into `buf`, keeping at most `cap` bytes of
/// it; the remainder is consumed and discarded. Returns the full line length
/// without the newline, or `None` at end of input.
fn read_line_capped<R: BufRead>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    cap: usize,
) -> io::Result<Option<usize>> {
    buf.clear();
    let mut total = 0usize;
    let mut saw_any = false;
    loop {
        let available = reader.fill_buf()?;
        if available.is_empty() {
            return Ok(saw_any.then_some(total));
        }
        saw_any = true;
        let newline = available.iter().position(|b| *b == b'\n');
        let chunk = &available[..newline.unwrap_or(available.len())];
        let room = cap.saturating_sub(buf.len());
        buf.extend_from_slice(&chunk[..chunk.len().min(room)]);
        total += chunk.len();
        let used = newline.map_or(chunk.len(), |i| i + 1);
        reader.consume(used);
        if newline.is_some() {
            return Ok(Some(total));
        }
    }
}

fn main() {
    let config = config::Config::from_env();
    logging::init_tracing(&config);
    info!(version = env!("CARGO_PKG_VERSION"), "memberportald starting");

    let max_payload = config.max_payload_bytes;
    let mut state = ipc::AppState::new(config);

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut stdout = io::stdout();
    let mut buf = Vec::new();

    loop {
        let size = match read_line_capped(&mut input, &mut buf, max_payload) {
            Ok(Some(n)) => n,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "stdin read failed");
                break;
            }
        };
        if size <= max_payload && buf.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        let resp = if size > max_payload {
            ipc::payload_too_large(size, max_payload)
        } else {
            match serde_json::from_slice::<ipc::Request>(&buf) {
                Ok(req) => ipc::handle_request(&mut state, req),
                Err(e) => ipc::bad_json(e.to_string()),
            }
        };

        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
    info!("memberportald exiting");
}

#[cfg(test)]
mod tests {
    use super::read_line_capped;
    use std::io::{BufReader, Cursor};

    #[test]
    fn long_lines_are_truncated_but_fully_consumed() {
        // A tiny buffer forces the line to span several fill_buf calls.
        let mut reader = BufReader::with_capacity(4, Cursor::new(b"abcdefghij\nok\n".to_vec()));
        let mut buf = Vec::new();

        let n = read_line_capped(&mut reader, &mut buf, 3).unwrap();
        assert_eq!(n, Some(10));
        assert_eq!(buf, b"abc");

        let n = read_line_capped(&mut reader, &mut buf, 3).unwrap();
        assert_eq!(n, Some(2));
        assert_eq!(buf, b"ok");

        assert_eq!(read_line_capped(&mut reader, &mut buf, 3).unwrap(), None);
    }

    #[test]
    fn invalid_utf8_is_returned_as_bytes() {
        let mut reader = Cursor::new(b"{\"x\":\"\xff\xfe\"}\nlast".to_vec());
        let mut buf = Vec::new();
        assert_eq!(read_line_capped(&mut reader, &mut buf, 64).unwrap(), Some(10));
        assert!(std::str::from_utf8(&buf).is_err());
        // A final line without a newline still counts.
        assert_eq!(read_line_capped(&mut reader, &mut buf, 64).unwrap(), Some(4));
        assert_eq!(buf, b"last");
    }
}
