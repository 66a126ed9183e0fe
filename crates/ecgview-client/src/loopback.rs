//! Single-threaded loopback HTTP server for exercising the client in tests.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc;
use std::thread;

/// One request as the server saw it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Recorded {
    pub request_line: String,
    pub body: String,
}

/// Fixed reply for [`serve_in_order`].
#[derive(Debug, Clone)]
pub struct Canned {
    pub status: u16,
    pub body: String,
}

impl Canned {
    pub fn ok(body: &str) -> Self {
        Self {
            status: 200,
            body: body.to_string(),
        }
    }
}

/// Answer `count` requests through `route(request_line, body)` on a loopback port.
///
/// Returns the base URL and a receiver yielding every request after it was answered.
pub fn serve<F>(count: usize, mut route: F) -> io::Result<(String, mpsc::Receiver<Recorded>)>
where
    F: FnMut(&str, &str) -> (u16, String) + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for _ in 0..count {
            let recorded = listener
                .accept()
                .and_then(|(stream, _)| answer(stream, &mut route));
            match recorded {
                Ok(recorded) => {
                    if tx.send(recorded).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    log::warn!("loopback server stopped: {}", err);
                    break;
                }
            }
        }
    });
    Ok((format!("http://{}", addr), rx))
}

/// Reply with `responses` in order, one per request.
pub fn serve_in_order(responses: Vec<Canned>) -> io::Result<(String, mpsc::Receiver<Recorded>)> {
    let count = responses.len();
    let mut replies = responses.into_iter();
    serve(count, move |_, _| {
        replies
            .next()
            .map_or((500, String::new()), |c| (c.status, c.body))
    })
}

fn answer<F>(mut stream: TcpStream, route: &mut F) -> io::Result<Recorded>
where
    F: FnMut(&str, &str) -> (u16, String),
{
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut request_line = String::new();
    reader.read_line(&mut request_line)?;
    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        reader.read_line(&mut line)?;
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value
                    .trim()
                    .parse()
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            }
        }
    }
    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body)?;
    let body = String::from_utf8_lossy(&body).into_owned();
    let request_line = request_line.trim_end().to_string();
    let (status, reply) = route(&request_line, &body);
    write!(
        stream,
        "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        reply.len(),
        reply
    )?;
    stream.flush()?;
    Ok(Recorded { request_line, body })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_each_request_and_records_it() {
        let (url, rx) = serve(1, |line, body| {
            assert!(line.starts_with("POST /echo "));
            (201, body.to_string())
        })
        .unwrap();
        let response = ureq::post(&format!("{}/echo", url))
            .send_string("{\"a\":1}")
            .unwrap();
        assert_eq!(response.status(), 201);
        assert_eq!(response.into_string().unwrap(), "{\"a\":1}");
        let recorded = rx.recv().unwrap();
        assert_eq!(recorded.request_line, "POST /echo HTTP/1.1");
        assert_eq!(recorded.body, "{\"a\":1}");
    }
}
