use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;
use bus::{Bus, BusReader};
use log::{debug, info, warn};
use crate::libs::application::application::{BusInput, BusOutput};
use crate::libs::bridge::bridge_event::{offer, RelayMessage};
use crate::libs::relay::relay::Relay;
use crate::libs::util::errors::MorseRelayError;

// How long any socket or channel wait lasts before the terminate flag is checked again.
const TERMINATE_CHECK_INTERVAL: Duration = Duration::from_millis(50);

// Reads newline-terminated messages until EOF, error or termination, passing each to `deliver`.
// Malformed lines are logged and skipped. Bytes are gathered until the newline before decoding,
// as a timeout can fall inside a multi-byte character.
fn read_messages<F>(stream: TcpStream, terminate: &AtomicBool, mut deliver: F) -> Result<(), String>
    where F: FnMut(RelayMessage)
{
    stream.set_read_timeout(Some(TERMINATE_CHECK_INTERVAL)).map_err(|e| e.to_string())?;
    let mut reader = BufReader::new(stream);
    let mut line: Vec<u8> = vec![];
    loop {
        if terminate.load(Ordering::SeqCst) {
            return Ok(());
        }
        match reader.read_until(b'\n', &mut line) {
            Ok(0) => {
                return Err("connection closed".to_owned());
            }
            Ok(_) => {
                // A timeout can leave a partial line; keep it until the newline arrives.
                if line.ends_with(b"\n") {
                    match std::str::from_utf8(&line) {
                        Ok(text) => match RelayMessage::from_json_line(text) {
                            Ok(message) => deliver(message),
                            Err(e) => warn!("{}", e),
                        },
                        Err(e) => warn!("Relay line is not UTF-8: {}", e),
                    }
                    line.clear();
                }
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => {}
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => {
                return Err(e.to_string());
            }
        }
    }
}

// Joins the connection threads that have ended, keeping the rest.
fn join_finished(handles: &mut Vec<JoinHandle<()>>) {
    let (finished, running): (Vec<_>, Vec<_>) = handles.drain(..).partition(|handle| handle.is_finished());
    *handles = running;
    for handle in finished {
        let _ = handle.join();
    }
}

fn write_message(stream: &mut TcpStream, message: &RelayMessage) -> Result<(), String> {
    let mut line = message.to_json_line()?;
    line.push('\n');
    stream.write_all(line.as_bytes()).map_err(|e| e.to_string())?;
    stream.flush().map_err(|e| e.to_string())
}

/// Serves a `Relay` over TCP: one line of JSON per message in each direction.
pub struct RelayServer {
    local_addr: SocketAddr,
    accept_thread_handle: Option<JoinHandle<()>>,
}

impl RelayServer {
    pub fn bind(addr: &str, relay: Arc<Relay>, terminate: Arc<AtomicBool>) -> Result<Self, MorseRelayError> {
        let unavailable = |e: std::io::Error| MorseRelayError::ChannelUnavailable(format!("Cannot listen on {}: {}", addr, e));
        let listener = TcpListener::bind(addr).map_err(unavailable)?;
        listener.set_nonblocking(true).map_err(unavailable)?;
        let local_addr = listener.local_addr().map_err(unavailable)?;
        info!("Relay listening on {}", local_addr);

        let accept_thread_handle = thread::spawn(move || {
            let mut connection_handles: Vec<JoinHandle<()>> = vec![];
            loop {
                if terminate.load(Ordering::SeqCst) {
                    info!("Terminating relay server");
                    break;
                }
                join_finished(&mut connection_handles);
                match listener.accept() {
                    Ok((stream, peer)) => {
                        match serve_connection(stream, peer, relay.clone(), terminate.clone()) {
                            Ok(mut handles) => connection_handles.append(&mut handles),
                            Err(e) => warn!("Could not serve {}: {}", peer, e),
                        }
                    }
                    Err(e) if e.kind() == ErrorKind::WouldBlock => {
                        thread::sleep(TERMINATE_CHECK_INTERVAL);
                    }
                    Err(e) => {
                        warn!("Relay accept failed: {}", e);
                        thread::sleep(TERMINATE_CHECK_INTERVAL);
                    }
                }
            }
            for handle in connection_handles {
                let _ = handle.join();
            }
            debug!("Relay server accept thread stopped");
        });

        Ok(Self { local_addr, accept_thread_handle: Some(accept_thread_handle) })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl Drop for RelayServer {
    fn drop(&mut self) {
        debug!("RelayServer joining accept thread (terminate flag must be set)...");
        self.accept_thread_handle.take().map(JoinHandle::join);
    }
}

// Each connection gets a reader thread publishing into the relay and a writer thread sending
// what the relay forwards.
fn serve_connection(stream: TcpStream, peer: SocketAddr, relay: Arc<Relay>, terminate: Arc<AtomicBool>) -> Result<Vec<JoinHandle<()>>, String> {
    stream.set_nonblocking(false).map_err(|e| e.to_string())?;
    let (id, rx) = relay.connect()?;
    info!("Relay connection {} from {}", id, peer);
    let mut write_stream = stream.try_clone().map_err(|e| e.to_string())?;
    let connection_gone = Arc::new(AtomicBool::new(false));

    let reader_relay = relay.clone();
    let reader_terminate = terminate.clone();
    let reader_gone = connection_gone.clone();
    let reader = thread::spawn(move || {
        if let Err(e) = read_messages(stream, &reader_terminate, |message| reader_relay.publish(id, message)) {
            debug!("Relay connection {} read ended: {}", id, e);
        }
        reader_gone.store(true, Ordering::SeqCst);
        reader_relay.disconnect(id);
    });

    let writer = thread::spawn(move || {
        loop {
            if terminate.load(Ordering::SeqCst) || connection_gone.load(Ordering::SeqCst) {
                break;
            }
            match rx.recv_timeout(TERMINATE_CHECK_INTERVAL) {
                Ok(message) => {
                    if let Err(e) = write_message(&mut write_stream, &message) {
                        debug!("Relay connection {} write ended: {}", id, e);
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        let _ = write_stream.shutdown(Shutdown::Both);
        relay.disconnect(id);
    });
    Ok(vec![reader, writer])
}

/// A session's connection to a relay server. Messages from the bus set with `set_input_rx` are
/// sent to the server; messages from the server are offered to the bus set with `set_output_tx`.
/// A lost connection is reported once and not retried.
pub struct RelayLink {
    connected: Arc<AtomicBool>,
    error: Arc<Mutex<Option<MorseRelayError>>>,
    input_rx: Arc<Mutex<Option<Arc<Mutex<BusReader<RelayMessage>>>>>>,
    output_tx: Arc<Mutex<Option<Arc<Mutex<Bus<RelayMessage>>>>>>,
    stream: TcpStream,
    thread_handles: Vec<JoinHandle<()>>,
}

impl BusInput<RelayMessage> for RelayLink {
    fn clear_input_rx(&mut self) {
        match self.input_rx.lock() {
            Ok(mut locked) => { *locked = None; }
            Err(_) => {}
        }
    }

    fn set_input_rx(&mut self, input_rx: Arc<Mutex<BusReader<RelayMessage>>>) {
        match self.input_rx.lock() {
            Ok(mut locked) => { *locked = Some(input_rx); }
            Err(_) => {}
        }
    }
}

impl BusOutput<RelayMessage> for RelayLink {
    fn clear_output_tx(&mut self) {
        match self.output_tx.lock() {
            Ok(mut locked) => { *locked = None; }
            Err(_) => {}
        }
    }

    fn set_output_tx(&mut self, output_tx: Arc<Mutex<Bus<RelayMessage>>>) {
        match self.output_tx.lock() {
            Ok(mut locked) => { *locked = Some(output_tx); }
            Err(_) => {}
        }
    }
}

// Records the first failure only.
fn lost(connected: &AtomicBool, error: &Mutex<Option<MorseRelayError>>, detail: String) {
    if connected.swap(false, Ordering::SeqCst) {
        let e = MorseRelayError::ChannelUnavailable(detail);
        warn!("{}", e);
        if let Ok(mut locked) = error.lock() {
            *locked = Some(e);
        }
    }
}

impl RelayLink {
    pub fn connect(addr: &str, terminate: Arc<AtomicBool>) -> Result<Self, MorseRelayError> {
        let stream = TcpStream::connect(addr)
            .map_err(|e| MorseRelayError::ChannelUnavailable(format!("Cannot connect to relay at {}: {}", addr, e)))?;
        let cannot_use = |e: std::io::Error| MorseRelayError::ChannelUnavailable(format!("Cannot use relay connection: {}", e));
        let mut write_stream = stream.try_clone().map_err(cannot_use)?;
        let read_stream = stream.try_clone().map_err(cannot_use)?;
        info!("Connected to relay at {}", addr);

        let connected = Arc::new(AtomicBool::new(true));
        let error: Arc<Mutex<Option<MorseRelayError>>> = Arc::new(Mutex::new(None));
        let input_rx: Arc<Mutex<Option<Arc<Mutex<BusReader<RelayMessage>>>>>> = Arc::new(Mutex::new(None));
        let output_tx: Arc<Mutex<Option<Arc<Mutex<Bus<RelayMessage>>>>>> = Arc::new(Mutex::new(None));

        let reader_connected = connected.clone();
        let reader_error = error.clone();
        let reader_output_tx = output_tx.clone();
        let reader_terminate = terminate.clone();
        let reader = thread::spawn(move || {
            let result = read_messages(read_stream, &reader_terminate, |message| {
                if let Ok(locked) = reader_output_tx.lock() {
                    match locked.as_ref() {
                        None => debug!("No inbound bus; dropping {}", message),
                        Some(bus) => {
                            if let Err(e) = offer(bus, message) {
                                warn!("Inbound {}", e);
                            }
                        }
                    }
                }
            });
            if let Err(e) = result {
                lost(&reader_connected, &reader_error, format!("Relay connection lost: {}", e));
                // Dropping the inbound bus tells its readers that nothing more will arrive.
                if let Ok(mut locked) = reader_output_tx.lock() {
                    *locked = None;
                }
            }
            debug!("Relay link reader stopped");
        });

        let writer_connected = connected.clone();
        let writer_error = error.clone();
        let writer_input_rx = input_rx.clone();
        let writer = thread::spawn(move || {
            loop {
                if terminate.load(Ordering::SeqCst) || !writer_connected.load(Ordering::SeqCst) {
                    break;
                }
                // Can be updated by the BusInput<RelayMessage> above
                let mut need_sleep = false;
                let mut to_send = None;
                match writer_input_rx.lock() {
                    Ok(locked) => match locked.as_deref() {
                        None => need_sleep = true,
                        Some(input_rx) => {
                            if let Ok(mut reader) = input_rx.lock() {
                                match reader.recv_timeout(TERMINATE_CHECK_INTERVAL) {
                                    Ok(message) => to_send = Some(message),
                                    Err(RecvTimeoutError::Timeout) => {}
                                    Err(RecvTimeoutError::Disconnected) => need_sleep = true,
                                }
                            }
                        }
                    },
                    Err(_) => need_sleep = true,
                }
                if let Some(message) = to_send {
                    if let Err(e) = write_message(&mut write_stream, &message) {
                        lost(&writer_connected, &writer_error, format!("Relay connection lost: {}", e));
                        break;
                    }
                }
                if need_sleep {
                    thread::sleep(TERMINATE_CHECK_INTERVAL);
                }
            }
            let _ = write_stream.shutdown(Shutdown::Both);
            debug!("Relay link writer stopped");
        });

        Ok(Self { connected, error, input_rx, output_tx, stream, thread_handles: vec![reader, writer] })
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// The failure that ended the connection, if any. Reported once.
    pub fn take_error(&self) -> Option<MorseRelayError> {
        match self.error.lock() {
            Ok(mut locked) => locked.take(),
            Err(_) => None,
        }
    }
}

impl Drop for RelayLink {
    fn drop(&mut self) {
        debug!("RelayLink closing...");
        // Marked disconnected first so that closing isn't reported as a lost connection.
        self.connected.store(false, Ordering::SeqCst);
        let _ = self.stream.shutdown(Shutdown::Both);
        for handle in self.thread_handles.drain(..) {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
#[path = "./tcp_transport_spec.rs"]
mod tcp_transport_spec;
