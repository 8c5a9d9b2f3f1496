//! TCP bridge between operator consoles and the gateway
//!
//! One publisher thread owns the listener: it accepts consoles and broadcasts
//! every queued GUI event to all of them. Each console also gets a reader
//! thread that decodes operator intents and hands them to the gateway.
//!
//! # Connection lifecycle
//!
//! ```text
//! 1. Console connects to TCP port 5555
//! 2. Publisher adds it to the broadcast list and spawns its reader
//! 3. Reader handles intents until disconnect
//! 4. A failed write or a finished reader removes the console
//! ```

use crate::bridge::framing;
use crate::bridge::queue::EventQueue;
use crate::config::BridgeConfig;
use crate::error::{Error, Result};
use crate::gateway::{Gateway, IntentOutcome};
use crate::intent::OperatorIntent;
use std::io::{self, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Read timeout of console readers, bounds shutdown latency
const READ_TIMEOUT: Duration = Duration::from_millis(500);

/// Most events broadcast per publisher iteration
const PUBLISH_BATCH: usize = 50;

/// Idle sleep when no event is queued
const IDLE_SLEEP: Duration = Duration::from_millis(10);

/// Near-full iterations between two queue warnings
const QUEUE_WARN_EVERY: u64 = 100;

/// Console bridge server
pub struct BridgeServer {
    local_addr: SocketAddr,
    events: EventQueue,
    publisher_thread: Option<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

/// A connected console
struct Console {
    addr: SocketAddr,
    stream: TcpStream,
    alive: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
}

impl BridgeServer {
    /// Bind the listener and start the publisher thread
    ///
    /// `events` must be the queue the gateway emits into.
    pub fn start(
        config: &BridgeConfig,
        gateway: Arc<Gateway>,
        events: EventQueue,
    ) -> Result<Self> {
        let listener = TcpListener::bind(config.bind_address.as_str())?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = Arc::clone(&shutdown);
        let events_clone = events.clone();

        let publisher_thread = thread::Builder::new()
            .name("bridge-publisher".to_string())
            .spawn(move || {
                if let Err(e) =
                    Self::publisher_loop(listener, gateway, events_clone, shutdown_clone)
                {
                    log::error!("Bridge publisher error: {}", e);
                }
            })?;

        log::info!("Console bridge listening on TCP {}", local_addr);

        Ok(Self {
            local_addr,
            events,
            publisher_thread: Some(publisher_thread),
            shutdown,
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting events and wait for the publisher to exit
    pub fn stop(&mut self) {
        self.events.close();
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(thread) = self.publisher_thread.take() {
            if thread.join().is_err() {
                log::error!("Bridge publisher panicked");
            }
            log::info!("Console bridge stopped");
        }
    }

    fn publisher_loop(
        listener: TcpListener,
        gateway: Arc<Gateway>,
        events: EventQueue,
        shutdown: Arc<AtomicBool>,
    ) -> Result<()> {
        let mut consoles: Vec<Console> = Vec::new();
        let mut frame = Vec::with_capacity(1024);
        let mut published = 0u64;
        let mut near_full = 0u64;

        while !shutdown.load(Ordering::Relaxed) {
            match listener.accept() {
                Ok((stream, addr)) => match Self::connect(stream, addr, &gateway, &shutdown) {
                    Ok(console) => {
                        log::info!("Console connected: {}", addr);
                        consoles.push(console);
                    }
                    Err(e) => log::warn!("Failed to set up console {}: {}", addr, e),
                },
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) => log::error!("Error accepting console connection: {}", e),
            }

            // Consoles whose reader ended are gone
            consoles.retain_mut(|console| {
                let alive = console.alive.load(Ordering::Relaxed);
                if !alive {
                    log::info!("Console disconnected: {}", console.addr);
                    console.close();
                }
                alive
            });

            let mut batch = 0;
            while let Some(event) = events.pop() {
                frame.clear();
                match serde_json::to_vec(&event)
                    .map_err(Error::from)
                    .and_then(|payload| framing::encode_frame(&payload, &mut frame))
                {
                    Ok(()) => {
                        Self::broadcast(&mut consoles, &frame);
                        published += 1;
                    }
                    Err(e) => log::warn!("Failed to encode {}: {}", event.name(), e),
                }

                batch += 1;
                if batch >= PUBLISH_BATCH {
                    break;
                }
            }

            if events.is_near_full() {
                near_full += 1;
                if near_full % QUEUE_WARN_EVERY == 1 {
                    log::warn!(
                        "Event queue near full: {}/{} ({:.1}%)",
                        events.len(),
                        events.capacity(),
                        (events.len() as f32 / events.capacity() as f32) * 100.0
                    );
                }
            }

            if events.is_empty() {
                thread::sleep(IDLE_SLEEP);
            }
        }

        for console in &mut consoles {
            console.close();
        }
        log::info!("Bridge publisher exiting ({} events published)", published);
        Ok(())
    }

    /// Prepare an accepted stream and spawn its reader
    fn connect(
        stream: TcpStream,
        addr: SocketAddr,
        gateway: &Arc<Gateway>,
        shutdown: &Arc<AtomicBool>,
    ) -> Result<Console> {
        stream.set_nonblocking(false)?;
        let reader_stream = stream.try_clone()?;
        reader_stream.set_read_timeout(Some(READ_TIMEOUT))?;

        let alive = Arc::new(AtomicBool::new(true));
        let mut reader = ConsoleReader {
            gateway: Arc::clone(gateway),
            shutdown: Arc::clone(shutdown),
            alive: Arc::clone(&alive),
            buffer: Vec::with_capacity(256),
        };
        let handle = thread::Builder::new()
            .name(format!("bridge-reader-{}", addr))
            .spawn(move || reader.run(reader_stream))?;

        Ok(Console {
            addr,
            stream,
            alive,
            reader: Some(handle),
        })
    }

    /// Write one frame to every console, dropping those that fail
    fn broadcast(consoles: &mut Vec<Console>, frame: &[u8]) {
        consoles.retain_mut(|console| match console.stream.write_all(frame) {
            Ok(()) => true,
            Err(e) => {
                log::debug!("Console {} dropped: {}", console.addr, e);
                console.close();
                false
            }
        });
    }
}

impl Drop for BridgeServer {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Console {
    fn close(&mut self) {
        self.alive.store(false, Ordering::Relaxed);
        let _ = self.stream.shutdown(Shutdown::Both);
        if let Some(reader) = self.reader.take()
            && reader.join().is_err()
        {
            log::error!("Reader for console {} panicked", self.addr);
        }
    }
}

/// Reads operator intents from one console
struct ConsoleReader {
    gateway: Arc<Gateway>,
    /// Bridge shutdown
    shutdown: Arc<AtomicBool>,
    /// Connection health, cleared by either side
    alive: Arc<AtomicBool>,
    /// Reused for every frame
    buffer: Vec<u8>,
}

impl ConsoleReader {
    fn run(&mut self, mut stream: TcpStream) {
        while !self.shutdown.load(Ordering::Relaxed) && self.alive.load(Ordering::Relaxed) {
            match framing::read_frame(&mut stream, &mut self.buffer) {
                Ok(Some(len)) => self.handle_frame(len),
                Ok(None) => {}
                Err(Error::Io(ref e))
                    if matches!(
                        e.kind(),
                        io::ErrorKind::UnexpectedEof | io::ErrorKind::ConnectionReset
                    ) =>
                {
                    break;
                }
                Err(e) => {
                    if self.alive.load(Ordering::Relaxed) {
                        log::warn!("Closing console connection: {}", e);
                    }
                    break;
                }
            }
        }
        self.alive.store(false, Ordering::Relaxed);
    }

    fn handle_frame(&self, len: usize) {
        let intent: OperatorIntent = match serde_json::from_slice(&self.buffer[..len]) {
            Ok(intent) => intent,
            Err(e) => {
                log::warn!("Skipping malformed console frame: {}", e);
                return;
            }
        };

        match self.gateway.handle_intent(&intent) {
            Ok(IntentOutcome::Selected(selector)) => {
                log::debug!("Destination is now {}", selector);
            }
            Ok(IntentOutcome::Sent(report)) => {
                for (id, e) in &report.skipped {
                    log::debug!("Robot {} skipped: {}", id, e);
                }
            }
            // Rejections are logged by the translator
            Err(Error::Validation(_)) => {}
            Err(e) => log::error!("Failed to handle {:?} intent: {}", intent.endpoint, e),
        }
    }
}
