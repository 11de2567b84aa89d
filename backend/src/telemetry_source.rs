use crate::error::{ConnectivityError, ReadError};
use crate::schema::{RawValue, Schema, ATTITUDE, GENERAL, SIMCONNECT};
use crate::telemetry_decode::{decode_attitude, decode_instruments, decode_simconnect};
use chrono::{Local, Offset};
use flightfollowing_shared::{Attitude, InstrumentSnapshot, SimConnectMessage};
use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_BRIDGE_ADDRESS: &str = "127.0.0.1:9002";
pub const CONNECT_RETRY: Duration = Duration::from_secs(20);
const BRIDGE_TIMEOUT: Duration = Duration::from_millis(400);

// ======================================================================
//  Telemetry Source Trait
// ======================================================================
pub trait TelemetrySource: Send {
    fn open(&mut self) -> Result<(), ConnectivityError>;
    /// Blocking read of one schema group, values in schema order.
    fn read(&mut self, schema: &Schema) -> Result<Vec<RawValue>, ReadError>;
    fn close(&mut self);
    fn name(&self) -> &str;
}

// ======================================================================
//  Bridge Implementation
// ======================================================================
/// Reads offsets through a local bridge process attached to the simulator.
///
/// Request: u16 LE entry count, then u16 LE offset + u16 LE size per entry.
/// Response: u16 LE payload length, then the values back to back.
pub struct BridgeSource {
    address: String,
    stream: Option<TcpStream>,
}

impl BridgeSource {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            stream: None,
        }
    }

    fn connect(&self) -> Result<TcpStream, ConnectivityError> {
        let addr = self
            .address
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| ConnectivityError::Protocol(format!("cannot resolve {}", self.address)))?;
        let stream = TcpStream::connect_timeout(&addr, BRIDGE_TIMEOUT * 5)?;
        stream.set_read_timeout(Some(BRIDGE_TIMEOUT))?;
        stream.set_write_timeout(Some(BRIDGE_TIMEOUT))?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }

    fn exchange(stream: &mut TcpStream, schema: &Schema) -> Result<Vec<u8>, ConnectivityError> {
        stream.write_all(&encode_request(schema))?;
        stream.flush()?;

        let mut len_buf = [0u8; 2];
        stream.read_exact(&mut len_buf)?;
        let len = u16::from_le_bytes(len_buf) as usize;

        let mut payload = vec![0u8; len];
        stream.read_exact(&mut payload)?;
        Ok(payload)
    }
}

pub fn encode_request(schema: &Schema) -> Vec<u8> {
    let mut frame = Vec::with_capacity(2 + schema.entries.len() * 4);
    frame.extend_from_slice(&(schema.entries.len() as u16).to_le_bytes());
    for entry in schema.entries {
        frame.extend_from_slice(&entry.offset.to_le_bytes());
        frame.extend_from_slice(&(entry.tag.size() as u16).to_le_bytes());
    }
    frame
}

impl TelemetrySource for BridgeSource {
    fn open(&mut self) -> Result<(), ConnectivityError> {
        self.stream = Some(self.connect()?);
        Ok(())
    }

    fn read(&mut self, schema: &Schema) -> Result<Vec<RawValue>, ReadError> {
        if self.stream.is_none() {
            // one reconnect attempt per read after a dropped connection
            self.stream = Some(self.connect()?);
        }
        let Some(stream) = self.stream.as_mut() else {
            return Err(ConnectivityError::NotOpen.into());
        };

        match Self::exchange(stream, schema) {
            Ok(payload) => Ok(schema.parse_payload(&payload)?),
            Err(e) => {
                self.stream = None;
                Err(e.into())
            }
        }
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(std::net::Shutdown::Both);
        }
    }

    fn name(&self) -> &str {
        &self.address
    }
}

/// Keep calling `open()` until it succeeds or shutdown is requested.
pub async fn open_with_retry(
    mut source: Box<dyn TelemetrySource>,
    every: Duration,
    shutdown: &CancellationToken,
) -> Option<Box<dyn TelemetrySource>> {
    loop {
        match source.open() {
            Ok(()) => {
                tracing::info!(source = source.name(), "telemetry connection established");
                return Some(source);
            }
            Err(e) => {
                tracing::warn!(
                    "No simulator detected ({e}). Start your simulator first! Retrying in {} seconds.",
                    every.as_secs()
                );
            }
        }
        tokio::select! {
            _ = tokio::time::sleep(every) => {}
            _ = shutdown.cancelled() => return None,
        }
    }
}

// ======================================================================
//  Shared handle
// ======================================================================
/// Cloneable handle the polling tasks share; reads are serialized.
///
/// Source calls block on socket I/O, so they run on the blocking pool and
/// never stall the runtime workers that drive hotkeys and timers.
#[derive(Clone)]
pub struct Telemetry {
    source: Arc<Mutex<Box<dyn TelemetrySource>>>,
}

impl Telemetry {
    pub fn new(source: Box<dyn TelemetrySource>) -> Self {
        Self {
            source: Arc::new(Mutex::new(source)),
        }
    }

    async fn with_source<T, F>(&self, f: F) -> Result<T, ReadError>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn TelemetrySource) -> Result<T, ReadError> + Send + 'static,
    {
        let source = Arc::clone(&self.source);
        tokio::task::spawn_blocking(move || {
            let mut guard = source.lock().unwrap_or_else(|p| p.into_inner());
            f(&mut **guard)
        })
        .await?
    }

    pub async fn read_instruments(&self) -> Result<InstrumentSnapshot, ReadError> {
        let (general, attitude) = self
            .with_source(|source| Ok((source.read(&GENERAL)?, source.read(&ATTITUDE)?)))
            .await?;
        let offset = Local::now().offset().fix();
        Ok(decode_instruments(&general, &attitude, offset)?)
    }

    pub async fn read_attitude(&self) -> Result<Attitude, ReadError> {
        let raw = self.with_source(|source| source.read(&ATTITUDE)).await?;
        Ok(decode_attitude(&raw)?)
    }

    pub async fn read_simconnect(&self) -> Result<SimConnectMessage, ReadError> {
        let raw = self.with_source(|source| source.read(&SIMCONNECT)).await?;
        Ok(decode_simconnect(&raw)?)
    }

    pub fn close(&self) {
        let mut guard = self.source.lock().unwrap_or_else(|p| p.into_inner());
        guard.close();
    }
}
