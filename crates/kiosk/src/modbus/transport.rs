// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The serial transport boundary: one real implementation over `tokio-serial`,
//! and a scriptable mock used by `controller_tests.rs` (spec §4.1 "instrument
//! Modbus transport to fail the first two writes ... succeed thereafter").

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::SerialPortBuilderExt;

use crate::error::ModbusError;

/// One request/response exchange over the RS-485 line. Implementors own
/// framing timeouts; callers just get a frame back or a `ModbusError`.
#[async_trait::async_trait]
pub trait SerialTransport: Send + Sync {
    async fn send_receive(&mut self, frame: &[u8], timeout: Duration) -> Result<Vec<u8>, ModbusError>;

    /// Broadcast writes (function code 0x06 to address 0x00) draw no response.
    async fn send_only(&mut self, frame: &[u8]) -> Result<(), ModbusError>;

    /// Whether the underlying port is still believed open (health sweep §4.1).
    fn is_open(&self) -> bool;
}

/// Real RS-485 transport over a `tokio-serial` port.
pub struct TokioSerialTransport {
    port: tokio_serial::SerialStream,
    open: bool,
}

impl TokioSerialTransport {
    pub fn open(path: &str, baudrate: u32) -> Result<Self, ModbusError> {
        let port = tokio_serial::new(path, baudrate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .open_native_async()
            .map_err(|_| ModbusError::PortClosed)?;
        Ok(Self { port, open: true })
    }
}

#[async_trait::async_trait]
impl SerialTransport for TokioSerialTransport {
    async fn send_receive(&mut self, frame: &[u8], timeout: Duration) -> Result<Vec<u8>, ModbusError> {
        if !self.open {
            return Err(ModbusError::PortClosed);
        }
        self.port.write_all(frame).await.map_err(|_| {
            self.open = false;
            ModbusError::PortClosed
        })?;

        let mut buf = [0u8; 256];
        let read = tokio::time::timeout(timeout, self.port.read(&mut buf))
            .await
            .map_err(|_| ModbusError::Timeout)?
            .map_err(|_| {
                self.open = false;
                ModbusError::PortClosed
            })?;
        if read == 0 {
            return Err(ModbusError::NoResponse);
        }
        Ok(buf[..read].to_vec())
    }

    async fn send_only(&mut self, frame: &[u8]) -> Result<(), ModbusError> {
        if !self.open {
            return Err(ModbusError::PortClosed);
        }
        self.port.write_all(frame).await.map_err(|_| {
            self.open = false;
            ModbusError::PortClosed
        })
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

/// Scriptable transport for controller tests: each call to `send_receive`/
/// `send_only` pops the next scripted [`MockStep`], advancing regardless of
/// the frame passed in. Lets a test say "fail twice, then succeed" (spec §8
/// scenario 4: "instrument Modbus transport to fail the first two writes
/// with CRC error, succeed thereafter").
#[cfg(test)]
#[derive(Debug, Clone)]
pub(crate) enum MockStep {
    Ok(Vec<u8>),
    Err(ModbusError),
}

#[cfg(test)]
pub(crate) struct MockSerialTransport {
    steps: std::collections::VecDeque<MockStep>,
    open: bool,
    pub calls: usize,
}

#[cfg(test)]
impl MockSerialTransport {
    pub fn new(steps: Vec<MockStep>) -> Self {
        Self { steps: steps.into(), open: true, calls: 0 }
    }

    pub fn close(&mut self) {
        self.open = false;
    }
}

#[cfg(test)]
#[async_trait::async_trait]
impl SerialTransport for MockSerialTransport {
    async fn send_receive(&mut self, _frame: &[u8], _timeout: Duration) -> Result<Vec<u8>, ModbusError> {
        self.calls += 1;
        match self.steps.pop_front() {
            Some(MockStep::Ok(echo)) => Ok(echo),
            Some(MockStep::Err(e)) => Err(e),
            None => Err(ModbusError::NoResponse),
        }
    }

    async fn send_only(&mut self, frame: &[u8]) -> Result<(), ModbusError> {
        self.send_receive(frame, Duration::from_millis(1)).await.map(|_| ())
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

#[cfg(test)]
#[path = "transport_tests.rs"]
mod tests;
