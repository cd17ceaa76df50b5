// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Modbus RTU frame encode/decode for the Waveshare-style relay cards
//! (spec §4.1, §6.4).

use locker_core::crc16::{append_crc, verify_frame};

use crate::error::ModbusError;

const FC_READ_HOLDING: u8 = 0x03;
const FC_WRITE_REGISTER: u8 = 0x06;
const FC_WRITE_COIL: u8 = 0x05;

/// Register Waveshare boards use for software slave-address reassignment.
pub const SOFTWARE_ADDRESS_REGISTER: u16 = 0x4000;

/// The address every slave accepts broadcast writes on.
pub const BROADCAST_ADDRESS: u8 = 0x00;

const COIL_ON: u16 = 0xFF00;
const COIL_OFF: u16 = 0x0000;

/// `card_address = ceil(locker_id / 16)`, `channel = ((locker_id - 1) mod 16) + 1` (§6.4).
pub fn locker_to_relay(locker_id: i64) -> (u8, u8) {
    debug_assert!(locker_id >= 1);
    let card_address = (locker_id - 1) / 16 + 1;
    let channel = ((locker_id - 1) % 16) + 1;
    (card_address as u8, channel as u8)
}

/// Single-coil write (function code 0x05): relay `channel` (1-based) on `slave`.
pub fn encode_write_coil(slave: u8, channel: u8, on: bool) -> Vec<u8> {
    let address = (channel - 1) as u16;
    let value = if on { COIL_ON } else { COIL_OFF };
    encode_write(slave, FC_WRITE_COIL, address, value)
}

/// Write-register (function code 0x06), used for software address reassignment.
pub fn encode_write_register(slave: u8, register: u16, value: u16) -> Vec<u8> {
    encode_write(slave, FC_WRITE_REGISTER, register, value)
}

fn encode_write(slave: u8, function_code: u8, address: u16, value: u16) -> Vec<u8> {
    let mut frame = vec![slave, function_code];
    frame.extend_from_slice(&address.to_be_bytes());
    frame.extend_from_slice(&value.to_be_bytes());
    append_crc(&mut frame);
    frame
}

/// Read-holding-registers (function code 0x03), used for presence probing.
pub fn encode_read_holding(slave: u8, register: u16, count: u16) -> Vec<u8> {
    let mut frame = vec![slave, FC_READ_HOLDING];
    frame.extend_from_slice(&register.to_be_bytes());
    frame.extend_from_slice(&count.to_be_bytes());
    append_crc(&mut frame);
    frame
}

/// A decoded, CRC-validated response frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseFrame {
    pub slave: u8,
    pub function_code: u8,
    pub body: Vec<u8>,
}

/// Validate CRC and split a raw response into `(slave, function_code, body)`.
/// An echoed write (0x05/0x06) has no meaningful body; a read (0x03) response
/// body is `[byte_count, data...]`.
pub fn decode_response(raw: &[u8]) -> Result<ResponseFrame, ModbusError> {
    if raw.len() < 4 {
        return Err(ModbusError::NoResponse);
    }
    if !verify_frame(raw) {
        return Err(ModbusError::CrcMismatch);
    }
    let body = raw[2..raw.len() - 2].to_vec();
    Ok(ResponseFrame { slave: raw[0], function_code: raw[1], body })
}

#[cfg(test)]
#[path = "frame_tests.rs"]
mod tests;
