//! Offset-addressed read schemas for the simulator's shared memory.
//!
//! Each group is an ordered list of (offset, type) pairs. The order is the
//! contract with the decoder: `telemetry_decode` indexes values by position.

use crate::error::DecodeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    F64,
    /// NUL-terminated Latin-1 string in a fixed-size field.
    Text(u16),
    /// Raw bytes, NULs preserved.
    Bytes(u16),
}

impl TypeTag {
    pub fn size(self) -> usize {
        match self {
            TypeTag::U8 => 1,
            TypeTag::I16 | TypeTag::U16 => 2,
            TypeTag::I32 | TypeTag::U32 => 4,
            TypeTag::I64 | TypeTag::F64 => 8,
            TypeTag::Text(n) | TypeTag::Bytes(n) => n as usize,
        }
    }

    fn parse(self, bytes: &[u8]) -> RawValue {
        let mut wide = [0u8; 8];
        let n = bytes.len().min(8);
        wide[..n].copy_from_slice(&bytes[..n]);
        match self {
            TypeTag::U8 => RawValue::UInt(bytes[0] as u64),
            TypeTag::I16 => RawValue::Int(i16::from_le_bytes([bytes[0], bytes[1]]) as i64),
            TypeTag::U16 => RawValue::UInt(u16::from_le_bytes([bytes[0], bytes[1]]) as u64),
            TypeTag::I32 => {
                RawValue::Int(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as i64)
            }
            TypeTag::U32 => {
                RawValue::UInt(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as u64)
            }
            TypeTag::I64 => RawValue::Int(i64::from_le_bytes(wide)),
            TypeTag::F64 => RawValue::Float(f64::from_le_bytes(wide)),
            TypeTag::Text(_) => {
                let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
                RawValue::Text(bytes[..end].iter().map(|&b| b as char).collect())
            }
            TypeTag::Bytes(_) => RawValue::Bytes(bytes.to_vec()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaEntry {
    pub offset: u16,
    pub tag: TypeTag,
}

const fn at(offset: u16, tag: TypeTag) -> SchemaEntry {
    SchemaEntry { offset, tag }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schema {
    pub name: &'static str,
    pub entries: &'static [SchemaEntry],
}

impl Schema {
    pub fn payload_size(&self) -> usize {
        self.entries.iter().map(|e| e.tag.size()).sum()
    }

    /// Split a little-endian payload into one value per entry.
    pub fn parse_payload(&self, bytes: &[u8]) -> Result<Vec<RawValue>, DecodeError> {
        let expected = self.payload_size();
        if bytes.len() != expected {
            return Err(DecodeError::PayloadSize {
                expected,
                got: bytes.len(),
            });
        }

        let mut out = Vec::with_capacity(self.entries.len());
        let mut cursor = 0;
        for entry in self.entries {
            let size = entry.tag.size();
            out.push(entry.tag.parse(&bytes[cursor..cursor + size]));
            cursor += size;
        }
        Ok(out)
    }
}

/// One value as read from the simulator, before any unit conversion.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

pub const SIMCONNECT_TEXT_LEN: u16 = 2028;

pub const GENERAL: Schema = Schema {
    name: "general",
    entries: &[
        at(0x034E, TypeTag::U16),      // com1 frequency, BCD
        at(0x3118, TypeTag::U16),      // com2 frequency, BCD
        at(0x3122, TypeTag::U8),       // radio active flags
        at(0x0560, TypeTag::I64),      // latitude
        at(0x0568, TypeTag::I64),      // longitude
        at(0x30F0, TypeTag::I16),      // flaps angle * 256
        at(0x0366, TypeTag::I16),      // on ground
        at(0x0BC8, TypeTag::I16),      // parking brake
        at(0x3324, TypeTag::I32),      // altitude, feet
        at(0x0020, TypeTag::U32),      // ground altitude, metres * 256
        at(0x0BCC, TypeTag::U32),      // spoilers armed
        at(0x07BC, TypeTag::U32),      // AP master
        at(0x07C4, TypeTag::U32),      // AP nav1 lock
        at(0x07C8, TypeTag::U32),      // AP heading lock
        at(0x07CC, TypeTag::U16),      // AP heading, degrees * 65536 / 360
        at(0x07D0, TypeTag::U32),      // AP altitude lock
        at(0x07D4, TypeTag::U32),      // AP altitude, metres * 65536
        at(0x07DC, TypeTag::U32),      // AP airspeed hold
        at(0x07E2, TypeTag::I16),      // AP airspeed, knots
        at(0x0580, TypeTag::U32),      // true heading
        at(0x02A0, TypeTag::I16),      // magnetic variation, -ve west
        at(0x0354, TypeTag::U16),      // transponder, BCD
        at(0x6048, TypeTag::F64),      // next waypoint distance, metres
        at(0x60A4, TypeTag::Text(6)),  // next waypoint id
        at(0x60E4, TypeTag::U32),      // next waypoint time enroute, seconds
        at(0x2F80, TypeTag::U8),       // autobrake switch
        at(0x02B8, TypeTag::U32),      // TAS, knots * 128
        at(0x02BC, TypeTag::U32),      // IAS, knots * 128
        at(0x0808, TypeTag::U32),      // yaw damper
        at(0x080C, TypeTag::U32),      // TOGA
        at(0x0810, TypeTag::U32),      // autothrottle arm
        at(0x11C6, TypeTag::I16),      // mach * 20480
        at(0x60E8, TypeTag::U32),      // next waypoint ETA, seconds
        at(0x6050, TypeTag::F64),      // next waypoint magnetic bearing, radians
        at(0x6137, TypeTag::Text(5)),  // destination id
        at(0x6198, TypeTag::U32),      // destination time enroute, seconds
        at(0x619C, TypeTag::U32),      // destination ETA, seconds
        at(0x61A0, TypeTag::F64),      // route total distance, metres
        at(0x61A8, TypeTag::F64),      // estimated fuel burn, gallons
    ],
};

pub const SIMCONNECT: Schema = Schema {
    name: "simconnect",
    entries: &[
        at(0xB000, TypeTag::U32), // changed counter
        at(0xB004, TypeTag::U32), // message type
        at(0xB008, TypeTag::U32), // display duration, seconds
        at(0xB00C, TypeTag::U32), // event id
        at(0xB010, TypeTag::U32), // text length
        at(0xB014, TypeTag::Bytes(SIMCONNECT_TEXT_LEN)),
    ],
};

pub const ATTITUDE: Schema = Schema {
    name: "attitude",
    entries: &[
        at(0x0578, TypeTag::I32), // pitch, -ve nose up
        at(0x057C, TypeTag::I32), // bank, -ve right
    ],
};
