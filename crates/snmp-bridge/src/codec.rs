// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! SNMP v1/v2c message codec.
//!
//! Decodes community-based SNMP messages into a [`Packet`] and re-encodes
//! packets with the codec's own version and community. Decoding is total:
//! any malformed input yields a [`DecodeError`], never a panic.

use crate::ber::{self, Reader};
use std::fmt;
use thiserror::Error;

/// `sysUpTime.0`
pub const SYS_UPTIME_OID: &str = "1.3.6.1.2.1.1.3.0";

/// `snmpTrapOID.0`
pub const SNMP_TRAP_OID: &str = "1.3.6.1.6.3.1.1.4.1.0";

/// Default community used when re-encoding.
pub const DEFAULT_COMMUNITY: &str = "public";

/// Errors produced while decoding wire bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("message truncated at offset {0}")]
    Truncated(usize),

    #[error("unexpected tag 0x{found:02x} at offset {offset}, expected {expected}")]
    UnexpectedTag {
        offset: usize,
        expected: &'static str,
        found: u8,
    },

    #[error("invalid length encoding at offset {0}")]
    InvalidLength(usize),

    #[error("invalid integer encoding")]
    InvalidInteger,

    #[error("integer out of range for {0}")]
    IntegerOutOfRange(&'static str),

    #[error("invalid object identifier encoding")]
    InvalidOid,

    #[error("unsupported SNMP version {0}")]
    UnsupportedVersion(i64),

    #[error("unsupported PDU type 0x{0:02x}")]
    UnsupportedPdu(u8),

    #[error("unsupported value tag 0x{0:02x}")]
    UnsupportedValue(u8),

    #[error("{0} trailing bytes")]
    TrailingBytes(usize),
}

/// Errors produced while encoding a packet.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("invalid object identifier: {0:?}")]
    InvalidOid(String),

    #[error("v1 Trap-PDU without a trap header")]
    MissingTrapHeader,
}

// ---------------------------------------------------------------------------
// Protocol enums
// ---------------------------------------------------------------------------

/// SNMP message version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    V1,
    V2c,
}

impl Version {
    fn from_wire(v: i64) -> Result<Self, DecodeError> {
        match v {
            0 => Ok(Self::V1),
            1 => Ok(Self::V2c),
            other => Err(DecodeError::UnsupportedVersion(other)),
        }
    }

    fn as_wire(self) -> i64 {
        match self {
            Self::V1 => 0,
            Self::V2c => 1,
        }
    }
}

/// PDU types relayed by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PduType {
    Get = 0xa0,
    GetNext = 0xa1,
    Response = 0xa2,
    Set = 0xa3,
    /// SNMPv1 Trap-PDU; its header lives in [`Packet::v1_trap`].
    TrapV1 = 0xa4,
    GetBulk = 0xa5,
    Inform = 0xa6,
    Trap = 0xa7,
    Report = 0xa8,
}

impl PduType {
    pub fn from_tag(tag: u8) -> Result<Self, DecodeError> {
        match tag {
            0xa0 => Ok(Self::Get),
            0xa1 => Ok(Self::GetNext),
            0xa2 => Ok(Self::Response),
            0xa3 => Ok(Self::Set),
            0xa4 => Ok(Self::TrapV1),
            0xa5 => Ok(Self::GetBulk),
            0xa6 => Ok(Self::Inform),
            0xa7 => Ok(Self::Trap),
            0xa8 => Ok(Self::Report),
            other => Err(DecodeError::UnsupportedPdu(other)),
        }
    }

    pub fn tag(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for PduType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Get => "GetRequest",
            Self::GetNext => "GetNextRequest",
            Self::Response => "Response",
            Self::Set => "SetRequest",
            Self::TrapV1 => "SNMPv1-Trap",
            Self::GetBulk => "GetBulkRequest",
            Self::Inform => "InformRequest",
            Self::Trap => "SNMPv2-Trap",
            Self::Report => "Report",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Values and bindings
// ---------------------------------------------------------------------------

/// A typed variable-binding value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Integer(i32),
    OctetString(Vec<u8>),
    Null,
    ObjectIdentifier(String),
    IpAddress([u8; 4]),
    Counter32(u32),
    Gauge32(u32),
    TimeTicks(u32),
    Opaque(Vec<u8>),
    Counter64(u64),
    NoSuchObject,
    NoSuchInstance,
    EndOfMibView,
}

impl Value {
    /// Short type name for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Integer(_) => "Integer",
            Self::OctetString(_) => "OctetString",
            Self::Null => "Null",
            Self::ObjectIdentifier(_) => "ObjectIdentifier",
            Self::IpAddress(_) => "IpAddress",
            Self::Counter32(_) => "Counter32",
            Self::Gauge32(_) => "Gauge32",
            Self::TimeTicks(_) => "TimeTicks",
            Self::Opaque(_) => "Opaque",
            Self::Counter64(_) => "Counter64",
            Self::NoSuchObject => "NoSuchObject",
            Self::NoSuchInstance => "NoSuchInstance",
            Self::EndOfMibView => "EndOfMibView",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    fn decode(tag: u8, content: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let offset = content.offset();
        let bytes = content.bytes();
        let value = match tag {
            ber::TAG_INTEGER => {
                let v = ber::decode_i64(bytes)?;
                Self::Integer(i32::try_from(v).map_err(|_| DecodeError::IntegerOutOfRange("Integer"))?)
            }
            ber::TAG_OCTET_STRING => Self::OctetString(bytes.to_vec()),
            ber::TAG_NULL => Self::Null,
            ber::TAG_OBJECT_IDENTIFIER => Self::ObjectIdentifier(ber::decode_oid(bytes)?),
            ber::TAG_IP_ADDRESS => {
                let octets: [u8; 4] = bytes
                    .try_into()
                    .map_err(|_| DecodeError::InvalidLength(offset))?;
                Self::IpAddress(octets)
            }
            ber::TAG_COUNTER32 => Self::Counter32(ber::decode_u32(bytes, "Counter32")?),
            ber::TAG_GAUGE32 => Self::Gauge32(ber::decode_u32(bytes, "Gauge32")?),
            ber::TAG_TIMETICKS => Self::TimeTicks(ber::decode_u32(bytes, "TimeTicks")?),
            ber::TAG_OPAQUE => Self::Opaque(bytes.to_vec()),
            ber::TAG_COUNTER64 => Self::Counter64(ber::decode_u64(bytes)?),
            ber::TAG_NO_SUCH_OBJECT => Self::NoSuchObject,
            ber::TAG_NO_SUCH_INSTANCE => Self::NoSuchInstance,
            ber::TAG_END_OF_MIB_VIEW => Self::EndOfMibView,
            other => return Err(DecodeError::UnsupportedValue(other)),
        };
        Ok(value)
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<(), EncodeError> {
        match self {
            Self::Integer(v) => ber::write_tlv(out, ber::TAG_INTEGER, &ber::encode_i64(*v as i64)),
            Self::OctetString(b) => ber::write_tlv(out, ber::TAG_OCTET_STRING, b),
            Self::Null => ber::write_tlv(out, ber::TAG_NULL, &[]),
            Self::ObjectIdentifier(oid) => {
                ber::write_tlv(out, ber::TAG_OBJECT_IDENTIFIER, &ber::encode_oid(oid)?)
            }
            Self::IpAddress(octets) => ber::write_tlv(out, ber::TAG_IP_ADDRESS, octets),
            Self::Counter32(v) => ber::write_tlv(out, ber::TAG_COUNTER32, &ber::encode_u64(*v as u64)),
            Self::Gauge32(v) => ber::write_tlv(out, ber::TAG_GAUGE32, &ber::encode_u64(*v as u64)),
            Self::TimeTicks(v) => ber::write_tlv(out, ber::TAG_TIMETICKS, &ber::encode_u64(*v as u64)),
            Self::Opaque(b) => ber::write_tlv(out, ber::TAG_OPAQUE, b),
            Self::Counter64(v) => ber::write_tlv(out, ber::TAG_COUNTER64, &ber::encode_u64(*v)),
            Self::NoSuchObject => ber::write_tlv(out, ber::TAG_NO_SUCH_OBJECT, &[]),
            Self::NoSuchInstance => ber::write_tlv(out, ber::TAG_NO_SUCH_INSTANCE, &[]),
            Self::EndOfMibView => ber::write_tlv(out, ber::TAG_END_OF_MIB_VIEW, &[]),
        }
        Ok(())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{}", v),
            Self::OctetString(b) | Self::Opaque(b) => write!(f, "{:?}", String::from_utf8_lossy(b)),
            Self::Null => f.write_str("null"),
            Self::ObjectIdentifier(oid) => f.write_str(oid),
            Self::IpAddress([a, b, c, d]) => write!(f, "{}.{}.{}.{}", a, b, c, d),
            Self::Counter32(v) | Self::Gauge32(v) | Self::TimeTicks(v) => write!(f, "{}", v),
            Self::Counter64(v) => write!(f, "{}", v),
            Self::NoSuchObject => f.write_str("noSuchObject"),
            Self::NoSuchInstance => f.write_str("noSuchInstance"),
            Self::EndOfMibView => f.write_str("endOfMibView"),
        }
    }
}

/// One (identifier, value) pair of a PDU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarBind {
    /// Dotted-numeric identifier, without a leading dot.
    pub oid: String,
    pub value: Value,
}

impl VarBind {
    pub fn new(oid: impl Into<String>, value: Value) -> Self {
        Self {
            oid: oid.into(),
            value,
        }
    }

    /// Binding with a Null placeholder value, as carried by GET requests.
    pub fn null(oid: impl Into<String>) -> Self {
        Self::new(oid, Value::Null)
    }
}

// ---------------------------------------------------------------------------
// Packet
// ---------------------------------------------------------------------------

/// Header fields of an SNMPv1 Trap-PDU (RFC 1157).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct V1TrapHeader {
    pub enterprise: String,
    pub agent_addr: [u8; 4],
    pub generic_trap: u32,
    pub specific_trap: u32,
    /// Agent `sysUpTime` when the trap was generated.
    pub timestamp: u32,
}

/// A decoded SNMP message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub version: Version,
    /// Raw community octets; not necessarily UTF-8.
    pub community: Vec<u8>,
    pub pdu_type: PduType,
    pub request_id: u32,
    /// Zero for GetBulk, where the field carries `non_repeaters`.
    pub error_status: u32,
    /// Zero for GetBulk, where the field carries `max_repetitions`.
    pub error_index: u32,
    pub non_repeaters: u32,
    pub max_repetitions: u32,
    pub variables: Vec<VarBind>,
    /// Present only for [`PduType::TrapV1`], whose request id is always zero.
    pub v1_trap: Option<V1TrapHeader>,
}

impl Packet {
    /// Create a packet with default header fields.
    pub fn new(pdu_type: PduType, request_id: u32, variables: Vec<VarBind>) -> Self {
        Self {
            version: Version::V2c,
            community: DEFAULT_COMMUNITY.as_bytes().to_vec(),
            pdu_type,
            request_id,
            error_status: 0,
            error_index: 0,
            non_repeaters: 0,
            max_repetitions: 0,
            variables,
            v1_trap: None,
        }
    }

    /// Copy of this packet carrying other bindings and a chosen request id.
    ///
    /// PDU type, repetition parameters and error fields are preserved.
    pub fn twin(&self, variables: Vec<VarBind>, request_id: u32) -> Self {
        Self {
            version: self.version,
            community: self.community.clone(),
            pdu_type: self.pdu_type,
            request_id,
            error_status: self.error_status,
            error_index: self.error_index,
            non_repeaters: self.non_repeaters,
            max_repetitions: self.max_repetitions,
            variables,
            v1_trap: self.v1_trap.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

/// Encoder/decoder with default outbound version and community.
#[derive(Debug, Clone)]
pub struct Codec {
    version: Version,
    community: Vec<u8>,
}

impl Default for Codec {
    fn default() -> Self {
        Self::new(DEFAULT_COMMUNITY)
    }
}

impl Codec {
    /// Create a v2c codec that encodes with `community`.
    pub fn new(community: impl Into<Vec<u8>>) -> Self {
        Self {
            version: Version::V2c,
            community: community.into(),
        }
    }

    /// Codec that answers in the version and community of `packet`.
    pub fn matching(packet: &Packet) -> Self {
        Self {
            version: packet.version,
            community: packet.community.clone(),
        }
    }

    pub fn community(&self) -> &[u8] {
        &self.community
    }

    /// Decode a complete SNMP message.
    pub fn decode(&self, bytes: &[u8]) -> Result<Packet, DecodeError> {
        let mut outer = Reader::new(bytes);
        let mut msg = outer.expect(ber::TAG_SEQUENCE, "message SEQUENCE")?;

        let version = Version::from_wire(msg.read_i64(ber::TAG_INTEGER, "version")?)?;
        let community = msg.expect(ber::TAG_OCTET_STRING, "community")?.bytes().to_vec();

        let (tag, mut pdu) = msg.read_tlv()?;
        let pdu_type = PduType::from_tag(tag)?;
        msg.finish()?;

        if pdu_type == PduType::TrapV1 {
            let header = decode_v1_trap_header(&mut pdu)?;
            let variables = decode_variables(&mut pdu)?;
            pdu.finish()?;
            return Ok(Packet {
                version,
                community,
                variables,
                v1_trap: Some(header),
                ..Packet::new(pdu_type, 0, Vec::new())
            });
        }

        let request_id = decode_request_id(pdu.read_i64(ber::TAG_INTEGER, "request-id")?)?;
        let field_a = pdu_field(pdu.read_i64(ber::TAG_INTEGER, "error-status")?)?;
        let field_b = pdu_field(pdu.read_i64(ber::TAG_INTEGER, "error-index")?)?;
        let variables = decode_variables(&mut pdu)?;
        pdu.finish()?;

        let (error_status, error_index, non_repeaters, max_repetitions) =
            if pdu_type == PduType::GetBulk {
                (0, 0, field_a, field_b)
            } else {
                (field_a, field_b, 0, 0)
            };

        Ok(Packet {
            version,
            community,
            pdu_type,
            request_id,
            error_status,
            error_index,
            non_repeaters,
            max_repetitions,
            variables,
            v1_trap: None,
        })
    }

    /// Build a fresh message from its parts using the codec's version and
    /// community.
    pub fn encode(
        &self,
        pdu_type: PduType,
        variables: &[VarBind],
        non_repeaters: u32,
        max_repetitions: u32,
        request_id: u32,
    ) -> Result<Vec<u8>, EncodeError> {
        self.encode_fields(pdu_type, request_id, (non_repeaters, max_repetitions), (0, 0), variables)
    }

    /// Encode a packet using the codec's version and community.
    ///
    /// Unlike [`Codec::encode`] this also carries error-status/error-index
    /// and the v1 trap header.
    pub fn encode_packet(&self, packet: &Packet) -> Result<Vec<u8>, EncodeError> {
        if packet.pdu_type == PduType::TrapV1 {
            let header = packet.v1_trap.as_ref().ok_or(EncodeError::MissingTrapHeader)?;
            let enterprise = ber::encode_oid(&header.enterprise)?;
            let list = encode_variables(&packet.variables)?;

            let mut pdu = Vec::with_capacity(list.len() + enterprise.len() + 24);
            ber::write_tlv(&mut pdu, ber::TAG_OBJECT_IDENTIFIER, &enterprise);
            ber::write_tlv(&mut pdu, ber::TAG_IP_ADDRESS, &header.agent_addr);
            ber::write_tlv(&mut pdu, ber::TAG_INTEGER, &ber::encode_i64(header.generic_trap.into()));
            ber::write_tlv(&mut pdu, ber::TAG_INTEGER, &ber::encode_i64(header.specific_trap.into()));
            ber::write_tlv(&mut pdu, ber::TAG_TIMETICKS, &ber::encode_u64(header.timestamp.into()));
            ber::write_tlv(&mut pdu, ber::TAG_SEQUENCE, &list);
            return Ok(self.wrap(PduType::TrapV1, &pdu));
        }

        self.encode_fields(
            packet.pdu_type,
            packet.request_id,
            (packet.non_repeaters, packet.max_repetitions),
            (packet.error_status, packet.error_index),
            &packet.variables,
        )
    }

    fn encode_fields(
        &self,
        pdu_type: PduType,
        request_id: u32,
        (non_repeaters, max_repetitions): (u32, u32),
        (error_status, error_index): (u32, u32),
        variables: &[VarBind],
    ) -> Result<Vec<u8>, EncodeError> {
        if pdu_type == PduType::TrapV1 {
            return Err(EncodeError::MissingTrapHeader);
        }
        let list = encode_variables(variables)?;

        let (field_a, field_b) = if pdu_type == PduType::GetBulk {
            (non_repeaters, max_repetitions)
        } else {
            (error_status, error_index)
        };

        let mut pdu = Vec::with_capacity(list.len() + 16);
        // request-id is an Integer32 on the wire.
        ber::write_tlv(&mut pdu, ber::TAG_INTEGER, &ber::encode_i64(request_id as i32 as i64));
        ber::write_tlv(&mut pdu, ber::TAG_INTEGER, &ber::encode_i64(field_a as i64));
        ber::write_tlv(&mut pdu, ber::TAG_INTEGER, &ber::encode_i64(field_b as i64));
        ber::write_tlv(&mut pdu, ber::TAG_SEQUENCE, &list);

        Ok(self.wrap(pdu_type, &pdu))
    }

    /// Wrap PDU contents in the message header.
    fn wrap(&self, pdu_type: PduType, pdu: &[u8]) -> Vec<u8> {
        let mut msg = Vec::with_capacity(pdu.len() + self.community.len() + 16);
        ber::write_tlv(&mut msg, ber::TAG_INTEGER, &ber::encode_i64(self.version.as_wire()));
        ber::write_tlv(&mut msg, ber::TAG_OCTET_STRING, &self.community);
        ber::write_tlv(&mut msg, pdu_type.tag(), pdu);

        let mut out = Vec::with_capacity(msg.len() + 4);
        ber::write_tlv(&mut out, ber::TAG_SEQUENCE, &msg);
        out
    }
}

fn decode_v1_trap_header(pdu: &mut Reader<'_>) -> Result<V1TrapHeader, DecodeError> {
    let mut oid = pdu.expect(ber::TAG_OBJECT_IDENTIFIER, "enterprise")?;
    let enterprise = ber::decode_oid(oid.bytes())?;

    let mut addr = pdu.expect(ber::TAG_IP_ADDRESS, "agent-addr")?;
    let offset = addr.offset();
    let agent_addr: [u8; 4] = addr
        .bytes()
        .try_into()
        .map_err(|_| DecodeError::InvalidLength(offset))?;

    let generic_trap = pdu_field(pdu.read_i64(ber::TAG_INTEGER, "generic-trap")?)?;
    let specific_trap = pdu_field(pdu.read_i64(ber::TAG_INTEGER, "specific-trap")?)?;
    let mut stamp = pdu.expect(ber::TAG_TIMETICKS, "time-stamp")?;
    let timestamp = ber::decode_u32(stamp.bytes(), "time-stamp")?;

    Ok(V1TrapHeader {
        enterprise,
        agent_addr,
        generic_trap,
        specific_trap,
        timestamp,
    })
}

fn decode_variables(pdu: &mut Reader<'_>) -> Result<Vec<VarBind>, DecodeError> {
    let mut list = pdu.expect(ber::TAG_SEQUENCE, "variable-bindings")?;
    let mut variables = Vec::new();
    while !list.is_empty() {
        let mut vb = list.expect(ber::TAG_SEQUENCE, "VarBind")?;
        let oid = ber::decode_oid(vb.expect(ber::TAG_OBJECT_IDENTIFIER, "name")?.bytes())?;
        let (value_tag, mut content) = vb.read_tlv()?;
        let value = Value::decode(value_tag, &mut content)?;
        vb.finish()?;
        variables.push(VarBind { oid, value });
    }
    Ok(variables)
}

fn encode_variables(variables: &[VarBind]) -> Result<Vec<u8>, EncodeError> {
    let mut list = Vec::with_capacity(variables.len() * 24);
    for vb in variables {
        let mut body = Vec::with_capacity(vb.oid.len() + 8);
        ber::write_tlv(&mut body, ber::TAG_OBJECT_IDENTIFIER, &ber::encode_oid(&vb.oid)?);
        vb.value.encode(&mut body)?;
        ber::write_tlv(&mut list, ber::TAG_SEQUENCE, &body);
    }
    Ok(list)
}

/// Request ids are Integer32 on the wire but some agents send them unsigned.
fn decode_request_id(v: i64) -> Result<u32, DecodeError> {
    if let Ok(signed) = i32::try_from(v) {
        Ok(signed as u32)
    } else {
        u32::try_from(v).map_err(|_| DecodeError::IntegerOutOfRange("request-id"))
    }
}

fn pdu_field(v: i64) -> Result<u32, DecodeError> {
    u32::try_from(v).map_err(|_| DecodeError::IntegerOutOfRange("PDU header field"))
}
