//! SNMP value types.
//!
//! The `Value` enum represents all SNMP data types including exceptions.

use crate::oid::Oid;
use bytes::Bytes;

/// A variable's value as carried in a varbind.
///
/// Alongside the SMIv2 base types this includes the three exception
/// sentinels a GET or GETNEXT answers with when there is nothing to return.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Value {
    /// INTEGER / Integer32.
    Integer(i32),
    /// OCTET STRING. The 65535 octet SMIv2 limit is left to the owning object.
    OctetString(Bytes),
    /// NULL, the placeholder value of GET-class requests.
    Null,
    /// OBJECT IDENTIFIER.
    ObjectIdentifier(Oid),
    /// IpAddress in network byte order.
    IpAddress([u8; 4]),
    /// Counter32.
    Counter32(u32),
    /// Gauge32 / Unsigned32.
    Gauge32(u32),
    /// TimeTicks, hundredths of a second.
    TimeTicks(u32),
    /// Opaque.
    Opaque(Bytes),
    /// Counter64. Not representable in SNMPv1; GETNEXT and GETBULK skip such
    /// instances for v1 requests.
    Counter64(u64),
    /// The object named by a GET does not exist in the view.
    NoSuchObject,
    /// The object exists but the named instance does not.
    NoSuchInstance,
    /// No lexicographic successor exists in the view.
    EndOfMibView,
}

impl Value {
    /// The INTEGER payload, if this is an INTEGER.
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Any unsigned payload, or a non-negative INTEGER.
    ///
    /// ```
    /// use async_snmp_agent::Value;
    ///
    /// assert_eq!(Value::Counter32(100).as_u64(), Some(100));
    /// assert_eq!(Value::Integer(-1).as_u64(), None);
    /// ```
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Counter64(v) => Some(*v),
            Value::Counter32(v) | Value::Gauge32(v) | Value::TimeTicks(v) => Some(*v as u64),
            Value::Integer(v) if *v >= 0 => Some(*v as u64),
            _ => None,
        }
    }

    /// Raw octets of an OCTET STRING or Opaque.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::OctetString(v) | Value::Opaque(v) => Some(v),
            _ => None,
        }
    }

    /// Octets as UTF-8, when they are valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        self.as_bytes().and_then(|b| std::str::from_utf8(b).ok())
    }

    /// The IpAddress payload.
    pub fn as_ip(&self) -> Option<std::net::Ipv4Addr> {
        match self {
            Value::IpAddress(bytes) => Some(std::net::Ipv4Addr::from(*bytes)),
            _ => None,
        }
    }

    /// Check if this is an exception value.
    pub fn is_exception(&self) -> bool {
        matches!(
            self,
            Value::NoSuchObject | Value::NoSuchInstance | Value::EndOfMibView
        )
    }

    /// The syntax of this value, used for SET type checks.
    ///
    /// # Examples
    ///
    /// ```
    /// use async_snmp_agent::value::{Value, ValueKind};
    ///
    /// assert_eq!(Value::Integer(1).kind(), ValueKind::Integer);
    /// assert_eq!(Value::from("x").kind(), ValueKind::OctetString);
    /// ```
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Integer(_) => ValueKind::Integer,
            Value::OctetString(_) => ValueKind::OctetString,
            Value::Null => ValueKind::Null,
            Value::ObjectIdentifier(_) => ValueKind::ObjectIdentifier,
            Value::IpAddress(_) => ValueKind::IpAddress,
            Value::Counter32(_) => ValueKind::Counter32,
            Value::Gauge32(_) => ValueKind::Gauge32,
            Value::TimeTicks(_) => ValueKind::TimeTicks,
            Value::Opaque(_) => ValueKind::Opaque,
            Value::Counter64(_) => ValueKind::Counter64,
            Value::NoSuchObject | Value::NoSuchInstance | Value::EndOfMibView => {
                ValueKind::Exception
            }
        }
    }

    /// Returns the total encoded length (tag + length + content).
    pub fn encoded_len(&self) -> usize {
        use crate::util::{
            integer_content_len, tlv_len, unsigned32_content_len, unsigned64_content_len,
        };

        match self {
            Value::Integer(v) => tlv_len(integer_content_len(*v)),
            Value::OctetString(data) | Value::Opaque(data) => tlv_len(data.len()),
            Value::Null => 2,
            Value::ObjectIdentifier(oid) => tlv_len(oid.encoded_len()),
            Value::IpAddress(_) => 6,
            Value::Counter32(v) | Value::Gauge32(v) | Value::TimeTicks(v) => {
                tlv_len(unsigned32_content_len(*v))
            }
            Value::Counter64(v) => tlv_len(unsigned64_content_len(*v)),
            Value::NoSuchObject | Value::NoSuchInstance | Value::EndOfMibView => 2,
        }
    }
}

/// Syntax of a [`Value`], without its payload.
///
/// Columns and scalars declare the kind they accept; a SET carrying any other
/// kind fails with `wrongType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ValueKind {
    Integer,
    OctetString,
    Null,
    ObjectIdentifier,
    IpAddress,
    Counter32,
    Gauge32,
    TimeTicks,
    Opaque,
    Counter64,
    /// One of the three exception sentinels. Never writable.
    Exception,
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Integer(v) => write!(f, "{}", v),
            Value::OctetString(data) => {
                // Try to display as string if it's valid UTF-8
                if let Ok(s) = std::str::from_utf8(data) {
                    write!(f, "{}", s)
                } else {
                    write!(f, "0x{}", HexBytes(data))
                }
            }
            Value::Null => write!(f, "NULL"),
            Value::ObjectIdentifier(oid) => write!(f, "{}", oid),
            Value::IpAddress(addr) => {
                write!(f, "{}.{}.{}.{}", addr[0], addr[1], addr[2], addr[3])
            }
            Value::Counter32(v) => write!(f, "{}", v),
            Value::Gauge32(v) => write!(f, "{}", v),
            Value::TimeTicks(v) => {
                // Display as time
                let secs = v / 100;
                let days = secs / 86400;
                let hours = (secs % 86400) / 3600;
                let mins = (secs % 3600) / 60;
                let s = secs % 60;
                write!(f, "{}d {}h {}m {}s", days, hours, mins, s)
            }
            Value::Opaque(data) => write!(f, "Opaque(0x{})", HexBytes(data)),
            Value::Counter64(v) => write!(f, "{}", v),
            Value::NoSuchObject => write!(f, "noSuchObject"),
            Value::NoSuchInstance => write!(f, "noSuchInstance"),
            Value::EndOfMibView => write!(f, "endOfMibView"),
        }
    }
}

/// ```
/// use async_snmp_agent::Value;
/// use std::net::Ipv4Addr;
///
/// assert_eq!(Value::from(42).as_i32(), Some(42));
/// assert_eq!(Value::from("eth0").as_str(), Some("eth0"));
/// assert_eq!(Value::from(10_000_000_000u64).as_u64(), Some(10_000_000_000));
/// assert_eq!(
///     Value::from(Ipv4Addr::new(10, 0, 0, 1)).as_ip(),
///     Some(Ipv4Addr::new(10, 0, 0, 1))
/// );
/// ```
impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::OctetString(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::OctetString(Bytes::from(s))
    }
}

impl From<&[u8]> for Value {
    fn from(data: &[u8]) -> Self {
        Value::OctetString(Bytes::copy_from_slice(data))
    }
}

impl From<Oid> for Value {
    fn from(oid: Oid) -> Self {
        Value::ObjectIdentifier(oid)
    }
}

impl From<std::net::Ipv4Addr> for Value {
    fn from(addr: std::net::Ipv4Addr) -> Self {
        Value::IpAddress(addr.octets())
    }
}

impl From<Bytes> for Value {
    fn from(data: Bytes) -> Self {
        Value::OctetString(data)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Counter64(v)
    }
}

impl From<[u8; 4]> for Value {
    fn from(addr: [u8; 4]) -> Self {
        Value::IpAddress(addr)
    }
}

/// Lowercase hex rendering for non-UTF-8 payloads.
struct HexBytes<'a>(&'a [u8]);

impl std::fmt::Display for HexBytes<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for byte in self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}
