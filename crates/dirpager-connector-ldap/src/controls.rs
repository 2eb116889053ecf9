//! Server-side sort and virtual list view controls
//!
//! BER codecs for the four controls used by VLV paging:
//!
//! - sort request (RFC 2891), `1.2.840.113556.1.4.473`
//! - sort response (RFC 2891), `1.2.840.113556.1.4.474`
//! - VLV request (draft-ietf-ldapext-ldapv3-vlv), `2.16.840.1.113730.3.4.9`
//! - VLV response, `2.16.840.1.113730.3.4.10`
//!
//! Request controls are encoded for the client and response controls decoded
//! from the server. The opposite directions exist as well so test servers and
//! diagnostics can read what a client sent and answer in kind.

use bytes::BytesMut;
use ldap3::asn1::{
    parse_tag, parse_uint, write, ASNTag, Boolean, Enumerated, Integer, OctetString, Sequence,
    StructureTag, Tag, TagClass, Types,
};
use ldap3::controls::RawControl;
use thiserror::Error;

use dirpager_connector::error::{ConnectorError, ConnectorResult};

/// OID of the server-side sort request control.
pub const SORT_REQUEST_OID: &str = "1.2.840.113556.1.4.473";

/// OID of the server-side sort response control.
pub const SORT_RESPONSE_OID: &str = "1.2.840.113556.1.4.474";

/// OID of the virtual list view request control.
pub const VLV_REQUEST_OID: &str = "2.16.840.1.113730.3.4.9";

/// OID of the virtual list view response control.
pub const VLV_RESPONSE_OID: &str = "2.16.840.1.113730.3.4.10";

/// Why a control value could not be decoded.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ControlDecodeError {
    /// The control carried no value.
    #[error("{control} control has no value")]
    MissingValue { control: &'static str },

    /// The value is not a complete BER element.
    #[error("{control} control value is not valid BER")]
    InvalidBer { control: &'static str },

    /// An element had the wrong type or was missing.
    #[error("{control} control value: expected {expected}")]
    Unexpected {
        control: &'static str,
        expected: &'static str,
    },

    /// An integer does not fit the range used by the control.
    #[error("{control} control value: {field} out of range")]
    OutOfRange {
        control: &'static str,
        field: &'static str,
    },
}

const SORT_REQUEST: &str = "sort request";
const SORT_RESPONSE: &str = "sort response";
const VLV_REQUEST: &str = "VLV request";
const VLV_RESPONSE: &str = "VLV response";

/// Symbolic name of a sort or VLV result code.
pub fn result_code_name(code: u32) -> &'static str {
    match code {
        0 => "success",
        1 => "operationsError",
        3 => "timeLimitExceeded",
        8 => "strongAuthRequired",
        11 => "adminLimitExceeded",
        16 => "noSuchAttribute",
        18 => "inappropriateMatching",
        50 => "insufficientAccessRights",
        51 => "busy",
        53 => "unwillingToPerform",
        60 => "sortControlMissing",
        61 => "offsetRangeError",
        76 => "virtualListViewError",
        80 => "other",
        _ => "unknown",
    }
}

/// One key of a server-side sort request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    /// Attribute to sort on.
    pub attribute: String,
    /// Optional matching rule OID used for ordering.
    pub ordering_rule: Option<String>,
    /// Sort in descending order.
    pub reverse: bool,
}

impl SortKey {
    /// Ascending sort on `attribute` with the default ordering rule.
    pub fn new(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            ordering_rule: None,
            reverse: false,
        }
    }

    fn into_tag(self) -> Tag {
        let mut inner = vec![Tag::OctetString(OctetString {
            inner: self.attribute.into_bytes(),
            ..Default::default()
        })];
        if let Some(rule) = self.ordering_rule {
            inner.push(Tag::OctetString(OctetString {
                id: 0,
                class: TagClass::Context,
                inner: rule.into_bytes(),
            }));
        }
        if self.reverse {
            inner.push(Tag::Boolean(Boolean {
                id: 1,
                class: TagClass::Context,
                inner: true,
            }));
        }
        Tag::Sequence(Sequence {
            inner,
            ..Default::default()
        })
    }

    fn from_tag(tag: StructureTag) -> Result<Self, ControlDecodeError> {
        let mut elements = Elements::sequence(SORT_REQUEST, tag)?;
        let attribute = elements.string("attributeType")?;
        let mut key = SortKey::new(attribute);
        while let Some(tag) = elements.next_optional() {
            let context = matches!(tag.class, TagClass::Context);
            match (context, tag.id) {
                (true, 0) => {
                    let rule = tag.expect_primitive().ok_or(ControlDecodeError::Unexpected {
                        control: SORT_REQUEST,
                        expected: "orderingRule",
                    })?;
                    key.ordering_rule = Some(String::from_utf8_lossy(&rule).into_owned());
                }
                (true, 1) => {
                    let flag = tag.expect_primitive().ok_or(ControlDecodeError::Unexpected {
                        control: SORT_REQUEST,
                        expected: "reverseOrder",
                    })?;
                    key.reverse = flag.iter().any(|b| *b != 0);
                }
                _ => {
                    return Err(ControlDecodeError::Unexpected {
                        control: SORT_REQUEST,
                        expected: "orderingRule or reverseOrder",
                    })
                }
            }
        }
        Ok(key)
    }
}

/// Server-side sort request control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortRequest {
    /// Sort keys, most significant first.
    pub keys: Vec<SortKey>,
    /// Criticality flag sent with the control.
    pub critical: bool,
}

impl SortRequest {
    /// Critical ascending sort on a single attribute.
    pub fn on_attribute(attribute: impl Into<String>) -> Self {
        Self {
            keys: vec![SortKey::new(attribute)],
            critical: true,
        }
    }

    /// Encode as a raw control ready to be attached to a search.
    pub fn to_control(&self) -> ConnectorResult<RawControl> {
        let inner = self.keys.iter().cloned().map(SortKey::into_tag).collect();
        let val = encode(Tag::Sequence(Sequence {
            inner,
            ..Default::default()
        }))?;
        Ok(RawControl {
            ctype: SORT_REQUEST_OID.to_owned(),
            crit: self.critical,
            val: Some(val),
        })
    }

    /// Decode a sort request control sent by a client.
    pub fn from_control(control: &RawControl) -> Result<Self, ControlDecodeError> {
        let val = control_value(control, SORT_REQUEST)?;
        let mut elements = Elements::sequence(SORT_REQUEST, parse_value(SORT_REQUEST, val)?)?;
        let mut keys = Vec::new();
        while let Some(tag) = elements.next_optional() {
            keys.push(SortKey::from_tag(tag)?);
        }
        if keys.is_empty() {
            return Err(ControlDecodeError::Unexpected {
                control: SORT_REQUEST,
                expected: "at least one sort key",
            });
        }
        Ok(Self {
            keys,
            critical: control.crit,
        })
    }
}

/// Server-side sort response control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortResponse {
    /// Sort result code; zero means the results were sorted.
    pub result: u32,
    /// Attribute that caused the failure, if the server named one.
    pub attribute: Option<String>,
}

impl SortResponse {
    /// Whether the server sorted the results.
    pub fn is_sorted(&self) -> bool {
        self.result == 0
    }

    /// Decode the value of a sort response control.
    pub fn decode(val: &[u8]) -> Result<Self, ControlDecodeError> {
        let mut elements = Elements::sequence(SORT_RESPONSE, parse_value(SORT_RESPONSE, val)?)?;
        let result = elements.enumerated("sortResult")?;
        let attribute = match elements.next_optional() {
            Some(tag) => {
                let name = tag
                    .match_class(TagClass::Context)
                    .and_then(|t| t.match_id(0))
                    .and_then(|t| t.expect_primitive())
                    .ok_or(ControlDecodeError::Unexpected {
                        control: SORT_RESPONSE,
                        expected: "attributeType",
                    })?;
                Some(String::from_utf8_lossy(&name).into_owned())
            }
            None => None,
        };
        Ok(Self { result, attribute })
    }

    /// Encode as a raw response control.
    pub fn to_control(&self) -> ConnectorResult<RawControl> {
        let mut inner = vec![Tag::Enumerated(Enumerated {
            inner: i64::from(self.result),
            ..Default::default()
        })];
        if let Some(attribute) = &self.attribute {
            inner.push(Tag::OctetString(OctetString {
                id: 0,
                class: TagClass::Context,
                inner: attribute.as_bytes().to_vec(),
            }));
        }
        let val = encode(Tag::Sequence(Sequence {
            inner,
            ..Default::default()
        }))?;
        Ok(RawControl {
            ctype: SORT_RESPONSE_OID.to_owned(),
            crit: false,
            val: Some(val),
        })
    }
}

/// Virtual list view request control, offset form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VlvRequest {
    /// Entries wanted before the target.
    pub before_count: u32,
    /// Entries wanted after the target.
    pub after_count: u32,
    /// 1-based position of the target entry.
    pub offset: u32,
    /// Client's estimate of the list size; zero when unknown.
    pub content_count: u32,
    /// Continuation cookie from the previous response; empty when none.
    pub context_id: Vec<u8>,
    /// Criticality flag sent with the control.
    pub critical: bool,
}

impl VlvRequest {
    /// Critical offset-form request for `after_count + 1` entries starting at
    /// `offset`.
    pub fn by_offset(offset: u32, content_count: u32, after_count: u32, context_id: &[u8]) -> Self {
        Self {
            before_count: 0,
            after_count,
            offset,
            content_count,
            context_id: context_id.to_vec(),
            critical: true,
        }
    }

    /// Encode as a raw control ready to be attached to a search.
    ///
    /// The context ID is always sent, as an empty octet string before the
    /// server has handed out a cookie.
    pub fn to_control(&self) -> ConnectorResult<RawControl> {
        let inner = vec![
            integer(self.before_count),
            integer(self.after_count),
            Tag::Sequence(Sequence {
                id: 0,
                class: TagClass::Context,
                inner: vec![integer(self.offset), integer(self.content_count)],
            }),
            Tag::OctetString(OctetString {
                inner: self.context_id.clone(),
                ..Default::default()
            }),
        ];
        let val = encode(Tag::Sequence(Sequence {
            inner,
            ..Default::default()
        }))?;
        Ok(RawControl {
            ctype: VLV_REQUEST_OID.to_owned(),
            crit: self.critical,
            val: Some(val),
        })
    }

    /// Decode a VLV request control sent by a client.
    ///
    /// Only the offset target form is understood.
    pub fn from_control(control: &RawControl) -> Result<Self, ControlDecodeError> {
        let val = control_value(control, VLV_REQUEST)?;
        let mut elements = Elements::sequence(VLV_REQUEST, parse_value(VLV_REQUEST, val)?)?;
        let before_count = elements.integer("beforeCount")?;
        let after_count = elements.integer("afterCount")?;

        let target = elements
            .next("byOffset")?
            .match_class(TagClass::Context)
            .and_then(|t| t.match_id(0))
            .ok_or(ControlDecodeError::Unexpected {
                control: VLV_REQUEST,
                expected: "byOffset",
            })?;
        let mut by_offset = Elements::constructed(VLV_REQUEST, target, "byOffset")?;
        let offset = by_offset.integer("offset")?;
        let content_count = by_offset.integer("contentCount")?;

        let context_id = match elements.next_optional() {
            Some(tag) => octets(VLV_REQUEST, tag, "contextID")?,
            None => Vec::new(),
        };

        Ok(Self {
            before_count,
            after_count,
            offset,
            content_count,
            context_id,
            critical: control.crit,
        })
    }
}

/// Virtual list view response control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VlvResponse {
    /// Position of the target entry as the server sees it.
    pub target_position: u32,
    /// Server's current size of the list.
    pub content_count: u32,
    /// VLV result code; zero on success.
    pub result: u32,
    /// Continuation cookie, when the server sent one.
    pub context_id: Option<Vec<u8>>,
}

impl VlvResponse {
    /// Decode the value of a VLV response control.
    pub fn decode(val: &[u8]) -> Result<Self, ControlDecodeError> {
        let mut elements = Elements::sequence(VLV_RESPONSE, parse_value(VLV_RESPONSE, val)?)?;
        let target_position = elements.integer("targetPosition")?;
        let content_count = elements.integer("contentCount")?;
        let result = elements.enumerated("virtualListViewResult")?;
        let context_id = match elements.next_optional() {
            Some(tag) => Some(octets(VLV_RESPONSE, tag, "contextID")?),
            None => None,
        };
        Ok(Self {
            target_position,
            content_count,
            result,
            context_id,
        })
    }

    /// Encode as a raw response control.
    pub fn to_control(&self) -> ConnectorResult<RawControl> {
        let mut inner = vec![
            integer(self.target_position),
            integer(self.content_count),
            Tag::Enumerated(Enumerated {
                inner: i64::from(self.result),
                ..Default::default()
            }),
        ];
        if let Some(context_id) = &self.context_id {
            inner.push(Tag::OctetString(OctetString {
                inner: context_id.clone(),
                ..Default::default()
            }));
        }
        let val = encode(Tag::Sequence(Sequence {
            inner,
            ..Default::default()
        }))?;
        Ok(RawControl {
            ctype: VLV_RESPONSE_OID.to_owned(),
            crit: false,
            val: Some(val),
        })
    }
}

fn integer(value: u32) -> Tag {
    Tag::Integer(Integer {
        inner: i64::from(value),
        ..Default::default()
    })
}

fn encode(tag: Tag) -> ConnectorResult<Vec<u8>> {
    let mut buf = BytesMut::new();
    write::encode_into(&mut buf, tag.into_structure())
        .map_err(|e| ConnectorError::internal_with_source("failed to encode control value", e))?;
    Ok(buf.to_vec())
}

fn control_value<'a>(
    control: &'a RawControl,
    name: &'static str,
) -> Result<&'a [u8], ControlDecodeError> {
    match control.val.as_deref() {
        Some(val) if !val.is_empty() => Ok(val),
        _ => Err(ControlDecodeError::MissingValue { control: name }),
    }
}

fn parse_value(control: &'static str, val: &[u8]) -> Result<StructureTag, ControlDecodeError> {
    match parse_tag(val) {
        Ok((_, tag)) => Ok(tag),
        Err(_) => Err(ControlDecodeError::InvalidBer { control }),
    }
}

fn octets(
    control: &'static str,
    tag: StructureTag,
    expected: &'static str,
) -> Result<Vec<u8>, ControlDecodeError> {
    tag.match_class(TagClass::Universal)
        .and_then(|t| t.match_id(Types::OctetString as u64))
        .and_then(|t| t.expect_primitive())
        .ok_or(ControlDecodeError::Unexpected { control, expected })
}

/// Cursor over the children of a constructed element.
struct Elements {
    control: &'static str,
    inner: std::vec::IntoIter<StructureTag>,
}

impl Elements {
    fn sequence(control: &'static str, tag: StructureTag) -> Result<Self, ControlDecodeError> {
        let tag = tag
            .match_class(TagClass::Universal)
            .and_then(|t| t.match_id(Types::Sequence as u64))
            .ok_or(ControlDecodeError::Unexpected {
                control,
                expected: "SEQUENCE",
            })?;
        Self::constructed(control, tag, "SEQUENCE")
    }

    fn constructed(
        control: &'static str,
        tag: StructureTag,
        expected: &'static str,
    ) -> Result<Self, ControlDecodeError> {
        let children = tag
            .expect_constructed()
            .ok_or(ControlDecodeError::Unexpected { control, expected })?;
        Ok(Self {
            control,
            inner: children.into_iter(),
        })
    }

    fn next(&mut self, expected: &'static str) -> Result<StructureTag, ControlDecodeError> {
        self.inner.next().ok_or(ControlDecodeError::Unexpected {
            control: self.control,
            expected,
        })
    }

    fn next_optional(&mut self) -> Option<StructureTag> {
        self.inner.next()
    }

    fn string(&mut self, field: &'static str) -> Result<String, ControlDecodeError> {
        let tag = self.next(field)?;
        let bytes = octets(self.control, tag, field)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn integer(&mut self, field: &'static str) -> Result<u32, ControlDecodeError> {
        self.unsigned(Types::Integer, field)
    }

    fn enumerated(&mut self, field: &'static str) -> Result<u32, ControlDecodeError> {
        self.unsigned(Types::Enumerated, field)
    }

    fn unsigned(&mut self, kind: Types, field: &'static str) -> Result<u32, ControlDecodeError> {
        let control = self.control;
        let bytes = self
            .next(field)?
            .match_class(TagClass::Universal)
            .and_then(|t| t.match_id(kind as u64))
            .and_then(|t| t.expect_primitive())
            .ok_or(ControlDecodeError::Unexpected {
                control,
                expected: field,
            })?;
        // Two's complement: a set high bit is negative. Five content octets
        // hold any u32 (leading zero octet included).
        match bytes.first() {
            None => return Err(ControlDecodeError::InvalidBer { control }),
            Some(first) if first & 0x80 != 0 => {
                return Err(ControlDecodeError::OutOfRange { control, field })
            }
            Some(_) if bytes.len() > 5 => {
                return Err(ControlDecodeError::OutOfRange { control, field })
            }
            Some(_) => {}
        }
        let value = match parse_uint(bytes.as_slice()) {
            Ok((_, value)) => value,
            Err(_) => return Err(ControlDecodeError::InvalidBer { control }),
        };
        u32::try_from(value).map_err(|_| ControlDecodeError::OutOfRange { control, field })
    }
}
