//! PDF object types.

use crate::error::{Error, Result};
use std::collections::BTreeMap;

/// Dictionary type used throughout the crate.
///
/// A `BTreeMap` rather than a hash map: the canonical document digest and
/// the writer both require iteration order that is stable across runs.
pub type Dict = BTreeMap<String, Object>;

/// PDF object representation.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    /// Null object
    Null,
    /// Boolean value
    Boolean(bool),
    /// Integer value
    Integer(i64),
    /// Real (floating-point) value
    Real(f64),
    /// String (byte array)
    String(Vec<u8>),
    /// Name (starting with /)
    Name(String),
    /// Array of objects
    Array(Vec<Object>),
    /// Dictionary (key-value pairs)
    Dictionary(Dict),
    /// Stream (dictionary + data)
    Stream {
        /// Stream dictionary
        dict: Dict,
        /// Raw (still encoded) stream data
        data: bytes::Bytes,
    },
    /// Indirect object reference
    Reference(ObjectRef),
}

/// Reference to an indirect object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef {
    /// Object number
    pub id: u32,
    /// Generation number
    pub gen: u16,
}

impl ObjectRef {
    /// Create a new object reference.
    pub fn new(id: u32, gen: u16) -> Self {
        Self { id, gen }
    }
}

impl std::fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} R", self.id, self.gen)
    }
}

impl Object {
    /// Get the type name of this object (without data).
    pub fn type_name(&self) -> &'static str {
        match self {
            Object::Null => "Null",
            Object::Boolean(_) => "Boolean",
            Object::Integer(_) => "Integer",
            Object::Real(_) => "Real",
            Object::String(_) => "String",
            Object::Name(_) => "Name",
            Object::Array(_) => "Array",
            Object::Dictionary(_) => "Dictionary",
            Object::Stream { .. } => "Stream",
            Object::Reference(_) => "Reference",
        }
    }

    /// Try to cast to integer.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Object::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to cast to name.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Object::Name(s) => Some(s),
            _ => None,
        }
    }

    /// Try to cast to dictionary. Works for both Dictionary and Stream objects.
    pub fn as_dict(&self) -> Option<&Dict> {
        match self {
            Object::Dictionary(d) => Some(d),
            Object::Stream { dict, .. } => Some(dict),
            _ => None,
        }
    }

    /// Try to cast to array.
    pub fn as_array(&self) -> Option<&Vec<Object>> {
        match self {
            Object::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Try to cast to reference.
    pub fn as_reference(&self) -> Option<ObjectRef> {
        match self {
            Object::Reference(r) => Some(*r),
            _ => None,
        }
    }

    /// Try to cast to string (bytes).
    pub fn as_string(&self) -> Option<&[u8]> {
        match self {
            Object::String(s) => Some(s),
            _ => None,
        }
    }

    /// Check if object is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Object::Null)
    }

    /// Decode stream data using the filters named in the stream dictionary.
    ///
    /// Supported filters: `FlateDecode` and unfiltered streams. Anything
    /// else is reported as [`Error::UnsupportedFilter`]; the caller decides
    /// whether that page can be skipped, the digest pipeline cannot.
    pub fn decode_stream_data(&self) -> Result<Vec<u8>> {
        match self {
            Object::Stream { dict, data } => {
                // Some generators leave extra whitespace after the "stream"
                // keyword; it is not part of the payload.
                let data = trim_leading_stream_whitespace(data);

                let filters = dict
                    .get("Filter")
                    .map(extract_filter_names)
                    .unwrap_or_default();

                let mut decoded = data.to_vec();
                for filter in &filters {
                    decoded = match filter.as_str() {
                        "FlateDecode" => inflate(&decoded)?,
                        other => return Err(Error::UnsupportedFilter(other.to_string())),
                    };
                }
                Ok(decoded)
            },
            _ => Err(Error::InvalidObjectType {
                expected: "Stream".to_string(),
                found: self.type_name().to_string(),
            }),
        }
    }
}

/// Decompress a zlib/deflate stream (PDF FlateDecode).
fn inflate(data: &[u8]) -> Result<Vec<u8>> {
    use std::io::Read;

    let mut out = Vec::new();
    let mut decoder = flate2::read::ZlibDecoder::new(data);
    decoder
        .read_to_end(&mut out)
        .map_err(|e| Error::Decode(format!("FlateDecode failed: {}", e)))?;
    Ok(out)
}

/// Trim leading PDF whitespace from stream data.
///
/// PDF whitespace characters: NUL, TAB, LF, FF, CR, SPACE.
fn trim_leading_stream_whitespace(data: &[u8]) -> &[u8] {
    let mut start = 0;
    while start < data.len() {
        match data[start] {
            0x00 | 0x09 | 0x0A | 0x0C | 0x0D | 0x20 => start += 1,
            _ => break,
        }
    }
    &data[start..]
}

/// Extract filter names from a Filter entry.
///
/// The Filter entry can be a single Name or an Array of Names.
fn extract_filter_names(filter_obj: &Object) -> Vec<String> {
    match filter_obj {
        Object::Name(name) => vec![name.clone()],
        Object::Array(arr) => arr
            .iter()
            .filter_map(|obj| obj.as_name().map(|s| s.to_string()))
            .collect(),
        _ => vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_integer() {
        let obj = Object::Integer(42);
        assert_eq!(obj.as_integer(), Some(42));
        assert!(obj.as_name().is_none());
        assert!(!obj.is_null());
    }

    #[test]
    fn test_object_name() {
        let obj = Object::Name("Type".to_string());
        assert_eq!(obj.as_name(), Some("Type"));
        assert!(obj.as_integer().is_none());
    }

    #[test]
    fn test_object_string() {
        let obj = Object::String(b"Hello".to_vec());
        assert_eq!(obj.as_string(), Some(&b"Hello"[..]));
    }

    #[test]
    fn test_object_null() {
        let obj = Object::Null;
        assert!(obj.is_null());
        assert!(obj.as_integer().is_none());
    }

    #[test]
    fn test_object_array() {
        let obj = Object::Array(vec![Object::Integer(1), Object::Integer(2)]);
        let arr = obj.as_array().unwrap();
        assert_eq!(arr.len(), 2);
        assert_eq!(arr[0].as_integer(), Some(1));
    }

    #[test]
    fn test_object_dictionary() {
        let mut dict = Dict::new();
        dict.insert("Type".to_string(), Object::Name("Page".to_string()));
        let obj = Object::Dictionary(dict);
        assert_eq!(obj.as_dict().unwrap().get("Type").unwrap().as_name(), Some("Page"));
    }

    #[test]
    fn test_object_stream_dict_access() {
        let mut dict = Dict::new();
        dict.insert("Length".to_string(), Object::Integer(100));
        let obj = Object::Stream {
            dict,
            data: bytes::Bytes::from_static(b"stream data"),
        };

        // Stream objects should also be accessible as dictionaries
        assert_eq!(obj.as_dict().unwrap().get("Length").unwrap().as_integer(), Some(100));
    }

    #[test]
    fn test_object_ref_display() {
        assert_eq!(format!("{}", ObjectRef::new(10, 0)), "10 0 R");
    }

    #[test]
    fn test_decode_stream_no_filter() {
        let mut dict = Dict::new();
        dict.insert("Length".to_string(), Object::Integer(5));
        let obj = Object::Stream {
            dict,
            data: bytes::Bytes::from_static(b"Hello"),
        };
        assert_eq!(obj.decode_stream_data().unwrap(), b"Hello");
    }

    #[test]
    fn test_decode_stream_flate() {
        use flate2::write::ZlibEncoder;
        use std::io::Write;

        let mut encoder = ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(b"BT (Hello) Tj ET").unwrap();
        let compressed = encoder.finish().unwrap();

        let mut dict = Dict::new();
        dict.insert("Filter".to_string(), Object::Name("FlateDecode".to_string()));
        let obj = Object::Stream {
            dict,
            data: bytes::Bytes::from(compressed),
        };
        assert_eq!(obj.decode_stream_data().unwrap(), b"BT (Hello) Tj ET");
    }

    #[test]
    fn test_decode_stream_unsupported_filter() {
        let mut dict = Dict::new();
        dict.insert("Filter".to_string(), Object::Name("JPXDecode".to_string()));
        let obj = Object::Stream {
            dict,
            data: bytes::Bytes::from_static(b"..."),
        };
        match obj.decode_stream_data() {
            Err(Error::UnsupportedFilter(name)) => assert_eq!(name, "JPXDecode"),
            other => panic!("Expected UnsupportedFilter, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_stream_not_a_stream() {
        let obj = Object::Integer(42);
        match obj.decode_stream_data() {
            Err(Error::InvalidObjectType { expected, found }) => {
                assert_eq!(expected, "Stream");
                assert_eq!(found, "Integer");
            },
            _ => panic!("Expected InvalidObjectType error"),
        }
    }

    #[test]
    fn test_extract_filter_names_array() {
        let filter = Object::Array(vec![
            Object::Name("ASCII85Decode".to_string()),
            Object::Name("FlateDecode".to_string()),
        ]);
        assert_eq!(extract_filter_names(&filter), vec!["ASCII85Decode", "FlateDecode"]);
    }
}
