//! Dtype descriptors and the dtype matcher
//!
//! Descriptors come in two flavors: simple byte-order-prefixed codes such
//! as `"<f8"`, `">i4"`, `"|b1"`, `"S128"`, `"U10"` (plus canonical aliases
//! like `"int32"`), and compound record layouts with named, offset fields.
//! Both sides of a comparison are canonicalized first; equality is exact
//! after canonicalization.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::{Result, SchemaError};

/// Byte order of a simple dtype after canonicalization.
///
/// Single-byte kinds and string kinds carry `None` (`|`); multi-byte
/// numeric kinds written without an explicit order, or with the native
/// marker `=`, canonicalize to little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ByteOrder {
    Little,
    Big,
    None,
}

/// A simple (non-compound) dtype: order, kind letter, and element size.
///
/// `size` is in bytes for numeric kinds and `S`, and in characters for
/// `U`. A `None` size is the kind-only shorthand a schema may use
/// (`"S"`, `"U"`) to accept any length of that kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SimpleDtype {
    pub order: ByteOrder,
    pub kind: char,
    pub size: Option<u32>,
}

impl SimpleDtype {
    /// Element width in bytes, if the size is declared.
    pub fn size_bytes(&self) -> Option<u32> {
        self.size.map(|n| if self.kind == 'U' { n * 4 } else { n })
    }

    /// True when a declared descriptor accepts an actual one.
    ///
    /// Kind and byte order must agree; a declared size of `None` accepts
    /// any actual size, otherwise sizes must be equal.
    pub fn matches(&self, actual: &SimpleDtype) -> bool {
        if self.kind != actual.kind {
            return false;
        }
        match self.size {
            None => true,
            Some(size) => self.order == actual.order && actual.size == Some(size),
        }
    }
}

impl fmt::Display for SimpleDtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.kind, self.size) {
            ('S', Some(n)) => write!(f, "S{}", n),
            ('S', None) => write!(f, "S"),
            ('U', Some(n)) => write!(f, "U{}", n),
            ('U', None) => write!(f, "U"),
            (kind, size) => {
                let prefix = match self.order {
                    ByteOrder::Little => '<',
                    ByteOrder::Big => '>',
                    ByteOrder::None => '|',
                };
                match size {
                    Some(n) => write!(f, "{}{}{}", prefix, kind, n),
                    None => write!(f, "{}{}", prefix, kind),
                }
            }
        }
    }
}

/// One field of a compound record layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompoundField {
    pub name: String,
    pub format: SimpleDtype,
    pub offset: u32,
}

/// A compound record layout: ordered fields plus the total item size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompoundDtype {
    pub fields: Vec<CompoundField>,
    pub itemsize: u32,
}

impl CompoundDtype {
    /// Build a layout from `(name, format)` pairs with optional explicit
    /// offsets and itemsize; missing offsets are packed in order.
    ///
    /// Fails when offsets are not strictly increasing or a field would
    /// overrun the item size.
    pub fn new(
        fields: Vec<(String, SimpleDtype, Option<u32>)>,
        itemsize: Option<u32>,
    ) -> Result<Self> {
        let mut laid_out = Vec::with_capacity(fields.len());
        let mut cursor = 0u32;
        let mut previous: Option<u32> = None;

        for (name, format, offset) in fields {
            let width = format.size_bytes().ok_or_else(|| {
                SchemaError::CompoundLayout(format!(
                    "field '{}' needs a sized format, got '{}'",
                    name, format
                ))
            })?;
            let offset = offset.unwrap_or(cursor);
            if let Some(prev) = previous {
                if offset <= prev {
                    return Err(SchemaError::CompoundLayout(format!(
                        "field '{}' offset {} does not increase past {}",
                        name, offset, prev
                    )));
                }
            }
            previous = Some(offset);
            cursor = offset + width;
            laid_out.push(CompoundField {
                name,
                format,
                offset,
            });
        }

        let itemsize = itemsize.unwrap_or(cursor);
        for field in &laid_out {
            let width = field.format.size_bytes().unwrap_or(0);
            if field.offset + width > itemsize {
                return Err(SchemaError::CompoundLayout(format!(
                    "field '{}' at offset {} overruns itemsize {}",
                    field.name, field.offset, itemsize
                )));
            }
        }

        Ok(Self {
            fields: laid_out,
            itemsize,
        })
    }
}

impl fmt::Display for CompoundDtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", field.name, field.format)?;
        }
        write!(f, "}} ({} bytes)", self.itemsize)
    }
}

/// A dtype descriptor, either a simple code or a compound record layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Dtype {
    Simple(SimpleDtype),
    Compound(CompoundDtype),
}

impl Dtype {
    /// Parse a simple code string such as `"<f8"`, `"S128"` or `"int32"`.
    pub fn parse(code: &str) -> Result<Dtype> {
        parse_simple(code).map(Dtype::Simple)
    }

    /// Fixed-length Unicode string dtype of `chars` characters.
    pub fn unicode(chars: u32) -> Dtype {
        Dtype::Simple(SimpleDtype {
            order: ByteOrder::None,
            kind: 'U',
            size: Some(chars),
        })
    }

    /// Fixed-length ASCII string dtype of `bytes` bytes.
    pub fn ascii(bytes: u32) -> Dtype {
        Dtype::Simple(SimpleDtype {
            order: ByteOrder::None,
            kind: 'S',
            size: Some(bytes),
        })
    }

    /// The kind letter (`i`, `u`, `f`, `b`, `S`, `U`) of a simple dtype.
    pub fn kind(&self) -> Option<char> {
        match self {
            Dtype::Simple(s) => Some(s.kind),
            Dtype::Compound(_) => None,
        }
    }

    /// True for `S` and `U` simple dtypes.
    pub fn is_string(&self) -> bool {
        matches!(self.kind(), Some('S') | Some('U'))
    }

    /// True when this declared descriptor accepts the actual one.
    ///
    /// Simple vs simple compares canonical forms; compound vs compound
    /// requires equal field sequences (name, format, offset) and equal
    /// itemsize; mixing the two flavors never matches.
    pub fn matches(&self, actual: &Dtype) -> bool {
        match (self, actual) {
            (Dtype::Simple(decl), Dtype::Simple(act)) => decl.matches(act),
            (Dtype::Compound(decl), Dtype::Compound(act)) => {
                decl.itemsize == act.itemsize
                    && decl.fields.len() == act.fields.len()
                    && decl.fields.iter().zip(&act.fields).all(|(a, b)| {
                        a.name == b.name && a.offset == b.offset && a.format.matches(&b.format)
                    })
            }
            _ => false,
        }
    }

    /// Build from the wire forms a schema or tree document may use: a
    /// code string, the canonical `{formats: [...], itemsize}` object, or
    /// the legacy list form `[{"name": ..., "dtype": ...}, ...]`.
    pub fn from_schema_value(value: &Value) -> Result<Dtype> {
        match value {
            Value::String(code) => Dtype::parse(code),
            Value::Array(entries) => {
                let mut fields = Vec::with_capacity(entries.len());
                for entry in entries {
                    let name = entry
                        .get("name")
                        .and_then(Value::as_str)
                        .ok_or_else(|| field_error(entry, "name"))?;
                    let format = entry
                        .get("dtype")
                        .and_then(Value::as_str)
                        .ok_or_else(|| field_error(entry, "dtype"))?;
                    fields.push((name.to_string(), parse_simple(format)?, None));
                }
                CompoundDtype::new(fields, None).map(Dtype::Compound)
            }
            Value::Object(obj) => {
                let formats = obj
                    .get("formats")
                    .and_then(Value::as_array)
                    .ok_or_else(|| {
                        SchemaError::InvalidDtype("compound dtype needs a 'formats' list".into())
                    })?;
                let mut fields = Vec::with_capacity(formats.len());
                for entry in formats {
                    let name = entry
                        .get("name")
                        .and_then(Value::as_str)
                        .ok_or_else(|| field_error(entry, "name"))?;
                    let format = entry
                        .get("format")
                        .and_then(Value::as_str)
                        .ok_or_else(|| field_error(entry, "format"))?;
                    let offset = entry.get("offset").and_then(Value::as_u64).map(|o| o as u32);
                    fields.push((name.to_string(), parse_simple(format)?, offset));
                }
                let itemsize = obj.get("itemsize").and_then(Value::as_u64).map(|n| n as u32);
                CompoundDtype::new(fields, itemsize).map(Dtype::Compound)
            }
            other => Err(SchemaError::InvalidDtype(format!(
                "expected string, list or object, got {}",
                other
            ))),
        }
    }

    /// Render back into the canonical schema wire form.
    pub fn to_schema_value(&self) -> Value {
        match self {
            Dtype::Simple(simple) => Value::String(simple.to_string()),
            Dtype::Compound(compound) => {
                let formats: Vec<Value> = compound
                    .fields
                    .iter()
                    .map(|f| {
                        serde_json::json!({
                            "name": f.name,
                            "format": f.format.to_string(),
                            "offset": f.offset,
                        })
                    })
                    .collect();
                serde_json::json!({ "formats": formats, "itemsize": compound.itemsize })
            }
        }
    }
}

impl fmt::Display for Dtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dtype::Simple(simple) => simple.fmt(f),
            Dtype::Compound(compound) => compound.fmt(f),
        }
    }
}

fn field_error(entry: &Value, key: &str) -> SchemaError {
    SchemaError::InvalidDtype(format!("compound field {} is missing '{}'", entry, key))
}

fn alias(code: &str) -> Option<(char, u32)> {
    let (kind, size) = match code {
        "int8" => ('i', 1),
        "int16" => ('i', 2),
        "int32" => ('i', 4),
        "int64" => ('i', 8),
        "uint8" => ('u', 1),
        "uint16" => ('u', 2),
        "uint32" => ('u', 4),
        "uint64" => ('u', 8),
        "float16" => ('f', 2),
        "float32" => ('f', 4),
        "float64" => ('f', 8),
        "bool" => ('b', 1),
        _ => return None,
    };
    Some((kind, size))
}

fn parse_simple(code: &str) -> Result<SimpleDtype> {
    if code.is_empty() {
        return Err(SchemaError::InvalidDtype("empty dtype code".into()));
    }

    if let Some((kind, size)) = alias(code) {
        return Ok(canonicalize(ByteOrder::Little, kind, Some(size)));
    }

    let mut rest = code;
    let mut order = None;
    if let Some(first) = rest.chars().next() {
        if matches!(first, '<' | '>' | '|' | '=') {
            order = Some(match first {
                '>' => ByteOrder::Big,
                '|' => ByteOrder::None,
                _ => ByteOrder::Little,
            });
            rest = &rest[1..];
        }
    }

    let kind = rest
        .chars()
        .next()
        .ok_or_else(|| SchemaError::InvalidDtype(format!("'{}' has no kind letter", code)))?;
    if !matches!(kind, 'i' | 'u' | 'f' | 'b' | 'S' | 'U') {
        return Err(SchemaError::InvalidDtype(format!(
            "'{}' has unsupported kind '{}'",
            code, kind
        )));
    }

    let digits = &rest[1..];
    let size = if digits.is_empty() {
        match kind {
            // Kind-only string shorthand accepts any length.
            'S' | 'U' => None,
            'b' => Some(1),
            _ => {
                return Err(SchemaError::InvalidDtype(format!(
                    "'{}' is missing an element size",
                    code
                )))
            }
        }
    } else {
        Some(digits.parse::<u32>().map_err(|_| {
            SchemaError::InvalidDtype(format!("'{}' has a malformed size", code))
        })?)
    };

    Ok(canonicalize(order.unwrap_or(ByteOrder::Little), kind, size))
}

fn canonicalize(order: ByteOrder, kind: char, size: Option<u32>) -> SimpleDtype {
    let order = match kind {
        'S' | 'U' | 'b' => ByteOrder::None,
        _ if size == Some(1) => ByteOrder::None,
        _ => match order {
            ByteOrder::None => ByteOrder::Little,
            other => other,
        },
    };
    SimpleDtype { order, kind, size }
}
