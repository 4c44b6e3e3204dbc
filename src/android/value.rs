//! Typed attribute values and their canonical text form.
//!
//! The output follows what `aapt2 dump xmltree` prints for each value type, so a
//! decoded document reads like the source XML it was compiled from.

use crate::android::chunk::StringPool;
use crate::android::resolver::{NoResolution, ResourceIdResolver};
use serde::{Deserialize, Serialize};

const TYPE_NULL: u8 = 0x00;
const TYPE_REFERENCE: u8 = 0x01;
const TYPE_ATTRIBUTE: u8 = 0x02;
const TYPE_STRING: u8 = 0x03;
const TYPE_FLOAT: u8 = 0x04;
const TYPE_DIMENSION: u8 = 0x05;
const TYPE_FRACTION: u8 = 0x06;
const TYPE_DYNAMIC_REFERENCE: u8 = 0x07;
const TYPE_DYNAMIC_ATTRIBUTE: u8 = 0x08;
const TYPE_INT_DEC: u8 = 0x10;
const TYPE_INT_HEX: u8 = 0x11;
const TYPE_INT_BOOLEAN: u8 = 0x12;
const TYPE_INT_COLOR_ARGB8: u8 = 0x1c;
const TYPE_INT_COLOR_RGB8: u8 = 0x1d;
const TYPE_INT_COLOR_ARGB4: u8 = 0x1e;
const TYPE_INT_COLOR_RGB4: u8 = 0x1f;

const DIMENSION_UNITS: [&str; 6] = ["px", "dp", "sp", "pt", "in", "mm"];
const FRACTION_UNITS: [&str; 2] = ["%", "%p"];
const UNKNOWN_UNIT: &str = "???";
const RADIX_SHIFTS: [u32; 4] = [23, 16, 8, 0];
const COMPLEX_RADIX_SHIFT: u32 = 4;
const COMPLEX_RADIX_MASK: u32 = 0x3;
const COMPLEX_MANTISSA_SHIFT: u32 = 8;
const COMPLEX_MANTISSA_MASK: u32 = 0xFF_FFFF;
const COMPLEX_UNIT_MASK: u32 = 0xF;
const MAX_FRACTION_DIGITS: usize = 6;

/// The `dataType` byte of a `Res_value`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    Null,
    Reference,
    Attribute,
    String,
    Float,
    Dimension,
    Fraction,
    DynamicReference,
    DynamicAttribute,
    IntDec,
    IntHex,
    IntBoolean,
    IntColorArgb8,
    IntColorRgb8,
    IntColorArgb4,
    IntColorRgb4,
    Unknown(u8),
}

impl ValueType {
    pub fn code(self) -> u8 {
        match self {
            ValueType::Null => TYPE_NULL,
            ValueType::Reference => TYPE_REFERENCE,
            ValueType::Attribute => TYPE_ATTRIBUTE,
            ValueType::String => TYPE_STRING,
            ValueType::Float => TYPE_FLOAT,
            ValueType::Dimension => TYPE_DIMENSION,
            ValueType::Fraction => TYPE_FRACTION,
            ValueType::DynamicReference => TYPE_DYNAMIC_REFERENCE,
            ValueType::DynamicAttribute => TYPE_DYNAMIC_ATTRIBUTE,
            ValueType::IntDec => TYPE_INT_DEC,
            ValueType::IntHex => TYPE_INT_HEX,
            ValueType::IntBoolean => TYPE_INT_BOOLEAN,
            ValueType::IntColorArgb8 => TYPE_INT_COLOR_ARGB8,
            ValueType::IntColorRgb8 => TYPE_INT_COLOR_RGB8,
            ValueType::IntColorArgb4 => TYPE_INT_COLOR_ARGB4,
            ValueType::IntColorRgb4 => TYPE_INT_COLOR_RGB4,
            ValueType::Unknown(code) => code,
        }
    }
}

impl From<u8> for ValueType {
    fn from(code: u8) -> Self {
        match code {
            TYPE_NULL => ValueType::Null,
            TYPE_REFERENCE => ValueType::Reference,
            TYPE_ATTRIBUTE => ValueType::Attribute,
            TYPE_STRING => ValueType::String,
            TYPE_FLOAT => ValueType::Float,
            TYPE_DIMENSION => ValueType::Dimension,
            TYPE_FRACTION => ValueType::Fraction,
            TYPE_DYNAMIC_REFERENCE => ValueType::DynamicReference,
            TYPE_DYNAMIC_ATTRIBUTE => ValueType::DynamicAttribute,
            TYPE_INT_DEC => ValueType::IntDec,
            TYPE_INT_HEX => ValueType::IntHex,
            TYPE_INT_BOOLEAN => ValueType::IntBoolean,
            TYPE_INT_COLOR_ARGB8 => ValueType::IntColorArgb8,
            TYPE_INT_COLOR_RGB8 => ValueType::IntColorRgb8,
            TYPE_INT_COLOR_ARGB4 => ValueType::IntColorArgb4,
            TYPE_INT_COLOR_RGB4 => ValueType::IntColorRgb4,
            other => ValueType::Unknown(other),
        }
    }
}

/// A type tag plus its 32 bits of payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypedValue {
    pub value_type: ValueType,
    pub data: u32,
}

impl TypedValue {
    pub fn new(value_type: ValueType, data: u32) -> Self {
        TypedValue { value_type, data }
    }
}

/// Formats a typed value the way it would be written in source XML.
///
/// `pool` is only consulted for [`ValueType::String`]; an index outside the pool
/// (or a missing pool) prints as `@string/0x<index>`.
pub fn format_value<R>(value: &TypedValue, pool: Option<&StringPool>, resolver: &R) -> String
where
    R: ResourceIdResolver + ?Sized,
{
    let data = value.data;
    match value.value_type {
        ValueType::Null => {
            if data == 1 {
                "@empty".to_string()
            } else {
                "@null".to_string()
            }
        }
        ValueType::Reference | ValueType::DynamicReference => {
            if data == 0 {
                "@null".to_string()
            } else {
                resolver.resolve(data)
            }
        }
        ValueType::Attribute | ValueType::DynamicAttribute => {
            let resolved = resolver.resolve(data);
            let name = resolved.strip_prefix('@').unwrap_or(resolved.as_str());
            format!("?{name}")
        }
        ValueType::String => match pool.and_then(|pool| pool.get(data)) {
            Some(text) => text.to_string(),
            None => format!("@string/0x{data:x}"),
        },
        ValueType::Dimension => complex_to_string(data, false),
        ValueType::Fraction => complex_to_string(data, true),
        ValueType::Float => format_decimal(f64::from(f32::from_bits(data))),
        ValueType::IntDec => (data as i32).to_string(),
        ValueType::IntHex => format!("0x{data:x}"),
        ValueType::IntBoolean => (data != 0).to_string(),
        ValueType::IntColorArgb8 => format!("#{data:08X}"),
        ValueType::IntColorRgb8 => format!("#{:06X}", data & 0xFF_FFFF),
        ValueType::IntColorArgb4 => format!("#{:04X}", data & 0xFFFF),
        ValueType::IntColorRgb4 => format!("#{:03X}", data & 0xFFF),
        ValueType::Unknown(_) => format!("@res/0x{data:x}"),
    }
}

/// [`format_value`] without resource name lookup.
pub fn format_value_unresolved(value: &TypedValue, pool: Option<&StringPool>) -> String {
    format_value(value, pool, &NoResolution)
}

/// Decodes a packed dimension or fraction into `<number><unit>`.
///
/// Layout, low bits first: 4-bit unit index, 2-bit radix, 2 unused bits and a
/// 24-bit mantissa. The radix picks how many of the mantissa bits are fractional.
/// Fractions are printed as percentages.
pub fn complex_to_string(complex: u32, is_fraction: bool) -> String {
    let radix = ((complex >> COMPLEX_RADIX_SHIFT) & COMPLEX_RADIX_MASK) as usize;
    let mantissa = u64::from((complex >> COMPLEX_MANTISSA_SHIFT) & COMPLEX_MANTISSA_MASK)
        << RADIX_SHIFTS[radix];
    // f32 arithmetic; the printed digits depend on it.
    let mut value = mantissa as f32 * (1.0f32 / (1u32 << 23) as f32);
    if is_fraction {
        value *= 100.0;
    }
    let unit_index = (complex & COMPLEX_UNIT_MASK) as usize;
    let units: &[&str] = if is_fraction {
        &FRACTION_UNITS
    } else {
        &DIMENSION_UNITS
    };
    let unit = units.get(unit_index).copied().unwrap_or(UNKNOWN_UNIT);
    format!("{}{}", format_decimal(f64::from(value)), unit)
}

/// Prints the shortest digits that round-trip, rounded to at most six fractional
/// digits with trailing zeros removed.
fn format_decimal(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        let text = if value > 0.0 { "\u{221E}" } else { "-\u{221E}" };
        return text.to_string();
    }
    // Large magnitudes keep their shortest digits and are padded with zeros,
    // never the full binary expansion.
    let shortest = value.to_string();
    let fraction_digits = shortest
        .split_once('.')
        .map_or(0, |(_, fraction)| fraction.len());
    if fraction_digits <= MAX_FRACTION_DIGITS {
        return shortest;
    }
    let text = format!("{:.*}", MAX_FRACTION_DIGITS, value);
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn format(value_type: ValueType, data: u32) -> String {
        format_value_unresolved(&TypedValue::new(value_type, data), None)
    }

    /// Packs a complex value from its parts.
    fn complex(mantissa: u32, radix: u32, unit: u32) -> u32 {
        (mantissa << COMPLEX_MANTISSA_SHIFT) | (radix << COMPLEX_RADIX_SHIFT) | unit
    }

    #[test]
    fn null_values() {
        assert_eq!(format(ValueType::Null, 1), "@empty");
        assert_eq!(format(ValueType::Null, 0), "@null");
    }

    #[test]
    fn references_use_the_resolver() {
        assert_eq!(format(ValueType::Reference, 0), "@null");
        assert_eq!(format(ValueType::Reference, 0x0101_0000), "@ref/0x1010000");
        assert_eq!(format(ValueType::DynamicReference, 0x7f01_0001), "@ref/0x7f010001");

        let resolver = |id: u32| format!("@android:string/id_{id:x}");
        let value = TypedValue::new(ValueType::Reference, 0x0104_000a);
        assert_eq!(format_value(&value, None, &resolver), "@android:string/id_104000a");
    }

    #[test]
    fn attributes_become_theme_references() {
        assert_eq!(format(ValueType::Attribute, 0x0101_0030), "?ref/0x1010030");
        let resolver = |_: u32| "@android:attr/textColorPrimary".to_string();
        let value = TypedValue::new(ValueType::DynamicAttribute, 0x0101_0036);
        assert_eq!(
            format_value(&value, None, &resolver),
            "?android:attr/textColorPrimary"
        );
    }

    #[test]
    fn strings_come_from_the_pool() {
        let pool = StringPool::from_strings(["first", "second", "last"]);
        let at = |idx: u32| {
            format_value_unresolved(&TypedValue::new(ValueType::String, idx), Some(&pool))
        };
        assert_eq!(at(0), "first");
        assert_eq!(at(pool.len() as u32 - 1), "last");
        assert_eq!(at(pool.len() as u32), "@string/0x3");
        assert_eq!(format(ValueType::String, 0x1f), "@string/0x1f");
    }

    #[test]
    fn dimensions_and_fractions() {
        assert_eq!(format(ValueType::Dimension, complex(1, 0, 1)), "1dp");
        assert_eq!(format(ValueType::Dimension, complex(0x80_0000, 3, 1)), "1dp");
        assert_eq!(format(ValueType::Dimension, complex(16, 0, 2)), "16sp");
        assert_eq!(format(ValueType::Dimension, complex(0x40_0000, 3, 0)), "0.5px");
        assert_eq!(format(ValueType::Fraction, complex(0x80_0000, 3, 0)), "100%");
        assert_eq!(format(ValueType::Fraction, complex(0x40_0000, 3, 1)), "50%p");
        assert_eq!(format(ValueType::Dimension, complex(1, 0, 9)), "1???");
        assert_eq!(format(ValueType::Fraction, complex(1, 0, 2)), "100???");
    }

    #[test]
    fn radix_selects_fraction_bits() {
        // 1.5 in each radix: 23p0 cannot hold it, the others can.
        assert_eq!(complex_to_string(complex(3 << 22, 3, 0), false), "1.5px");
        assert_eq!(complex_to_string(complex(3 << 14, 2, 0), false), "1.5px");
        assert_eq!(complex_to_string(complex(3 << 6, 1, 0), false), "1.5px");
        assert_eq!(complex_to_string(complex(3, 0, 0), false), "3px");
    }

    #[test]
    fn small_values_round_to_six_digits() {
        // Smallest 0p23 step is 2^-23, well below six digits.
        assert_eq!(complex_to_string(complex(1, 3, 0), false), "0px");
        assert_eq!(complex_to_string(complex(10, 3, 0), false), "0.000001px");
    }

    #[test]
    fn floats() {
        assert_eq!(format(ValueType::Float, 1.0f32.to_bits()), "1");
        assert_eq!(format(ValueType::Float, 0.25f32.to_bits()), "0.25");
        assert_eq!(format(ValueType::Float, (-2.5f32).to_bits()), "-2.5");
        assert_eq!(format(ValueType::Float, 0.1f32.to_bits()), "0.1");
        assert_eq!(format(ValueType::Float, 1234567.0f32.to_bits()), "1234567");
        assert_eq!(format(ValueType::Float, f32::NAN.to_bits()), "NaN");
        assert_eq!(format(ValueType::Float, f32::INFINITY.to_bits()), "\u{221E}");
        assert_eq!(format(ValueType::Float, f32::NEG_INFINITY.to_bits()), "-\u{221E}");
    }

    #[test]
    fn large_floats_keep_shortest_digits() {
        assert_eq!(format(ValueType::Float, 1e20f32.to_bits()), "100000002004087730000");
        assert_eq!(
            format(ValueType::Float, 0x7385_97dc),
            "21168687629120990000000000000000"
        );
        assert_eq!(format(ValueType::Float, (-1e20f32).to_bits()), "-100000002004087730000");
        assert_eq!(format(ValueType::Float, 16_777_216.0f32.to_bits()), "16777216");
    }

    #[test]
    fn integers_and_booleans() {
        assert_eq!(format(ValueType::IntDec, 42), "42");
        assert_eq!(format(ValueType::IntDec, 0xFFFF_FFFF), "-1");
        assert_eq!(format(ValueType::IntHex, 0x30), "0x30");
        assert_eq!(format(ValueType::IntHex, 0xFFFF_FFFF), "0xffffffff");
        assert_eq!(format(ValueType::IntBoolean, 0), "false");
        assert_eq!(format(ValueType::IntBoolean, 0xFFFF_FFFF), "true");
    }

    #[test]
    fn colors() {
        assert_eq!(format(ValueType::IntColorArgb8, 0x80FF_0000), "#80FF0000");
        assert_eq!(format(ValueType::IntColorArgb8, 0xFF), "#000000FF");
        assert_eq!(format(ValueType::IntColorRgb8, 0xFF12_AB34), "#12AB34");
        assert_eq!(format(ValueType::IntColorArgb4, 0xFFFF_F0A3), "#F0A3");
        assert_eq!(format(ValueType::IntColorRgb4, 0xFFFF_F0A3), "#0A3");
    }

    #[test]
    fn unknown_types() {
        assert_eq!(ValueType::from(0x42), ValueType::Unknown(0x42));
        assert_eq!(format(ValueType::Unknown(0x42), 0xBEEF), "@res/0xbeef");
    }

    #[test]
    fn type_codes_roundtrip() {
        for code in 0..=u8::MAX {
            assert_eq!(ValueType::from(code).code(), code);
        }
    }

    proptest! {
        #[test]
        fn complex_values_always_carry_a_unit(packed in any::<u32>(), is_fraction in any::<bool>()) {
            let text = complex_to_string(packed, is_fraction);
            let units: &[&str] = if is_fraction { &FRACTION_UNITS } else { &DIMENSION_UNITS };
            let unit = units
                .iter()
                .copied()
                .chain(std::iter::once(UNKNOWN_UNIT))
                .filter(|unit| text.ends_with(unit))
                .max_by_key(|unit| unit.len())
                .expect("known unit suffix");
            let number = &text[..text.len() - unit.len()];
            prop_assert!(!number.is_empty());
            prop_assert!(number.parse::<f64>().is_ok(), "not a number: {}", number);
            prop_assert!(!number.contains('e'));
        }

        #[test]
        fn formatting_is_idempotent(code in any::<u8>(), data in any::<u32>()) {
            let pool = StringPool::from_strings(["a", "b"]);
            let value = TypedValue::new(ValueType::from(code), data);
            prop_assert_eq!(
                format_value(&value, Some(&pool), &NoResolution),
                format_value(&value, Some(&pool), &NoResolution)
            );
        }
    }
}
