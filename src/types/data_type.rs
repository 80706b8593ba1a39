//! # Access Column Data Types
//!
//! `DataType` is the column type code stored in a Jet table definition. The
//! discriminants are the on-disk codes, so `#[repr(u8)]` plus `TryFrom<u8>`
//! is all the decoding a table-definition reader needs.
//!
//! ## Type Categories
//!
//! | Category     | Types                                  | Index storage        |
//! |--------------|----------------------------------------|----------------------|
//! | **Boolean**  | Boolean                                | flag byte only       |
//! | **Integer**  | Byte, Int, Long, BigInt, Money         | 1, 2, 4, 8, 8 bytes  |
//! | **Float**    | Float, Double                          | 4, 8 bytes           |
//! | **Date/Time**| ShortDateTime                          | 8 bytes (date double)|
//! | **Decimal**  | Numeric                                | 16 bytes             |
//! | **Text**     | Text, Memo                             | variable, collated   |
//! | **Binary**   | Binary, Guid                           | 8-byte chunks        |
//! | **Opaque**   | Ole, ComplexType                       | not indexable        |

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Boolean = 0x01,
    Byte = 0x02,
    Int = 0x03,
    Long = 0x04,
    Money = 0x05,
    Float = 0x06,
    Double = 0x07,
    ShortDateTime = 0x08,
    Binary = 0x09,
    Text = 0x0A,
    Ole = 0x0B,
    Memo = 0x0C,
    Guid = 0x0F,
    Numeric = 0x10,
    ComplexType = 0x12,
    BigInt = 0x13,
}

impl DataType {
    /// Byte width of the value inside an index entry (excluding the flag
    /// byte), or None for variable-length encodings.
    pub fn fixed_index_size(&self) -> Option<usize> {
        match self {
            DataType::Boolean => Some(0),
            DataType::Byte => Some(1),
            DataType::Int => Some(2),
            DataType::Long | DataType::Float => Some(4),
            DataType::Money | DataType::Double | DataType::ShortDateTime | DataType::BigInt => {
                Some(8)
            }
            DataType::Numeric => Some(16),
            DataType::Text
            | DataType::Memo
            | DataType::Binary
            | DataType::Guid
            | DataType::Ole
            | DataType::ComplexType => None,
        }
    }

    /// Whether an index over a column of this type can be maintained.
    pub fn is_indexable(&self) -> bool {
        !matches!(self, DataType::Ole | DataType::ComplexType)
    }

    pub fn is_text(&self) -> bool {
        matches!(self, DataType::Text | DataType::Memo)
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            DataType::Byte | DataType::Int | DataType::Long | DataType::BigInt
        )
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            DataType::Byte
                | DataType::Int
                | DataType::Long
                | DataType::BigInt
                | DataType::Money
                | DataType::Float
                | DataType::Double
                | DataType::Numeric
        )
    }
}

impl TryFrom<u8> for DataType {
    type Error = eyre::Report;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(DataType::Boolean),
            0x02 => Ok(DataType::Byte),
            0x03 => Ok(DataType::Int),
            0x04 => Ok(DataType::Long),
            0x05 => Ok(DataType::Money),
            0x06 => Ok(DataType::Float),
            0x07 => Ok(DataType::Double),
            0x08 => Ok(DataType::ShortDateTime),
            0x09 => Ok(DataType::Binary),
            0x0A => Ok(DataType::Text),
            0x0B => Ok(DataType::Ole),
            0x0C => Ok(DataType::Memo),
            0x0F => Ok(DataType::Guid),
            0x10 => Ok(DataType::Numeric),
            0x12 => Ok(DataType::ComplexType),
            0x13 => Ok(DataType::BigInt),
            _ => eyre::bail!("invalid column type code: 0x{:02X}", value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_codes_round_trip() {
        for dt in [
            DataType::Boolean,
            DataType::Long,
            DataType::Text,
            DataType::Numeric,
            DataType::BigInt,
        ] {
            assert_eq!(DataType::try_from(dt as u8).unwrap(), dt);
        }
        assert!(DataType::try_from(0x0E).is_err());
    }

    #[test]
    fn opaque_types_are_not_indexable() {
        assert!(!DataType::Ole.is_indexable());
        assert!(!DataType::ComplexType.is_indexable());
        assert!(DataType::Memo.is_indexable());
        assert_eq!(DataType::Boolean.fixed_index_size(), Some(0));
        assert_eq!(DataType::Text.fixed_index_size(), None);
    }
}
