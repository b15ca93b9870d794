use serde::de::{self, Deserializer, Visitor};
use serde::Deserialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Radix {
    Decimal,
    Hex,
}

/// Unsigned number as a node reported it: a JSON number, a decimal string
/// or a `0x`-prefixed hex string. The radix is kept so follow-up requests
/// can address blocks the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quantity {
    pub value: u64,
    pub radix: Radix,
}

impl Quantity {
    pub fn decimal(value: u64) -> Self {
        Self {
            value,
            radix: Radix::Decimal,
        }
    }

    pub fn parse(s: &str) -> eyre::Result<Self> {
        let s = s.trim();
        if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            let value = u64::from_str_radix(hex, 16)
                .map_err(|e| eyre::eyre!("invalid hex quantity {:?}: {}", s, e))?;
            Ok(Self {
                value,
                radix: Radix::Hex,
            })
        } else {
            let value = s
                .parse::<u64>()
                .map_err(|e| eyre::eyre!("invalid decimal quantity {:?}: {}", s, e))?;
            Ok(Self::decimal(value))
        }
    }

    /// Value as Unix seconds; fails when it does not fit an `i64`
    pub fn unix_secs(&self) -> eyre::Result<i64> {
        i64::try_from(self.value)
            .map_err(|_| eyre::eyre!("timestamp {} out of range", self.value))
    }

    /// Same number in this quantity's radix
    pub fn encode(&self, value: u64) -> String {
        match self.radix {
            Radix::Hex => format!("{:#x}", value),
            Radix::Decimal => value.to_string(),
        }
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct QuantityVisitor;

        impl<'de> Visitor<'de> for QuantityVisitor {
            type Value = Quantity;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an unsigned integer, a decimal string or a 0x-prefixed hex string")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Quantity, E> {
                Ok(Quantity::decimal(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Quantity, E> {
                u64::try_from(v)
                    .map(Quantity::decimal)
                    .map_err(|_| E::custom(format!("negative quantity {}", v)))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Quantity, E> {
                Quantity::parse(v).map_err(E::custom)
            }
        }

        deserializer.deserialize_any(QuantityVisitor)
    }
}

/// Nanoseconds elapsed since `start`, saturating
pub fn elapsed_ns(start: std::time::Instant) -> u64 {
    u64::try_from(start.elapsed().as_nanos()).unwrap_or(u64::MAX)
}
