//! Rendering helpers shared by the command types.

use core::fmt;

/// A byte sequence rendered as colon-separated two-digit hex (`de:ad:be:ef`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HexBytes<'a>(pub &'a [u8]);

impl fmt::Display for HexBytes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(":")?;
            }
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// A frequency in hertz, rendered with a magnitude-dependent unit and three decimals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Frequency(pub u32);

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hz = self.0 as f64;
        match self.0 {
            0..1_000 => write!(f, "{hz:.3} Hz"),
            1_000..1_000_000 => write!(f, "{:.3} kHz", hz / 1e3),
            1_000_000..1_000_000_000 => write!(f, "{:.3} MHz", hz / 1e6),
            _ => write!(f, "{:.3} GHz", hz / 1e9),
        }
    }
}

/// Writes `bits` as `|`-joined names in table order.
///
/// Bits without a name are kept as a trailing hex group, and an empty set is `0x0`.
pub(crate) fn write_flags(
    f: &mut fmt::Formatter<'_>,
    bits: u32,
    names: &[(u32, &str)],
) -> fmt::Result {
    let mut residual = bits;
    let mut first = true;

    for &(flag, name) in names {
        if flag != 0 && bits & flag == flag {
            if !first {
                f.write_str("|")?;
            }
            f.write_str(name)?;
            residual &= !flag;
            first = false;
        }
    }

    if residual != 0 || first {
        if !first {
            f.write_str("|")?;
        }
        write!(f, "{residual:#x}")?;
    }

    Ok(())
}

/// Writes each item separated by `, `.
pub(crate) fn write_list<T: fmt::Display>(
    f: &mut fmt::Formatter<'_>,
    items: impl IntoIterator<Item = T>,
) -> fmt::Result {
    for (i, item) in items.into_iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    struct Flags(u32);

    impl fmt::Display for Flags {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write_flags(f, self.0, &[(1, "SWD"), (2, "JTAG"), (16, "Atomic")])
        }
    }

    #[test]
    fn hex_bytes() {
        assert_eq!(HexBytes(&[0xde, 0xad, 0x0f]).to_string(), "de:ad:0f");
        assert_eq!(HexBytes(&[]).to_string(), "");
    }

    #[test]
    fn frequency_units() {
        assert_eq!(Frequency(999).to_string(), "999.000 Hz");
        assert_eq!(Frequency(1_000).to_string(), "1.000 kHz");
        assert_eq!(Frequency(125_500).to_string(), "125.500 kHz");
        assert_eq!(Frequency(1_000_000).to_string(), "1.000 MHz");
        assert_eq!(Frequency(4_000_000_000).to_string(), "4.000 GHz");
    }

    #[test]
    fn flags_keep_residual_bits() {
        assert_eq!(Flags(0x11).to_string(), "SWD|Atomic");
        assert_eq!(Flags(0x203).to_string(), "SWD|JTAG|0x200");
        assert_eq!(Flags(0x40).to_string(), "0x40");
        assert_eq!(Flags(0).to_string(), "0x0");
    }
}
