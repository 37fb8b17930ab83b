use std::fmt;
use std::str::FromStr;

use crate::error::LinkError;

pub const DECIMALS: u32 = 9;
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Decimal quantity of native currency, stored exactly in lamports.
///
/// Advisory: shown to the recipient, never checked on redemption.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(u64);

impl Amount {
    pub fn from_lamports(lamports: u64) -> Self {
        Self(lamports)
    }

    pub fn lamports(&self) -> u64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / LAMPORTS_PER_SOL;
        let frac = self.0 % LAMPORTS_PER_SOL;
        if frac == 0 {
            return write!(f, "{whole}");
        }
        let frac = format!("{frac:09}");
        write!(f, "{whole}.{}", frac.trim_end_matches('0'))
    }
}

impl FromStr for Amount {
    type Err = LinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || LinkError::InvalidAmount(s.to_string());

        let (whole, frac) = s.split_once('.').unwrap_or((s, ""));
        if whole.is_empty() && frac.is_empty() {
            return Err(err());
        }
        if frac.len() > DECIMALS as usize
            || !whole.bytes().all(|b| b.is_ascii_digit())
            || !frac.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(err());
        }

        let whole: u64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| err())?
        };
        let frac: u64 = if frac.is_empty() {
            0
        } else {
            let scaled = format!("{frac:0<9}");
            scaled.parse().map_err(|_| err())?
        };

        whole
            .checked_mul(LAMPORTS_PER_SOL)
            .and_then(|w| w.checked_add(frac))
            .map(Self)
            .ok_or_else(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!("0.01".parse::<Amount>().unwrap().lamports(), 10_000_000);
        assert_eq!("1".parse::<Amount>().unwrap().lamports(), LAMPORTS_PER_SOL);
        assert_eq!("2.5".parse::<Amount>().unwrap().lamports(), 2_500_000_000);
        assert_eq!(".5".parse::<Amount>().unwrap().lamports(), 500_000_000);
        assert_eq!("0.000000001".parse::<Amount>().unwrap().lamports(), 1);
    }

    #[test]
    fn test_reject() {
        for bad in ["", ".", "-1", "1e3", "0.0000000001", "abc", "1.2.3", "99999999999999999999"] {
            assert!(bad.parse::<Amount>().is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(Amount::from_lamports(10_000_000).to_string(), "0.01");
        assert_eq!(Amount::from_lamports(3 * LAMPORTS_PER_SOL).to_string(), "3");
        assert_eq!(Amount::from_lamports(1).to_string(), "0.000000001");
        assert_eq!(Amount::from_lamports(0).to_string(), "0");
    }
}
