use serde::{Deserialize, Serialize};

/// A single nucleotide as reported at a typing site.
///
/// `N` stands for "no usable coverage or ambiguous pileup" and is never a
/// valid allele in a [`VariantTarget`](crate::core::target::VariantTarget).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Base {
    A,
    C,
    G,
    T,
    N,
}

impl Base {
    /// The four concrete bases, in index order.
    pub const ACGT: [Base; 4] = [Base::A, Base::C, Base::G, Base::T];

    /// Parse a single nucleotide byte, case-insensitively.
    ///
    /// Returns `None` for anything outside `ACGTN`.
    #[must_use]
    pub fn from_byte(b: u8) -> Option<Self> {
        match b.to_ascii_uppercase() {
            b'A' => Some(Self::A),
            b'C' => Some(Self::C),
            b'G' => Some(Self::G),
            b'T' => Some(Self::T),
            b'N' => Some(Self::N),
            _ => None,
        }
    }

    /// Parse a string holding exactly one nucleotide.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.as_bytes() {
            [b] => Self::from_byte(*b),
            _ => None,
        }
    }

    /// Index into an `[_; 4]` count array, `None` for `N`.
    #[must_use]
    pub fn index(self) -> Option<usize> {
        match self {
            Self::A => Some(0),
            Self::C => Some(1),
            Self::G => Some(2),
            Self::T => Some(3),
            Self::N => None,
        }
    }

    #[must_use]
    pub fn is_called(self) -> bool {
        self != Self::N
    }
}

impl std::fmt::Display for Base {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let c = match self {
            Self::A => 'A',
            Self::C => 'C',
            Self::G => 'G',
            Self::T => 'T',
            Self::N => 'N',
        };
        write!(f, "{c}")
    }
}

/// Outcome of comparing an observed base against a site's expected alleles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    /// Observed base equals the reference allele
    Reference,
    /// Observed base equals the alternate allele
    Alternate,
    /// A third base, matching neither expected allele
    Other,
    /// No usable coverage, or an ambiguous pileup
    NoData,
}

impl Category {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Reference => "REFERENCE",
            Self::Alternate => "ALTERNATE",
            Self::Other => "OTHER",
            Self::NoData => "NO_DATA",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
